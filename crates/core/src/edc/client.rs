//! Management-plane client operations.
//!
//! [`EdcService`] is the stateless protocol client the drivers work
//! against: catalog queries, negotiation and transfer start calls, and the
//! blocking poll loops that observe the two remote state machines. It
//! builds every envelope and URL itself and pushes the raw exchange down
//! through the [`Connector`] seam.

use crate::config::AppConfig;
use crate::edc::connector::Connector;
use crate::edc::error::{EdcError, EdcResult};
use crate::store::StorageResult;
use dpp_protocol::{
    Catalog, CatalogRequest, Dataset, IdResponse, Negotiation, NegotiationRequest, Transfer,
    TransferRequest,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Data-plane protocol sub-path appended to connector base URLs.
pub const DSP_PATH: &str = "/api/v1/dsp";

/// Catalog filter key selecting assets by id.
pub const ASSET_ID_FILTER: &str = "https://w3id.org/edc/v0.0.1/ns/id";

/// Catalog filter key selecting assets by type (registry search).
pub const ASSET_TYPE_FILTER: &str = "https://w3id.org/edc/v0.0.1/ns/type";

/// Append the DSP sub-path to a connector base URL.
pub fn data_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(DSP_PATH) {
        base.to_string()
    } else {
        format!("{base}{DSP_PATH}")
    }
}

/// Result of a polling loop: either the remote machine reached a terminal
/// state, or the caller's abort predicate fired first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The remote state machine reached a terminal state.
    Terminal(T),
    /// Cancellation was observed; nothing further was persisted.
    Aborted,
}

/// The two remote state machines the engine polls.
#[derive(Debug, Clone, Copy)]
enum Machine {
    Negotiation,
    Transfer,
}

impl Machine {
    fn label(&self) -> &'static str {
        match self {
            Machine::Negotiation => "contract negotiation",
            Machine::Transfer => "transfer process",
        }
    }

    fn is_terminal(&self, state: &str) -> bool {
        match self {
            Machine::Negotiation => Negotiation::is_terminal(state),
            Machine::Transfer => Transfer::is_terminal(state),
        }
    }
}

/// Stateless client for one counterparty-facing management plane.
pub struct EdcService {
    connector: Arc<dyn Connector>,
    config: Arc<AppConfig>,
}

impl EdcService {
    pub fn new(config: Arc<AppConfig>, connector: Arc<dyn Connector>) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn management_url(&self, path: &str) -> String {
        let edc = &self.config.edc;
        format!("{}{}{}", edc.endpoint, edc.management, path)
    }

    /// Check the consumer connector connection by issuing an empty catalog
    /// query against its own DSP endpoint and returning the participant id.
    pub async fn participant_id(&self) -> EdcResult<String> {
        let own_dsp = data_endpoint(&self.config.edc.endpoint);
        let catalog = self
            .catalog_by_filter(&own_dsp, ASSET_ID_FILTER, "")
            .await?
            .ok_or_else(|| EdcError::PeerUnreachable(own_dsp.clone()))?;
        catalog
            .participant_id
            .filter(|participant| !participant.is_empty())
            .ok_or_else(|| {
                EdcError::Protocol(format!("catalog from [{own_dsp}] carries no participant id"))
            })
    }

    /// Query a provider catalog with a single equality filter. `None`
    /// means the provider answered with an empty body.
    pub async fn catalog_by_filter(
        &self,
        provider_dsp: &str,
        key: &str,
        value: &str,
    ) -> EdcResult<Option<Catalog>> {
        let request = CatalogRequest::by_filter(provider_dsp, key, value);
        let url = self.management_url(&self.config.edc.catalog);
        match self.connector.request_catalog(&url, &request).await? {
            None => Ok(None),
            Some(body) => serde_json::from_value(body).map(Some).map_err(|error| {
                EdcError::Protocol(format!("malformed catalog from [{provider_dsp}]: {error}"))
            }),
        }
    }

    /// Look up the contract offer for `asset_id` in the provider catalog.
    ///
    /// A single advertised dataset is returned directly; a list is indexed
    /// by asset id and `None` means no entry matched.
    pub async fn find_offer_by_asset_id(
        &self,
        provider_dsp: &str,
        asset_id: &str,
    ) -> EdcResult<Option<Dataset>> {
        let Some(catalog) = self
            .catalog_by_filter(provider_dsp, ASSET_ID_FILTER, asset_id)
            .await?
        else {
            return Ok(None);
        };
        let Some(offers) = catalog.contract_offers else {
            return Ok(None);
        };

        match offers {
            Value::Array(entries) => {
                let datasets: Vec<Dataset> =
                    serde_json::from_value(Value::Array(entries)).map_err(|error| {
                        EdcError::Protocol(format!("malformed catalog datasets: {error}"))
                    })?;
                Ok(datasets.into_iter().find(|dataset| dataset.asset_id == asset_id))
            }
            single => serde_json::from_value(single).map(Some).map_err(|error| {
                EdcError::Protocol(format!("malformed catalog dataset: {error}"))
            }),
        }
    }

    /// Search a provider for its digital-twin-registry catalog.
    pub async fn search_registry_catalog(&self, provider_url: &str) -> EdcResult<Option<Catalog>> {
        self.catalog_by_filter(
            &data_endpoint(provider_url),
            ASSET_TYPE_FILTER,
            &self.config.dtr.asset_type,
        )
        .await
    }

    /// Start a contract negotiation and return the remote-assigned id.
    pub async fn start_negotiation(&self, request: &NegotiationRequest) -> EdcResult<IdResponse> {
        let url = self.management_url(&self.config.edc.negotiation);
        info!(offer_id = %request.offer.offer_id, "starting contract negotiation");
        let body = self
            .connector
            .start_negotiation(&url, request)
            .await?
            .ok_or_else(|| EdcError::PeerUnreachable(url.clone()))?;
        serde_json::from_value(body)
            .map_err(|error| EdcError::Protocol(format!("malformed id response: {error}")))
    }

    /// Start a transfer process and return the remote-assigned id.
    pub async fn start_transfer(&self, request: &TransferRequest) -> EdcResult<IdResponse> {
        let url = self.management_url(&self.config.edc.transfer);
        info!(contract_id = %request.contract_id, "starting transfer process");
        let body = self
            .connector
            .start_transfer(&url, request)
            .await?
            .ok_or_else(|| EdcError::PeerUnreachable(url.clone()))?;
        serde_json::from_value(body)
            .map_err(|error| EdcError::Protocol(format!("malformed id response: {error}")))
    }

    /// Poll a contract negotiation to a terminal state.
    ///
    /// `abort` is consulted once per iteration; `on_transition` runs for
    /// every observed state change before the abort check, so the last
    /// observation is persisted even when the poll is then cancelled.
    pub async fn poll_negotiation(
        &self,
        id: &str,
        abort: impl Fn() -> bool + Send,
        on_transition: impl FnMut(&str) -> StorageResult<()> + Send,
    ) -> EdcResult<PollOutcome<Negotiation>> {
        match self
            .poll_until_terminal(Machine::Negotiation, id, abort, on_transition)
            .await?
        {
            PollOutcome::Aborted => Ok(PollOutcome::Aborted),
            PollOutcome::Terminal(body) => serde_json::from_value(body)
                .map(PollOutcome::Terminal)
                .map_err(|error| EdcError::Protocol(format!("malformed negotiation: {error}"))),
        }
    }

    /// Poll a transfer process to a terminal state. Same contract as
    /// [`Self::poll_negotiation`].
    pub async fn poll_transfer(
        &self,
        id: &str,
        abort: impl Fn() -> bool + Send,
        on_transition: impl FnMut(&str) -> StorageResult<()> + Send,
    ) -> EdcResult<PollOutcome<Transfer>> {
        match self
            .poll_until_terminal(Machine::Transfer, id, abort, on_transition)
            .await?
        {
            PollOutcome::Aborted => Ok(PollOutcome::Aborted),
            PollOutcome::Terminal(body) => serde_json::from_value(body)
                .map(PollOutcome::Terminal)
                .map_err(|error| EdcError::Protocol(format!("malformed transfer: {error}"))),
        }
    }

    /// Fetch an artifact from a one-shot data-plane endpoint.
    pub async fn fetch_artifact(&self, endpoint: &str) -> EdcResult<Value> {
        self.connector
            .fetch_artifact(endpoint)
            .await?
            .ok_or_else(|| EdcError::PeerUnreachable(endpoint.to_string()))
    }

    /// The one polling loop both remote machines share.
    ///
    /// There is deliberately no iteration cap: the counterparty is the
    /// timing authority, and deadlines are imposed from outside by the
    /// supervisor.
    async fn poll_until_terminal(
        &self,
        machine: Machine,
        id: &str,
        abort: impl Fn() -> bool + Send,
        mut on_transition: impl FnMut(&str) -> StorageResult<()> + Send,
    ) -> EdcResult<PollOutcome<Value>> {
        let path = match machine {
            Machine::Negotiation => &self.config.edc.negotiation,
            Machine::Transfer => &self.config.edc.transfer,
        };
        let url = format!("{}/{}", self.management_url(path), id);

        let mut last_state = String::new();
        let mut since = Instant::now();
        debug!(%id, "checking {} status", machine.label());

        loop {
            let body = match machine {
                Machine::Negotiation => self.connector.fetch_negotiation(&url).await?,
                Machine::Transfer => self.connector.fetch_transfer(&url).await?,
            }
            .ok_or_else(|| EdcError::PeerUnreachable(url.clone()))?;

            let state = body
                .get("edc:state")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    EdcError::Protocol(format!(
                        "{} [{id}] response carries no edc:state",
                        machine.label()
                    ))
                })?
                .to_string();

            if machine.is_terminal(&state) {
                debug!(%id, %state, "{} finished", machine.label());
                return Ok(PollOutcome::Terminal(body));
            }

            if state != last_state {
                on_transition(&state)?;
                debug!(%id, %state, elapsed = ?since.elapsed(), "{} state changed", machine.label());
                since = Instant::now();
                last_state = state;
            }

            if abort() {
                info!(%id, "{} polling cancelled", machine.label());
                return Ok(PollOutcome::Aborted);
            }

            tokio::time::sleep(self.config.edc.poll_interval()).await;
        }
    }
}
