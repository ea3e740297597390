//! Scripted mock connector for tests.
//!
//! Plays back configured remote state sequences instead of talking to a
//! management plane, and records every outbound request so tests can
//! assert on what was (or was not) sent. The last state of a sequence
//! repeats, mimicking a remote machine resting in its terminal state.

use crate::edc::connector::Connector;
use crate::edc::error::EdcResult;
use async_trait::async_trait;
use dpp_protocol::{CatalogRequest, NegotiationRequest, TransferRequest, NEGOTIATION_SUCCESS};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn next_body(queue: &mut VecDeque<Value>) -> Option<Value> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Connector playing back scripted responses.
#[derive(Default)]
pub struct MockConnector {
    catalog: Mutex<Option<Value>>,
    artifact: Mutex<Option<Value>>,
    negotiation_id: Mutex<String>,
    negotiation_bodies: Mutex<VecDeque<Value>>,
    transfer_bodies: Mutex<VecDeque<Value>>,
    keyed_transfer_bodies: Mutex<HashMap<String, VecDeque<Value>>>,

    /// Every negotiation request that was started.
    pub negotiation_requests: Mutex<Vec<NegotiationRequest>>,
    /// Every transfer request that was started.
    pub transfer_requests: Mutex<Vec<TransferRequest>>,
    /// Every catalog query that was issued.
    pub catalog_requests: Mutex<Vec<CatalogRequest>>,
    /// Number of negotiation poll fetches served.
    pub negotiation_fetches: AtomicUsize,
    /// Number of transfer poll fetches served.
    pub transfer_fetches: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            negotiation_id: Mutex::new("negotiation-1".to_string()),
            ..Self::default()
        }
    }

    /// Respond to catalog queries with `catalog`.
    pub fn with_catalog(self, catalog: Value) -> Self {
        *self.catalog.lock().unwrap() = Some(catalog);
        self
    }

    /// Respond to artifact fetches with `artifact`.
    pub fn with_artifact(self, artifact: Value) -> Self {
        *self.artifact.lock().unwrap() = Some(artifact);
        self
    }

    /// Script the negotiation `id` through `states`, one per poll. A
    /// terminal-success state carries a contract agreement id.
    pub fn with_negotiation_states(self, id: &str, states: &[&str]) -> Self {
        *self.negotiation_id.lock().unwrap() = id.to_string();
        let bodies = states
            .iter()
            .map(|state| {
                let mut body = json!({ "@id": id, "edc:state": state });
                if NEGOTIATION_SUCCESS.contains(state) {
                    body["edc:contractAgreementId"] = json!(format!("agreement-{id}"));
                }
                body
            })
            .collect();
        *self.negotiation_bodies.lock().unwrap() = bodies;
        self
    }

    /// Script raw negotiation poll bodies, e.g. one without `edc:state`.
    pub fn with_negotiation_bodies(self, bodies: Vec<Value>) -> Self {
        *self.negotiation_bodies.lock().unwrap() = bodies.into();
        self
    }

    /// Script the default transfer sequence (for the single-transfer path).
    pub fn with_transfer_states(self, id: &str, states: &[&str]) -> Self {
        let bodies = states
            .iter()
            .map(|state| json!({ "@id": id, "edc:state": state }))
            .collect();
        *self.transfer_bodies.lock().unwrap() = bodies;
        self
    }

    /// Script the transfer sequence for one registry endpoint. The mock
    /// assigns transfer id `transfer-<endpointId>` based on the last
    /// receiver-endpoint segment, so sequences here are keyed the same way.
    pub fn with_transfer_states_for(self, endpoint_id: &str, states: &[&str]) -> Self {
        let id = format!("transfer-{endpoint_id}");
        let bodies = states
            .iter()
            .map(|state| json!({ "@id": id, "edc:state": state }))
            .collect();
        self.keyed_transfer_bodies.lock().unwrap().insert(id, bodies);
        self
    }

    fn last_segment(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn request_catalog(&self, _url: &str, request: &CatalogRequest) -> EdcResult<Option<Value>> {
        self.catalog_requests.lock().unwrap().push(request.clone());
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn start_negotiation(
        &self,
        _url: &str,
        request: &NegotiationRequest,
    ) -> EdcResult<Option<Value>> {
        self.negotiation_requests.lock().unwrap().push(request.clone());
        let id = self.negotiation_id.lock().unwrap().clone();
        Ok(Some(json!({ "@id": id })))
    }

    async fn fetch_negotiation(&self, _url: &str) -> EdcResult<Option<Value>> {
        self.negotiation_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(next_body(&mut self.negotiation_bodies.lock().unwrap()))
    }

    async fn start_transfer(&self, _url: &str, request: &TransferRequest) -> EdcResult<Option<Value>> {
        self.transfer_requests.lock().unwrap().push(request.clone());
        let suffix = Self::last_segment(&request.private_properties.receiver_http_endpoint);
        Ok(Some(json!({ "@id": format!("transfer-{suffix}") })))
    }

    async fn fetch_transfer(&self, url: &str) -> EdcResult<Option<Value>> {
        self.transfer_fetches.fetch_add(1, Ordering::SeqCst);
        let id = Self::last_segment(url).to_string();
        let mut keyed = self.keyed_transfer_bodies.lock().unwrap();
        if let Some(queue) = keyed.get_mut(&id) {
            return Ok(next_body(queue));
        }
        Ok(next_body(&mut self.transfer_bodies.lock().unwrap()))
    }

    async fn fetch_artifact(&self, _url: &str) -> EdcResult<Option<Value>> {
        Ok(self.artifact.lock().unwrap().clone())
    }
}
