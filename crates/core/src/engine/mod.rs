//! Exchange engine.
//!
//! The controller-facing facade over the whole core: it creates processes,
//! spawns the driver chain for each of them (negotiation strictly before
//! transfer), fans out registry transfers, and routes user cancellation
//! through the supervisor.

use crate::config::AppConfig;
use crate::drivers::{negotiation, registry, transfer, DriverContext};
use crate::edc::{Connector, EdcService};
use crate::state::{transitions, ProcessDataModel};
use crate::store::{ProcessStore, StorageError, StorageResult};
use crate::supervisor::Supervisor;
use anyhow::{bail, Result};
use dpp_protocol::{Dataset, Dtr, Process, ProcessState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// The main orchestration engine.
///
/// One instance owns all active processes of this deployment; processes in
/// a terminal state stay queryable but are no longer scheduled.
pub struct ExchangeEngine {
    edc: Arc<EdcService>,
    store: Arc<ProcessStore>,
    model: Arc<ProcessDataModel>,
    supervisor: Arc<Supervisor>,
}

impl ExchangeEngine {
    /// Build an engine over `connector`, persisting under `store_root`.
    pub fn new(
        config: AppConfig,
        connector: Arc<dyn Connector>,
        store_root: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let store = Arc::new(ProcessStore::new(store_root)?);
        let model = Arc::new(ProcessDataModel::new());
        let supervisor = Arc::new(Supervisor::new(Arc::clone(&store), Arc::clone(&model)));
        let edc = Arc::new(EdcService::new(Arc::new(config), connector));
        Ok(Self {
            edc,
            store,
            model,
            supervisor,
        })
    }

    /// The protocol client, for callers that need direct catalog access.
    pub fn edc(&self) -> &Arc<EdcService> {
        &self.edc
    }

    /// The process store, for direct journal reads.
    pub fn store(&self) -> &Arc<ProcessStore> {
        &self.store
    }

    /// The in-memory data model.
    pub fn model(&self) -> &Arc<ProcessDataModel> {
        &self.model
    }

    /// Create and register a new process for `endpoint`/`bpn`.
    pub fn create_process(&self, endpoint: &str, bpn: &str) -> StorageResult<Process> {
        let process = self.store.create(endpoint, bpn)?;
        self.model.register(&process.id);
        Ok(process)
    }

    fn driver_context(&self) -> DriverContext {
        DriverContext {
            edc: Arc::clone(&self.edc),
            store: Arc::clone(&self.store),
            model: Arc::clone(&self.model),
        }
    }

    /// Schedule the negotiation/transfer chain for a created process.
    ///
    /// The spawned worker drives the contract negotiation to a terminal
    /// state and, only on success, hands over to the transfer driver; at
    /// most one of each is ever active per process.
    pub fn start_exchange(&self, process_id: &str, bpn: &str, dataset: Dataset) -> Result<()> {
        if self.model.has_active_driver(process_id) {
            bail!("process [{process_id}] already has an active driver chain");
        }
        match self.model.state(process_id) {
            Some(ProcessState::Created) => {}
            Some(state) => bail!("process [{process_id}] cannot start an exchange from {state:?}"),
            None => bail!("process [{process_id}] is not registered"),
        }
        transitions::start_process(&self.store, &self.model, process_id)?;

        let ctx = self.driver_context();
        let supervisor = Arc::clone(&self.supervisor);
        let deadline = self.edc.config().edc.step_deadline();
        let process_id_owned = process_id.to_string();
        let bpn = bpn.to_string();

        let handle = tokio::spawn(async move {
            let process_id = process_id_owned;
            let negotiation = match deadline {
                Some(limit) => supervisor
                    .enforce_deadline(&process_id, limit, negotiation::run(&ctx, &process_id, &bpn, &dataset))
                    .await
                    .flatten(),
                None => negotiation::run(&ctx, &process_id, &bpn, &dataset).await,
            };
            let Some(negotiation) = negotiation else {
                return;
            };

            match deadline {
                Some(limit) => {
                    supervisor
                        .enforce_deadline(
                            &process_id,
                            limit,
                            transfer::run(&ctx, &process_id, &bpn, &dataset, &negotiation),
                        )
                        .await;
                }
                None => {
                    transfer::run(&ctx, &process_id, &bpn, &dataset, &negotiation).await;
                }
            }
        });

        self.model.attach(process_id, handle)?;
        Ok(())
    }

    /// Schedule registry transfers for every discovered endpoint.
    ///
    /// The workers run in parallel and persist under endpoint-qualified
    /// keys; none of them drives the process to a terminal state.
    pub fn start_registry_fetch(&self, process_id: &str, endpoints: Vec<(String, Dtr)>) -> Result<()> {
        // The single handle slot is first-come-first-served: a running
        // exchange chain must finish (or be joined) before a registry
        // fan-out may claim it.
        if self.model.has_active_driver(process_id) {
            bail!("process [{process_id}] already has an active driver chain");
        }
        match self.model.state(process_id) {
            Some(ProcessState::Created) => {
                transitions::start_process(&self.store, &self.model, process_id)?;
            }
            Some(state) if !state.is_terminal() => {}
            Some(state) => bail!("process [{process_id}] cannot fetch registries from {state:?}"),
            None => bail!("process [{process_id}] is not registered"),
        }

        let ctx = self.driver_context();
        let process_id_owned = process_id.to_string();
        let handle = tokio::spawn(async move {
            let process_id = process_id_owned;
            let workers: Vec<_> = endpoints
                .into_iter()
                .map(|(endpoint_id, dtr)| {
                    let ctx = ctx.clone();
                    let process_id = process_id.clone();
                    tokio::spawn(async move {
                        registry::run(&ctx, &process_id, &endpoint_id, &dtr).await;
                    })
                })
                .collect();
            for worker in workers {
                if let Err(error) = worker.await {
                    debug!(%process_id, %error, "registry worker panicked");
                }
            }
        });

        self.model.attach(process_id, handle)?;
        Ok(())
    }

    /// Cancel a process. Polling drivers observe the signal within one
    /// poll interval plus one in-flight call.
    pub fn terminate(&self, process_id: &str) -> Result<()> {
        self.supervisor.terminate(process_id)
    }

    /// Snapshot of the process record.
    pub fn status(&self, process_id: &str) -> StorageResult<Process> {
        self.store.get(process_id)
    }

    /// Await the driver chain of a process, if one is attached.
    pub async fn join(&self, process_id: &str) {
        if let Some(handle) = self.model.take_handle(process_id) {
            if let Err(error) = handle.await {
                debug!(%process_id, %error, "driver task panicked");
            }
        }
    }

    /// Number of processes registered with this engine.
    pub fn process_count(&self) -> usize {
        self.model.len()
    }
}
