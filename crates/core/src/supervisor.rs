//! Cancellation and timeout supervisor.
//!
//! Termination is cooperative: flipping the in-memory state to Terminated
//! is observed by every polling loop on its next iteration. Deadlines wrap
//! a driver future in a timeout; when the deadline elapses the supervisor
//! forces the process to Terminated with a `timeout: FAILED` entry.

use crate::state::transitions;
use crate::state::ProcessDataModel;
use crate::store::ProcessStore;
use anyhow::Result;
use dpp_protocol::{History, ProcessState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Supervisor {
    store: Arc<ProcessStore>,
    model: Arc<ProcessDataModel>,
}

impl Supervisor {
    pub fn new(store: Arc<ProcessStore>, model: Arc<ProcessDataModel>) -> Self {
        Self { store, model }
    }

    /// Propagate a user abort signal to the process.
    ///
    /// The next polling iteration of any driver working on it observes the
    /// flag and returns without persisting further remote state.
    pub fn terminate(&self, process_id: &str) -> Result<()> {
        transitions::terminate_process(&self.store, &self.model, process_id)
    }

    /// Run `work` under a per-step deadline.
    ///
    /// On timeout the driver future is dropped at its current suspension
    /// point and the process is forced to Terminated.
    pub async fn enforce_deadline<T>(
        &self,
        process_id: &str,
        deadline: Duration,
        work: impl Future<Output = T>,
    ) -> Option<T> {
        match tokio::time::timeout(deadline, work).await {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%process_id, ?deadline, "step deadline elapsed, terminating");
                if let Err(error) =
                    self.store
                        .set_status(process_id, "timeout", History::new(process_id, "FAILED"))
                {
                    debug!(%process_id, %error, "could not journal the timeout");
                }
                if self.model.signal_terminate(process_id).is_ok() {
                    if let Err(error) = self.store.update_state(process_id, ProcessState::Terminated)
                    {
                        debug!(%process_id, %error, "could not persist the terminated state");
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::ProcessDataModel;

    fn setup() -> (tempfile::TempDir, Supervisor, Arc<ProcessStore>, Arc<ProcessDataModel>, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ProcessStore::new(dir.path()).unwrap());
        let model = Arc::new(ProcessDataModel::new());
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();
        model.register(&process.id);
        let supervisor = Supervisor::new(Arc::clone(&store), Arc::clone(&model));
        (dir, supervisor, store, model, process.id)
    }

    #[tokio::test]
    async fn test_deadline_passes_results_through() {
        let (_dir, supervisor, _store, _model, id) = setup();
        let result = supervisor
            .enforce_deadline(&id, Duration::from_secs(5), async { 42 })
            .await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_deadline_forces_termination() {
        let (_dir, supervisor, store, model, id) = setup();
        model.set_state(&id, ProcessState::Running).unwrap();

        let result = supervisor
            .enforce_deadline(&id, Duration::from_millis(10), std::future::pending::<()>())
            .await;

        assert!(result.is_none());
        assert!(model.is_terminated(&id));
        let record = store.get(&id).unwrap();
        assert_eq!(record.state, ProcessState::Terminated);
        assert_eq!(record.get_history("timeout").unwrap().status, "FAILED");
    }

    #[tokio::test]
    async fn test_terminate_is_cooperative() {
        let (_dir, supervisor, store, model, id) = setup();
        model.set_state(&id, ProcessState::Running).unwrap();

        supervisor.terminate(&id).unwrap();

        assert!(model.is_terminated(&id));
        assert_eq!(store.get(&id).unwrap().state, ProcessState::Terminated);
    }
}
