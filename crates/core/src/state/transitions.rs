//! Process lifecycle transitions.
//!
//! Free functions that move a process through its lifecycle, keeping the
//! in-memory data model and the persisted record in step. Each transition
//! writes its history entry before the state change becomes observable.

use crate::state::model::ProcessDataModel;
use crate::store::ProcessStore;
use anyhow::Result;
use dpp_protocol::{History, ProcessState};
use tracing::{debug, info};

/// Transition the process to Running once a driver is scheduled.
pub fn start_process(store: &ProcessStore, model: &ProcessDataModel, process_id: &str) -> Result<()> {
    store.set_status(process_id, "process-started", History::new(process_id, "RUNNING"))?;
    model.set_state(process_id, ProcessState::Running)?;
    store.update_state(process_id, ProcessState::Running)?;
    Ok(())
}

/// Transition to Negotiated after a terminal-success negotiation.
pub fn mark_negotiated(
    store: &ProcessStore,
    model: &ProcessDataModel,
    process_id: &str,
) -> Result<()> {
    model.set_state(process_id, ProcessState::Negotiated)?;
    store.update_state(process_id, ProcessState::Negotiated)?;
    Ok(())
}

/// Transition to Completed after a terminal-success transfer.
pub fn complete_process(
    store: &ProcessStore,
    model: &ProcessDataModel,
    process_id: &str,
) -> Result<()> {
    model.set_state(process_id, ProcessState::Completed)?;
    store.update_state(process_id, ProcessState::Completed)?;
    info!(%process_id, "process completed");
    Ok(())
}

/// Record a failing step and transition to Failed.
///
/// Best-effort by design: drivers call this on their error paths and have
/// nothing left to do with a secondary failure except log it, so this
/// never returns an error.
pub fn fail_process(store: &ProcessStore, model: &ProcessDataModel, process_id: &str, step: &str) {
    if let Err(error) = store.set_status(process_id, step, History::new(process_id, "FAILED")) {
        debug!(%process_id, step, %error, "could not journal the failure");
    }
    // A concurrent terminate may have won; the sink that got there first stays.
    if model.set_state(process_id, ProcessState::Failed).is_ok() {
        if let Err(error) = store.update_state(process_id, ProcessState::Failed) {
            debug!(%process_id, %error, "could not persist the failed state");
        }
    }
    info!(%process_id, step, "process failed");
}

/// Transition to Terminated on user request.
///
/// The in-memory flag flips first so polling drivers observe the abort on
/// their next iteration; the record follows its history entry.
pub fn terminate_process(
    store: &ProcessStore,
    model: &ProcessDataModel,
    process_id: &str,
) -> Result<()> {
    model.signal_terminate(process_id)?;
    store.set_status(
        process_id,
        "process-terminated",
        History::new(process_id, "TERMINATED"),
    )?;
    store.update_state(process_id, ProcessState::Terminated)?;
    info!(%process_id, "process terminated");
    Ok(())
}
