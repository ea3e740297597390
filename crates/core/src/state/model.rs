//! In-memory registry of live processes.
//!
//! Maps each process id to its scheduling state and, once a driver task is
//! spawned, its join handle. The scheduling state is what the polling
//! loops consult for cooperative cancellation, so reads must be cheap and
//! lock-free of IO.

use dpp_protocol::ProcessState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors from the process data model.
#[derive(Error, Debug)]
pub enum StateError {
    /// The requested transition is not on the forward path and the target
    /// is not a sink.
    #[error("Invalid state transition {from:?} -> {to:?} for process [{id}]")]
    InvalidTransition {
        id: String,
        from: ProcessState,
        to: ProcessState,
    },

    /// The process id is not registered.
    #[error("Unknown process [{0}]")]
    UnknownProcess(String),

    /// A driver chain is already attached and still running.
    #[error("A driver is already active for process [{0}]")]
    DriverActive(String),
}

struct Entry {
    state: ProcessState,
    handle: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of live process worker handles and their scheduling state.
///
/// `set_state` enforces the lifecycle: the sequence
/// Created -> Running -> Negotiated -> Completed is the only forward path,
/// while Failed and Terminated are sinks reachable from any non-terminal
/// state. Illegal transitions are rejected and leave the state unchanged.
#[derive(Default)]
pub struct ProcessDataModel {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ProcessDataModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process in the `Created` state. Re-registering resets
    /// the entry.
    pub fn register(&self, process_id: &str) {
        lock(&self.entries).insert(
            process_id.to_string(),
            Entry {
                state: ProcessState::Created,
                handle: None,
            },
        );
    }

    /// Current scheduling state, if the process is registered.
    pub fn state(&self, process_id: &str) -> Option<ProcessState> {
        lock(&self.entries).get(process_id).map(|entry| entry.state)
    }

    /// Whether the process was cancelled. Unknown ids read as terminated
    /// so an orphaned driver stops instead of polling forever.
    pub fn is_terminated(&self, process_id: &str) -> bool {
        self.state(process_id)
            .map(|state| state == ProcessState::Terminated)
            .unwrap_or(true)
    }

    fn transition_allowed(from: ProcessState, to: ProcessState) -> bool {
        use ProcessState::*;
        match (from, to) {
            (Created, Running) | (Running, Negotiated) | (Negotiated, Completed) => true,
            (from, Failed) | (from, Terminated) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Advance the scheduling state. A same-state update is a no-op.
    pub fn set_state(&self, process_id: &str, to: ProcessState) -> Result<(), StateError> {
        let mut entries = lock(&self.entries);
        let entry = entries
            .get_mut(process_id)
            .ok_or_else(|| StateError::UnknownProcess(process_id.to_string()))?;

        if entry.state == to {
            return Ok(());
        }
        if !Self::transition_allowed(entry.state, to) {
            return Err(StateError::InvalidTransition {
                id: process_id.to_string(),
                from: entry.state,
                to,
            });
        }
        entry.state = to;
        Ok(())
    }

    /// Whether a driver chain is attached and still running.
    pub fn has_active_driver(&self, process_id: &str) -> bool {
        lock(&self.entries)
            .get(process_id)
            .and_then(|entry| entry.handle.as_ref())
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Attach the driver task handle for this process.
    ///
    /// There is a single handle slot per process: attaching while a
    /// previous handle is still running is rejected, so a live driver
    /// chain can never be silently dropped. A finished handle may be
    /// replaced.
    pub fn attach(&self, process_id: &str, handle: JoinHandle<()>) -> Result<(), StateError> {
        let mut entries = lock(&self.entries);
        let entry = entries
            .get_mut(process_id)
            .ok_or_else(|| StateError::UnknownProcess(process_id.to_string()))?;
        if let Some(existing) = &entry.handle {
            if !existing.is_finished() {
                return Err(StateError::DriverActive(process_id.to_string()));
            }
        }
        entry.handle = Some(handle);
        Ok(())
    }

    /// Take the driver task handle, e.g. to await it during shutdown.
    pub fn take_handle(&self, process_id: &str) -> Option<JoinHandle<()>> {
        lock(&self.entries)
            .get_mut(process_id)
            .and_then(|entry| entry.handle.take())
    }

    /// Request cooperative termination: flips the state to `Terminated`,
    /// which every polling loop observes on its next iteration.
    pub fn signal_terminate(&self, process_id: &str) -> Result<(), StateError> {
        self.set_state(process_id, ProcessState::Terminated)
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}
