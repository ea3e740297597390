//! Runtime process state models.
//!
//! This module defines the structures for tracking the state of a single
//! data-exchange process: the lifecycle state owned by the engine, the
//! per-step history journal entries, and the optional registry job records.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current epoch-millisecond timestamp, the time base for every record.
pub fn timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Represents the current lifecycle state of a data-exchange process.
///
/// The state progresses through these states during normal execution:
/// Created -> Running -> Negotiated -> Completed
///
/// Special states:
/// - Failed: a negotiation or transfer reached a terminal-failure state
/// - Terminated: the user cancelled the process; reachable from any
///   non-terminal state
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Process has been created but no driver has been scheduled yet.
    Created,

    /// A negotiation or transfer driver is actively working.
    Running,

    /// Contract negotiation reached terminal success; transfer pending.
    Negotiated,

    /// Negotiation and transfer both completed successfully.
    Completed,

    /// A driver recorded a terminal failure.
    Failed,

    /// The user cancelled the process.
    Terminated,
}

impl ProcessState {
    /// Whether the process has left the engine's ownership.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Completed | ProcessState::Failed | ProcessState::Terminated
        )
    }
}

/// One entry in the per-process history journal.
///
/// Entries are keyed by step name inside [`Process::history`]; re-appending
/// under the same step name preserves `started` and refreshes `updated`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct History {
    /// Identifier of the object the event pertains to: a negotiation id,
    /// a transfer id, or the process step itself.
    pub id: String,

    /// Short status label, e.g. `NEGOTIATED`, `FAILED`, `INCOMPLETE`, or the
    /// last observed remote state.
    pub status: String,

    /// Epoch milliseconds of the first append for this step.
    pub started: i64,

    /// Epoch milliseconds of the latest append, set by the journal.
    pub updated: i64,
}

impl History {
    /// Create a new entry stamped with the current instant.
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            id: id.into(),
            status: status.into(),
            started: now,
            updated: now,
        }
    }
}

/// Record of one registry search job, keyed by search id on the process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobHistory {
    /// Remote job identifier.
    pub job_id: String,

    /// Job state label as reported by the registry path.
    pub state: String,

    /// Epoch milliseconds when the job was recorded.
    pub started: i64,

    /// Epoch milliseconds of the last update to this record.
    pub updated: i64,
}

/// Represents one data-exchange process, the unit of work the engine owns.
///
/// A process ties one contract negotiation and one data transfer (or a
/// fan-out of registry transfers) to one user request. Optional fields are
/// omitted from the serialized form when unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Process {
    /// Unique identifier for this process, opaque to the counterparty.
    pub id: String,

    /// Current lifecycle state.
    pub state: ProcessState,

    /// Epoch milliseconds at creation.
    pub created: i64,

    /// Epoch milliseconds of the last change to this record.
    pub modified: i64,

    /// Counterparty data-space URL.
    pub endpoint: String,

    /// Counterparty business-partner identifier.
    pub bpn: String,

    /// Registry search jobs, keyed by search id. Only present on the
    /// registry path.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub jobs: Option<HashMap<String, JobHistory>>,

    /// History journal entries, keyed by step name.
    pub history: HashMap<String, History>,

    /// Tree-navigation state, opaque to the engine.
    #[serde(rename = "treeState", skip_serializing_if = "Option::is_none", default)]
    pub tree_state: Option<String>,

    /// Tree-navigation child flag, opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub children: Option<bool>,
}

impl Process {
    /// Create a fresh process record in the `Created` state.
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, bpn: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            id: id.into(),
            state: ProcessState::Created,
            created: now,
            modified: now,
            endpoint: endpoint.into(),
            bpn: bpn.into(),
            jobs: None,
            history: HashMap::new(),
            tree_state: None,
            children: None,
        }
    }

    /// Replace the entry for `step`, refreshing the modification stamp.
    pub fn set_history(&mut self, step: impl Into<String>, entry: History) {
        self.history.insert(step.into(), entry);
        self.modified = timestamp();
    }

    pub fn history_exists(&self, step: &str) -> bool {
        self.history.contains_key(step)
    }

    pub fn get_history(&self, step: &str) -> Option<&History> {
        self.history.get(step)
    }

    pub fn remove_history(&mut self, step: &str) -> bool {
        self.history.remove(step).is_some()
    }

    /// Record a registry job under `search_id`.
    ///
    /// The jobs map is copy-on-write: it is materialised on first use and
    /// replaced as a whole, never mutated through a shared reference.
    pub fn add_job_history(&mut self, search_id: impl Into<String>, job: JobHistory) {
        let mut jobs = self.jobs.take().unwrap_or_default();
        jobs.insert(search_id.into(), job);
        self.jobs = Some(jobs);
        self.modified = timestamp();
    }

    pub fn get_job(&self, search_id: &str) -> Option<&JobHistory> {
        self.jobs.as_ref().and_then(|jobs| jobs.get(search_id))
    }
}
