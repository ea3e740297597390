//! Process store: create/lookup/persist processes with atomic status
//! updates.
//!
//! The store keeps every live process in memory, indexed by id, with one
//! directory per process on disk (`process.json` plus the history journal
//! and the request/response artifacts). All `save_*` operations are
//! composites of a journal append and an in-memory update executed under
//! the per-process lock; if either side fails, the record is rolled back
//! to its previous state and the operation fails with a storage error.
//!
//! Registry-path artifacts live in a `registry/` sub-directory and use
//! endpoint-qualified step names, so parallel registry workers never touch
//! the passport negotiation/transfer slots or each other's.

use crate::store::error::{StorageError, StorageResult};
use crate::store::journal::{write_atomic, HistoryJournal};
use dpp_protocol::{
    timestamp, History, IdResponse, JobHistory, Negotiation, NegotiationRequest, Process,
    ProcessState, Transfer, TransferRequest,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// File-backed registry of all processes owned by this instance.
///
/// Access to the same process id is serialized through a per-process lock;
/// different ids proceed in parallel without contention.
pub struct ProcessStore {
    root: PathBuf,
    journal: HistoryJournal,
    processes: Mutex<HashMap<String, Arc<Mutex<Process>>>>,
}

impl ProcessStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            journal: HistoryJournal::new(&root),
            root,
            processes: Mutex::new(HashMap::new()),
        })
    }

    /// The journal backing this store, for direct step reads.
    pub fn journal(&self) -> &HistoryJournal {
        &self.journal
    }

    fn process_dir(&self, process_id: &str) -> PathBuf {
        self.root.join(process_id)
    }

    fn process_path(&self, process_id: &str) -> PathBuf {
        self.process_dir(process_id).join("process.json")
    }

    fn artifact_path(&self, process_id: &str, registry: Option<&str>, name: &str) -> PathBuf {
        match registry {
            None => self.process_dir(process_id).join(format!("{name}.json")),
            Some(endpoint_id) => self
                .process_dir(process_id)
                .join("registry")
                .join(format!("{endpoint_id}-{name}.json")),
        }
    }

    fn entry(&self, process_id: &str) -> StorageResult<Arc<Mutex<Process>>> {
        lock(&self.processes)
            .get(process_id)
            .cloned()
            .ok_or_else(|| StorageError::UnknownProcess(process_id.to_string()))
    }

    fn persist(&self, process: &Process) -> StorageResult<()> {
        let path = self.process_path(&process.id);
        let bytes = serde_json::to_vec_pretty(process).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }

    fn write_artifact<T: Serialize>(
        &self,
        process_id: &str,
        registry: Option<&str>,
        name: &str,
        value: &T,
    ) -> StorageResult<()> {
        let path = self.artifact_path(process_id, registry, name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }

    /// Create a new process for `endpoint`/`bpn` and persist its initial
    /// record and `process-started` journal entry.
    pub fn create(&self, endpoint: &str, bpn: &str) -> StorageResult<Process> {
        let id = Uuid::new_v4().to_string();
        let process = Process::new(&id, endpoint, bpn);

        let dir = self.process_dir(&id);
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        self.persist(&process)?;
        lock(&self.processes).insert(id.clone(), Arc::new(Mutex::new(process)));

        self.set_status(&id, "process-started", History::new(&id, "CREATED"))?;
        self.get(&id)
    }

    /// Snapshot of the in-memory record for `process_id`.
    pub fn get(&self, process_id: &str) -> StorageResult<Process> {
        let handle = self.entry(process_id)?;
        let process = lock(&handle);
        Ok(process.clone())
    }

    /// Read the persisted record for `process_id` from disk.
    pub fn load(&self, process_id: &str) -> StorageResult<Process> {
        let path = self.process_path(process_id);
        let bytes = std::fs::read(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode { path, source })
    }

    /// Re-register a persisted process after a restart.
    pub fn resume(&self, process_id: &str) -> StorageResult<Process> {
        let process = self.load(process_id)?;
        lock(&self.processes).insert(process_id.to_string(), Arc::new(Mutex::new(process.clone())));
        Ok(process)
    }

    /// Number of registered processes.
    pub fn process_count(&self) -> usize {
        lock(&self.processes).len()
    }

    /// Append `entry` to the journal under `step` and mirror it into the
    /// in-memory record. The journal write happens first; a failure leaves
    /// the record untouched. When the record write fails afterwards, the
    /// journal is rolled back to its prior entry as well, so both sides of
    /// the composite stay unchanged.
    pub fn set_status(&self, process_id: &str, step: &str, entry: History) -> StorageResult<History> {
        let handle = self.entry(process_id)?;
        let mut process = lock(&handle);
        let snapshot = process.clone();

        let appended = self.journal.append(process_id, step, entry)?;
        process.set_history(step, appended.clone());
        if let Err(error) = self.persist(&process) {
            let rollback = match snapshot.get_history(step) {
                Some(prior) => self.journal.restore(process_id, step, prior),
                None => self.journal.remove(process_id, step).map(drop),
            };
            if let Err(rollback_error) = rollback {
                debug!(%process_id, step, %rollback_error, "could not roll back the journal");
            }
            *process = snapshot;
            return Err(error);
        }
        Ok(appended)
    }

    /// Record a lifecycle state change. Callers write the matching history
    /// entry first, so the journal explains every state the record shows.
    pub fn update_state(&self, process_id: &str, state: ProcessState) -> StorageResult<()> {
        let handle = self.entry(process_id)?;
        let mut process = lock(&handle);
        let snapshot = process.clone();

        process.state = state;
        process.modified = timestamp();
        if let Err(error) = self.persist(&process) {
            *process = snapshot;
            return Err(error);
        }
        Ok(())
    }

    /// Record a registry search job on the process.
    pub fn add_job_history(
        &self,
        process_id: &str,
        search_id: &str,
        job: JobHistory,
    ) -> StorageResult<()> {
        let handle = self.entry(process_id)?;
        let mut process = lock(&handle);
        let snapshot = process.clone();

        process.add_job_history(search_id, job);
        if let Err(error) = self.persist(&process) {
            *process = snapshot;
            return Err(error);
        }
        Ok(())
    }

    fn step_name(registry: Option<&str>, suffix: &str) -> String {
        match registry {
            None => suffix.to_string(),
            Some(endpoint_id) => format!("dtr-{endpoint_id}-{suffix}"),
        }
    }

    /// Persist an outgoing negotiation request together with the (possibly
    /// placeholder) id response.
    pub fn save_negotiation_request(
        &self,
        process_id: &str,
        request: &NegotiationRequest,
        response: &IdResponse,
        registry: Option<&str>,
    ) -> StorageResult<()> {
        self.write_artifact(
            process_id,
            registry,
            "negotiation-request",
            &json!({ "request": request, "response": response }),
        )?;
        self.set_status(
            process_id,
            &Self::step_name(registry, "negotiation-request"),
            History::new(&response.id, "REQUESTED"),
        )?;
        Ok(())
    }

    /// Persist the terminal negotiation observation.
    pub fn save_negotiation(
        &self,
        process_id: &str,
        negotiation: &Negotiation,
        registry: Option<&str>,
    ) -> StorageResult<()> {
        self.write_artifact(process_id, registry, "negotiation", negotiation)?;
        self.set_status(
            process_id,
            &Self::step_name(registry, "negotiation"),
            History::new(&negotiation.id, &negotiation.state),
        )?;
        Ok(())
    }

    /// Persist an outgoing transfer request together with the (possibly
    /// placeholder) id response.
    pub fn save_transfer_request(
        &self,
        process_id: &str,
        request: &TransferRequest,
        response: &IdResponse,
        registry: Option<&str>,
    ) -> StorageResult<()> {
        self.write_artifact(
            process_id,
            registry,
            "transfer-request",
            &json!({ "request": request, "response": response }),
        )?;
        self.set_status(
            process_id,
            &Self::step_name(registry, "transfer-request"),
            History::new(&response.id, "REQUESTED"),
        )?;
        Ok(())
    }

    /// Persist the terminal transfer observation.
    pub fn save_transfer(
        &self,
        process_id: &str,
        transfer: &Transfer,
        registry: Option<&str>,
    ) -> StorageResult<()> {
        self.write_artifact(process_id, registry, "transfer", transfer)?;
        self.set_status(
            process_id,
            &Self::step_name(registry, "transfer"),
            History::new(&transfer.id, &transfer.state),
        )?;
        Ok(())
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ProcessStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_writes_initial_record() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();

        assert_eq!(process.state, ProcessState::Created);
        assert!(process.history_exists("process-started"));

        let loaded = store.load(&process.id).unwrap();
        assert_eq!(loaded, process);
    }

    #[test]
    fn test_get_unknown_process_fails() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get("missing"),
            Err(StorageError::UnknownProcess(_))
        ));
    }

    #[test]
    fn test_set_status_appends_and_mirrors() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();

        store
            .set_status(&process.id, "negotiation", History::new("neg-1", "REQUESTED"))
            .unwrap();
        store
            .set_status(&process.id, "negotiation", History::new("neg-1", "CONFIRMED"))
            .unwrap();

        let journal_entry = store.journal().read(&process.id, "negotiation").unwrap().unwrap();
        let record = store.get(&process.id).unwrap();
        assert_eq!(record.get_history("negotiation"), Some(&journal_entry));
        assert_eq!(journal_entry.status, "CONFIRMED");
    }

    /// Make the record file unreplaceable so `persist` fails after the
    /// journal append succeeded.
    fn break_record_file(store: &ProcessStore, process_id: &str) {
        let path = store.root().join(process_id).join("process.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
    }

    #[test]
    fn test_set_status_rolls_back_a_fresh_journal_entry_when_persist_fails() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();
        break_record_file(&store, &process.id);

        let result =
            store.set_status(&process.id, "negotiation", History::new("neg-1", "REQUESTED"));
        assert!(result.is_err());

        // Neither side observed the append.
        assert!(store.journal().read(&process.id, "negotiation").unwrap().is_none());
        assert!(!store.get(&process.id).unwrap().history_exists("negotiation"));
    }

    #[test]
    fn test_set_status_restores_the_prior_journal_entry_when_persist_fails() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();
        let first = store
            .set_status(&process.id, "negotiation", History::new("neg-1", "REQUESTED"))
            .unwrap();
        break_record_file(&store, &process.id);

        let result =
            store.set_status(&process.id, "negotiation", History::new("neg-1", "CONFIRMED"));
        assert!(result.is_err());

        // The journal still holds the prior entry, verbatim.
        let entry = store.journal().read(&process.id, "negotiation").unwrap().unwrap();
        assert_eq!(entry, first);
        assert_eq!(
            store.get(&process.id).unwrap().get_history("negotiation"),
            Some(&first)
        );
    }

    #[test]
    fn test_registry_namespace_is_separate() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();

        let transfer = Transfer {
            id: "tra-1".to_string(),
            state: "COMPLETED".to_string(),
        };
        store.save_transfer(&process.id, &transfer, None).unwrap();
        store.save_transfer(&process.id, &transfer, Some("r1")).unwrap();

        let record = store.get(&process.id).unwrap();
        assert!(record.history_exists("transfer"));
        assert!(record.history_exists("dtr-r1-transfer"));

        assert!(store.root().join(&process.id).join("transfer.json").is_file());
        assert!(store
            .root()
            .join(&process.id)
            .join("registry")
            .join("r1-transfer.json")
            .is_file());
    }

    #[test]
    fn test_add_job_history_is_persisted() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();

        let job = JobHistory {
            job_id: "job-1".to_string(),
            state: "RUNNING".to_string(),
            started: 1,
            updated: 2,
        };
        store.add_job_history(&process.id, "search-1", job.clone()).unwrap();

        let loaded = store.load(&process.id).unwrap();
        assert_eq!(loaded.get_job("search-1"), Some(&job));
    }

    #[test]
    fn test_resume_round_trips_the_record() {
        let (_dir, store) = store();
        let process = store.create("https://prov/api", "BPNL000TEST").unwrap();
        store
            .set_status(&process.id, "negotiation", History::new("neg-1", "CONFIRMED"))
            .unwrap();
        store.update_state(&process.id, ProcessState::Negotiated).unwrap();
        let before = store.get(&process.id).unwrap();

        // Fresh store over the same root, as after a restart.
        let reopened = ProcessStore::new(store.root()).unwrap();
        let resumed = reopened.resume(&process.id).unwrap();
        assert_eq!(resumed, before);
    }
}
