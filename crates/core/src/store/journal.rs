//! Durable per-process history journal.
//!
//! One file per step name under `<root>/<processId>/history/`. A step file
//! is replaced wholesale on every append through a temp-file rename, so a
//! concurrent reader sees either the previous or the new entry, never a
//! torn one. `started` survives from the first append for a step;
//! `updated` is stamped by the journal on every append.

use crate::store::error::{StorageError, StorageResult};
use dpp_protocol::{timestamp, History};
use std::path::{Path, PathBuf};

/// Replace `path` atomically with `bytes`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|source| StorageError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// File-backed history journal, append-only per step name.
#[derive(Debug, Clone)]
pub struct HistoryJournal {
    root: PathBuf,
}

impl HistoryJournal {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn history_dir(&self, process_id: &str) -> PathBuf {
        self.root.join(process_id).join("history")
    }

    fn step_path(&self, process_id: &str, step: &str) -> PathBuf {
        self.history_dir(process_id).join(format!("{step}.json"))
    }

    /// Append `entry` under `step`, preserving `started` from the first
    /// append and stamping `updated` with the current instant.
    pub fn append(&self, process_id: &str, step: &str, mut entry: History) -> StorageResult<History> {
        let dir = self.history_dir(process_id);
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        if let Some(existing) = self.read(process_id, step)? {
            entry.started = existing.started;
        }
        entry.updated = timestamp();

        let path = self.step_path(process_id, step);
        let bytes = serde_json::to_vec_pretty(&entry).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)?;
        Ok(entry)
    }

    /// Write `entry` for `step` verbatim, without the append stamping.
    ///
    /// Used by the store to put a step file back to its prior entry when
    /// the other half of a composite write fails.
    pub(crate) fn restore(&self, process_id: &str, step: &str, entry: &History) -> StorageResult<()> {
        let path = self.step_path(process_id, step);
        let bytes = serde_json::to_vec_pretty(entry).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }

    /// Read the entry for `step`, if one was ever appended.
    pub fn read(&self, process_id: &str, step: &str) -> StorageResult<Option<History>> {
        let path = self.step_path(process_id, step);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Decode { path, source })
    }

    /// Step names with at least one append, sorted.
    pub fn list_steps(&self, process_id: &str) -> StorageResult<Vec<String>> {
        let dir = self.history_dir(process_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let mut steps = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(step) = name.strip_suffix(".json") {
                steps.push(step.to_string());
            }
        }
        steps.sort();
        Ok(steps)
    }

    /// Remove the entry for `step`. Returns whether one existed.
    pub fn remove(&self, process_id: &str, step: &str) -> StorageResult<bool> {
        let path = self.step_path(process_id, step);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
