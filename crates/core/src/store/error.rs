//! Error types for the process store and history journal.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when the persistence medium is unavailable or a record
/// cannot be encoded/decoded. Drivers treat every variant as fatal to the
/// affected process.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to read or write a file under the store root.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize a record.
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to deserialize a persisted record.
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The process id is not registered with this store.
    #[error("Unknown process [{0}]")]
    UnknownProcess(String),
}

/// Type alias for Result with StorageError.
pub type StorageResult<T> = Result<T, StorageError>;
