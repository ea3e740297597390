//! Error types for management-plane communication.

use crate::store::StorageError;
use thiserror::Error;

/// Errors surfaced by the protocol client to the drivers, which classify
/// and record them; they are never propagated past a driver.
#[derive(Error, Debug)]
pub enum EdcError {
    /// Network failure or an empty body where one was required.
    #[error("No response received from [{0}]")]
    PeerUnreachable(String),

    /// A response arrived but is malformed: unparseable JSON, missing
    /// `edc:state`, missing participant id.
    #[error("Malformed management-plane response: {0}")]
    Protocol(String),

    /// Transport-level failure reported by the HTTP client.
    #[error("Management-plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Persisting an observed state failed mid-poll; fatal to the process.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Type alias for Result with EdcError.
pub type EdcResult<T> = Result<T, EdcError>;
