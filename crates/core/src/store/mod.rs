//! Persistence: the history journal and the process store built on it.

pub mod error;
pub mod journal;
pub mod process_store;

pub use error::{StorageError, StorageResult};
pub use journal::HistoryJournal;
pub use process_store::ProcessStore;
