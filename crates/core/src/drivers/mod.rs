//! Worker tasks driving the remote state machines for one process.
//!
//! Drivers surface no errors: they record failures in the journal,
//! transition the process, and return. Callers read the process state to
//! learn the outcome.

pub mod negotiation;
pub mod registry;
pub mod transfer;

use crate::edc::EdcService;
use crate::state::ProcessDataModel;
use crate::store::ProcessStore;
use std::sync::Arc;

/// The capabilities a driver captures at spawn time.
#[derive(Clone)]
pub struct DriverContext {
    pub edc: Arc<EdcService>,
    pub store: Arc<ProcessStore>,
    pub model: Arc<ProcessDataModel>,
}
