//! State management for data-exchange processes.
//!
//! This module provides:
//! - The in-memory registry of live worker handles and scheduling state
//! - The lifecycle transition helpers shared by the drivers

pub mod model;
pub mod transitions;

pub use model::{ProcessDataModel, StateError};
