//! # dpp-protocol
//!
//! Core protocol definitions and data models for the digital product
//! passport consumer engine.
//!
//! This crate defines all shared data structures used for:
//! - Runtime process state and the per-process history journal
//! - The dataspace management-plane wire format (catalog queries,
//!   contract negotiations, transfer processes)
//! - Registry (digital twin registry) endpoint descriptors
//!
//! ## Modules
//!
//! - [`process_models`]: Process record, lifecycle state and history entries
//! - [`catalog_models`]: Catalog queries and the datasets/offers they return
//! - [`negotiation_models`]: Contract negotiation requests and remote state
//! - [`transfer_models`]: Transfer process requests and remote state
//! - [`jsonld`]: The JSON-LD request envelope shared by every outbound call
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, serde_json, uuid and chrono
//! - Wire fidelity: field names follow the management-plane JSON-LD keys,
//!   optional fields are omitted when unset
//! - Independent compilation: no dependencies on the engine crate

pub mod catalog_models;
pub mod jsonld;
pub mod negotiation_models;
pub mod process_models;
pub mod transfer_models;

// Re-export all public types for convenience
pub use catalog_models::*;
pub use jsonld::*;
pub use negotiation_models::*;
pub use process_models::*;
pub use transfer_models::*;
