//! JSON-LD envelope shared by every outbound management-plane request.

use serde_json::{json, Value};

/// Namespace of the ODRL vocabulary referenced by offers and policies.
pub const ODRL_NAMESPACE: &str = "http://www.w3.org/ns/odrl/2/";

/// The `@context` object attached to catalog, negotiation and transfer
/// requests.
pub fn odrl_context() -> Value {
    json!({ "odrl": ODRL_NAMESPACE })
}
