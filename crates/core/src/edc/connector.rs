//! Connector seam between the protocol client and the wire.
//!
//! The [`Connector`] trait covers the raw single-shot exchanges with the
//! management plane; everything above it (envelope building, polling,
//! classification) lives in [`crate::edc::EdcService`]. Implementations:
//! the HTTP connector for production and a scripted mock for tests.

use crate::edc::error::EdcResult;
use async_trait::async_trait;
use dpp_protocol::{CatalogRequest, NegotiationRequest, TransferRequest};
use serde_json::Value;

/// Raw exchanges with a counterparty management plane.
///
/// Every method resolves to the parsed response body, or `None` when the
/// peer answered with an empty body; callers decide whether that is an
/// error for the operation at hand.
#[async_trait]
pub trait Connector: Send + Sync {
    /// POST a catalog query.
    async fn request_catalog(&self, url: &str, request: &CatalogRequest) -> EdcResult<Option<Value>>;

    /// POST a contract negotiation request.
    async fn start_negotiation(
        &self,
        url: &str,
        request: &NegotiationRequest,
    ) -> EdcResult<Option<Value>>;

    /// GET the current state of a contract negotiation.
    async fn fetch_negotiation(&self, url: &str) -> EdcResult<Option<Value>>;

    /// POST a transfer process request.
    async fn start_transfer(&self, url: &str, request: &TransferRequest) -> EdcResult<Option<Value>>;

    /// GET the current state of a transfer process.
    async fn fetch_transfer(&self, url: &str) -> EdcResult<Option<Value>>;

    /// GET an artifact from a one-shot data-plane endpoint.
    async fn fetch_artifact(&self, url: &str) -> EdcResult<Option<Value>>;
}
