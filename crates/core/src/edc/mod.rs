//! Management-plane client: the connector seam, its HTTP and mock
//! implementations, and the stateless service the drivers call.

pub mod client;
pub mod connector;
pub mod error;
pub mod http;
pub mod mock;

pub use client::{data_endpoint, EdcService, PollOutcome, ASSET_ID_FILTER, ASSET_TYPE_FILTER, DSP_PATH};
pub use connector::Connector;
pub use error::{EdcError, EdcResult};
pub use http::HttpConnector;
pub use mock::MockConnector;
