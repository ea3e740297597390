//! Test fixtures: configurations, datasets and engine setup.

use dpp_core::config::{AppConfig, DtrConfig, EdcConfig};
use dpp_core::edc::{Connector, MockConnector};
use dpp_core::ExchangeEngine;
use dpp_protocol::{Dataset, Dtr};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_BPN: &str = "BPNL000TEST";
pub const TEST_ENDPOINT: &str = "https://prov/api";

/// Engine configuration with a millisecond poll interval so terminal
/// states are reached within a few milliseconds of wall clock.
pub fn test_config() -> AppConfig {
    AppConfig {
        edc: EdcConfig {
            endpoint: "https://consumer".to_string(),
            management: "/management/v2".to_string(),
            catalog: "/catalog/request".to_string(),
            negotiation: "/contractnegotiations".to_string(),
            transfer: "/transferprocesses".to_string(),
            receiver_endpoint: "https://backend/endpoint".to_string(),
            api_key: "test-api-key".to_string(),
            participant_id: "BPNL000CONS".to_string(),
            delay: 5,
            ..Default::default()
        },
        dtr: DtrConfig::default(),
    }
}

/// Dataset advertising asset `urn:uuid:a1` under policy `pol-1`.
pub fn test_dataset() -> Dataset {
    Dataset {
        asset_id: "urn:uuid:a1".to_string(),
        policy: json!({"@id": "pol-1", "odrl:permission": []}),
    }
}

/// Registry endpoint descriptor for one endpoint id.
#[allow(dead_code)]
pub fn test_dtr(endpoint_id: &str) -> Dtr {
    Dtr {
        endpoint: format!("https://registry-{endpoint_id}"),
        asset_id: format!("urn:uuid:dtr-{endpoint_id}"),
        contract_id: format!("agreement-dtr-{endpoint_id}"),
        bpn: None,
    }
}

/// Build an engine over a scripted connector; the temp dir must be kept
/// alive for the test duration.
pub fn engine_with(connector: MockConnector) -> (TempDir, Arc<MockConnector>, ExchangeEngine) {
    let dir = tempfile::tempdir().expect("temp store root");
    let connector = Arc::new(connector);
    let engine = ExchangeEngine::new(
        test_config(),
        Arc::clone(&connector) as Arc<dyn Connector>,
        dir.path(),
    )
    .expect("engine over temp store");
    (dir, connector, engine)
}
