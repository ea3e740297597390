//! Configuration models for the orchestration engine.
//!
//! All connector-facing settings live in one `[edc]` table; the registry
//! path adds a small `[dtr]` table. Required string keys default to empty
//! and are validated as a batch so the caller learns about every missing
//! key at once, not just the first.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_delay() -> u64 {
    200
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

/// Connector-facing settings from the `[edc]` table.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EdcConfig {
    /// Consumer connector base URL.
    #[serde(default)]
    pub endpoint: String,

    /// Management-plane path prefix, e.g. `/management/v2`.
    #[serde(default)]
    pub management: String,

    /// Catalog request sub-path.
    #[serde(default)]
    pub catalog: String,

    /// Contract negotiation sub-path.
    #[serde(default)]
    pub negotiation: String,

    /// Transfer process sub-path.
    #[serde(default)]
    pub transfer: String,

    /// Base URL of the backend endpoint the data plane pushes artifacts to.
    #[serde(default)]
    pub receiver_endpoint: String,

    /// Poll interval in milliseconds.
    #[serde(default = "default_delay")]
    pub delay: u64,

    /// Management-plane API key (held in the vault in deployments).
    #[serde(default)]
    pub api_key: String,

    /// This consumer's business-partner identifier (vault secret as well).
    #[serde(default)]
    pub participant_id: String,

    /// HTTP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// HTTP read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Optional per-step deadline in seconds; 0 disables the watchdog.
    #[serde(default)]
    pub deadline: u64,
}

impl Default for EdcConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            management: String::new(),
            catalog: String::new(),
            negotiation: String::new(),
            transfer: String::new(),
            receiver_endpoint: String::new(),
            delay: default_delay(),
            api_key: String::new(),
            participant_id: String::new(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            deadline: 0,
        }
    }
}

impl EdcConfig {
    /// Names of required keys that are unset, in declaration order.
    ///
    /// An empty result means the configuration is complete.
    pub fn missing_keys(&self) -> Vec<String> {
        let required = [
            ("endpoint", &self.endpoint),
            ("management", &self.management),
            ("catalog", &self.catalog),
            ("negotiation", &self.negotiation),
            ("transfer", &self.transfer),
            ("receiver_endpoint", &self.receiver_endpoint),
            ("api_key", &self.api_key),
            ("participant_id", &self.participant_id),
        ];
        required
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Poll interval between state observations.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.delay)
    }

    /// Per-step deadline, if one is configured.
    pub fn step_deadline(&self) -> Option<Duration> {
        (self.deadline > 0).then(|| Duration::from_secs(self.deadline))
    }
}

/// Digital-twin-registry settings from the `[dtr]` table.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DtrConfig {
    /// Catalog filter value identifying registry assets.
    #[serde(default = "DtrConfig::default_asset_type")]
    pub asset_type: String,
}

impl DtrConfig {
    fn default_asset_type() -> String {
        "data.core.digitalTwinRegistry".to_string()
    }
}

impl Default for DtrConfig {
    fn default() -> Self {
        Self {
            asset_type: Self::default_asset_type(),
        }
    }
}

/// Unified application configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub edc: EdcConfig,

    #[serde(default)]
    pub dtr: DtrConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> EdcConfig {
        EdcConfig {
            endpoint: "https://consumer".to_string(),
            management: "/management/v2".to_string(),
            catalog: "/catalog/request".to_string(),
            negotiation: "/contractnegotiations".to_string(),
            transfer: "/transferprocesses".to_string(),
            receiver_endpoint: "https://backend/endpoint".to_string(),
            api_key: "secret".to_string(),
            participant_id: "BPNL000CONS".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_config_has_no_missing_keys() {
        assert!(complete_config().missing_keys().is_empty());
    }

    #[test]
    fn test_missing_keys_are_reported_together() {
        let mut config = complete_config();
        config.api_key.clear();
        config.negotiation.clear();

        let missing = config.missing_keys();
        assert_eq!(missing, vec!["negotiation".to_string(), "api_key".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let config = EdcConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.connect_timeout, 10);
        assert_eq!(config.read_timeout, 30);
        assert!(config.step_deadline().is_none());
    }
}
