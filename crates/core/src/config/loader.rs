//! Configuration file loader.
//!
//! Reads the engine configuration from a single TOML file and validates
//! that every key the connector calls depend on is present.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::AppConfig;
use std::path::Path;

/// Load and validate the configuration at `path`.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file cannot be read
/// - The TOML is malformed
/// - Required `[edc]` keys are unset (`MissingKeys` lists all of them)
pub fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    let missing = config.edc.missing_keys();
    if !missing.is_empty() {
        return Err(ConfigError::MissingKeys { keys: missing });
    }

    Ok(config)
}
