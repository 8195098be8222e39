//! Configuration for imshelf-core.
//!
//! Hosts build one [`ShelfConfig`] at startup from their own preference
//! store and hand it to the registry; the pipeline and admission guard take
//! their knobs from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Knobs for the open/close core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfConfig {
    /// Resolve duplicate cite keys automatically instead of warning.
    pub resolve_duplicate_keys: bool,
    /// Exporter/parser-variant hint handed to the loader.
    pub bibtex_source: String,
    /// Fallback character encoding for sources without their own.
    pub bibtex_encoding: String,
    /// Parse attempts per open before reporting failure.
    pub max_open_attempts: u32,
    /// Lock-marker negotiation settings.
    pub lock: LockConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            resolve_duplicate_keys: false,
            bibtex_source: "bibtex".to_string(),
            bibtex_encoding: "UTF-8".to_string(),
            max_open_attempts: 5,
            lock: LockConfig::default(),
        }
    }
}

/// Lock-marker negotiation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// A lock older than this is stale and may be offered for breaking.
    pub critical_age_secs: u64,
    /// How many times to poll a fresh lock before rejecting.
    pub wait_retries: u32,
    /// Pause between lock polls, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            critical_age_secs: 60,
            wait_retries: 10,
            poll_interval_ms: 500,
        }
    }
}

impl LockConfig {
    pub fn critical_age(&self) -> Duration {
        Duration::from_secs(self.critical_age_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ShelfConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_open_attempts == 0 {
            return Err(ConfigError::OutOfRange(
                "max_open_attempts must be at least 1".to_string(),
            ));
        }
        if self.lock.wait_retries == 0 {
            return Err(ConfigError::OutOfRange(
                "lock.wait_retries must be at least 1".to_string(),
            ));
        }
        if self.lock.poll_interval_ms == 0 {
            return Err(ConfigError::OutOfRange(
                "lock.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.bibtex_encoding.trim().is_empty() {
            return Err(ConfigError::MissingField("bibtex_encoding".to_string()));
        }
        Ok(())
    }
}

/// Configuration validation error.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Value is out of valid range
    #[error("Value out of range: {0}")]
    OutOfRange(String),
    /// Required field is missing or empty
    #[error("Missing field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShelfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_open_attempts, 5);
        assert_eq!(config.lock.wait_retries, 10);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ShelfConfig::default();
        let json = config.to_json().unwrap();
        let parsed = ShelfConfig::from_json(&json).unwrap();
        assert_eq!(config.bibtex_encoding, parsed.bibtex_encoding);
        assert_eq!(config.lock.critical_age_secs, parsed.lock.critical_age_secs);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = ShelfConfig::default();
        config.max_open_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_encoding_rejected() {
        let mut config = ShelfConfig::default();
        config.bibtex_encoding = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
