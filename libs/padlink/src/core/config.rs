// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime-wide flow control defaults, loadable from YAML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Result, StreamError};

pub const DEFAULT_TOILET_CAPACITY_FACTOR: u64 = 200;
pub const DEFAULT_THROTTLING_FACTOR: u64 = 1;
pub const DEFAULT_AUTO_DEMAND_SIZE_FACTOR: u64 = 400;
pub const DEFAULT_TARGET_QUEUE_SIZE_FACTOR: u64 = 40;
pub const DEFAULT_LINK_CALL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TOILET_OVERFLOW_TIMEOUT_MS: u64 = 5_000;

/// Flow control defaults shared by every element of a pipeline.
///
/// Per-link values in [`LinkProps`](crate::core::pads::LinkProps) take
/// precedence over these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Toilet capacity in multiples of the demand unit's buffer size approximation.
    pub toilet_capacity_factor: u64,

    /// Minimum accumulated decrement before it is flushed to the shared counter.
    pub throttling_factor: u64,

    /// Auto demand size in multiples of the demand unit's buffer size approximation.
    pub auto_demand_size_factor: u64,

    /// Manual input queue target in multiples of the buffer size approximation.
    pub target_queue_size_factor: u64,

    /// Bounded wait for the link handshake.
    pub link_call_timeout_ms: u64,

    /// How long a toilet may stay overflowed while the sender keeps producing.
    pub toilet_overflow_timeout_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            toilet_capacity_factor: DEFAULT_TOILET_CAPACITY_FACTOR,
            throttling_factor: DEFAULT_THROTTLING_FACTOR,
            auto_demand_size_factor: DEFAULT_AUTO_DEMAND_SIZE_FACTOR,
            target_queue_size_factor: DEFAULT_TARGET_QUEUE_SIZE_FACTOR,
            link_call_timeout_ms: DEFAULT_LINK_CALL_TIMEOUT_MS,
            toilet_overflow_timeout_ms: DEFAULT_TOILET_OVERFLOW_TIMEOUT_MS,
        }
    }
}

impl FlowConfig {
    /// Parse a configuration from YAML. Missing fields keep their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| StreamError::Configuration(format!("Failed to parse flow config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&content)?;
        tracing::info!("Loaded flow config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.throttling_factor == 0 {
            return Err(StreamError::Configuration(
                "throttling_factor must be at least 1".into(),
            ));
        }
        if self.toilet_capacity_factor == 0 {
            return Err(StreamError::Configuration(
                "toilet_capacity_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn link_call_timeout(&self) -> Duration {
        Duration::from_millis(self.link_call_timeout_ms)
    }

    pub fn toilet_overflow_timeout(&self) -> Duration {
        Duration::from_millis(self.toilet_overflow_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlowConfig::default();
        assert_eq!(config.toilet_capacity_factor, 200);
        assert_eq!(config.throttling_factor, 1);
        assert_eq!(config.auto_demand_size_factor, 400);
        assert_eq!(config.link_call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = FlowConfig::from_yaml_str("throttling_factor: 150\n").unwrap();
        assert_eq!(config.throttling_factor, 150);
        assert_eq!(config.auto_demand_size_factor, 400);
    }

    #[test]
    fn test_zero_throttling_is_rejected() {
        let err = FlowConfig::from_yaml_str("throttling_factor: 0\n").unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "link_call_timeout_ms: 250\ntoilet_capacity_factor: 10\n").unwrap();

        let config = FlowConfig::load(&path).unwrap();
        assert_eq!(config.link_call_timeout(), Duration::from_millis(250));
        assert_eq!(config.toilet_capacity_factor, 10);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlowConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }
}
