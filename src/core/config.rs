//! Serializable dispatcher configuration
//!
//! Everything here can also be set through [`crate::DispatcherBuilder`]; the
//! config form exists so deployments can adjust verbosity from a file.

use super::{
    error::{LoggerError, Result},
    log_level::LogLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_ordering_lane_name() -> String {
    "log.ordering".to_string()
}

/// # Example
///
/// ```
/// use rust_log_dispatch::{DispatcherConfig, LogLevel};
///
/// let config = DispatcherConfig::from_json(r#"{
///     "queue_capacity": 1024,
///     "source_levels": { "net::http": "debug" }
/// }"#).unwrap();
///
/// assert_eq!(config.queue_capacity, Some(1024));
/// assert_eq!(config.source_levels["net::http"], LogLevel::DEBUG);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Bound on queued ordering-lane operations; `None` is unbounded
    pub queue_capacity: Option<usize>,

    pub shutdown_timeout_ms: u64,

    pub ordering_lane_name: String,

    /// Initial thresholds seeded into the level registry
    pub source_levels: BTreeMap<String, LogLevel>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            ordering_lane_name: default_ordering_lane_name(),
            source_levels: BTreeMap::new(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation("reading dispatcher config", path.display().to_string(), e)
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == Some(0) {
            return Err(LoggerError::config(
                "Dispatcher",
                "queue_capacity must be greater than zero",
            ));
        }
        if self.ordering_lane_name.trim().is_empty() {
            return Err(LoggerError::config(
                "Dispatcher",
                "ordering_lane_name must not be empty",
            ));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
