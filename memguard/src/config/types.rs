use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::memory::MemoryThresholds;
use crate::policy::KillingPolicyKind;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("usage_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Memory monitor and killing policy settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMonitorConfig {
    /// Fraction of total memory at which the node is above threshold
    pub usage_threshold: f64,
    /// Free-memory floor in bytes; absent disables the check
    pub min_free_bytes: Option<u64>,
    /// Sampling period in milliseconds; 0 never schedules a tick
    pub refresh_interval_ms: u64,
    /// Policy used to pick the victim
    pub killing_policy: KillingPolicyKind,
    /// Record per-process resident memory in each snapshot
    pub track_process_memory: bool,
    /// Number of workers listed in the kill-order report
    pub report_top_workers: usize,
}

impl Default for MemoryMonitorConfig {
    fn default() -> Self {
        Self {
            usage_threshold: 0.95,
            min_free_bytes: None,
            refresh_interval_ms: 250,
            killing_policy: KillingPolicyKind::default(),
            track_process_memory: true,
            report_top_workers: 10,
        }
    }
}

impl MemoryMonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.usage_threshold) {
            return Err(ConfigError::InvalidThreshold(self.usage_threshold));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        MemoryThresholds::new(self.usage_threshold, self.min_free_bytes)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Load and validate a config file. `.json` files are JSON, anything else TOML.
pub fn load_config(path: impl AsRef<Path>) -> Result<MemoryMonitorConfig, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let config: MemoryMonitorConfig = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&data)?
    } else {
        toml::from_str(&data)?
    };
    config.validate()?;
    Ok(config)
}
