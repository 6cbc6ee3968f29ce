//! Configuration utilities.
//!
//! Scheduler and timer settings are plain serde structs with per-field
//! defaults, so a TOML file only needs the keys it wants to change.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::types::SliceOptions;

/// Batch scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Low-water mark (milliseconds). The executor yields back to the host
    /// once a slice has no more than this much budget left.
    #[serde(default = "default_time_remaining_lower_limit_ms")]
    pub time_remaining_lower_limit_ms: u64,

    /// Timeout (milliseconds) passed with every slice request
    #[serde(default)]
    pub slice_timeout_ms: Option<u64>,
}

fn default_time_remaining_lower_limit_ms() -> u64 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_remaining_lower_limit_ms: default_time_remaining_lower_limit_ms(),
            slice_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    /// Low-water mark as a duration.
    pub fn time_remaining_lower_limit(&self) -> Duration {
        Duration::from_millis(self.time_remaining_lower_limit_ms)
    }

    /// Slice options derived from this configuration.
    pub fn slice_options(&self) -> SliceOptions {
        SliceOptions {
            timeout: self.slice_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slice_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "slice_timeout_ms must be positive when set".to_string(),
            ));
        }

        if self.time_remaining_lower_limit_ms == 0 {
            debug!("Low-water mark is zero; slices drain until the budget is gone");
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Timer-based slice provider configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Delay (milliseconds) between arming a slice and firing it
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Budget (milliseconds) reported by a freshly armed slice
    #[serde(default = "default_slice_budget_ms")]
    pub slice_budget_ms: u64,
}

fn default_delay_ms() -> u64 {
    1
}

fn default_slice_budget_ms() -> u64 {
    50
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            slice_budget_ms: default_slice_budget_ms(),
        }
    }
}

impl TimerConfig {
    /// Arming delay as a duration.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Slice budget as a duration.
    pub fn slice_budget(&self) -> Duration {
        Duration::from_millis(self.slice_budget_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slice_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "slice_budget_ms cannot be zero".to_string(),
            ));
        }

        // The budget counts down from arming, so a slice that fires after
        // the whole budget has gone could never run a task.
        if self.delay_ms >= self.slice_budget_ms {
            return Err(ConfigError::Invalid(format!(
                "delay_ms ({}) must be below slice_budget_ms ({})",
                self.delay_ms, self.slice_budget_ms
            )));
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Read a TOML file into `T`, or return `T::default()` when no path is given.
///
/// A path that does not exist is a load failure, not a silent default.
pub fn load_toml<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No configuration file specified, using defaults");
        return Ok(T::default());
    };

    info!(path = %path.display(), "Loading configuration");
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;

    Ok(toml::from_str(&content)?)
}
