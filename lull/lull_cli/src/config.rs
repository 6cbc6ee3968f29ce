//! Top-level configuration file for the `lull` binary.
//!
//! Every section is optional:
//!
//! ```toml
//! log_level = "info"
//! search_result_limit = 20
//!
//! [scheduler]
//! time_remaining_lower_limit_ms = 2
//!
//! [timer]
//! slice_budget_ms = 16
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use lull_core::error::ConfigError;
use lull_core::utils::{load_toml, LogLevel, SchedulerConfig, TimerConfig};
use lull_markdown::DEFAULT_RESULT_LIMIT;

/// Configuration for the `lull` binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LullConfig {
    /// Log level used when `RUST_LOG` is not set
    #[serde(default)]
    pub log_level: LogLevel,

    /// Maximum number of search matches printed
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: usize,

    /// Batch scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Timer slice provider settings
    #[serde(default)]
    pub timer: TimerConfig,
}

fn default_search_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl Default for LullConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            search_result_limit: default_search_result_limit(),
            scheduler: SchedulerConfig::default(),
            timer: TimerConfig::default(),
        }
    }
}

impl LullConfig {
    /// Load from `path`, or defaults when no path is given, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section and how they combine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.timer.validate()?;

        if self.search_result_limit == 0 {
            return Err(ConfigError::Invalid(
                "search_result_limit cannot be zero".to_string(),
            ));
        }

        // Without a timeout, a slice fires with at most `slice_budget_ms -
        // delay_ms` left, which must stay above the low-water mark or no
        // task would ever run.
        let lower_limit_ms = self.scheduler.time_remaining_lower_limit_ms;
        if self.scheduler.slice_timeout_ms.is_none()
            && lower_limit_ms.saturating_add(self.timer.delay_ms) >= self.timer.slice_budget_ms
        {
            return Err(ConfigError::Invalid(format!(
                "time_remaining_lower_limit_ms ({}) plus delay_ms ({}) must be below slice_budget_ms ({}) unless slice_timeout_ms is set",
                lower_limit_ms, self.timer.delay_ms, self.timer.slice_budget_ms
            )));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
