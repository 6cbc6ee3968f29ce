//! Error types for the lull scheduler.
//!
//! Errors are organized by subsystem, with each subsystem having its own
//! error type. The root error type, `Error`, wraps any of them so callers
//! can handle everything uniformly at the top level.

use thiserror::Error;

/// Root error type for lull.
#[derive(Debug, Error)]
pub enum Error {
    /// Batch scheduling errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Slice provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration loading and validation errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Markdown task recognition errors
    #[error("Markdown error: {0}")]
    Markdown(#[from] MarkdownError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the batch scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The submission was rejected before any state was touched
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// The scheduler was built with an unusable configuration
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by idle slice providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has been shut down and fires nothing
    #[error("Slice provider is shut down")]
    ShutDown,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source could not be read
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    /// The configuration source is not valid TOML for the expected shape
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration parsed but holds unusable values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while recognising markdown task lines.
#[derive(Debug, Error)]
pub enum MarkdownError {
    /// A property carried a date that does not exist on the calendar
    #[error("Invalid date on line {line}: {value}")]
    InvalidDate {
        /// One-based line number
        line: usize,
        /// The offending text
        value: String,
    },

    /// A timestamp carried an hour or minute out of range
    #[error("Invalid time on line {line}: {value}")]
    InvalidTime {
        /// One-based line number
        line: usize,
        /// The offending text
        value: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type used throughout lull.
pub type Result<T> = std::result::Result<T, Error>;
