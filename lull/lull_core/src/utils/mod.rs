//! Utility functions and types.
//!
//! Configuration loading and log level helpers used by every lull crate.

pub mod config;
pub mod logging;

pub use config::{load_toml, SchedulerConfig, TimerConfig};
pub use logging::LogLevel;
