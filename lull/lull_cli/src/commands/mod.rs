//! Subcommands of the `lull` binary.

pub mod config;
pub mod scan;
