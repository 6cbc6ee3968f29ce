use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lull_core::utils::LogLevel;

mod commands;
mod config;

use commands::config::ConfigArgs;
use commands::scan::ScanArgs;
use config::LullConfig;

/// Lull: background task scanning for markdown notes
///
/// Markdown files are parsed in cooperative idle slices, one file per task.
#[derive(Parser)]
#[command(name = "lull", author, version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory of markdown notes for tasks
    Scan(ScanArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

fn init_logging(level: LogLevel) {
    // Logs go to stderr so `--json` output stays machine readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive())),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LullConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid default configuration".to_string(),
    })?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(config.log_level);

    match &cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &config),
        Commands::Config(args) => commands::config::execute(args, &config),
    }
}
