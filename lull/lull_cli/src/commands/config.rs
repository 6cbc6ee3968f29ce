//! The `config` command.

use anyhow::Result;
use clap::Args;

use crate::config::LullConfig;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the built-in defaults, ignoring any configuration file
    #[arg(long)]
    pub defaults: bool,
}

/// Print the effective configuration as TOML
pub fn execute(args: &ConfigArgs, config: &LullConfig) -> Result<()> {
    let rendered = if args.defaults {
        LullConfig::default().to_toml_string()?
    } else {
        config.to_toml_string()?
    };
    print!("{}", rendered);
    Ok(())
}
