//! # Config — print the effective engine configuration as YAML.

use anyhow::Result;
use clap::Args;

use wdg_resolver::EngineConfig;

/// Arguments for `wdg config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

/// Execute the config subcommand.
pub fn run_config(_args: &ConfigArgs, config: Option<EngineConfig>) -> Result<u8> {
    let config = config.unwrap_or_default();
    print!("{}", config.to_yaml()?);
    Ok(crate::EXIT_OK)
}
