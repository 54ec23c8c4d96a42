//! # Run — execute a simulation script file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use wdg_resolver::EngineConfig;

use crate::emit_report;
use crate::script::{Script, Simulation};

/// Arguments for `wdg run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML script.
    pub script: PathBuf,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the run subcommand. `config` overrides the script's own.
pub fn run_run(args: &RunArgs, config: Option<EngineConfig>) -> Result<u8> {
    let yaml = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let script = Script::from_yaml_str(&yaml)?;
    tracing::info!(script = %args.script.display(), steps = script.steps.len(), "running script");
    let report = Simulation::run_script(&script, config)?;
    emit_report(&report, args.pretty)
}
