//! # wdg CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wdg_cli::config::{run_config, ConfigArgs};
use wdg_cli::load_config;
use wdg_cli::run::{run_run, RunArgs};
use wdg_cli::scenario::{run_scenario, ScenarioArgs};

/// Withdrawal dispute game simulator.
///
/// Runs escalating-stake dispute games, their escrow vaults and the
/// withdrawal resolver on a manual clock and reports every step as JSON.
#[derive(Parser, Debug)]
#[command(name = "wdg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file; overrides any config embedded in a script.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a YAML simulation script.
    Run(RunArgs),

    /// Run a bundled end-to-end scenario.
    Scenario(ScenarioArgs),

    /// Print the effective engine configuration.
    Config(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Run(args) => run_run(args, config),
        Commands::Scenario(args) => run_scenario(args, config),
        Commands::Config(args) => run_config(args, config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
