//! # wdg-cli — Command-Line Driver for the Withdrawal Dispute Game
//!
//! Drives a [`wdg_resolver::DisputeEngine`] on a manual clock from YAML
//! scripts and prints what happened as JSON.
//!
//! ## Subcommands
//!
//! - `wdg run <script>`: run a simulation script.
//! - `wdg scenario <name>`: run one of the bundled end-to-end scenarios.
//! - `wdg config`: print the effective engine configuration.
//!
//! ```bash
//! wdg run ./dispute.yaml --pretty
//! wdg scenario defender-wins -v
//! wdg --config deploy.yaml config
//! ```

pub mod config;
pub mod run;
pub mod scenario;
pub mod script;

use std::path::Path;

use anyhow::{Context, Result};

use wdg_resolver::EngineConfig;

/// Exit code when every step matched its expectation.
pub const EXIT_OK: u8 = 0;
/// Exit code when at least one step disagreed with its expectation.
pub const EXIT_MISMATCH: u8 = 2;

/// Load an engine configuration file, or `None` when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Option<EngineConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = EngineConfig::from_yaml_str(&yaml)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded engine config");
    Ok(Some(config))
}

/// Print `report` as JSON and map it to an exit code.
pub fn emit_report(report: &script::RunReport, pretty: bool) -> Result<u8> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("failed to render report")?;
    println!("{rendered}");
    if report.passed() {
        Ok(EXIT_OK)
    } else {
        tracing::error!(mismatches = report.mismatches, "script did not run as expected");
        Ok(EXIT_MISMATCH)
    }
}
