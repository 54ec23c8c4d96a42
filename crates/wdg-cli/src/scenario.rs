//! # Scenario — run a bundled end-to-end dispute.
//!
//! Two scripts ship with the binary:
//!
//! - `defender-wins`: the attacker pool stops funding and the withdrawal
//!   resolves valid.
//! - `attacker-wins`: the defender pool stops funding and the withdrawal
//!   resolves invalid.

use anyhow::Result;
use clap::{Args, ValueEnum};

use wdg_resolver::EngineConfig;

use crate::emit_report;
use crate::script::{Script, Simulation};

const DEFENDER_WINS: &str = include_str!("../scripts/defender_wins.yaml");
const ATTACKER_WINS: &str = include_str!("../scripts/attacker_wins.yaml");

/// Bundled scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    /// Attacker pool misses the doubled round.
    DefenderWins,
    /// Defender pool misses the doubled round.
    AttackerWins,
}

impl ScenarioName {
    /// The scenario's script source.
    pub fn source(self) -> &'static str {
        match self {
            Self::DefenderWins => DEFENDER_WINS,
            Self::AttackerWins => ATTACKER_WINS,
        }
    }

    /// Parse the scenario's script.
    pub fn script(self) -> Result<Script> {
        Script::from_yaml_str(self.source())
    }
}

/// Arguments for `wdg scenario`.
#[derive(Args, Debug)]
pub struct ScenarioArgs {
    /// Which scenario to run.
    #[arg(value_enum)]
    pub name: ScenarioName,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the scenario subcommand. `config` overrides the scenario's own.
pub fn run_scenario(args: &ScenarioArgs, config: Option<EngineConfig>) -> Result<u8> {
    let script = args.name.script()?;
    tracing::info!(scenario = ?args.name, "running scenario");
    let report = Simulation::run_script(&script, config)?;
    emit_report(&report, args.pretty)
}
