//! # Simulation Scripts
//!
//! A script is a YAML document describing a starting instant, an optional
//! engine configuration, and a list of steps run in order against a fresh
//! [`DisputeEngine`] on a manual clock:
//!
//! ```yaml
//! start: 2026-03-01T00:00:00Z
//! config:
//!   dispute_stake: 1
//! steps:
//!   - op: push_request
//!     requester: alice
//!     amount: 100
//!   - op: credit
//!     account: bob
//!     amount: 1
//!   - op: approve
//!     owner: bob
//!     spender: resolver
//!     amount: 1
//!   - op: dispute
//!     caller: bob
//!     request: 0
//!   - op: advance
//!     secs: 3601
//!   - op: claim_timeout
//!     game: 0
//!     caller: bob
//!     expect_error: false
//! ```
//!
//! ## Account Names
//!
//! Plain names (`alice`, `bob`) map to deterministic accounts. Reserved
//! names address system accounts: `facade`, `resolver`, `game:<n>` and
//! `vault:<n>:attacker` / `vault:<n>:defender`.
//!
//! ## Expectations
//!
//! Every step may set `expect_error`. A step whose outcome disagrees with
//! its expectation is a mismatch; the run continues and the report lists
//! it. `validate` steps may also set `expect` to the validity they require.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, GameId, ManualClock, RequestId, Timestamp, VaultId};
use wdg_resolver::{DisputeEngine, EngineConfig, EngineEvent};
use wdg_state::Side;

/// A parsed simulation script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Clock start.
    pub start: Timestamp,
    /// Engine configuration; defaults when absent.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    /// Name of the withdrawal facade identity.
    #[serde(default = "default_facade")]
    pub facade: String,
    /// Steps, in order.
    pub steps: Vec<Step>,
}

fn default_facade() -> String {
    "facade".to_string()
}

impl Script {
    /// Parse a YAML script.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse simulation script")
    }
}

/// One step of a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// What to do.
    #[serde(flatten)]
    pub action: Action,
    /// Whether the step is expected to be rejected.
    #[serde(default)]
    pub expect_error: bool,
}

/// Engine operation performed by a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Issue stake asset to an account.
    Credit { account: String, amount: u64 },
    /// Set a ledger allowance.
    Approve { owner: String, spender: String, amount: u64 },
    /// Direct ledger transfer.
    Transfer { from: String, to: String, amount: u64 },
    /// Facade registers a withdrawal.
    PushRequest {
        requester: String,
        amount: u64,
        #[serde(default)]
        caller: Option<String>,
    },
    /// Open a dispute.
    Dispute { caller: String, request: u64 },
    /// Deposit into one side's vault.
    Deposit {
        game: u64,
        side: Side,
        depositor: String,
        amount: u64,
        #[serde(default)]
        beneficiary: Option<String>,
    },
    /// Mint exact shares of one side's vault.
    Mint {
        game: u64,
        side: Side,
        depositor: String,
        shares: u64,
        #[serde(default)]
        beneficiary: Option<String>,
    },
    /// Withdraw exact assets from a vault.
    Withdraw {
        game: u64,
        side: Side,
        caller: String,
        amount: u64,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        owner: Option<String>,
    },
    /// Redeem shares from a vault; all held shares when `shares` is absent.
    Redeem {
        game: u64,
        side: Side,
        caller: String,
        #[serde(default)]
        shares: Option<u64>,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        owner: Option<String>,
    },
    /// Explicitly ask a vault to move.
    PlayTurn { game: u64, side: Side },
    /// Attack through the attacker vault; `caller` must be its account.
    Attack { game: u64, caller: String },
    /// Defend through the defender vault; `caller` must be its account.
    Defend { game: u64, caller: String },
    /// Move the clock forward.
    Advance { secs: u64 },
    /// Claim a timeout.
    ClaimTimeout { game: u64, caller: String },
    /// Resolve a disputed request.
    Resolve { request: u64 },
    /// Query request validity.
    Validate {
        requester: String,
        request: u64,
        #[serde(default)]
        expect: Option<bool>,
    },
    /// Snapshot a game and its vaults.
    Status { game: u64 },
}

impl Action {
    /// The step's `op` name.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Credit { .. } => "credit",
            Self::Approve { .. } => "approve",
            Self::Transfer { .. } => "transfer",
            Self::PushRequest { .. } => "push_request",
            Self::Dispute { .. } => "dispute",
            Self::Deposit { .. } => "deposit",
            Self::Mint { .. } => "mint",
            Self::Withdraw { .. } => "withdraw",
            Self::Redeem { .. } => "redeem",
            Self::PlayTurn { .. } => "play_turn",
            Self::Attack { .. } => "attack",
            Self::Defend { .. } => "defend",
            Self::Advance { .. } => "advance",
            Self::ClaimTimeout { .. } => "claim_timeout",
            Self::Resolve { .. } => "resolve",
            Self::Validate { .. } => "validate",
            Self::Status { .. } => "status",
        }
    }
}

// ── Report ─────────────────────────────────────────────────────────────

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Position in the script.
    pub index: usize,
    /// Operation name.
    pub op: &'static str,
    /// Clock at execution.
    pub at: Timestamp,
    /// Whether the engine accepted the step.
    pub ok: bool,
    /// Whether the outcome matched the step's expectation.
    pub as_expected: bool,
    /// Returned value, when accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Rejection reason, when rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole script.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Per-step outcomes.
    pub steps: Vec<StepReport>,
    /// Steps whose outcome disagreed with their expectation.
    pub mismatches: usize,
    /// Final balance of every named account.
    pub balances: BTreeMap<String, u64>,
    /// Engine event log.
    pub events: Vec<EngineEvent>,
}

impl RunReport {
    /// Whether every step behaved as expected.
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

// ── Simulation ─────────────────────────────────────────────────────────

/// An engine on a manual clock plus the name → account table.
pub struct Simulation {
    engine: DisputeEngine<ManualClock>,
    clock: ManualClock,
    names: BTreeMap<String, AccountId>,
}

impl Simulation {
    /// A fresh engine at `start`.
    pub fn new(config: EngineConfig, start: Timestamp, facade: &str) -> Result<Self> {
        let clock = ManualClock::new(start);
        let facade_account = user_account(facade);
        let engine = DisputeEngine::new(config, facade_account, clock.clone())
            .context("failed to start dispute engine")?;
        let mut names = BTreeMap::new();
        names.insert(facade.to_string(), facade_account);
        Ok(Self {
            engine,
            clock,
            names,
        })
    }

    /// Run every step of `script` against a fresh simulation.
    ///
    /// `config` overrides the script's own configuration when given.
    pub fn run_script(script: &Script, config: Option<EngineConfig>) -> Result<RunReport> {
        let config = config
            .or_else(|| script.config.clone())
            .unwrap_or_default();
        let mut sim = Self::new(config, script.start, &script.facade)?;
        Ok(sim.run(&script.steps))
    }

    /// Run `steps` in order.
    pub fn run(&mut self, steps: &[Step]) -> RunReport {
        let mut reports = Vec::with_capacity(steps.len());
        let mut mismatches = 0;
        for (index, step) in steps.iter().enumerate() {
            let at = self.engine.now();
            let outcome = self.apply(&step.action);
            let ok = outcome.is_ok();
            let as_expected = ok != step.expect_error;
            if !as_expected {
                mismatches += 1;
            }
            let (result, error) = match outcome {
                Ok(value) => (Some(value), None),
                Err(e) => (None, Some(format!("{e:#}"))),
            };
            match (&error, as_expected) {
                (Some(e), false) => tracing::warn!(index, op = step.action.op(), error = %e, "step failed"),
                (None, false) => tracing::warn!(index, op = step.action.op(), "step succeeded but was expected to fail"),
                _ => tracing::debug!(index, op = step.action.op(), ok, "step"),
            }
            reports.push(StepReport {
                index,
                op: step.action.op(),
                at,
                ok,
                as_expected,
                result,
                error,
            });
        }
        RunReport {
            steps: reports,
            mismatches,
            balances: self.balances(),
            events: self.engine.events().to_vec(),
        }
    }

    /// Perform one action.
    pub fn apply(&mut self, action: &Action) -> Result<serde_json::Value> {
        let value = match action {
            Action::Credit { account, amount } => {
                let account = self.account(account)?;
                to_json(&self.engine.credit(&account, *amount)?)?
            }
            Action::Approve { owner, spender, amount } => {
                let (owner, spender) = (self.account(owner)?, self.account(spender)?);
                self.engine.approve(&owner, &spender, *amount)?;
                serde_json::Value::Null
            }
            Action::Transfer { from, to, amount } => {
                let (from, to) = (self.account(from)?, self.account(to)?);
                self.engine.transfer(&from, &to, *amount)?;
                serde_json::Value::Null
            }
            Action::PushRequest { requester, amount, caller } => {
                let requester = self.account(requester)?;
                let caller = match caller {
                    Some(name) => self.account(name)?,
                    None => self.engine.facade(),
                };
                to_json(&self.engine.push_withdraw_request(&caller, &requester, *amount)?)?
            }
            Action::Dispute { caller, request } => {
                let caller = self.account(caller)?;
                to_json(&self.engine.dispute(&caller, RequestId(*request))?)?
            }
            Action::Deposit { game, side, depositor, amount, beneficiary } => {
                let vault = self.vault(*game, *side)?;
                let depositor = self.account(depositor)?;
                let beneficiary = self.account_or(beneficiary, depositor)?;
                to_json(&self.engine.deposit(vault, &depositor, *amount, &beneficiary)?)?
            }
            Action::Mint { game, side, depositor, shares, beneficiary } => {
                let vault = self.vault(*game, *side)?;
                let depositor = self.account(depositor)?;
                let beneficiary = self.account_or(beneficiary, depositor)?;
                to_json(&self.engine.mint(vault, &depositor, *shares, &beneficiary)?)?
            }
            Action::Withdraw { game, side, caller, amount, receiver, owner } => {
                let vault = self.vault(*game, *side)?;
                let caller = self.account(caller)?;
                let receiver = self.account_or(receiver, caller)?;
                let owner = self.account_or(owner, caller)?;
                to_json(&self.engine.withdraw(vault, &caller, *amount, &receiver, &owner)?)?
            }
            Action::Redeem { game, side, caller, shares, receiver, owner } => {
                let vault = self.vault(*game, *side)?;
                let caller = self.account(caller)?;
                let receiver = self.account_or(receiver, caller)?;
                let owner = self.account_or(owner, caller)?;
                let shares = match shares {
                    Some(shares) => *shares,
                    None => self.engine.shares_of(vault, &owner)?,
                };
                to_json(&self.engine.redeem(vault, &caller, shares, &receiver, &owner)?)?
            }
            Action::PlayTurn { game, side } => {
                let vault = self.vault(*game, *side)?;
                to_json(&self.engine.play_turn(vault)?)?
            }
            Action::Attack { game, caller } => {
                let caller = self.account(caller)?;
                to_json(&self.engine.attack(GameId(*game), &caller)?)?
            }
            Action::Defend { game, caller } => {
                let caller = self.account(caller)?;
                to_json(&self.engine.defend(GameId(*game), &caller)?)?
            }
            Action::Advance { secs } => to_json(&self.clock.advance(*secs)?)?,
            Action::ClaimTimeout { game, caller } => {
                let caller = self.account(caller)?;
                to_json(&self.engine.claim_timeout(GameId(*game), &caller)?)?
            }
            Action::Resolve { request } => to_json(&self.engine.resolve(RequestId(*request))?)?,
            Action::Validate { requester, request, expect } => {
                let requester = self.account(requester)?;
                let valid = self.engine.validate_withdraw(&requester, RequestId(*request));
                if let Some(expected) = expect {
                    if valid != *expected {
                        bail!("request {request}: expected valid={expected}, got valid={valid}");
                    }
                }
                serde_json::Value::Bool(valid)
            }
            Action::Status { game } => {
                let game = GameId(*game);
                let (attacker, defender) = self.engine.pools_of(game)?;
                serde_json::json!({
                    "game": self.engine.game_info(game)?,
                    "attacker_vault": self.engine.vault_status(attacker)?,
                    "defender_vault": self.engine.vault_status(defender)?,
                })
            }
        };
        Ok(value)
    }

    /// Resolve a name to an account, remembering plain names.
    pub fn account(&mut self, name: &str) -> Result<AccountId> {
        if let Some(account) = self.system_account(name)? {
            return Ok(account);
        }
        let account = user_account(name);
        self.names.entry(name.to_string()).or_insert(account);
        Ok(account)
    }

    fn account_or(&mut self, name: &Option<String>, fallback: AccountId) -> Result<AccountId> {
        match name {
            Some(name) => self.account(name),
            None => Ok(fallback),
        }
    }

    fn system_account(&self, name: &str) -> Result<Option<AccountId>> {
        if name == "resolver" {
            return Ok(Some(self.engine.resolver_account()));
        }
        let parts: Vec<&str> = name.split(':').collect();
        match parts.as_slice() {
            ["game", n] => {
                let game = GameId(n.parse().with_context(|| format!("bad game in {name}"))?);
                Ok(Some(self.engine.game_info(game)?.account))
            }
            ["vault", n, side] => {
                let game: u64 = n.parse().with_context(|| format!("bad game in {name}"))?;
                let side = parse_side(side)?;
                let vault = self.vault(game, side)?;
                Ok(Some(self.engine.vault_info(vault)?.account))
            }
            _ => Ok(None),
        }
    }

    fn vault(&self, game: u64, side: Side) -> Result<VaultId> {
        let (attacker, defender) = self.engine.pools_of(GameId(game))?;
        Ok(match side {
            Side::Attacker => attacker,
            Side::Defender => defender,
        })
    }

    fn balances(&self) -> BTreeMap<String, u64> {
        self.names
            .iter()
            .map(|(name, account)| (name.clone(), self.engine.balance_of(account)))
            .collect()
    }

    /// The engine under simulation.
    pub fn engine(&self) -> &DisputeEngine<ManualClock> {
        &self.engine
    }
}

/// Deterministic account behind a plain name.
pub fn user_account(name: &str) -> AccountId {
    AccountId::derive(&format!("user:{name}"), 0)
}

fn parse_side(s: &str) -> Result<Side> {
    match s.to_ascii_lowercase().as_str() {
        "attacker" => Ok(Side::Attacker),
        "defender" => Ok(Side::Defender),
        other => Err(anyhow!("unknown side {other:?}")),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("failed to serialize step result")
}
