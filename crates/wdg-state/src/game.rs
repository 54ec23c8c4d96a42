//! # Dispute Game
//!
//! One game per dispute, between exactly one attacker identity and one
//! defender identity. In practice both identities are escrow vaults, but the
//! game does not know or care: it only checks who is calling.
//!
//! ## Security Invariant
//!
//! Each entry point validates every precondition, computes every derived
//! value (next stake, next deadline, new cumulative totals) and only then
//! performs its single ledger transfer. State is written after the transfer
//! succeeds. A rejected call therefore leaves both the game and the ledger
//! untouched.
//!
//! The custody account's balance always equals
//! `attacker_staked + defender_staked` while the game is active, and that
//! whole amount is paid to the winner in one transfer on timeout.

use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, Amount, AssetId, GameId, Ledger, Timestamp};

use crate::error::GameError;

// ── Sides and States ───────────────────────────────────────────────────

/// One of the two parties of a game. Also names whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    /// The challenger of the withdrawal.
    Attacker,
    /// The defender of the withdrawal.
    Defender,
}

impl Side {
    /// The other side.
    pub fn opponent(&self) -> Self {
        match self {
            Self::Attacker => Self::Defender,
            Self::Defender => Self::Attacker,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attacker => "ATTACKER",
            Self::Defender => "DEFENDER",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Moves are being accepted.
    Active,
    /// The defender missed a deadline. Terminal.
    AttackerWon,
    /// The attacker missed a deadline. Terminal.
    DefenderWon,
}

impl GameState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// The winning side, once terminal.
    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Active => None,
            Self::AttackerWon => Some(Side::Attacker),
            Self::DefenderWon => Some(Side::Defender),
        }
    }

    /// The terminal state in which `side` has won.
    pub fn won_by(side: Side) -> Self {
        match side {
            Side::Attacker => Self::AttackerWon,
            Side::Defender => Self::DefenderWon,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::AttackerWon => "ATTACKER_WON",
            Self::DefenderWon => "DEFENDER_WON",
        }
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Construction ───────────────────────────────────────────────────────

/// Everything needed to bring a game into existence.
#[derive(Debug, Clone)]
pub struct GameParams {
    /// Handle assigned by the factory.
    pub id: GameId,
    /// Account that custodies both sides' stake.
    pub account: AccountId,
    /// Identity entitled to attack.
    pub attacker: AccountId,
    /// Identity entitled to defend.
    pub defender: AccountId,
    /// Asset the stakes are denominated in.
    pub asset: AssetId,
    /// Stake unit `S` of the first round.
    pub initial_stake: Amount,
    /// Seconds granted to the side on turn after every move.
    pub timeout_extension_secs: u64,
}

// ── Outcomes ───────────────────────────────────────────────────────────

/// Result of an accepted attack or defence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// The game.
    pub game_id: GameId,
    /// The side that moved.
    pub side: Side,
    /// The identity that moved.
    pub mover: AccountId,
    /// Stake committed by this move.
    pub stake: Amount,
    /// Stake required of the next move.
    pub next_required_stake: Amount,
    /// Side now on turn.
    pub next_turn: Side,
    /// Deadline for the next move.
    pub deadline: Timestamp,
    /// Moves completed so far, including this one.
    pub moves: u64,
}

/// Result of an accepted timeout claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOutcome {
    /// The game.
    pub game_id: GameId,
    /// Whoever submitted the claim.
    pub claimed_by: AccountId,
    /// The terminal state reached.
    pub verdict: GameState,
    /// Identity that received the pot.
    pub winner: AccountId,
    /// Size of the pot.
    pub payout: Amount,
}

/// Read-only snapshot of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    /// The game.
    pub id: GameId,
    /// Custody account.
    pub account: AccountId,
    /// Attacker identity.
    pub attacker: AccountId,
    /// Defender identity.
    pub defender: AccountId,
    /// Stake asset.
    pub asset: AssetId,
    /// Stake unit of the first round.
    pub initial_stake: Amount,
    /// Stake the side on turn must commit.
    pub required_stake: Amount,
    /// Side on turn.
    pub turn: Side,
    /// Lifecycle state.
    pub state: GameState,
    /// Cumulative attacker stake.
    pub attacker_staked: Amount,
    /// Cumulative defender stake.
    pub defender_staked: Amount,
    /// Last instant at which the side on turn may still move.
    pub timeout_deadline: Timestamp,
    /// Seconds re-armed after every move.
    pub timeout_extension_secs: u64,
    /// Completed moves.
    pub moves: u64,
    /// When the game was created.
    pub created_at: Timestamp,
}

// ── The Game ───────────────────────────────────────────────────────────

/// A dispute game between one attacker and one defender.
#[derive(Debug, Clone)]
pub struct DisputeGame {
    id: GameId,
    account: AccountId,
    attacker: AccountId,
    defender: AccountId,
    asset: AssetId,
    initial_stake: Amount,
    required_stake: Amount,
    turn: Side,
    state: GameState,
    attacker_staked: Amount,
    defender_staked: Amount,
    timeout_deadline: Timestamp,
    timeout_extension_secs: u64,
    moves: u64,
    created_at: Timestamp,
}

impl DisputeGame {
    /// Create a game with the attacker on turn and the first deadline armed.
    ///
    /// A constructed game is always initialized; there is no way to
    /// initialize one twice.
    ///
    /// # Errors
    ///
    /// - [`GameError::InvalidParties`] if either party or the custody account
    ///   is the null identity, if attacker equals defender, or if the custody
    ///   account is one of the parties.
    /// - [`GameError::ZeroStake`] / [`GameError::ZeroTimeoutExtension`].
    pub fn initialize(params: GameParams, now: Timestamp) -> Result<Self, GameError> {
        if params.attacker.is_nil() || params.defender.is_nil() || params.account.is_nil() {
            return Err(GameError::InvalidParties(
                "attacker, defender and custody account must be non-null".to_string(),
            ));
        }
        if params.attacker == params.defender {
            return Err(GameError::InvalidParties(format!(
                "attacker and defender are both {}",
                params.attacker
            )));
        }
        if params.account == params.attacker || params.account == params.defender {
            return Err(GameError::InvalidParties(
                "custody account must be distinct from both parties".to_string(),
            ));
        }
        if params.initial_stake == 0 {
            return Err(GameError::ZeroStake);
        }
        if params.timeout_extension_secs == 0 {
            return Err(GameError::ZeroTimeoutExtension);
        }
        let timeout_deadline = now.checked_add_secs(params.timeout_extension_secs)?;

        Ok(Self {
            id: params.id,
            account: params.account,
            attacker: params.attacker,
            defender: params.defender,
            asset: params.asset,
            initial_stake: params.initial_stake,
            required_stake: params.initial_stake,
            turn: Side::Attacker,
            state: GameState::Active,
            attacker_staked: 0,
            defender_staked: 0,
            timeout_deadline,
            timeout_extension_secs: params.timeout_extension_secs,
            moves: 0,
            created_at: now,
        })
    }

    /// Commit the required stake as the attacker. The required stake is
    /// unchanged for the defender's answer.
    pub fn attack(
        &mut self,
        caller: &AccountId,
        ledger: &mut Ledger,
        now: Timestamp,
    ) -> Result<MoveOutcome, GameError> {
        self.play(Side::Attacker, caller, ledger, now)
    }

    /// Commit the required stake as the defender, doubling the stake the
    /// next round will cost.
    pub fn defend(
        &mut self,
        caller: &AccountId,
        ledger: &mut Ledger,
        now: Timestamp,
    ) -> Result<MoveOutcome, GameError> {
        self.play(Side::Defender, caller, ledger, now)
    }

    /// Make the move for whichever side `caller` plays.
    pub fn play(
        &mut self,
        side: Side,
        caller: &AccountId,
        ledger: &mut Ledger,
        now: Timestamp,
    ) -> Result<MoveOutcome, GameError> {
        self.ensure_active()?;
        if *caller != self.party(side) {
            return Err(GameError::UnauthorizedMover {
                game_id: self.id.to_string(),
                side: side.to_string(),
                caller: caller.to_string(),
            });
        }
        if self.turn != side {
            return Err(GameError::WrongTurn {
                game_id: self.id.to_string(),
                expected: self.turn.to_string(),
                attempted: side.to_string(),
            });
        }
        if now > self.timeout_deadline {
            return Err(GameError::DeadlinePassed {
                game_id: self.id.to_string(),
                deadline: self.timeout_deadline.to_string(),
                now: now.to_string(),
            });
        }

        let stake = self.required_stake;
        let next_required_stake = match side {
            Side::Attacker => stake,
            Side::Defender => stake.checked_mul(2).ok_or_else(|| self.overflow())?,
        };
        let staked_after = self
            .staked(side)
            .checked_add(stake)
            .ok_or_else(|| self.overflow())?;
        let deadline = now.checked_add_secs(self.timeout_extension_secs)?;

        ledger.transfer_from(&self.asset, &self.account, caller, &self.account, stake)?;

        match side {
            Side::Attacker => self.attacker_staked = staked_after,
            Side::Defender => self.defender_staked = staked_after,
        }
        self.required_stake = next_required_stake;
        self.turn = side.opponent();
        self.timeout_deadline = deadline;
        self.moves += 1;

        Ok(MoveOutcome {
            game_id: self.id,
            side,
            mover: *caller,
            stake,
            next_required_stake,
            next_turn: self.turn,
            deadline,
            moves: self.moves,
        })
    }

    /// Settle the game against the side that let its deadline pass.
    ///
    /// Callable by anyone once `now` is strictly after the deadline. Pays the
    /// whole pot to the other side in one transfer; if that transfer fails
    /// the game stays active.
    pub fn claim_timeout(
        &mut self,
        caller: &AccountId,
        ledger: &mut Ledger,
        now: Timestamp,
    ) -> Result<TimeoutOutcome, GameError> {
        self.ensure_active()?;
        if now <= self.timeout_deadline {
            return Err(GameError::DeadlineNotReached {
                game_id: self.id.to_string(),
                deadline: self.timeout_deadline.to_string(),
                now: now.to_string(),
            });
        }

        let winning_side = self.turn.opponent();
        let winner = self.party(winning_side);
        let payout = self.pot()?;

        ledger.transfer(&self.asset, &self.account, &winner, payout)?;
        self.state = GameState::won_by(winning_side);

        Ok(TimeoutOutcome {
            game_id: self.id,
            claimed_by: *caller,
            verdict: self.state,
            winner,
            payout,
        })
    }

    // ── Observers ──────────────────────────────────────────────────────

    /// Full snapshot of the game.
    pub fn info(&self) -> GameInfo {
        GameInfo {
            id: self.id,
            account: self.account,
            attacker: self.attacker,
            defender: self.defender,
            asset: self.asset.clone(),
            initial_stake: self.initial_stake,
            required_stake: self.required_stake,
            turn: self.turn,
            state: self.state,
            attacker_staked: self.attacker_staked,
            defender_staked: self.defender_staked,
            timeout_deadline: self.timeout_deadline,
            timeout_extension_secs: self.timeout_extension_secs,
            moves: self.moves,
            created_at: self.created_at,
        }
    }

    /// Stake the side on turn must commit.
    pub fn required_stake(&self) -> Amount {
        self.required_stake
    }

    /// The game handle.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Custody account of the game.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Stake asset.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Stake unit of the first round.
    pub fn initial_stake(&self) -> Amount {
        self.initial_stake
    }

    /// Lifecycle state.
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Side on turn.
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// Last instant at which the side on turn may still move.
    pub fn timeout_deadline(&self) -> Timestamp {
        self.timeout_deadline
    }

    /// Identity playing `side`.
    pub fn party(&self, side: Side) -> AccountId {
        match side {
            Side::Attacker => self.attacker,
            Side::Defender => self.defender,
        }
    }

    /// Cumulative stake committed by `side`.
    pub fn staked(&self, side: Side) -> Amount {
        match side {
            Side::Attacker => self.attacker_staked,
            Side::Defender => self.defender_staked,
        }
    }

    fn pot(&self) -> Result<Amount, GameError> {
        self.attacker_staked
            .checked_add(self.defender_staked)
            .ok_or_else(|| self.overflow())
    }

    fn ensure_active(&self) -> Result<(), GameError> {
        if self.state.is_terminal() {
            return Err(GameError::NotActive {
                game_id: self.id.to_string(),
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn overflow(&self) -> GameError {
        GameError::StakeOverflow {
            game_id: self.id.to_string(),
        }
    }
}
