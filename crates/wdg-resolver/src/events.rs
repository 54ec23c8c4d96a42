//! # Engine Events
//!
//! Append-only record of every state transition the engine performed, in
//! order. Events emitted by a call that later fails are discarded together
//! with the rest of that call's effects.

use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, Amount, GameId, RequestId, Timestamp, VaultId};
use wdg_state::{GameState, Side};

/// A state transition performed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The facade registered a withdrawal.
    WithdrawRequested {
        /// When.
        at: Timestamp,
        /// New request.
        request: RequestId,
        /// Withdrawing identity.
        requester: AccountId,
        /// Amount withdrawn.
        amount: Amount,
    },
    /// A dispute game was created with its two vaults.
    GameCreated {
        /// When.
        at: Timestamp,
        /// New game.
        game: GameId,
        /// Its custody account.
        game_account: AccountId,
        /// Attacker vault.
        attacker_vault: VaultId,
        /// Defender vault.
        defender_vault: VaultId,
        /// Stake of the first round.
        initial_stake: Amount,
    },
    /// A request was disputed.
    DisputeOpened {
        /// When.
        at: Timestamp,
        /// Disputed request.
        request: RequestId,
        /// Its game.
        game: GameId,
        /// Identity that opened the dispute.
        disputer: AccountId,
        /// Stake seeded into the attacker vault.
        stake: Amount,
    },
    /// A vault moved on behalf of its depositors.
    TurnPlayed {
        /// When.
        at: Timestamp,
        /// The vault.
        vault: VaultId,
        /// The game.
        game: GameId,
        /// Side moved.
        side: Side,
        /// Stake committed.
        stake: Amount,
        /// Stake now required of the opponent.
        next_required_stake: Amount,
        /// Next move's deadline.
        deadline: Timestamp,
    },
    /// Assets entered a vault.
    Deposited {
        /// When.
        at: Timestamp,
        /// The vault.
        vault: VaultId,
        /// Source of the assets.
        depositor: AccountId,
        /// Holder of the new shares.
        beneficiary: AccountId,
        /// Assets in.
        assets: Amount,
        /// Shares issued.
        shares: Amount,
    },
    /// Assets left a vault.
    Withdrawn {
        /// When.
        at: Timestamp,
        /// The vault.
        vault: VaultId,
        /// Share owner.
        owner: AccountId,
        /// Paid account.
        receiver: AccountId,
        /// Assets out.
        assets: Amount,
        /// Shares burned.
        shares: Amount,
    },
    /// A game ended by timeout.
    TimeoutClaimed {
        /// When.
        at: Timestamp,
        /// The game.
        game: GameId,
        /// Claimant.
        claimed_by: AccountId,
        /// Terminal state.
        verdict: GameState,
        /// Paid identity.
        winner: AccountId,
        /// Pot size.
        payout: Amount,
    },
    /// A disputed request received its validity.
    Resolved {
        /// When.
        at: Timestamp,
        /// The request.
        request: RequestId,
        /// Its game.
        game: GameId,
        /// The game's verdict.
        verdict: GameState,
        /// Resulting validity.
        valid: bool,
    },
}

impl EngineEvent {
    /// When the event happened.
    pub fn at(&self) -> Timestamp {
        match self {
            Self::WithdrawRequested { at, .. }
            | Self::GameCreated { at, .. }
            | Self::DisputeOpened { at, .. }
            | Self::TurnPlayed { at, .. }
            | Self::Deposited { at, .. }
            | Self::Withdrawn { at, .. }
            | Self::TimeoutClaimed { at, .. }
            | Self::Resolved { at, .. } => *at,
        }
    }

    /// The snake_case event name, as serialized.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WithdrawRequested { .. } => "withdraw_requested",
            Self::GameCreated { .. } => "game_created",
            Self::DisputeOpened { .. } => "dispute_opened",
            Self::TurnPlayed { .. } => "turn_played",
            Self::Deposited { .. } => "deposited",
            Self::Withdrawn { .. } => "withdrawn",
            Self::TimeoutClaimed { .. } => "timeout_claimed",
            Self::Resolved { .. } => "resolved",
        }
    }
}
