//! # Dispute Game Errors
//!
//! Every variant carries the game handle and the state that caused the
//! rejection. A returned error means the game and the ledger are unchanged.

use thiserror::Error;

use wdg_core::{CoreError, LedgerError};

/// Errors arising from dispute game operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Attacker or defender is the null identity, or both are the same.
    #[error("invalid parties: {0}")]
    InvalidParties(String),

    /// The initial stake unit must be positive.
    #[error("initial stake must be positive")]
    ZeroStake,

    /// The per-move timeout extension must be positive.
    #[error("timeout extension must be positive")]
    ZeroTimeoutExtension,

    /// The game has reached a verdict and accepts no further moves.
    #[error("game {game_id} is not active (state {state})")]
    NotActive {
        /// The game handle.
        game_id: String,
        /// The terminal state.
        state: String,
    },

    /// Caller is not the identity entitled to play this side.
    #[error("{caller} may not move as {side} in game {game_id}")]
    UnauthorizedMover {
        /// The game handle.
        game_id: String,
        /// The side the caller tried to play.
        side: String,
        /// The rejected caller.
        caller: String,
    },

    /// The other side is due to move.
    #[error("not {attempted}'s turn in game {game_id}: waiting on {expected}")]
    WrongTurn {
        /// The game handle.
        game_id: String,
        /// The side whose turn it is.
        expected: String,
        /// The side that tried to move.
        attempted: String,
    },

    /// The move came after the deadline; only a timeout claim is possible now.
    #[error("deadline {deadline} for game {game_id} has passed (now {now})")]
    DeadlinePassed {
        /// The game handle.
        game_id: String,
        /// The missed deadline.
        deadline: String,
        /// Time of the rejected move.
        now: String,
    },

    /// A timeout was claimed while the side on turn still has time.
    #[error("deadline {deadline} for game {game_id} not yet exceeded (now {now})")]
    DeadlineNotReached {
        /// The game handle.
        game_id: String,
        /// The pending deadline.
        deadline: String,
        /// Time of the rejected claim.
        now: String,
    },

    /// Doubling the required stake or summing the pot overflowed.
    #[error("stake arithmetic overflow in game {game_id}")]
    StakeOverflow {
        /// The game handle.
        game_id: String,
    },

    /// Pulling stake or paying out was rejected by the ledger.
    #[error("transfer failed: {0}")]
    Transfer(#[from] LedgerError),

    /// Deadline arithmetic left the representable time range.
    #[error(transparent)]
    Core(#[from] CoreError),
}
