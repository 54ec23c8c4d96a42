//! # Vault Errors
//!
//! A vault entry point that returns one of these has changed neither the
//! share book nor the ledger.

use thiserror::Error;

use wdg_core::{Amount, LedgerError};
use wdg_state::GameError;

use crate::shares::ShareError;

/// Errors arising from escrow vault operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Construction parameters are inconsistent with each other or the game.
    #[error("invalid vault configuration: {0}")]
    InvalidConfig(String),

    /// The game handed in is not the game this vault is bound to.
    #[error("vault {vault} is bound to {expected}, got {actual}")]
    GameMismatch {
        /// The vault.
        vault: String,
        /// Bound game.
        expected: String,
        /// Game supplied by the caller.
        actual: String,
    },

    /// Zero-sized deposits and exits are rejected.
    #[error("{operation} of zero on vault {vault}")]
    ZeroAmount {
        /// The vault.
        vault: String,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The deposit is too small to be worth a single share.
    #[error("deposit of {assets} into vault {vault} is worth zero shares")]
    ZeroShares {
        /// The vault.
        vault: String,
        /// Deposited assets.
        assets: Amount,
    },

    /// Shares cannot be issued to the null identity.
    #[error("vault {vault} cannot issue shares to the null account")]
    NullBeneficiary {
        /// The vault.
        vault: String,
    },

    /// The exit needs more than the uncommitted balance. Committed stake
    /// only becomes withdrawable once the game returns it.
    #[error("vault {vault} has {available} uncommitted, exit needs {requested}")]
    InsufficientLiquidity {
        /// The vault.
        vault: String,
        /// Uncommitted balance.
        available: Amount,
        /// Assets requested.
        requested: Amount,
    },

    /// Share-book rejection.
    #[error("vault {vault}: {source}")]
    Shares {
        /// The vault.
        vault: String,
        /// Underlying share error.
        #[source]
        source: ShareError,
    },

    /// Cumulative staked counter overflowed.
    #[error("staked total overflow in vault {vault}")]
    Overflow {
        /// The vault.
        vault: String,
    },

    /// The ledger rejected a transfer or approval.
    #[error("transfer failed: {0}")]
    Ledger(#[from] LedgerError),

    /// The game rejected the vault's move.
    #[error("game rejected move: {0}")]
    Game(#[from] GameError),
}
