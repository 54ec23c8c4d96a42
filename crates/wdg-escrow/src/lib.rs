//! # wdg-escrow — Pooled Escrow Vaults
//!
//! Lets many independent depositors co-fund one side of a dispute game.
//!
//! - **Shares** ([`shares`]): a generic proportional share book. Knows
//!   nothing about games; converts between assets and shares against a
//!   total-assets figure supplied by its owner.
//!
//! - **Vault** ([`vault`]): the dispute-aware controller wrapping a share
//!   book. Pulls deposits, pays exits, and after every balance change tries
//!   to play its side's turn with exactly the stake the game requires.
//!
//! The split is composition, not inheritance: the vault calls an explicit
//! turn hook after each entry or exit, and a failed hook never undoes the
//! deposit or withdrawal that triggered it.

pub mod error;
pub mod shares;
pub mod vault;

pub use error::VaultError;
pub use shares::{Rounding, ShareError, ShareLedger};
pub use vault::{
    EntryReceipt, EscrowVault, ExitReceipt, TurnPlayed, VaultGameStatus, VaultInfo, VaultParams,
};
