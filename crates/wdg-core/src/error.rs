//! # Error Types
//!
//! Errors shared by every crate in the workspace. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Validation errors name the offending input.
//! - Ledger errors carry the asset, account, and the amounts involved, so a
//!   rejected transfer can be diagnosed from the message alone.

use thiserror::Error;

/// Validation failure on a core primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Asset symbol failed validation.
    #[error("invalid asset symbol {0:?}: expected 1-16 uppercase ASCII letters, digits, '-' or '_'")]
    InvalidAsset(String),

    /// Timestamp could not be parsed or constructed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Adding a duration to a timestamp left the representable range.
    #[error("timestamp overflow adding {secs}s to {base}")]
    TimestampOverflow {
        /// The base timestamp (ISO8601).
        base: String,
        /// Seconds that were added.
        secs: u64,
    },
}

/// Rejected value transfer on the hosting ledger.
///
/// A ledger operation that returns one of these has changed nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The null identity cannot hold, send, or receive value.
    #[error("{operation} involves the null account")]
    ZeroAccount {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Sender balance is below the transfer amount.
    #[error("insufficient {asset} balance for {account}: has {available}, needs {required}")]
    InsufficientBalance {
        /// Asset symbol.
        asset: String,
        /// Debited account.
        account: String,
        /// Current balance.
        available: u64,
        /// Requested amount.
        required: u64,
    },

    /// Spender allowance is below the transfer amount.
    #[error("insufficient {asset} allowance from {owner} to {spender}: has {available}, needs {required}")]
    InsufficientAllowance {
        /// Asset symbol.
        asset: String,
        /// Owner of the funds.
        owner: String,
        /// Account spending on the owner's behalf.
        spender: String,
        /// Current allowance.
        available: u64,
        /// Requested amount.
        required: u64,
    },

    /// Crediting the recipient would overflow its balance.
    #[error("{asset} balance overflow for {account}")]
    Overflow {
        /// Asset symbol.
        asset: String,
        /// Credited account.
        account: String,
    },
}
