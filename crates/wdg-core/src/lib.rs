//! # wdg-core — Foundational Types for the Withdrawal Dispute Game
//!
//! This crate is the bedrock of the dispute-game workspace. It defines the
//! identity, time, and value-transfer primitives every other crate builds on.
//! Every other crate in the workspace depends on `wdg-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identities.** `AccountId`, `GameId`, `VaultId`,
//!    `RequestId`, `AssetId`. You cannot pass a game handle where a request
//!    id is expected.
//!
//! 2. **One null identity.** `AccountId::nil()` is the only "zero address".
//!    Constructors that take parties reject it explicitly.
//!
//! 3. **All-or-nothing transfers.** [`Ledger`] checks balance and allowance
//!    before it mutates anything. A failed transfer leaves the ledger
//!    untouched.
//!
//! 4. **Time is injected.** Components receive `now: Timestamp`; only the
//!    engine reads a [`Clock`]. Deadlines are compared, never scheduled.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `wdg-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod asset;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod temporal;

pub use asset::{Amount, AssetId};
pub use error::{CoreError, LedgerError};
pub use identity::{AccountId, GameId, RequestId, VaultId};
pub use ledger::Ledger;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
