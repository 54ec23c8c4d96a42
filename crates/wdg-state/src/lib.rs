//! # wdg-state — Dispute Game State Machine
//!
//! A dispute game is a two-party war of attrition over a withdrawal. The
//! attacker challenges, the defender answers, and every defence doubles the
//! stake the next round costs. Whoever fails to move before the re-armed
//! deadline forfeits everything both sides have put in.
//!
//! ## States
//!
//! ```text
//! ACTIVE ──claim_timeout() on attacker's turn──▶ DEFENDER_WON
//!    │
//!    └────claim_timeout() on defender's turn──▶ ATTACKER_WON
//! ```
//!
//! Both outcomes are terminal. Every mutating entry point on a terminal
//! game is rejected with [`GameError::NotActive`].
//!
//! ## Stake Schedule
//!
//! With initial stake `S`, after `n` completed moves the required stake is
//! `S * 2^(n / 2)`: an attack leaves it unchanged, a defence doubles it.

pub mod error;
pub mod game;

pub use error::GameError;
pub use game::{
    DisputeGame, GameInfo, GameParams, GameState, MoveOutcome, Side, TimeoutOutcome,
};
