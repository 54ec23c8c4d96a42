//! # wdg-resolver — Withdrawal Resolver and Dispute Engine
//!
//! Ties withdrawal requests to dispute games and puts the whole system
//! behind one atomic entry surface.
//!
//! - **Factory** ([`factory`]): creates a game and its two vaults per
//!   dispute and owns them in handle-indexed arenas.
//! - **Resolver** ([`resolver`]): the request registry. Opens disputes,
//!   enforces one game per request, and maps verdicts to validity.
//! - **Engine** ([`engine`]): ledger + factory + resolver + event log, with
//!   snapshot rollback around every call.
//! - **Config** ([`config`]): YAML-loadable deployment parameters.
//!
//! ## Dependency position
//!
//! ```text
//! wdg-core ◀── wdg-state ◀── wdg-escrow ◀── wdg-resolver ◀── wdg-cli
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod factory;
pub mod resolver;

pub use config::EngineConfig;
pub use engine::{DisputeEngine, SharedEngine};
pub use error::{EngineError, ResolverError};
pub use events::EngineEvent;
pub use factory::{GameFactory, GameInstance};
pub use resolver::{
    DisputeGameLookup, DisputeOpened, RequestStatus, Resolution, Resolver, ResolverParams,
    WithdrawRequest,
};
