//! # Resolver and Engine Errors
//!
//! Two layers. [`ResolverError`] covers the factory and the request
//! lifecycle. [`EngineError`] is what the engine facade returns: any lower
//! error, plus configuration problems.
//!
//! Lookups of requests, games and vaults that do not exist are reported
//! with dedicated `*NotFound` variants so callers can tell "no such thing"
//! apart from "not allowed right now".

use thiserror::Error;

use wdg_core::{Amount, CoreError, LedgerError};
use wdg_escrow::VaultError;
use wdg_state::GameError;

/// Errors arising from the factory and the resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// No request with this id was ever pushed.
    #[error("withdraw request {request} not found")]
    RequestNotFound {
        /// Request id.
        request: String,
    },

    /// No game with this handle exists.
    #[error("game {game} not found")]
    GameNotFound {
        /// Game handle.
        game: String,
    },

    /// No vault with this handle exists.
    #[error("vault {vault} not found")]
    VaultNotFound {
        /// Vault handle.
        vault: String,
    },

    /// The request exists but no dispute game was ever opened for it.
    #[error("withdraw request {request} has no dispute game")]
    NoLinkedGame {
        /// Request id.
        request: String,
    },

    /// Only the bound withdrawal facade may push requests.
    #[error("{caller} is not the withdrawal facade")]
    UnauthorizedFacade {
        /// The rejected caller.
        caller: String,
    },

    /// Withdraw requests must name a non-null requester.
    #[error("withdraw request requires a non-null requester")]
    NullRequester,

    /// Withdraw requests must carry a positive amount.
    #[error("withdraw request amount must be positive")]
    ZeroAmount,

    /// The request has already been disputed.
    #[error("withdraw request {request} is already disputed")]
    AlreadyDisputed {
        /// Request id.
        request: String,
    },

    /// A game is already linked to the request.
    #[error("withdraw request {request} is already linked to {game}")]
    GameAlreadyLinked {
        /// Request id.
        request: String,
        /// Linked game.
        game: String,
    },

    /// The dispute window has closed; the request is presumptively valid.
    #[error("dispute window for request {request} closed at {deadline} (now {now})")]
    ValidationWindowClosed {
        /// Request id.
        request: String,
        /// Last instant a dispute was accepted (ISO 8601).
        deadline: String,
        /// Time of the attempt (ISO 8601).
        now: String,
    },

    /// The linked game has not finished.
    #[error("game {game} for request {request} is still active")]
    GameStillActive {
        /// Request id.
        request: String,
        /// Linked game.
        game: String,
    },

    /// The freshly created game does not use the dispute stake as its unit.
    #[error("dispute stake {dispute_stake} does not match game initial stake {initial_stake}")]
    StakeMismatch {
        /// Configured dispute stake.
        dispute_stake: Amount,
        /// Initial stake of the created game.
        initial_stake: Amount,
    },

    /// Seeding the attacker vault did not trigger the opening attack.
    #[error("opening attack did not fire in game {game}")]
    OpeningAttackMissing {
        /// The new game.
        game: String,
    },

    /// Factory or resolver parameters are unusable.
    #[error("invalid resolver configuration: {0}")]
    InvalidConfig(String),

    /// Handle or request counter exhausted.
    #[error("{what} counter exhausted")]
    CounterExhausted {
        /// Which counter.
        what: &'static str,
    },

    /// Ledger rejection.
    #[error("transfer failed: {0}")]
    Ledger(#[from] LedgerError),

    /// Game rejection.
    #[error("game error: {0}")]
    Game(#[from] GameError),

    /// Vault rejection.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Time arithmetic failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ResolverError {
    /// Whether this error reports a missing request, game or vault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RequestNotFound { .. }
                | Self::GameNotFound { .. }
                | Self::VaultNotFound { .. }
                | Self::NoLinkedGame { .. }
        )
    }
}

/// Errors returned by [`crate::DisputeEngine`] entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine configuration rejected.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// Factory or resolver rejection.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Direct game call rejected.
    #[error("game error: {0}")]
    Game(#[from] GameError),

    /// Vault call rejected.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Direct ledger call rejected.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A ledger call tried to spend from an account the engine owns.
    #[error("{operation} from {account} rejected: engine-owned accounts move only through their own game or vault")]
    EngineOwnedAccount {
        /// The rejected operation.
        operation: &'static str,
        /// The engine-owned account.
        account: String,
    },

    /// A vault was asked to move but cannot.
    #[error("{vault} cannot move in {game}: state {state}, turn {turn}, balance {balance}, required {required}")]
    VaultIdle {
        /// The vault.
        vault: String,
        /// Its game.
        game: String,
        /// Game state.
        state: String,
        /// Side on turn.
        turn: String,
        /// Uncommitted vault balance.
        balance: Amount,
        /// Stake the side on turn must commit.
        required: Amount,
    },

    /// Time arithmetic failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Whether this error reports a missing request, game or vault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Resolver(e) if e.is_not_found())
    }
}
