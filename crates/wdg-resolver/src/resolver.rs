//! # Withdrawal Resolver
//!
//! Binds withdrawal requests raised by the withdrawal facade to dispute
//! games, and turns a finished game into a validity flag the facade reads.
//!
//! ## Request Lifecycle
//!
//! ```text
//! CREATED ──(window elapses, never disputed)──▶ IMPLICITLY_VALID
//!    │
//!    └──dispute()──▶ DISPUTED ──resolve() on terminal game──▶ RESOLVED_VALID
//!                                                        └──▶ RESOLVED_INVALID
//! ```
//!
//! An undisputed request is optimistically valid once `now` is strictly
//! after `timestamp + validation_timeout`. A disputed request is valid
//! exactly when the defender won.
//!
//! ## Resolution
//!
//! `resolve` is idempotent. The first call after the game ends stores the
//! verdict and the resolution time; every later call returns the stored
//! resolution without re-deriving it.
//!
//! ## Atomicity
//!
//! `dispute` touches the factory, the ledger and a vault in sequence. On
//! its own it only guarantees that precondition failures change nothing;
//! run it inside [`crate::DisputeEngine`] for all-or-nothing semantics
//! across every step.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, Amount, AssetId, GameId, Ledger, RequestId, Timestamp};
use wdg_escrow::EntryReceipt;
use wdg_state::GameState;

use crate::error::ResolverError;
use crate::factory::{GameFactory, GameInstance};

/// Share class label of attacker vaults.
pub const ATTACKER_SHARE_CLASS: &str = "wdgA";
/// Share class label of defender vaults.
pub const DEFENDER_SHARE_CLASS: &str = "wdgD";

// ── Records ────────────────────────────────────────────────────────────

/// A withdrawal awaiting a validity decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    /// Request id.
    pub id: RequestId,
    /// Identity withdrawing.
    pub requester: AccountId,
    /// Amount being withdrawn.
    pub amount: Amount,
    /// When the request was pushed.
    pub timestamp: Timestamp,
    /// Whether a dispute was opened.
    pub disputed: bool,
    /// Stored verdict of a resolved dispute.
    pub valid: bool,
    /// When the dispute was resolved.
    pub resolved_at: Option<Timestamp>,
}

impl WithdrawRequest {
    /// Where the request sits in its lifecycle at `now`.
    pub fn status(&self, validation_timeout_secs: u64, now: Timestamp) -> RequestStatus {
        match (self.disputed, self.resolved_at) {
            (true, Some(_)) if self.valid => RequestStatus::ResolvedValid,
            (true, Some(_)) => RequestStatus::ResolvedInvalid,
            (true, None) => RequestStatus::Disputed,
            (false, _) => match self.timestamp.checked_add_secs(validation_timeout_secs) {
                Ok(deadline) if now > deadline => RequestStatus::ImplicitlyValid,
                _ => RequestStatus::Created,
            },
        }
    }
}

/// Lifecycle position of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Pushed; dispute window open.
    Created,
    /// Window elapsed without a dispute.
    ImplicitlyValid,
    /// Dispute game running or finished but not yet resolved.
    Disputed,
    /// Defender won.
    ResolvedValid,
    /// Attacker won.
    ResolvedInvalid,
}

impl RequestStatus {
    /// Whether the validity of the request can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ImplicitlyValid | Self::ResolvedValid | Self::ResolvedInvalid
        )
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::ImplicitlyValid => "IMPLICITLY_VALID",
            Self::Disputed => "DISPUTED",
            Self::ResolvedValid => "RESOLVED_VALID",
            Self::ResolvedInvalid => "RESOLVED_INVALID",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of opening a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeOpened {
    /// The disputed request.
    pub request: RequestId,
    /// Identity that opened the dispute.
    pub disputer: AccountId,
    /// The new game and vaults.
    pub instance: GameInstance,
    /// Stake seeded into the attacker vault.
    pub stake: Amount,
    /// The seeding deposit, including the opening attack.
    pub entry: EntryReceipt,
}

/// Result of resolving a disputed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The request.
    pub request: RequestId,
    /// The linked game.
    pub game: GameId,
    /// The game's terminal state.
    pub verdict: GameState,
    /// Resulting validity of the request.
    pub valid: bool,
    /// When the resolution was first recorded.
    pub resolved_at: Timestamp,
    /// Whether this call recorded it.
    pub newly_resolved: bool,
}

/// Game linked to a request, as seen by an outside observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeGameLookup {
    /// Whether a game is linked.
    pub exists: bool,
    /// The linked game.
    pub game_id: Option<GameId>,
    /// Its custody account.
    pub game_account: Option<AccountId>,
    /// Its current state.
    pub state: Option<GameState>,
}

impl DisputeGameLookup {
    fn absent() -> Self {
        Self {
            exists: false,
            game_id: None,
            game_account: None,
            state: None,
        }
    }
}

/// Construction parameters of a resolver.
#[derive(Debug, Clone)]
pub struct ResolverParams {
    /// The resolver's own ledger account.
    pub account: AccountId,
    /// The only identity allowed to push requests.
    pub facade: AccountId,
    /// Stake asset of every dispute.
    pub asset: AssetId,
    /// Stake required to open a dispute. Also the initial stake of every game.
    pub dispute_stake: Amount,
    /// Seconds after a request during which it can be disputed.
    pub validation_timeout_secs: u64,
}

// ── Resolver ───────────────────────────────────────────────────────────

/// Request registry and request↔game linkage.
#[derive(Debug, Clone)]
pub struct Resolver {
    account: AccountId,
    facade: AccountId,
    asset: AssetId,
    dispute_stake: Amount,
    validation_timeout_secs: u64,
    next_request: u64,
    requests: BTreeMap<RequestId, WithdrawRequest>,
    request_to_game: HashMap<RequestId, GameId>,
    game_to_request: HashMap<GameId, RequestId>,
}

impl Resolver {
    /// A resolver with no requests.
    pub fn new(params: ResolverParams) -> Result<Self, ResolverError> {
        if params.account.is_nil() || params.facade.is_nil() {
            return Err(ResolverError::InvalidConfig(
                "resolver and facade accounts must be non-null".to_string(),
            ));
        }
        if params.account == params.facade {
            return Err(ResolverError::InvalidConfig(
                "resolver account cannot be the facade".to_string(),
            ));
        }
        if params.dispute_stake == 0 {
            return Err(ResolverError::InvalidConfig(
                "dispute stake must be positive".to_string(),
            ));
        }
        Ok(Self {
            account: params.account,
            facade: params.facade,
            asset: params.asset,
            dispute_stake: params.dispute_stake,
            validation_timeout_secs: params.validation_timeout_secs,
            next_request: 0,
            requests: BTreeMap::new(),
            request_to_game: HashMap::new(),
            game_to_request: HashMap::new(),
        })
    }

    /// Record a new withdrawal request. Facade only.
    pub fn push_withdraw_request(
        &mut self,
        caller: &AccountId,
        requester: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<RequestId, ResolverError> {
        if *caller != self.facade {
            return Err(ResolverError::UnauthorizedFacade {
                caller: caller.to_string(),
            });
        }
        if requester.is_nil() {
            return Err(ResolverError::NullRequester);
        }
        if amount == 0 {
            return Err(ResolverError::ZeroAmount);
        }
        let id = RequestId(self.next_request);
        self.next_request = self
            .next_request
            .checked_add(1)
            .ok_or(ResolverError::CounterExhausted { what: "request" })?;
        self.requests.insert(
            id,
            WithdrawRequest {
                id,
                requester: *requester,
                amount,
                timestamp: now,
                disputed: false,
                valid: false,
                resolved_at: None,
            },
        );
        Ok(id)
    }

    /// Whether `requester` may complete withdrawal `id` at `now`.
    ///
    /// Never fails: unknown ids and requester mismatches are simply invalid.
    pub fn validate_withdraw(&self, requester: &AccountId, id: RequestId, now: Timestamp) -> bool {
        let Some(request) = self.requests.get(&id) else {
            return false;
        };
        if request.requester != *requester {
            return false;
        }
        if request.disputed {
            return request.valid;
        }
        match request.timestamp.checked_add_secs(self.validation_timeout_secs) {
            Ok(deadline) => now > deadline,
            Err(_) => false,
        }
    }

    /// Open a dispute game against request `id`, staking `dispute_stake`
    /// from `caller`.
    ///
    /// `caller` must have approved the resolver account for the stake. The
    /// stake lands in the new attacker vault with `caller` as beneficiary,
    /// which fires the opening attack.
    pub fn dispute(
        &mut self,
        caller: &AccountId,
        id: RequestId,
        factory: &mut GameFactory,
        ledger: &mut Ledger,
        now: Timestamp,
    ) -> Result<DisputeOpened, ResolverError> {
        let request = self.request(id)?;
        if request.disputed {
            return Err(ResolverError::AlreadyDisputed {
                request: id.to_string(),
            });
        }
        if let Some(game) = self.request_to_game.get(&id) {
            return Err(ResolverError::GameAlreadyLinked {
                request: id.to_string(),
                game: game.to_string(),
            });
        }
        let deadline = request.timestamp.checked_add_secs(self.validation_timeout_secs)?;
        if now > deadline {
            return Err(ResolverError::ValidationWindowClosed {
                request: id.to_string(),
                deadline: deadline.to_string(),
                now: now.to_string(),
            });
        }

        let stake = self.dispute_stake;
        ledger.transfer_from(&self.asset, &self.account, caller, &self.account, stake)?;

        let instance = factory.create_game_with_pools(
            self.asset.clone(),
            stake,
            ATTACKER_SHARE_CLASS,
            DEFENDER_SHARE_CLASS,
            now,
        )?;
        let initial_stake = factory.game(instance.game_id)?.initial_stake();
        if initial_stake != stake {
            return Err(ResolverError::StakeMismatch {
                dispute_stake: stake,
                initial_stake,
            });
        }

        ledger.approve(&self.asset, &self.account, &instance.attacker_vault_account, stake)?;
        let (vault, game) = factory.vault_with_game_mut(instance.attacker_vault)?;
        let entry = vault.deposit(&self.account, stake, caller, ledger, game, now)?;
        if entry.turn.is_none() {
            return Err(ResolverError::OpeningAttackMissing {
                game: instance.game_id.to_string(),
            });
        }

        self.request_to_game.insert(id, instance.game_id);
        self.game_to_request.insert(instance.game_id, id);
        if let Some(request) = self.requests.get_mut(&id) {
            request.disputed = true;
        }

        Ok(DisputeOpened {
            request: id,
            disputer: *caller,
            instance,
            stake,
            entry,
        })
    }

    /// Turn the linked game's verdict into request validity.
    pub fn resolve(
        &mut self,
        id: RequestId,
        factory: &GameFactory,
        now: Timestamp,
    ) -> Result<Resolution, ResolverError> {
        let game_id = self.linked_game(id)?;
        let request = self.request(id)?;
        let verdict = factory.game(game_id)?.state();

        if let Some(resolved_at) = request.resolved_at {
            return Ok(Resolution {
                request: id,
                game: game_id,
                verdict,
                valid: request.valid,
                resolved_at,
                newly_resolved: false,
            });
        }
        if !verdict.is_terminal() {
            return Err(ResolverError::GameStillActive {
                request: id.to_string(),
                game: game_id.to_string(),
            });
        }

        let valid = verdict != GameState::AttackerWon;
        if let Some(request) = self.requests.get_mut(&id) {
            request.valid = valid;
            request.resolved_at = Some(now);
        }
        Ok(Resolution {
            request: id,
            game: game_id,
            verdict,
            valid,
            resolved_at: now,
            newly_resolved: true,
        })
    }

    /// The game linked to request `id`, if any.
    pub fn get_dispute_game(&self, id: RequestId, factory: &GameFactory) -> DisputeGameLookup {
        let Some(game_id) = self.request_to_game.get(&id) else {
            return DisputeGameLookup::absent();
        };
        match factory.game(*game_id) {
            Ok(game) => DisputeGameLookup {
                exists: true,
                game_id: Some(*game_id),
                game_account: Some(game.account()),
                state: Some(game.state()),
            },
            Err(_) => DisputeGameLookup::absent(),
        }
    }

    // ── Observers ──────────────────────────────────────────────────────

    /// Look up a request.
    pub fn request(&self, id: RequestId) -> Result<&WithdrawRequest, ResolverError> {
        self.requests
            .get(&id)
            .ok_or_else(|| ResolverError::RequestNotFound {
                request: id.to_string(),
            })
    }

    /// Every request, by id.
    pub fn requests(&self) -> impl Iterator<Item = &WithdrawRequest> {
        self.requests.values()
    }

    /// Lifecycle position of request `id` at `now`.
    pub fn request_status(
        &self,
        id: RequestId,
        now: Timestamp,
    ) -> Result<RequestStatus, ResolverError> {
        Ok(self.request(id)?.status(self.validation_timeout_secs, now))
    }

    /// Game linked to request `id`.
    pub fn linked_game(&self, id: RequestId) -> Result<GameId, ResolverError> {
        self.request(id)?;
        self.request_to_game
            .get(&id)
            .copied()
            .ok_or_else(|| ResolverError::NoLinkedGame {
                request: id.to_string(),
            })
    }

    /// Request that game `game` was opened for.
    pub fn request_for_game(&self, game: GameId) -> Option<RequestId> {
        self.game_to_request.get(&game).copied()
    }

    /// The resolver's ledger account.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// The withdrawal facade identity.
    pub fn facade(&self) -> AccountId {
        self.facade
    }

    /// Stake asset.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Stake required to open a dispute.
    pub fn dispute_stake(&self) -> Amount {
        self.dispute_stake
    }

    /// Seconds a request stays disputable.
    pub fn validation_timeout_secs(&self) -> u64 {
        self.validation_timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdg_state::Side;

    const WINDOW: u64 = 86_400;
    const EXTENSION: u64 = 3_600;

    struct Setup {
        resolver: Resolver,
        factory: GameFactory,
        ledger: Ledger,
        facade: AccountId,
        requester: AccountId,
        start: Timestamp,
    }

    fn weth() -> AssetId {
        AssetId::new("WETH").unwrap()
    }

    fn setup(dispute_stake: Amount) -> Setup {
        let facade = AccountId::derive("facade", 0);
        let resolver = Resolver::new(ResolverParams {
            account: AccountId::derive("resolver", 0),
            facade,
            asset: weth(),
            dispute_stake,
            validation_timeout_secs: WINDOW,
        })
        .unwrap();
        Setup {
            resolver,
            factory: GameFactory::new(EXTENSION).unwrap(),
            ledger: Ledger::new(),
            facade,
            requester: AccountId::new(),
            start: Timestamp::parse("2026-03-01T00:00:00Z").unwrap(),
        }
    }

    fn at(s: &Setup, secs: u64) -> Timestamp {
        s.start.checked_add_secs(secs).unwrap()
    }

    fn challenger(s: &mut Setup, funds: Amount) -> AccountId {
        let who = AccountId::new();
        s.ledger.credit(&weth(), &who, funds).unwrap();
        s.ledger
            .approve(&weth(), &who, &s.resolver.account(), funds)
            .unwrap();
        who
    }

    fn push(s: &mut Setup) -> RequestId {
        let (facade, requester, start) = (s.facade, s.requester, s.start);
        s.resolver
            .push_withdraw_request(&facade, &requester, 10, start)
            .unwrap()
    }

    #[test]
    fn construction_rejects_bad_params() {
        let base = ResolverParams {
            account: AccountId::derive("resolver", 0),
            facade: AccountId::derive("facade", 0),
            asset: weth(),
            dispute_stake: 1,
            validation_timeout_secs: WINDOW,
        };
        let mut zero = base.clone();
        zero.dispute_stake = 0;
        assert!(Resolver::new(zero).is_err());
        let mut same = base.clone();
        same.facade = same.account;
        assert!(Resolver::new(same).is_err());
        let mut nil = base;
        nil.facade = AccountId::nil();
        assert!(Resolver::new(nil).is_err());
    }

    #[test]
    fn only_facade_pushes() {
        let mut s = setup(1);
        let (requester, start) = (s.requester, s.start);
        assert!(matches!(
            s.resolver.push_withdraw_request(&requester, &requester, 10, start),
            Err(ResolverError::UnauthorizedFacade { .. })
        ));
        let facade = s.facade;
        assert_eq!(
            s.resolver.push_withdraw_request(&facade, &requester, 0, start),
            Err(ResolverError::ZeroAmount)
        );
        assert_eq!(
            s.resolver.push_withdraw_request(&facade, &AccountId::nil(), 1, start),
            Err(ResolverError::NullRequester)
        );
    }

    #[test]
    fn request_ids_are_sequential() {
        let mut s = setup(1);
        assert_eq!(push(&mut s), RequestId(0));
        assert_eq!(push(&mut s), RequestId(1));
        assert_eq!(s.resolver.requests().count(), 2);
    }

    #[test]
    fn undisputed_request_valid_strictly_after_window() {
        let mut s = setup(1);
        let id = push(&mut s);
        let r = s.requester;
        assert!(!s.resolver.validate_withdraw(&r, id, at(&s, WINDOW)));
        assert!(s.resolver.validate_withdraw(&r, id, at(&s, WINDOW + 1)));
        assert!(!s.resolver.validate_withdraw(&AccountId::new(), id, at(&s, WINDOW + 1)));
        assert!(!s.resolver.validate_withdraw(&r, RequestId(9), at(&s, WINDOW + 1)));
        assert_eq!(
            s.resolver.request_status(id, at(&s, WINDOW + 1)).unwrap(),
            RequestStatus::ImplicitlyValid
        );
    }

    #[test]
    fn dispute_opens_game_and_fires_attack() {
        let mut s = setup(1);
        let id = push(&mut s);
        let bob = challenger(&mut s, 1);
        let opened = s
            .resolver
            .dispute(&bob, id, &mut s.factory, &mut s.ledger, s.start)
            .unwrap();
        assert_eq!(opened.stake, 1);
        assert!(opened.entry.turn.is_some());
        assert_eq!(opened.entry.beneficiary, bob);
        let game = s.factory.game(opened.instance.game_id).unwrap();
        assert_eq!(game.turn(), Side::Defender);
        assert_eq!(game.required_stake(), 1);
        assert!(s.resolver.request(id).unwrap().disputed);
        assert_eq!(s.resolver.request_for_game(opened.instance.game_id), Some(id));
        let vault = s.factory.vault(opened.instance.attacker_vault).unwrap();
        assert_eq!(vault.shares_of(&bob), 1);
        assert_eq!(s.ledger.balance_of(&weth(), &s.resolver.account()), 0);

        let lookup = s.resolver.get_dispute_game(id, &s.factory);
        assert!(lookup.exists);
        assert_eq!(lookup.state, Some(GameState::Active));
    }

    #[test]
    fn second_dispute_rejected() {
        let mut s = setup(1);
        let id = push(&mut s);
        let bob = challenger(&mut s, 2);
        s.resolver
            .dispute(&bob, id, &mut s.factory, &mut s.ledger, s.start)
            .unwrap();
        assert!(matches!(
            s.resolver.dispute(&bob, id, &mut s.factory, &mut s.ledger, s.start),
            Err(ResolverError::AlreadyDisputed { .. })
        ));
        assert_eq!(s.factory.game_count(), 1);
    }

    #[test]
    fn dispute_after_window_rejected() {
        let mut s = setup(1);
        let id = push(&mut s);
        let bob = challenger(&mut s, 1);
        let late = at(&s, WINDOW + 1);
        assert!(matches!(
            s.resolver.dispute(&bob, id, &mut s.factory, &mut s.ledger, late),
            Err(ResolverError::ValidationWindowClosed { .. })
        ));
        let on_time = at(&s, WINDOW);
        assert!(s
            .resolver
            .dispute(&bob, id, &mut s.factory, &mut s.ledger, on_time)
            .is_ok());
    }

    #[test]
    fn unfunded_dispute_changes_nothing() {
        let mut s = setup(5);
        let id = push(&mut s);
        let bob = challenger(&mut s, 4);
        assert!(matches!(
            s.resolver.dispute(&bob, id, &mut s.factory, &mut s.ledger, s.start),
            Err(ResolverError::Ledger(_))
        ));
        assert_eq!(s.factory.game_count(), 0);
        assert!(!s.resolver.request(id).unwrap().disputed);
        assert_eq!(s.ledger.balance_of(&weth(), &bob), 4);
    }

    #[test]
    fn unknown_request_is_not_found() {
        let mut s = setup(1);
        let bob = challenger(&mut s, 1);
        let err = s
            .resolver
            .dispute(&bob, RequestId(3), &mut s.factory, &mut s.ledger, s.start)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(s.resolver.resolve(RequestId(3), &s.factory, s.start).unwrap_err().is_not_found());
        assert!(!s.resolver.get_dispute_game(RequestId(3), &s.factory).exists);
    }

    #[test]
    fn resolve_requires_terminal_game_and_is_idempotent() {
        let mut s = setup(1);
        let id = push(&mut s);
        assert!(matches!(
            s.resolver.resolve(id, &s.factory, s.start),
            Err(ResolverError::NoLinkedGame { .. })
        ));
        let bob = challenger(&mut s, 1);
        let opened = s
            .resolver
            .dispute(&bob, id, &mut s.factory, &mut s.ledger, s.start)
            .unwrap();
        assert!(matches!(
            s.resolver.resolve(id, &s.factory, s.start),
            Err(ResolverError::GameStillActive { .. })
        ));

        // Defender never funds: attacker wins.
        let late = at(&s, EXTENSION + 1);
        s.factory
            .game_mut(opened.instance.game_id)
            .unwrap()
            .claim_timeout(&bob, &mut s.ledger, late)
            .unwrap();
        let first = s.resolver.resolve(id, &s.factory, late).unwrap();
        assert!(first.newly_resolved);
        assert_eq!(first.verdict, GameState::AttackerWon);
        assert!(!first.valid);
        let again = s.resolver.resolve(id, &s.factory, at(&s, EXTENSION + 50)).unwrap();
        assert!(!again.newly_resolved);
        assert_eq!(again.resolved_at, late);
        assert!(!s.resolver.validate_withdraw(&s.requester, id, at(&s, WINDOW * 2)));
        assert_eq!(
            s.resolver.request_status(id, late).unwrap(),
            RequestStatus::ResolvedInvalid
        );
    }

    #[test]
    fn status_names() {
        assert_eq!(RequestStatus::ImplicitlyValid.as_str(), "IMPLICITLY_VALID");
        assert!(RequestStatus::ResolvedValid.is_terminal());
        assert!(!RequestStatus::Disputed.is_terminal());
    }
}
