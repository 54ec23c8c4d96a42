//! # Dispute Engine
//!
//! The single entry surface of the system. Owns the ledger, the factory
//! arenas, the resolver and the event log, and exposes every operation of
//! games, vaults and the resolver by handle.
//!
//! ## Atomicity
//!
//! Every mutating entry point reads the clock once, checkpoints the parts of
//! the state it may change, runs, and restores the checkpoint if anything
//! failed. A checkpoint holds the ledger (when the call moves value), the
//! one game or vault-and-game the call addresses (or the arena lengths when
//! it can only create instances), and the event count. Resolver methods
//! mutate only after their last fallible step, so the request registry
//! needs no copy. Nested steps (resolver → factory → vault → game → ledger)
//! therefore either all take effect or none do, and events recorded by a
//! failed call vanish with it.
//!
//! ## Engine-owned accounts
//!
//! Game custody, vault, factory and resolver accounts hold pooled or
//! escrowed value. The ledger entry points refuse to spend from them, and
//! a game move is only accepted from the side's own vault, played through
//! the vault so its stake accounting follows.
//!
//! ## Sharing
//!
//! [`SharedEngine`] wraps an engine in a `parking_lot::Mutex` so racing
//! callers are serialized. Each call observes the state left by the one
//! before it; of two racing timeout claims exactly one succeeds.

use std::sync::Arc;

use parking_lot::Mutex;

use wdg_core::{
    AccountId, Amount, AssetId, Clock, GameId, Ledger, RequestId, SystemClock, Timestamp,
    VaultId,
};
use wdg_escrow::{EntryReceipt, ExitReceipt, TurnPlayed, VaultGameStatus, VaultInfo};
use wdg_state::{GameError, GameInfo, Side, TimeoutOutcome};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::factory::{FactoryCheckpoint, GameFactory};
use crate::resolver::{
    DisputeGameLookup, DisputeOpened, RequestStatus, Resolution, Resolver, ResolverParams,
    WithdrawRequest,
};

/// Mutable state behind the engine.
#[derive(Debug)]
struct EngineState {
    ledger: Ledger,
    factory: GameFactory,
    resolver: Resolver,
    events: Vec<EngineEvent>,
}

/// What one call may change besides the event log.
#[derive(Debug, Clone, Copy)]
enum Touches {
    /// Ledger balances and allowances.
    Ledger,
    /// The request registry.
    Requests,
    /// The ledger, the registry, and instances appended to the factory.
    NewGame,
    /// The ledger and one game.
    Game(GameId),
    /// The ledger, one vault and the game it plays.
    Vault(VaultId),
}

#[derive(Debug)]
struct Checkpoint {
    ledger: Option<Ledger>,
    factory: FactoryCheckpoint,
    events: usize,
}

impl EngineState {
    fn checkpoint(&self, touches: Touches) -> Result<Checkpoint, EngineError> {
        let factory = match touches {
            Touches::Ledger | Touches::Requests | Touches::NewGame => {
                self.factory.checkpoint_append()
            }
            Touches::Game(id) => self.factory.checkpoint_game(id)?,
            Touches::Vault(id) => self.factory.checkpoint_vault(id)?,
        };
        let ledger = match touches {
            Touches::Requests => None,
            _ => Some(self.ledger.clone()),
        };
        Ok(Checkpoint {
            ledger,
            factory,
            events: self.events.len(),
        })
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        if let Some(ledger) = checkpoint.ledger {
            self.ledger = ledger;
        }
        self.factory.restore(checkpoint.factory);
        self.events.truncate(checkpoint.events);
    }

    fn ensure_spendable(&self, operation: &'static str, account: &AccountId) -> Result<(), EngineError> {
        if self.factory.is_engine_account(account) || *account == self.resolver.account() {
            return Err(EngineError::EngineOwnedAccount {
                operation,
                account: account.to_string(),
            });
        }
        Ok(())
    }
}

/// Ledger, games, vaults and resolver behind one atomic API.
#[derive(Debug)]
pub struct DisputeEngine<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,
    state: EngineState,
}

impl DisputeEngine<SystemClock> {
    /// An engine on wall-clock time.
    pub fn with_system_clock(config: EngineConfig, facade: AccountId) -> Result<Self, EngineError> {
        Self::new(config, facade, SystemClock)
    }
}

impl<C: Clock> DisputeEngine<C> {
    /// An engine with no requests, games or balances.
    ///
    /// `facade` is the only identity allowed to push withdraw requests.
    pub fn new(config: EngineConfig, facade: AccountId, clock: C) -> Result<Self, EngineError> {
        config.validate()?;
        let factory = GameFactory::new(config.timeout_extension_secs)?;
        let resolver = Resolver::new(ResolverParams {
            account: AccountId::derive("resolver", 0),
            facade,
            asset: config.asset.clone(),
            dispute_stake: config.dispute_stake,
            validation_timeout_secs: config.validation_timeout_secs,
        })?;
        tracing::info!(
            asset = %config.asset,
            dispute_stake = config.dispute_stake,
            validation_timeout_secs = config.validation_timeout_secs,
            timeout_extension_secs = config.timeout_extension_secs,
            "dispute engine started"
        );
        Ok(Self {
            config,
            clock,
            state: EngineState {
                ledger: Ledger::new(),
                factory,
                resolver,
                events: Vec::new(),
            },
        })
    }

    fn atomic<T>(
        &mut self,
        operation: &'static str,
        touches: Touches,
        f: impl FnOnce(&mut EngineState, Timestamp) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let now = self.clock.now();
        let checkpoint = match self.state.checkpoint(touches) {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                tracing::warn!(operation, error = %err, "call rejected");
                return Err(err);
            }
        };
        match f(&mut self.state, now) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state.restore(checkpoint);
                tracing::warn!(operation, error = %err, "call rejected, state restored");
                Err(err)
            }
        }
    }

    // ── Ledger ─────────────────────────────────────────────────────────

    /// Issue `amount` of the stake asset to `account`. Returns the new balance.
    pub fn credit(&mut self, account: &AccountId, amount: Amount) -> Result<Amount, EngineError> {
        let asset = self.config.asset.clone();
        self.atomic("credit", Touches::Ledger, |s, _| {
            Ok(s.ledger.credit(&asset, account, amount)?)
        })
    }

    /// Set `spender`'s allowance over `owner`'s stake-asset balance.
    /// `owner` cannot be an engine-owned account.
    pub fn approve(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let asset = self.config.asset.clone();
        self.atomic("approve", Touches::Ledger, |s, _| {
            s.ensure_spendable("approve", owner)?;
            Ok(s.ledger.approve(&asset, owner, spender, amount)?)
        })
    }

    /// Move stake asset from `from` to `to`. `from` cannot be an
    /// engine-owned account; paying into one is a donation.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let asset = self.config.asset.clone();
        self.atomic("transfer", Touches::Ledger, |s, _| {
            s.ensure_spendable("transfer", from)?;
            Ok(s.ledger.transfer(&asset, from, to, amount)?)
        })
    }

    /// Stake-asset balance of `account`.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.ledger.balance_of(&self.config.asset, account)
    }

    /// Stake-asset allowance of `spender` over `owner`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state.ledger.allowance(&self.config.asset, owner, spender)
    }

    // ── Resolver ───────────────────────────────────────────────────────

    /// Register a withdrawal on behalf of the facade.
    pub fn push_withdraw_request(
        &mut self,
        caller: &AccountId,
        requester: &AccountId,
        amount: Amount,
    ) -> Result<RequestId, EngineError> {
        self.atomic("push_withdraw_request", Touches::Requests, |s, now| {
            let request = s
                .resolver
                .push_withdraw_request(caller, requester, amount, now)?;
            tracing::info!(%request, %requester, amount, "withdraw requested");
            s.events.push(EngineEvent::WithdrawRequested {
                at: now,
                request,
                requester: *requester,
                amount,
            });
            Ok(request)
        })
    }

    /// Whether `requester` may complete withdrawal `request` now.
    pub fn validate_withdraw(&self, requester: &AccountId, request: RequestId) -> bool {
        self.state
            .resolver
            .validate_withdraw(requester, request, self.clock.now())
    }

    /// Open a dispute against `request`, staking the dispute stake from
    /// `caller`. `caller` must have approved [`Self::resolver_account`].
    pub fn dispute(
        &mut self,
        caller: &AccountId,
        request: RequestId,
    ) -> Result<DisputeOpened, EngineError> {
        self.atomic("dispute", Touches::NewGame, |s, now| {
            let opened = s
                .resolver
                .dispute(caller, request, &mut s.factory, &mut s.ledger, now)?;
            let inst = opened.instance;
            tracing::info!(%request, game = %inst.game_id, disputer = %caller, stake = opened.stake, "dispute opened");
            s.events.push(EngineEvent::GameCreated {
                at: now,
                game: inst.game_id,
                game_account: inst.game_account,
                attacker_vault: inst.attacker_vault,
                defender_vault: inst.defender_vault,
                initial_stake: opened.stake,
            });
            s.events.push(EngineEvent::DisputeOpened {
                at: now,
                request,
                game: inst.game_id,
                disputer: *caller,
                stake: opened.stake,
            });
            record_entry(&mut s.events, &opened.entry, now);
            Ok(opened)
        })
    }

    /// Turn the linked game's verdict into request validity.
    pub fn resolve(&mut self, request: RequestId) -> Result<Resolution, EngineError> {
        self.atomic("resolve", Touches::Requests, |s, now| {
            let resolution = s.resolver.resolve(request, &s.factory, now)?;
            if resolution.newly_resolved {
                tracing::info!(%request, game = %resolution.game, verdict = %resolution.verdict, valid = resolution.valid, "request resolved");
                s.events.push(EngineEvent::Resolved {
                    at: now,
                    request,
                    game: resolution.game,
                    verdict: resolution.verdict,
                    valid: resolution.valid,
                });
            }
            Ok(resolution)
        })
    }

    /// The game linked to `request`, if any.
    pub fn get_dispute_game(&self, request: RequestId) -> DisputeGameLookup {
        self.state
            .resolver
            .get_dispute_game(request, &self.state.factory)
    }

    /// A withdraw request record.
    pub fn request(&self, request: RequestId) -> Result<WithdrawRequest, EngineError> {
        Ok(self.state.resolver.request(request)?.clone())
    }

    /// Every withdraw request, by id.
    pub fn requests(&self) -> Vec<WithdrawRequest> {
        self.state.resolver.requests().cloned().collect()
    }

    /// Lifecycle position of `request` now.
    pub fn request_status(&self, request: RequestId) -> Result<RequestStatus, EngineError> {
        Ok(self
            .state
            .resolver
            .request_status(request, self.clock.now())?)
    }

    // ── Vaults ─────────────────────────────────────────────────────────

    /// Deposit `assets` from `depositor` into `vault`, crediting shares to
    /// `beneficiary`. `depositor` must have approved the vault's account.
    pub fn deposit(
        &mut self,
        vault: VaultId,
        depositor: &AccountId,
        assets: Amount,
        beneficiary: &AccountId,
    ) -> Result<EntryReceipt, EngineError> {
        self.atomic("deposit", Touches::Vault(vault), |s, now| {
            let (v, game) = s.factory.vault_with_game_mut(vault)?;
            let entry = v.deposit(depositor, assets, beneficiary, &mut s.ledger, game, now)?;
            record_entry(&mut s.events, &entry, now);
            Ok(entry)
        })
    }

    /// Mint exactly `shares` of `vault` to `beneficiary`, paid by `depositor`.
    pub fn mint(
        &mut self,
        vault: VaultId,
        depositor: &AccountId,
        shares: Amount,
        beneficiary: &AccountId,
    ) -> Result<EntryReceipt, EngineError> {
        self.atomic("mint", Touches::Vault(vault), |s, now| {
            let (v, game) = s.factory.vault_with_game_mut(vault)?;
            let entry = v.mint(depositor, shares, beneficiary, &mut s.ledger, game, now)?;
            record_entry(&mut s.events, &entry, now);
            Ok(entry)
        })
    }

    /// Withdraw exactly `assets` of `owner`'s position to `receiver`.
    pub fn withdraw(
        &mut self,
        vault: VaultId,
        caller: &AccountId,
        assets: Amount,
        receiver: &AccountId,
        owner: &AccountId,
    ) -> Result<ExitReceipt, EngineError> {
        self.atomic("withdraw", Touches::Vault(vault), |s, now| {
            let (v, game) = s.factory.vault_with_game_mut(vault)?;
            let exit = v.withdraw(caller, assets, receiver, owner, &mut s.ledger, game, now)?;
            record_exit(&mut s.events, &exit, now);
            Ok(exit)
        })
    }

    /// Redeem exactly `shares` of `owner`'s position to `receiver`.
    pub fn redeem(
        &mut self,
        vault: VaultId,
        caller: &AccountId,
        shares: Amount,
        receiver: &AccountId,
        owner: &AccountId,
    ) -> Result<ExitReceipt, EngineError> {
        self.atomic("redeem", Touches::Vault(vault), |s, now| {
            let (v, game) = s.factory.vault_with_game_mut(vault)?;
            let exit = v.redeem(caller, shares, receiver, owner, &mut s.ledger, game, now)?;
            record_exit(&mut s.events, &exit, now);
            Ok(exit)
        })
    }

    /// Let `spender` exit on behalf of `owner` for up to `shares`.
    pub fn approve_shares(
        &mut self,
        vault: VaultId,
        owner: &AccountId,
        spender: &AccountId,
        shares: Amount,
    ) -> Result<(), EngineError> {
        self.atomic("approve_shares", Touches::Vault(vault), |s, _| {
            let (v, _) = s.factory.vault_with_game_mut(vault)?;
            v.approve_shares(owner, spender, shares);
            Ok(())
        })
    }

    /// Ask `vault` to play its turn if it can.
    pub fn play_turn(&mut self, vault: VaultId) -> Result<Option<TurnPlayed>, EngineError> {
        self.atomic("play_turn", Touches::Vault(vault), |s, now| {
            let (v, game) = s.factory.vault_with_game_mut(vault)?;
            let turn = v.play_turn(&mut s.ledger, game, now)?;
            if let Some(turn) = &turn {
                record_turn(&mut s.events, turn, now);
            }
            Ok(turn)
        })
    }

    // ── Games ──────────────────────────────────────────────────────────

    /// Attack in `game` as `caller`, which must be the attacker vault.
    pub fn attack(&mut self, game: GameId, caller: &AccountId) -> Result<TurnPlayed, EngineError> {
        self.move_as("attack", game, Side::Attacker, caller)
    }

    /// Defend in `game` as `caller`, which must be the defender vault.
    pub fn defend(&mut self, game: GameId, caller: &AccountId) -> Result<TurnPlayed, EngineError> {
        self.move_as("defend", game, Side::Defender, caller)
    }

    fn move_as(
        &mut self,
        operation: &'static str,
        game: GameId,
        side: Side,
        caller: &AccountId,
    ) -> Result<TurnPlayed, EngineError> {
        let vault = match self.state.factory.vault_for(game, side) {
            Ok(vault) => vault,
            Err(err) => {
                let err = EngineError::from(err);
                tracing::warn!(operation, error = %err, "call rejected");
                return Err(err);
            }
        };
        self.atomic(operation, Touches::Vault(vault), |s, now| {
            let (v, g) = s.factory.vault_with_game_mut(vault)?;
            if *caller != v.account() {
                return Err(GameError::UnauthorizedMover {
                    game_id: game.to_string(),
                    side: side.to_string(),
                    caller: caller.to_string(),
                }
                .into());
            }
            match v.play_turn(&mut s.ledger, g, now)? {
                Some(turn) => {
                    record_turn(&mut s.events, &turn, now);
                    Ok(turn)
                }
                None => {
                    let status = v.game_status(&s.ledger, g);
                    Err(EngineError::VaultIdle {
                        vault: vault.to_string(),
                        game: game.to_string(),
                        state: status.state.to_string(),
                        turn: g.turn().to_string(),
                        balance: status.balance,
                        required: status.required_stake,
                    })
                }
            }
        })
    }

    /// Settle `game` against the side that missed its deadline.
    pub fn claim_timeout(
        &mut self,
        game: GameId,
        caller: &AccountId,
    ) -> Result<TimeoutOutcome, EngineError> {
        self.atomic("claim_timeout", Touches::Game(game), |s, now| {
            let outcome = s
                .factory
                .game_mut(game)?
                .claim_timeout(caller, &mut s.ledger, now)?;
            tracing::info!(%game, verdict = %outcome.verdict, winner = %outcome.winner, payout = outcome.payout, "timeout claimed");
            s.events.push(EngineEvent::TimeoutClaimed {
                at: now,
                game,
                claimed_by: *caller,
                verdict: outcome.verdict,
                winner: outcome.winner,
                payout: outcome.payout,
            });
            Ok(outcome)
        })
    }

    // ── Observers ──────────────────────────────────────────────────────

    /// Full snapshot of a game.
    pub fn game_info(&self, game: GameId) -> Result<GameInfo, EngineError> {
        Ok(self.state.factory.game(game)?.info())
    }

    /// Stake the side on turn must commit in `game`.
    pub fn required_stake(&self, game: GameId) -> Result<Amount, EngineError> {
        Ok(self.state.factory.game(game)?.required_stake())
    }

    /// Attacker and defender vaults of `game`.
    pub fn pools_of(&self, game: GameId) -> Result<(VaultId, VaultId), EngineError> {
        Ok(self.state.factory.pools_of(game)?)
    }

    /// A vault's view of its game.
    pub fn vault_status(&self, vault: VaultId) -> Result<VaultGameStatus, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.game_status(&self.state.ledger, game))
    }

    /// Full snapshot of a vault.
    pub fn vault_info(&self, vault: VaultId) -> Result<VaultInfo, EngineError> {
        Ok(self.state.factory.vault(vault)?.info())
    }

    /// Shares of `vault` held by `owner`.
    pub fn shares_of(&self, vault: VaultId, owner: &AccountId) -> Result<Amount, EngineError> {
        Ok(self.state.factory.vault(vault)?.shares_of(owner))
    }

    /// Value backing `vault`'s shares.
    pub fn total_assets(&self, vault: VaultId) -> Result<Amount, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.total_assets(&self.state.ledger, game))
    }

    /// Assets `owner` could withdraw from `vault` right now.
    pub fn max_withdraw(&self, vault: VaultId, owner: &AccountId) -> Result<Amount, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.max_withdraw(owner, &self.state.ledger, game)?)
    }

    /// Shares `owner` could redeem from `vault` right now.
    pub fn max_redeem(&self, vault: VaultId, owner: &AccountId) -> Result<Amount, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.max_redeem(owner, &self.state.ledger, game)?)
    }

    /// Assets a redemption of `shares` from `vault` would pay now.
    pub fn preview_redeem(&self, vault: VaultId, shares: Amount) -> Result<Amount, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.preview_redeem(shares, &self.state.ledger, game)?)
    }

    /// Shares a deposit of `assets` into `vault` would issue now.
    pub fn preview_deposit(&self, vault: VaultId, assets: Amount) -> Result<Amount, EngineError> {
        let (v, game) = self.state.factory.vault_with_game(vault)?;
        Ok(v.preview_deposit(assets, &self.state.ledger, game)?)
    }

    /// Every transition so far, oldest first.
    pub fn events(&self) -> &[EngineEvent] {
        &self.state.events
    }

    /// The resolver's account; disputers approve it for the dispute stake.
    pub fn resolver_account(&self) -> AccountId {
        self.state.resolver.account()
    }

    /// The withdrawal facade identity.
    pub fn facade(&self) -> AccountId {
        self.state.resolver.facade()
    }

    /// Stake asset.
    pub fn asset(&self) -> &AssetId {
        &self.config.asset
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine's clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

fn record_entry(events: &mut Vec<EngineEvent>, entry: &EntryReceipt, now: Timestamp) {
    tracing::info!(vault = %entry.vault, depositor = %entry.depositor, assets = entry.assets, shares = entry.shares, "deposit");
    events.push(EngineEvent::Deposited {
        at: now,
        vault: entry.vault,
        depositor: entry.depositor,
        beneficiary: entry.beneficiary,
        assets: entry.assets,
        shares: entry.shares,
    });
    if let Some(turn) = &entry.turn {
        record_turn(events, turn, now);
    }
}

fn record_exit(events: &mut Vec<EngineEvent>, exit: &ExitReceipt, now: Timestamp) {
    tracing::info!(vault = %exit.vault, owner = %exit.owner, assets = exit.assets, shares = exit.shares, "withdrawal");
    events.push(EngineEvent::Withdrawn {
        at: now,
        vault: exit.vault,
        owner: exit.owner,
        receiver: exit.receiver,
        assets: exit.assets,
        shares: exit.shares,
    });
    if let Some(turn) = &exit.turn {
        record_turn(events, turn, now);
    }
}

fn record_turn(events: &mut Vec<EngineEvent>, turn: &TurnPlayed, now: Timestamp) {
    let o = &turn.outcome;
    tracing::info!(vault = %turn.vault, game = %o.game_id, side = %o.side, stake = o.stake, next_required_stake = o.next_required_stake, "turn played");
    events.push(EngineEvent::TurnPlayed {
        at: now,
        vault: turn.vault,
        game: o.game_id,
        side: o.side,
        stake: o.stake,
        next_required_stake: o.next_required_stake,
        deadline: o.deadline,
    });
}

// ── Shared handle ──────────────────────────────────────────────────────

/// Cloneable, thread-safe handle to one engine.
#[derive(Debug)]
pub struct SharedEngine<C: Clock = SystemClock> {
    inner: Arc<Mutex<DisputeEngine<C>>>,
}

impl<C: Clock> Clone for SharedEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> SharedEngine<C> {
    /// Share `engine`.
    pub fn new(engine: DisputeEngine<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut DisputeEngine<C>) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::GameInstance;
    use wdg_core::ManualClock;
    use wdg_state::GameState;

    fn engine() -> (DisputeEngine<ManualClock>, ManualClock, AccountId) {
        let clock = ManualClock::new(Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
        let facade = AccountId::derive("facade", 0);
        let engine = DisputeEngine::new(EngineConfig::default(), facade, clock.clone()).unwrap();
        (engine, clock, facade)
    }

    fn funded(engine: &mut DisputeEngine<ManualClock>, amount: Amount) -> AccountId {
        let who = AccountId::new();
        engine.credit(&who, amount).unwrap();
        who
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            dispute_stake: 0,
            ..EngineConfig::default()
        };
        let clock = ManualClock::new(Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
        assert!(matches!(
            DisputeEngine::new(config, AccountId::new(), clock),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn failed_dispute_restores_everything() {
        let (mut engine, _, facade) = engine();
        let requester = AccountId::new();
        let request = engine.push_withdraw_request(&facade, &requester, 10).unwrap();
        let bob = funded(&mut engine, 5);
        // No approval of the resolver: the stake pull fails.
        let events_before = engine.events().len();
        assert!(engine.dispute(&bob, request).is_err());
        assert_eq!(engine.events().len(), events_before);
        assert_eq!(engine.balance_of(&bob), 5);
        assert!(!engine.get_dispute_game(request).exists);
        assert!(!engine.request(request).unwrap().disputed);
    }

    #[test]
    fn dispute_records_events_in_order() {
        let (mut engine, _, facade) = engine();
        let request = engine
            .push_withdraw_request(&facade, &AccountId::new(), 10)
            .unwrap();
        let bob = funded(&mut engine, 1);
        let resolver = engine.resolver_account();
        engine.approve(&bob, &resolver, 1).unwrap();
        engine.dispute(&bob, request).unwrap();
        let kinds: Vec<_> = engine.events().iter().map(EngineEvent::kind).collect();
        assert_eq!(
            kinds,
            ["withdraw_requested", "game_created", "dispute_opened", "deposited", "turn_played"]
        );
    }

    #[test]
    fn unknown_handles_are_not_found() {
        let (mut engine, _, _) = engine();
        assert!(engine.game_info(GameId(0)).unwrap_err().is_not_found());
        assert!(engine.vault_status(VaultId(0)).unwrap_err().is_not_found());
        assert!(engine.play_turn(VaultId(3)).unwrap_err().is_not_found());
        assert!(engine.resolve(RequestId(0)).unwrap_err().is_not_found());
    }

    /// An engine with `stake` as dispute stake and one open dispute.
    fn disputed(stake: Amount) -> (DisputeEngine<ManualClock>, GameInstance) {
        let config = EngineConfig {
            dispute_stake: stake,
            ..EngineConfig::default()
        };
        let clock = ManualClock::new(Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
        let facade = AccountId::derive("facade", 0);
        let mut engine = DisputeEngine::new(config, facade, clock).unwrap();
        let request = engine
            .push_withdraw_request(&facade, &AccountId::new(), 10)
            .unwrap();
        let bob = funded(&mut engine, stake);
        let resolver = engine.resolver_account();
        engine.approve(&bob, &resolver, stake).unwrap();
        let instance = engine.dispute(&bob, request).unwrap().instance;
        (engine, instance)
    }

    fn deposit_into(
        engine: &mut DisputeEngine<ManualClock>,
        vault: VaultId,
        account: &AccountId,
        assets: Amount,
    ) -> (AccountId, EntryReceipt) {
        let who = funded(engine, assets);
        engine.approve(&who, account, assets).unwrap();
        let entry = engine.deposit(vault, &who, assets, &who).unwrap();
        (who, entry)
    }

    #[test]
    fn engine_owned_accounts_cannot_be_spent() {
        let (mut engine, inst) = disputed(4);
        let (alice, entry) =
            deposit_into(&mut engine, inst.defender_vault, &inst.defender_vault_account, 3);
        assert!(entry.turn.is_none());
        let mallory = AccountId::new();
        let vault_balance = engine.balance_of(&inst.defender_vault_account);
        let game_balance = engine.balance_of(&inst.game_account);
        let max_withdraw = engine.max_withdraw(inst.defender_vault, &alice).unwrap();
        let events = engine.events().len();

        for owned in [
            inst.defender_vault_account,
            inst.attacker_vault_account,
            inst.game_account,
            engine.resolver_account(),
            AccountId::derive("factory", 0),
        ] {
            assert!(matches!(
                engine.transfer(&owned, &mallory, 1),
                Err(EngineError::EngineOwnedAccount { operation: "transfer", .. })
            ));
            assert!(matches!(
                engine.approve(&owned, &mallory, 1),
                Err(EngineError::EngineOwnedAccount { operation: "approve", .. })
            ));
            assert_eq!(engine.allowance(&owned, &mallory), 0);
        }

        assert_eq!(engine.balance_of(&mallory), 0);
        assert_eq!(engine.balance_of(&inst.defender_vault_account), vault_balance);
        assert_eq!(engine.balance_of(&inst.game_account), game_balance);
        assert_eq!(engine.max_withdraw(inst.defender_vault, &alice).unwrap(), max_withdraw);
        assert_eq!(engine.events().len(), events);
    }

    #[test]
    fn paying_into_an_engine_account_is_a_donation() {
        let (mut engine, inst) = disputed(4);
        let donor = funded(&mut engine, 2);
        engine
            .transfer(&donor, &inst.defender_vault_account, 2)
            .unwrap();
        assert_eq!(engine.balance_of(&inst.defender_vault_account), 2);
        assert_eq!(engine.vault_status(inst.defender_vault).unwrap().balance, 2);
    }

    #[test]
    fn direct_move_by_stranger_rejected_without_side_effects() {
        let (mut engine, inst) = disputed(1);
        let bob = funded(&mut engine, 5);
        let before = engine.game_info(inst.game_id).unwrap();
        let events = engine.events().len();
        assert!(matches!(
            engine.defend(inst.game_id, &bob),
            Err(EngineError::Game(GameError::UnauthorizedMover { .. }))
        ));
        assert!(matches!(
            engine.attack(inst.game_id, &inst.defender_vault_account),
            Err(EngineError::Game(GameError::UnauthorizedMover { .. }))
        ));
        assert_eq!(engine.game_info(inst.game_id).unwrap(), before);
        assert_eq!(engine.events().len(), events);
        assert_eq!(engine.balance_of(&bob), 5);
    }

    #[test]
    fn direct_move_by_vault_account_goes_through_the_vault() {
        let (mut engine, inst) = disputed(4);
        let (alice, _) =
            deposit_into(&mut engine, inst.defender_vault, &inst.defender_vault_account, 3);

        // Short of the required stake: nothing moves.
        assert!(matches!(
            engine.defend(inst.game_id, &inst.defender_vault_account),
            Err(EngineError::VaultIdle { balance: 3, required: 4, .. })
        ));
        assert_eq!(engine.vault_info(inst.defender_vault).unwrap().total_staked, 0);

        let donor = funded(&mut engine, 1);
        engine
            .transfer(&donor, &inst.defender_vault_account, 1)
            .unwrap();
        let turn = engine
            .defend(inst.game_id, &inst.defender_vault_account)
            .unwrap();
        assert_eq!(turn.vault, inst.defender_vault);
        assert_eq!(turn.outcome.side, Side::Defender);
        assert_eq!(turn.outcome.stake, 4);
        assert_eq!(engine.vault_info(inst.defender_vault).unwrap().total_staked, 4);
        assert_eq!(engine.events().last().map(EngineEvent::kind), Some("turn_played"));

        // Stake stays priced into the vault; nobody can pull it out.
        assert_eq!(engine.total_assets(inst.defender_vault).unwrap(), 4);
        assert_eq!(engine.max_withdraw(inst.defender_vault, &alice).unwrap(), 0);

        // The attacker vault still accepts deposits and answers.
        let need = engine.required_stake(inst.game_id).unwrap();
        let (_, entry) =
            deposit_into(&mut engine, inst.attacker_vault, &inst.attacker_vault_account, need);
        assert!(entry.turn.is_some());
    }

    #[test]
    fn failed_vault_call_leaves_other_games_and_events_alone() {
        let (mut engine, first) = disputed(1);
        let facade = engine.facade();
        let request = engine
            .push_withdraw_request(&facade, &AccountId::new(), 7)
            .unwrap();
        let carol = funded(&mut engine, 1);
        let resolver = engine.resolver_account();
        engine.approve(&carol, &resolver, 1).unwrap();
        let second = engine.dispute(&carol, request).unwrap().instance;

        let first_game = engine.game_info(first.game_id).unwrap();
        let second_vault = engine.vault_info(second.defender_vault).unwrap();
        let events = engine.events().len();

        // No approval of the vault: the pull fails inside the deposit.
        let dave = funded(&mut engine, 3);
        assert!(engine.deposit(second.defender_vault, &dave, 3, &dave).is_err());

        assert_eq!(engine.game_info(first.game_id).unwrap(), first_game);
        assert_eq!(engine.vault_info(second.defender_vault).unwrap(), second_vault);
        assert_eq!(engine.events().len(), events);
        assert_eq!(engine.balance_of(&dave), 3);
    }

    #[test]
    fn racing_timeout_claims_settle_once() {
        let (mut engine, clock, facade) = engine();
        let request = engine
            .push_withdraw_request(&facade, &AccountId::new(), 10)
            .unwrap();
        let bob = funded(&mut engine, 1);
        let resolver = engine.resolver_account();
        engine.approve(&bob, &resolver, 1).unwrap();
        let game = engine.dispute(&bob, request).unwrap().instance.game_id;
        clock.advance(DEFAULT_EXTENSION + 1).unwrap();

        let shared = SharedEngine::new(engine);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.with(|e| e.claim_timeout(game, &AccountId::new()).is_ok())
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        shared.with(|e| {
            assert_eq!(e.game_info(game).unwrap().state, GameState::AttackerWon);
            let timeouts = e
                .events()
                .iter()
                .filter(|ev| ev.kind() == "timeout_claimed")
                .count();
            assert_eq!(timeouts, 1);
        });
    }

    const DEFAULT_EXTENSION: u64 = crate::config::DEFAULT_TIMEOUT_EXTENSION_SECS;
}
