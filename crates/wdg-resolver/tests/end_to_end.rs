//! # End-to-End Dispute Flows
//!
//! Drives the full engine (facade request → dispute → vault play → timeout
//! → resolution → redemption) on a manual clock.

use wdg_core::{AccountId, Amount, ManualClock, RequestId, Timestamp, VaultId};
use wdg_resolver::{DisputeEngine, EngineConfig, EngineError, RequestStatus, ResolverError};
use wdg_state::{GameState, Side};

const WINDOW: u64 = 86_400;
const EXTENSION: u64 = 3_600;

struct World {
    engine: DisputeEngine<ManualClock>,
    clock: ManualClock,
    facade: AccountId,
    requester: AccountId,
}

fn world(dispute_stake: Amount) -> World {
    let clock = ManualClock::new(Timestamp::parse("2026-03-01T00:00:00Z").unwrap());
    let facade = AccountId::derive("facade", 0);
    let config = EngineConfig {
        dispute_stake,
        validation_timeout_secs: WINDOW,
        timeout_extension_secs: EXTENSION,
        ..EngineConfig::default()
    };
    World {
        engine: DisputeEngine::new(config, facade, clock.clone()).unwrap(),
        clock,
        facade,
        requester: AccountId::derive("requester", 0),
    }
}

impl World {
    fn push(&mut self, amount: Amount) -> RequestId {
        let (facade, requester) = (self.facade, self.requester);
        self.engine
            .push_withdraw_request(&facade, &requester, amount)
            .unwrap()
    }

    /// A fresh account holding `amount`, with `spender` approved for all of it.
    fn participant(&mut self, amount: Amount, spender: AccountId) -> AccountId {
        let who = AccountId::new();
        self.engine.credit(&who, amount).unwrap();
        self.engine.approve(&who, &spender, amount).unwrap();
        who
    }

    fn vault_account(&self, vault: VaultId) -> AccountId {
        self.engine.vault_info(vault).unwrap().account
    }
}

// =========================================================================
// Scenario: defender prevails
// =========================================================================

#[test]
fn defender_wins_when_attacker_stops_escalating() {
    let mut w = world(1);
    let request = w.push(100);

    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let opened = w.engine.dispute(&bob, request).unwrap();
    let game = opened.instance.game_id;
    let (attacker_vault, defender_vault) = w.engine.pools_of(game).unwrap();

    let info = w.engine.game_info(game).unwrap();
    assert_eq!(info.turn, Side::Defender);
    assert_eq!(info.required_stake, 1);
    assert_eq!(info.attacker_staked, 1);

    let carol = w.participant(1, w.vault_account(defender_vault));
    let entry = w.engine.deposit(defender_vault, &carol, 1, &carol).unwrap();
    assert!(entry.turn.is_some());
    let info = w.engine.game_info(game).unwrap();
    assert_eq!(info.turn, Side::Attacker);
    assert_eq!(info.required_stake, 2);

    let status = w.engine.vault_status(attacker_vault).unwrap();
    assert!(status.is_my_turn);
    assert!(!status.has_enough);

    w.clock.advance(EXTENSION + 1).unwrap();
    let outcome = w.engine.claim_timeout(game, &carol).unwrap();
    assert_eq!(outcome.verdict, GameState::DefenderWon);
    assert_eq!(outcome.payout, 2);
    assert_eq!(outcome.winner, w.vault_account(defender_vault));
    assert_eq!(w.engine.balance_of(&w.vault_account(defender_vault)), 2);

    let resolution = w.engine.resolve(request).unwrap();
    assert!(resolution.valid);
    let requester = w.requester;
    assert!(w.engine.validate_withdraw(&requester, request));
    assert_eq!(w.engine.request_status(request).unwrap(), RequestStatus::ResolvedValid);

    let exit = w
        .engine
        .redeem(defender_vault, &carol, 1, &carol, &carol)
        .unwrap();
    assert_eq!(exit.assets, 2);
    assert_eq!(w.engine.balance_of(&carol), 2);
    assert_eq!(w.engine.total_assets(attacker_vault).unwrap(), 0);
}

// =========================================================================
// Scenario: attacker prevails
// =========================================================================

#[test]
fn attacker_wins_when_defender_stops_escalating() {
    let mut w = world(1);
    let request = w.push(100);

    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (attacker_vault, defender_vault) = w.engine.pools_of(game).unwrap();

    let carol = w.participant(1, w.vault_account(defender_vault));
    w.engine.deposit(defender_vault, &carol, 1, &carol).unwrap();

    let dave = w.participant(2, w.vault_account(attacker_vault));
    let entry = w.engine.deposit(attacker_vault, &dave, 2, &dave).unwrap();
    let turn = entry.turn.expect("attacker vault should escalate");
    assert_eq!(turn.outcome.stake, 2);
    assert_eq!(turn.outcome.next_required_stake, 2);
    assert_eq!(w.engine.game_info(game).unwrap().turn, Side::Defender);

    w.clock.advance(EXTENSION + 1).unwrap();
    let outcome = w.engine.claim_timeout(game, &AccountId::new()).unwrap();
    assert_eq!(outcome.verdict, GameState::AttackerWon);
    assert_eq!(outcome.payout, 4);
    assert_eq!(w.engine.total_assets(attacker_vault).unwrap(), 4);

    let resolution = w.engine.resolve(request).unwrap();
    assert!(!resolution.valid);
    let requester = w.requester;
    assert!(!w.engine.validate_withdraw(&requester, request));

    let bob_out = w
        .engine
        .redeem(attacker_vault, &bob, 1, &bob, &bob)
        .unwrap();
    let dave_shares = w.engine.shares_of(attacker_vault, &dave).unwrap();
    let dave_out = w
        .engine
        .redeem(attacker_vault, &dave, dave_shares, &dave, &dave)
        .unwrap();
    assert_eq!(bob_out.assets + dave_out.assets, 4);
    assert!(dave_out.assets > bob_out.assets);
}

// =========================================================================
// Resolver lifecycle
// =========================================================================

#[test]
fn undisputed_request_becomes_valid_one_second_after_window() {
    let mut w = world(1);
    let request = w.push(5);
    let requester = w.requester;

    w.clock.advance(WINDOW).unwrap();
    assert!(!w.engine.validate_withdraw(&requester, request));
    assert_eq!(w.engine.request_status(request).unwrap(), RequestStatus::Created);

    w.clock.advance(1).unwrap();
    assert!(w.engine.validate_withdraw(&requester, request));
    assert_eq!(
        w.engine.request_status(request).unwrap(),
        RequestStatus::ImplicitlyValid
    );

    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let err = w.engine.dispute(&bob, request).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Resolver(ResolverError::ValidationWindowClosed { .. })
    ));
}

#[test]
fn duplicate_dispute_creates_no_game() {
    let mut w = world(1);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(2, resolver);
    w.engine.dispute(&bob, request).unwrap();
    let events = w.engine.events().len();

    let err = w.engine.dispute(&bob, request).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Resolver(ResolverError::AlreadyDisputed { .. })
    ));
    assert_eq!(w.engine.events().len(), events);
    assert_eq!(w.engine.balance_of(&bob), 1);
    assert!(w.engine.game_info(wdg_core::GameId(1)).is_err());
}

#[test]
fn disputed_request_is_invalid_until_resolved() {
    let mut w = world(1);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let requester = w.requester;

    assert!(matches!(
        w.engine.resolve(request),
        Err(EngineError::Resolver(ResolverError::GameStillActive { .. }))
    ));
    // Past the validation window the dispute still governs validity.
    w.clock.advance(WINDOW + 1).unwrap();
    assert!(!w.engine.validate_withdraw(&requester, request));

    w.engine.claim_timeout(game, &bob).unwrap();
    let first = w.engine.resolve(request).unwrap();
    w.clock.advance(10).unwrap();
    let second = w.engine.resolve(request).unwrap();
    assert_eq!(first.valid, second.valid);
    assert_eq!(first.resolved_at, second.resolved_at);
    assert!(!second.newly_resolved);
    let resolved = w
        .engine
        .events()
        .iter()
        .filter(|e| e.kind() == "resolved")
        .count();
    assert_eq!(resolved, 1);
}

#[test]
fn get_dispute_game_reports_linkage() {
    let mut w = world(1);
    let request = w.push(5);
    assert!(!w.engine.get_dispute_game(request).exists);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let opened = w.engine.dispute(&bob, request).unwrap();
    let lookup = w.engine.get_dispute_game(request);
    assert!(lookup.exists);
    assert_eq!(lookup.game_id, Some(opened.instance.game_id));
    assert_eq!(lookup.game_account, Some(opened.instance.game_account));
    assert_eq!(lookup.state, Some(GameState::Active));
}

// =========================================================================
// Vault behaviour inside the engine
// =========================================================================

#[test]
fn short_deposit_waits_for_explicit_play_turn() {
    let mut w = world(1);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (_, defender_vault) = w.engine.pools_of(game).unwrap();
    let defender_account = w.vault_account(defender_vault);

    let carol = w.participant(1, defender_account);
    w.engine.deposit(defender_vault, &carol, 1, &carol).unwrap();
    // Required is now 2 for the attacker; the attacker vault holds nothing.
    let (attacker_vault, _) = w.engine.pools_of(game).unwrap();
    assert_eq!(w.engine.play_turn(attacker_vault).unwrap(), None);

    // Funds arrive without a deposit.
    let donor = w.participant(2, AccountId::new());
    let attacker_account = w.vault_account(attacker_vault);
    w.engine.transfer(&donor, &attacker_account, 2).unwrap();
    let turn = w.engine.play_turn(attacker_vault).unwrap().expect("turn");
    assert_eq!(turn.outcome.side, Side::Attacker);
    assert_eq!(w.engine.required_stake(game).unwrap(), 2);
}

#[test]
fn late_vault_move_is_skipped_and_deposit_kept() {
    let mut w = world(1);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (_, defender_vault) = w.engine.pools_of(game).unwrap();

    w.clock.advance(EXTENSION + 1).unwrap();
    let carol = w.participant(1, w.vault_account(defender_vault));
    let entry = w.engine.deposit(defender_vault, &carol, 1, &carol).unwrap();
    assert!(entry.turn.is_none());
    assert_eq!(w.engine.shares_of(defender_vault, &carol).unwrap(), 1);
    assert!(w.engine.play_turn(defender_vault).is_err());
    assert_eq!(w.engine.game_info(game).unwrap().moves, 1);
}

#[test]
fn committed_stake_cannot_be_withdrawn_mid_game() {
    let mut w = world(2);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(2, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (attacker_vault, _) = w.engine.pools_of(game).unwrap();

    assert_eq!(w.engine.max_withdraw(attacker_vault, &bob).unwrap(), 0);
    assert_eq!(w.engine.max_redeem(attacker_vault, &bob).unwrap(), 0);
    let err = w
        .engine
        .withdraw(attacker_vault, &bob, 1, &bob, &bob)
        .unwrap_err();
    assert!(matches!(err, EngineError::Vault(_)));
    assert_eq!(w.engine.shares_of(attacker_vault, &bob).unwrap(), 2);
}

#[test]
fn third_party_exit_uses_share_allowance() {
    let mut w = world(1);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(1, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (_, defender_vault) = w.engine.pools_of(game).unwrap();
    // Defender vault holds 3 but only 1 is needed: 2 stay liquid.
    let carol = w.participant(3, w.vault_account(defender_vault));
    w.engine.deposit(defender_vault, &carol, 3, &carol).unwrap();

    let agent = AccountId::new();
    assert!(w
        .engine
        .withdraw(defender_vault, &agent, 1, &agent, &carol)
        .is_err());
    w.engine
        .approve_shares(defender_vault, &carol, &agent, 1)
        .unwrap();
    let exit = w
        .engine
        .withdraw(defender_vault, &agent, 1, &agent, &carol)
        .unwrap();
    assert_eq!(exit.shares, 1);
    assert_eq!(w.engine.balance_of(&agent), 1);
}

#[test]
fn mint_prices_against_committed_stake() {
    let mut w = world(4);
    let request = w.push(5);
    let resolver = w.engine.resolver_account();
    let bob = w.participant(4, resolver);
    let game = w.engine.dispute(&bob, request).unwrap().instance.game_id;
    let (attacker_vault, _) = w.engine.pools_of(game).unwrap();

    assert_eq!(w.engine.preview_deposit(attacker_vault, 4).unwrap(), 4);
    let dave = w.participant(10, w.vault_account(attacker_vault));
    let entry = w.engine.mint(attacker_vault, &dave, 2, &dave).unwrap();
    assert_eq!(entry.assets, 2);
    assert_eq!(w.engine.preview_redeem(attacker_vault, 2).unwrap(), 2);
}
