//! # Escrow Vault
//!
//! One vault per side per game. Depositors buy shares of the vault's
//! balance; whenever it is the vault's turn and the vault holds enough, it
//! commits the required stake into the game on their behalf.
//!
//! ## Pool Value
//!
//! While the game is active, the vault's value is its uncommitted ledger
//! balance plus everything it has staked: committed stake still belongs to
//! the pool until the game decides otherwise. Once the game is terminal the
//! value is the ledger balance alone, which by then includes the pot (won)
//! or lacks the stake (lost). Shares are priced against that value, so a
//! late depositor pays for its slice of stake already in flight.
//!
//! Exits are capped by the uncommitted balance.
//!
//! ## Turn Hook
//!
//! After every deposit, mint, withdraw and redeem the vault tries to play a
//! turn. The attempt is skipped (not failed) when the game is over, when it
//! is the other side's turn, or when the balance is short. If the game
//! rejects the move anyway, the approval granted for it is restored and the
//! entry or exit that triggered the hook still succeeds.

use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, Amount, AssetId, GameId, Ledger, Timestamp, VaultId};
use wdg_state::{DisputeGame, GameState, MoveOutcome, Side};

use crate::error::VaultError;
use crate::shares::{Rounding, ShareError, ShareLedger};

/// Everything needed to bind a vault to its game.
#[derive(Debug, Clone)]
pub struct VaultParams {
    /// Handle assigned by the factory.
    pub id: VaultId,
    /// The vault's own ledger account.
    pub account: AccountId,
    /// Account of the factory that created the vault.
    pub factory: AccountId,
    /// Side the vault plays.
    pub role: Side,
    /// The opposing vault.
    pub opponent: VaultId,
    /// The opposing vault's ledger account.
    pub opponent_account: AccountId,
    /// Label of the vault's share class.
    pub share_class: String,
}

/// A move the vault committed on behalf of its depositors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPlayed {
    /// The vault that moved.
    pub vault: VaultId,
    /// The game's record of the move.
    pub outcome: MoveOutcome,
}

/// Result of a deposit or mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReceipt {
    /// The vault.
    pub vault: VaultId,
    /// Account the assets came from.
    pub depositor: AccountId,
    /// Account credited with shares.
    pub beneficiary: AccountId,
    /// Assets pulled in.
    pub assets: Amount,
    /// Shares issued.
    pub shares: Amount,
    /// Move triggered by the entry, if any.
    pub turn: Option<TurnPlayed>,
}

/// Result of a withdraw or redeem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReceipt {
    /// The vault.
    pub vault: VaultId,
    /// Share owner.
    pub owner: AccountId,
    /// Account paid.
    pub receiver: AccountId,
    /// Assets paid out.
    pub assets: Amount,
    /// Shares burned.
    pub shares: Amount,
    /// Move triggered by the exit, if any.
    pub turn: Option<TurnPlayed>,
}

/// The vault's view of its game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultGameStatus {
    /// The vault.
    pub vault: VaultId,
    /// Side the vault plays.
    pub role: Side,
    /// Game state.
    pub state: GameState,
    /// Whether the game is waiting on this vault.
    pub is_my_turn: bool,
    /// Stake the side on turn must commit.
    pub required_stake: Amount,
    /// Uncommitted vault balance.
    pub balance: Amount,
    /// Whether the balance covers the required stake.
    pub has_enough: bool,
    /// Whether the game still accepts moves.
    pub active: bool,
}

/// Read-only snapshot of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    /// The vault.
    pub id: VaultId,
    /// The vault's ledger account.
    pub account: AccountId,
    /// Side the vault plays.
    pub role: Side,
    /// The opposing vault.
    pub opponent: VaultId,
    /// The bound game.
    pub game: GameId,
    /// Stake asset.
    pub asset: AssetId,
    /// Stake unit of the game's first round.
    pub initial_stake: Amount,
    /// Share class label.
    pub share_class: String,
    /// Cumulative stake committed into the game.
    pub total_staked: Amount,
    /// Shares outstanding.
    pub total_shares: Amount,
}

/// A pooled escrow vault playing one side of one dispute game.
#[derive(Debug, Clone)]
pub struct EscrowVault {
    id: VaultId,
    account: AccountId,
    factory: AccountId,
    role: Side,
    opponent: VaultId,
    opponent_account: AccountId,
    game: GameId,
    asset: AssetId,
    initial_stake: Amount,
    share_class: String,
    total_staked: Amount,
    shares: ShareLedger,
}

impl EscrowVault {
    /// Bind a new vault to `game`, taking the game's asset and initial stake
    /// as its accounting baseline.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidConfig`] if any account is null, if the vault
    /// is its own opponent, or if the game does not seat this vault and its
    /// opponent on the declared sides.
    pub fn initialize(params: VaultParams, game: &DisputeGame) -> Result<Self, VaultError> {
        if params.account.is_nil() || params.factory.is_nil() || params.opponent_account.is_nil()
        {
            return Err(VaultError::InvalidConfig(
                "vault, factory and opponent accounts must be non-null".to_string(),
            ));
        }
        if params.opponent == params.id || params.opponent_account == params.account {
            return Err(VaultError::InvalidConfig(format!(
                "{} cannot be its own opponent",
                params.id
            )));
        }
        if game.party(params.role) != params.account {
            return Err(VaultError::InvalidConfig(format!(
                "{} does not seat {} as {}",
                game.id(),
                params.account,
                params.role
            )));
        }
        if game.party(params.role.opponent()) != params.opponent_account {
            return Err(VaultError::InvalidConfig(format!(
                "{} does not seat opponent {} as {}",
                game.id(),
                params.opponent_account,
                params.role.opponent()
            )));
        }

        Ok(Self {
            id: params.id,
            account: params.account,
            factory: params.factory,
            role: params.role,
            opponent: params.opponent,
            opponent_account: params.opponent_account,
            game: game.id(),
            asset: game.asset().clone(),
            initial_stake: game.initial_stake(),
            share_class: params.share_class,
            total_staked: 0,
            shares: ShareLedger::new(),
        })
    }

    // ── Entries ────────────────────────────────────────────────────────

    /// Pull `assets` from `depositor` and issue shares to `beneficiary`,
    /// then try to play a turn.
    pub fn deposit(
        &mut self,
        depositor: &AccountId,
        assets: Amount,
        beneficiary: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<EntryReceipt, VaultError> {
        self.ensure_game(game)?;
        if assets == 0 {
            return Err(self.zero("deposit"));
        }
        let shares = self.preview_deposit(assets, ledger, game)?;
        if shares == 0 {
            return Err(VaultError::ZeroShares {
                vault: self.id.to_string(),
                assets,
            });
        }
        self.enter(depositor, assets, shares, beneficiary, ledger, game, now)
    }

    /// Issue exactly `shares` to `beneficiary`, pulling whatever they cost
    /// from `depositor`, then try to play a turn.
    pub fn mint(
        &mut self,
        depositor: &AccountId,
        shares: Amount,
        beneficiary: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<EntryReceipt, VaultError> {
        self.ensure_game(game)?;
        if shares == 0 {
            return Err(self.zero("mint"));
        }
        let assets = self.preview_mint(shares, ledger, game)?;
        if assets == 0 {
            return Err(self.zero("mint"));
        }
        self.enter(depositor, assets, shares, beneficiary, ledger, game, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn enter(
        &mut self,
        depositor: &AccountId,
        assets: Amount,
        shares: Amount,
        beneficiary: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<EntryReceipt, VaultError> {
        if beneficiary.is_nil() {
            return Err(VaultError::NullBeneficiary {
                vault: self.id.to_string(),
            });
        }
        self.shares
            .ensure_mintable(beneficiary, shares)
            .map_err(|e| self.share_error(e))?;
        ledger.transfer_from(&self.asset, &self.account, depositor, &self.account, assets)?;
        self.shares
            .mint(beneficiary, shares)
            .map_err(|e| self.share_error(e))?;

        let turn = self.after_balance_change(ledger, game, now);
        Ok(EntryReceipt {
            vault: self.id,
            depositor: *depositor,
            beneficiary: *beneficiary,
            assets,
            shares,
            turn,
        })
    }

    // ── Exits ──────────────────────────────────────────────────────────

    /// Pay exactly `assets` to `receiver`, burning the shares they cost
    /// from `owner`.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        assets: Amount,
        receiver: &AccountId,
        owner: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<ExitReceipt, VaultError> {
        self.ensure_game(game)?;
        if assets == 0 {
            return Err(self.zero("withdraw"));
        }
        let shares = self.preview_withdraw(assets, ledger, game)?;
        self.exit(caller, assets, shares, receiver, owner, ledger, game, now)
    }

    /// Burn exactly `shares` from `owner`, paying what they are worth to
    /// `receiver`.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem(
        &mut self,
        caller: &AccountId,
        shares: Amount,
        receiver: &AccountId,
        owner: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<ExitReceipt, VaultError> {
        self.ensure_game(game)?;
        if shares == 0 {
            return Err(self.zero("redeem"));
        }
        let assets = self.preview_redeem(shares, ledger, game)?;
        self.exit(caller, assets, shares, receiver, owner, ledger, game, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        caller: &AccountId,
        assets: Amount,
        shares: Amount,
        receiver: &AccountId,
        owner: &AccountId,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<ExitReceipt, VaultError> {
        let available = self.uncommitted_balance(ledger);
        if assets > available {
            return Err(VaultError::InsufficientLiquidity {
                vault: self.id.to_string(),
                available,
                requested: assets,
            });
        }
        self.shares
            .ensure_burnable(caller, owner, shares)
            .map_err(|e| self.share_error(e))?;
        ledger.transfer(&self.asset, &self.account, receiver, assets)?;
        self.shares
            .burn(caller, owner, shares)
            .map_err(|e| self.share_error(e))?;

        let turn = self.after_balance_change(ledger, game, now);
        Ok(ExitReceipt {
            vault: self.id,
            owner: *owner,
            receiver: *receiver,
            assets,
            shares,
            turn,
        })
    }

    /// Let `spender` withdraw or redeem up to `shares` of `owner`'s shares.
    pub fn approve_shares(&mut self, owner: &AccountId, spender: &AccountId, shares: Amount) {
        self.shares.approve(owner, spender, shares);
    }

    // ── Turn play ──────────────────────────────────────────────────────

    /// Explicitly attempt a turn. Same effect as the automatic attempt,
    /// but failures are returned instead of logged.
    ///
    /// Returns `Ok(None)` when there is nothing to do: the game is over,
    /// it is the opponent's turn, or the balance is short.
    pub fn play_turn(
        &mut self,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Result<Option<TurnPlayed>, VaultError> {
        self.ensure_game(game)?;
        if game.state().is_terminal() || game.turn() != self.role {
            return Ok(None);
        }
        let stake = game.required_stake();
        if self.uncommitted_balance(ledger) < stake {
            return Ok(None);
        }
        let total_staked = self
            .total_staked
            .checked_add(stake)
            .ok_or_else(|| VaultError::Overflow {
                vault: self.id.to_string(),
            })?;

        let game_account = game.account();
        let previous = ledger.allowance(&self.asset, &self.account, &game_account);
        ledger.approve(&self.asset, &self.account, &game_account, stake)?;
        match game.play(self.role, &self.account, ledger, now) {
            Ok(outcome) => {
                ledger.approve(&self.asset, &self.account, &game_account, previous)?;
                self.total_staked = total_staked;
                Ok(Some(TurnPlayed {
                    vault: self.id,
                    outcome,
                }))
            }
            Err(err) => {
                ledger.approve(&self.asset, &self.account, &game_account, previous)?;
                Err(err.into())
            }
        }
    }

    fn after_balance_change(
        &mut self,
        ledger: &mut Ledger,
        game: &mut DisputeGame,
        now: Timestamp,
    ) -> Option<TurnPlayed> {
        match self.play_turn(ledger, game, now) {
            Ok(turn) => turn,
            Err(err) => {
                tracing::debug!(vault = %self.id, game = %self.game, error = %err, "auto-play skipped");
                None
            }
        }
    }

    // ── Accounting ─────────────────────────────────────────────────────

    /// Vault balance not committed to the game.
    pub fn uncommitted_balance(&self, ledger: &Ledger) -> Amount {
        ledger.balance_of(&self.asset, &self.account)
    }

    /// Value backing the shares (see module docs).
    pub fn total_assets(&self, ledger: &Ledger, game: &DisputeGame) -> Amount {
        let balance = self.uncommitted_balance(ledger);
        if game.state().is_terminal() {
            balance
        } else {
            balance.saturating_add(self.total_staked)
        }
    }

    /// Assets currently worth `shares`.
    pub fn convert_to_assets(
        &self,
        shares: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        self.shares
            .to_assets(shares, self.total_assets(ledger, game), Rounding::Down)
            .map_err(|e| self.share_error(e))
    }

    /// Shares currently worth `assets`.
    pub fn convert_to_shares(
        &self,
        assets: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        self.shares
            .to_shares(assets, self.total_assets(ledger, game), Rounding::Down)
            .map_err(|e| self.share_error(e))
    }

    /// Shares a deposit of `assets` would issue.
    pub fn preview_deposit(
        &self,
        assets: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        self.convert_to_shares(assets, ledger, game)
    }

    /// Assets a mint of `shares` would cost.
    pub fn preview_mint(
        &self,
        shares: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        let total_assets = self.total_assets(ledger, game);
        if self.shares.total_supply() > 0 && total_assets == 0 {
            return Err(self.share_error(ShareError::Insolvent));
        }
        self.shares
            .to_assets(shares, total_assets, Rounding::Up)
            .map_err(|e| self.share_error(e))
    }

    /// Shares a withdrawal of `assets` would burn.
    pub fn preview_withdraw(
        &self,
        assets: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        self.shares
            .to_shares(assets, self.total_assets(ledger, game), Rounding::Up)
            .map_err(|e| self.share_error(e))
    }

    /// Assets a redemption of `shares` would pay.
    pub fn preview_redeem(
        &self,
        shares: Amount,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        self.convert_to_assets(shares, ledger, game)
    }

    /// Most assets `owner` can withdraw right now.
    pub fn max_withdraw(
        &self,
        owner: &AccountId,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        let owned = self.convert_to_assets(self.shares.balance_of(owner), ledger, game)?;
        Ok(owned.min(self.uncommitted_balance(ledger)))
    }

    /// Most shares `owner` can redeem right now.
    pub fn max_redeem(
        &self,
        owner: &AccountId,
        ledger: &Ledger,
        game: &DisputeGame,
    ) -> Result<Amount, VaultError> {
        let held = self.shares.balance_of(owner);
        if held == 0 {
            return Ok(0);
        }
        let liquid = self.uncommitted_balance(ledger);
        let total_assets = self.total_assets(ledger, game);
        if liquid >= total_assets {
            return Ok(held);
        }
        let redeemable = self
            .shares
            .to_shares(liquid, total_assets, Rounding::Down)
            .map_err(|e| self.share_error(e))?;
        Ok(held.min(redeemable))
    }

    // ── Observers ──────────────────────────────────────────────────────

    /// The vault's view of its game.
    pub fn game_status(&self, ledger: &Ledger, game: &DisputeGame) -> VaultGameStatus {
        let state = game.state();
        let required_stake = game.required_stake();
        let balance = self.uncommitted_balance(ledger);
        VaultGameStatus {
            vault: self.id,
            role: self.role,
            state,
            is_my_turn: !state.is_terminal() && game.turn() == self.role,
            required_stake,
            balance,
            has_enough: balance >= required_stake,
            active: !state.is_terminal(),
        }
    }

    /// Full snapshot of the vault.
    pub fn info(&self) -> VaultInfo {
        VaultInfo {
            id: self.id,
            account: self.account,
            role: self.role,
            opponent: self.opponent,
            game: self.game,
            asset: self.asset.clone(),
            initial_stake: self.initial_stake,
            share_class: self.share_class.clone(),
            total_staked: self.total_staked,
            total_shares: self.shares.total_supply(),
        }
    }

    /// Shares held by `owner`.
    pub fn shares_of(&self, owner: &AccountId) -> Amount {
        self.shares.balance_of(owner)
    }

    /// The share book.
    pub fn share_ledger(&self) -> &ShareLedger {
        &self.shares
    }

    /// The vault handle.
    pub fn id(&self) -> VaultId {
        self.id
    }

    /// The vault's ledger account.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Account of the factory that created the vault.
    pub fn factory(&self) -> AccountId {
        self.factory
    }

    /// The bound game.
    pub fn game_id(&self) -> GameId {
        self.game
    }

    /// Side the vault plays.
    pub fn role(&self) -> Side {
        self.role
    }

    /// The opposing vault.
    pub fn opponent(&self) -> VaultId {
        self.opponent
    }

    /// The opposing vault's ledger account.
    pub fn opponent_account(&self) -> AccountId {
        self.opponent_account
    }

    /// Stake asset.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    /// Cumulative stake committed into the game.
    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    fn ensure_game(&self, game: &DisputeGame) -> Result<(), VaultError> {
        if game.id() != self.game || game.party(self.role) != self.account {
            return Err(VaultError::GameMismatch {
                vault: self.id.to_string(),
                expected: self.game.to_string(),
                actual: game.id().to_string(),
            });
        }
        Ok(())
    }

    fn zero(&self, operation: &'static str) -> VaultError {
        VaultError::ZeroAmount {
            vault: self.id.to_string(),
            operation,
        }
    }

    fn share_error(&self, source: ShareError) -> VaultError {
        VaultError::Shares {
            vault: self.id.to_string(),
            source,
        }
    }
}
