//! # Game Factory
//!
//! Produces a fresh dispute game plus its two escrow vaults per dispute,
//! and owns every instance it has produced. Instances live in arenas and
//! are referenced by [`GameId`] / [`VaultId`] handles; nothing is ever
//! removed, so a handle stays valid for the life of the factory.
//!
//! Ledger accounts for games and vaults are derived from the handle, so a
//! replayed sequence of calls produces the same accounts. The factory keeps
//! a registry of every account it derived; those accounts hold pooled or
//! escrowed value and only move through their own game or vault.
//!
//! ## Checkpoints
//!
//! [`FactoryCheckpoint`] captures just the instances one call may change:
//! one game, one vault and its game, or the arena lengths when a call can
//! only append. Restoring it undoes the call without copying the arenas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use wdg_core::{AccountId, Amount, AssetId, GameId, Timestamp, VaultId};
use wdg_escrow::{EscrowVault, VaultParams};
use wdg_state::{DisputeGame, GameParams, Side};

use crate::error::ResolverError;

/// Handles and accounts of a freshly created game and its vaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInstance {
    /// The game.
    pub game_id: GameId,
    /// The game's custody account.
    pub game_account: AccountId,
    /// The attacker vault.
    pub attacker_vault: VaultId,
    /// The attacker vault's account.
    pub attacker_vault_account: AccountId,
    /// The defender vault.
    pub defender_vault: VaultId,
    /// The defender vault's account.
    pub defender_vault_account: AccountId,
}

/// Template configuration plus the arenas of every game and vault.
#[derive(Debug, Clone)]
pub struct GameFactory {
    account: AccountId,
    timeout_extension_secs: u64,
    games: Vec<DisputeGame>,
    pools: Vec<(VaultId, VaultId)>,
    vaults: Vec<EscrowVault>,
    engine_accounts: HashSet<AccountId>,
}

/// The part of a factory one call may change, captured before the call.
#[derive(Debug, Clone)]
pub enum FactoryCheckpoint {
    /// Existing instances are untouched; new ones may be appended.
    Append {
        /// Games before the call.
        games: usize,
        /// Vaults before the call.
        vaults: usize,
    },
    /// One game may change.
    Game {
        /// The game's handle.
        id: GameId,
        /// The game before the call.
        game: Box<DisputeGame>,
    },
    /// One vault and the game it plays may change.
    Vault {
        /// The vault's handle.
        id: VaultId,
        /// The vault before the call.
        vault: Box<EscrowVault>,
        /// Its game before the call.
        game: Box<DisputeGame>,
    },
}

impl GameFactory {
    /// A factory whose games re-arm their deadline by `timeout_extension_secs`.
    pub fn new(timeout_extension_secs: u64) -> Result<Self, ResolverError> {
        if timeout_extension_secs == 0 {
            return Err(ResolverError::InvalidConfig(
                "timeout extension must be positive".to_string(),
            ));
        }
        let account = AccountId::derive("factory", 0);
        Ok(Self {
            account,
            timeout_extension_secs,
            games: Vec::new(),
            pools: Vec::new(),
            vaults: Vec::new(),
            engine_accounts: HashSet::from([account]),
        })
    }

    /// Create a game and both of its vaults, wired to each other.
    pub fn create_game_with_pools(
        &mut self,
        asset: AssetId,
        initial_stake: Amount,
        attacker_share_class: &str,
        defender_share_class: &str,
        now: Timestamp,
    ) -> Result<GameInstance, ResolverError> {
        let game_index = self.games.len() as u64;
        let vault_index = self.vaults.len() as u64;
        let defender_index = vault_index
            .checked_add(1)
            .ok_or(ResolverError::CounterExhausted { what: "vault" })?;

        let game_id = GameId(game_index);
        let game_account = AccountId::derive("game", game_index);
        let (attacker_vault, defender_vault) = (VaultId(vault_index), VaultId(defender_index));
        let attacker_vault_account = AccountId::derive("vault", vault_index);
        let defender_vault_account = AccountId::derive("vault", defender_index);

        let game = DisputeGame::initialize(
            GameParams {
                id: game_id,
                account: game_account,
                attacker: attacker_vault_account,
                defender: defender_vault_account,
                asset,
                initial_stake,
                timeout_extension_secs: self.timeout_extension_secs,
            },
            now,
        )?;
        let attacker = EscrowVault::initialize(
            VaultParams {
                id: attacker_vault,
                account: attacker_vault_account,
                factory: self.account,
                role: Side::Attacker,
                opponent: defender_vault,
                opponent_account: defender_vault_account,
                share_class: attacker_share_class.to_string(),
            },
            &game,
        )?;
        let defender = EscrowVault::initialize(
            VaultParams {
                id: defender_vault,
                account: defender_vault_account,
                factory: self.account,
                role: Side::Defender,
                opponent: attacker_vault,
                opponent_account: attacker_vault_account,
                share_class: defender_share_class.to_string(),
            },
            &game,
        )?;

        self.games.push(game);
        self.pools.push((attacker_vault, defender_vault));
        self.vaults.push(attacker);
        self.vaults.push(defender);
        self.engine_accounts
            .extend([game_account, attacker_vault_account, defender_vault_account]);

        Ok(GameInstance {
            game_id,
            game_account,
            attacker_vault,
            attacker_vault_account,
            defender_vault,
            defender_vault_account,
        })
    }

    /// The factory's own account.
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Whether `account` is the factory's or one of its games' or vaults'.
    pub fn is_engine_account(&self, account: &AccountId) -> bool {
        self.engine_accounts.contains(account)
    }

    /// The vault playing `side` of `game`.
    pub fn vault_for(&self, game: GameId, side: Side) -> Result<VaultId, ResolverError> {
        let (attacker, defender) = self.pools_of(game)?;
        Ok(match side {
            Side::Attacker => attacker,
            Side::Defender => defender,
        })
    }

    /// Capture the arena lengths for a call that may only append.
    pub fn checkpoint_append(&self) -> FactoryCheckpoint {
        FactoryCheckpoint::Append {
            games: self.games.len(),
            vaults: self.vaults.len(),
        }
    }

    /// Capture one game.
    pub fn checkpoint_game(&self, id: GameId) -> Result<FactoryCheckpoint, ResolverError> {
        Ok(FactoryCheckpoint::Game {
            id,
            game: Box::new(self.game(id)?.clone()),
        })
    }

    /// Capture one vault and its game.
    pub fn checkpoint_vault(&self, id: VaultId) -> Result<FactoryCheckpoint, ResolverError> {
        let (vault, game) = self.vault_with_game(id)?;
        Ok(FactoryCheckpoint::Vault {
            id,
            vault: Box::new(vault.clone()),
            game: Box::new(game.clone()),
        })
    }

    /// Undo everything since `checkpoint` was taken.
    pub fn restore(&mut self, checkpoint: FactoryCheckpoint) {
        match checkpoint {
            FactoryCheckpoint::Append { games, vaults } => {
                for game in self.games.drain(games.min(self.games.len())..) {
                    self.engine_accounts.remove(&game.account());
                }
                for vault in self.vaults.drain(vaults.min(self.vaults.len())..) {
                    self.engine_accounts.remove(&vault.account());
                }
                self.pools.truncate(games);
            }
            FactoryCheckpoint::Game { id, game } => {
                if let Some(slot) = id.index().and_then(|i| self.games.get_mut(i)) {
                    *slot = *game;
                }
            }
            FactoryCheckpoint::Vault { id, vault, game } => {
                let game_id = game.id();
                if let Some(slot) = id.index().and_then(|i| self.vaults.get_mut(i)) {
                    *slot = *vault;
                }
                if let Some(slot) = game_id.index().and_then(|i| self.games.get_mut(i)) {
                    *slot = *game;
                }
            }
        }
    }

    /// Deadline extension stamped into every new game.
    pub fn timeout_extension_secs(&self) -> u64 {
        self.timeout_extension_secs
    }

    /// Number of games created.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Every game, in creation order.
    pub fn games(&self) -> impl Iterator<Item = &DisputeGame> {
        self.games.iter()
    }

    /// Look up a game.
    pub fn game(&self, id: GameId) -> Result<&DisputeGame, ResolverError> {
        id.index()
            .and_then(|i| self.games.get(i))
            .ok_or_else(|| game_not_found(id))
    }

    /// Look up a game for mutation.
    pub fn game_mut(&mut self, id: GameId) -> Result<&mut DisputeGame, ResolverError> {
        id.index()
            .and_then(|i| self.games.get_mut(i))
            .ok_or_else(|| game_not_found(id))
    }

    /// Attacker and defender vaults of a game.
    pub fn pools_of(&self, id: GameId) -> Result<(VaultId, VaultId), ResolverError> {
        id.index()
            .and_then(|i| self.pools.get(i))
            .copied()
            .ok_or_else(|| game_not_found(id))
    }

    /// Look up a vault.
    pub fn vault(&self, id: VaultId) -> Result<&EscrowVault, ResolverError> {
        id.index()
            .and_then(|i| self.vaults.get(i))
            .ok_or_else(|| vault_not_found(id))
    }

    /// A vault together with the game it plays.
    pub fn vault_with_game(
        &self,
        id: VaultId,
    ) -> Result<(&EscrowVault, &DisputeGame), ResolverError> {
        let vault = self.vault(id)?;
        let game = self.game(vault.game_id())?;
        Ok((vault, game))
    }

    /// A vault together with the game it plays, both mutable.
    pub fn vault_with_game_mut(
        &mut self,
        id: VaultId,
    ) -> Result<(&mut EscrowVault, &mut DisputeGame), ResolverError> {
        let vault = id
            .index()
            .and_then(|i| self.vaults.get_mut(i))
            .ok_or_else(|| vault_not_found(id))?;
        let game_id = vault.game_id();
        let game = game_id
            .index()
            .and_then(|i| self.games.get_mut(i))
            .ok_or_else(|| game_not_found(game_id))?;
        Ok((vault, game))
    }
}

fn game_not_found(id: GameId) -> ResolverError {
    ResolverError::GameNotFound {
        game: id.to_string(),
    }
}

fn vault_not_found(id: VaultId) -> ResolverError {
    ResolverError::VaultNotFound {
        vault: id.to_string(),
    }
}
