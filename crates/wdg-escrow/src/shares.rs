//! # Proportional Share Ledger
//!
//! Tracks who owns what fraction of a pool. The pool's asset total is not
//! stored here; every conversion takes it as an argument, so the owner
//! decides what counts as pool value.
//!
//! ## Conversion Rules
//!
//! - Empty supply converts 1:1.
//! - Outstanding shares against zero assets cannot be priced: conversions
//!   into shares fail with [`ShareError::Insolvent`].
//! - Rounding always favours the pool. Callers pick [`Rounding::Down`] when
//!   handing value out and [`Rounding::Up`] when taking value in.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use wdg_core::{AccountId, Amount};

/// Direction to round a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero.
    Down,
    /// Away from zero.
    Up,
}

/// Share-book rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// Owner holds fewer shares than requested.
    #[error("{owner} holds {available} shares, needs {requested}")]
    InsufficientShares {
        /// Share owner.
        owner: String,
        /// Shares held.
        available: Amount,
        /// Shares requested.
        requested: Amount,
    },

    /// Spender's share allowance is too small.
    #[error("{spender} may spend {available} of {owner}'s shares, needs {requested}")]
    InsufficientAllowance {
        /// Share owner.
        owner: String,
        /// Spending account.
        spender: String,
        /// Allowance left.
        available: Amount,
        /// Shares requested.
        requested: Amount,
    },

    /// Shares are outstanding but the pool holds nothing.
    #[error("pool has outstanding shares but no assets")]
    Insolvent,

    /// Conversion or supply arithmetic overflowed.
    #[error("share arithmetic overflow")]
    Overflow,
}

/// Share balances, allowances and total supply.
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    balances: BTreeMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
    total_supply: Amount,
}

impl ShareLedger {
    /// An empty share book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares in existence.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Shares held by `owner`.
    pub fn balance_of(&self, owner: &AccountId) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Every non-zero holder, ordered by account.
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, &Amount)> {
        self.balances.iter()
    }

    /// Shares `spender` may burn on behalf of `owner`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Set `spender`'s allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, shares: Amount) {
        if shares == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), shares);
        }
    }

    /// Shares worth `assets` given the pool holds `total_assets`.
    pub fn to_shares(
        &self,
        assets: Amount,
        total_assets: Amount,
        rounding: Rounding,
    ) -> Result<Amount, ShareError> {
        if self.total_supply == 0 {
            return Ok(assets);
        }
        if total_assets == 0 {
            return Err(ShareError::Insolvent);
        }
        mul_div(assets, self.total_supply, total_assets, rounding)
    }

    /// Assets worth `shares` given the pool holds `total_assets`.
    pub fn to_assets(
        &self,
        shares: Amount,
        total_assets: Amount,
        rounding: Rounding,
    ) -> Result<Amount, ShareError> {
        if self.total_supply == 0 {
            return Ok(shares);
        }
        mul_div(shares, total_assets, self.total_supply, rounding)
    }

    /// Check that `shares` can be minted to `to` without overflow.
    pub fn ensure_mintable(&self, to: &AccountId, shares: Amount) -> Result<(), ShareError> {
        self.total_supply
            .checked_add(shares)
            .and_then(|_| self.balance_of(to).checked_add(shares))
            .map(|_| ())
            .ok_or(ShareError::Overflow)
    }

    /// Create `shares` for `to`.
    pub fn mint(&mut self, to: &AccountId, shares: Amount) -> Result<(), ShareError> {
        self.ensure_mintable(to, shares)?;
        self.total_supply += shares;
        *self.balances.entry(*to).or_insert(0) += shares;
        Ok(())
    }

    /// Check that `spender` may burn `shares` of `owner`.
    pub fn ensure_burnable(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        shares: Amount,
    ) -> Result<(), ShareError> {
        let held = self.balance_of(owner);
        if held < shares {
            return Err(ShareError::InsufficientShares {
                owner: owner.to_string(),
                available: held,
                requested: shares,
            });
        }
        if spender != owner {
            let allowed = self.allowance(owner, spender);
            if allowed < shares {
                return Err(ShareError::InsufficientAllowance {
                    owner: owner.to_string(),
                    spender: spender.to_string(),
                    available: allowed,
                    requested: shares,
                });
            }
        }
        Ok(())
    }

    /// Destroy `shares` of `owner`, spending `spender`'s allowance when the
    /// two differ.
    pub fn burn(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        shares: Amount,
    ) -> Result<(), ShareError> {
        self.ensure_burnable(spender, owner, shares)?;
        if spender != owner {
            let left = self.allowance(owner, spender) - shares;
            self.approve(owner, spender, left);
        }
        let left = self.balance_of(owner) - shares;
        if left == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, left);
        }
        self.total_supply -= shares;
        Ok(())
    }
}

fn mul_div(
    value: Amount,
    numerator: Amount,
    denominator: Amount,
    rounding: Rounding,
) -> Result<Amount, ShareError> {
    let product = u128::from(value) * u128::from(numerator);
    let denominator = u128::from(denominator);
    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != 0 {
        quotient += 1;
    }
    Amount::try_from(quotient).map_err(|_| ShareError::Overflow)
}
