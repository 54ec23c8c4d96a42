//! # Value-Transfer Ledger
//!
//! The hosting ledger the dispute engine settles on: per-asset balances and
//! per-asset spending allowances, with all-or-nothing transfers.
//!
//! ## Security Invariant
//!
//! Every mutating operation validates all of its preconditions (non-null
//! parties, sufficient balance, sufficient allowance, no overflow on the
//! credit side) before writing anything. A returned [`LedgerError`] means
//! the ledger is exactly as it was before the call.
//!
//! ## Pull Payments
//!
//! Components never reach into another account's balance directly. A party
//! that wants a component to take its funds first calls [`Ledger::approve`]
//! naming the component's account as spender; the component then calls
//! [`Ledger::transfer_from`]. This is how the dispute game pulls stake from
//! a mover and how a vault pulls a deposit from a depositor.

use std::collections::HashMap;

use crate::asset::{Amount, AssetId};
use crate::error::LedgerError;
use crate::identity::AccountId;

/// In-memory value ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<(AssetId, AccountId), Amount>,
    allowances: HashMap<(AssetId, AccountId, AccountId), Amount>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account` in `asset`.
    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.balances
            .get(&(asset.clone(), *account))
            .copied()
            .unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(asset.clone(), *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Issue new units of `asset` to `account`.
    ///
    /// Issuance sits outside the dispute core; it exists so simulations and
    /// tests can fund their participants.
    pub fn credit(
        &mut self,
        asset: &AssetId,
        account: &AccountId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        if account.is_nil() {
            return Err(LedgerError::ZeroAccount { operation: "credit" });
        }
        let current = self.balance_of(asset, account);
        let next = current.checked_add(amount).ok_or_else(|| LedgerError::Overflow {
            asset: asset.to_string(),
            account: account.to_string(),
        })?;
        self.balances.insert((asset.clone(), *account), next);
        Ok(next)
    }

    /// Set the allowance of `spender` over `owner`'s balance to exactly `amount`.
    pub fn approve(
        &mut self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if owner.is_nil() || spender.is_nil() {
            return Err(LedgerError::ZeroAccount { operation: "approve" });
        }
        let key = (asset.clone(), *owner, *spender);
        if amount == 0 {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(key, amount);
        }
        Ok(())
    }

    /// Move `amount` from `from` to `to`, authorized by `from` itself.
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.check_move(asset, from, to, amount, "transfer")?;
        self.apply_move(asset, from, to, amount);
        Ok(())
    }

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.check_move(asset, from, to, amount, "transfer_from")?;
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                asset: asset.to_string(),
                owner: from.to_string(),
                spender: spender.to_string(),
                available: allowed,
                required: amount,
            });
        }
        self.apply_move(asset, from, to, amount);
        let key = (asset.clone(), *from, *spender);
        let remaining = allowed - amount;
        if remaining == 0 {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(key, remaining);
        }
        Ok(())
    }

    fn check_move(
        &self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        operation: &'static str,
    ) -> Result<(), LedgerError> {
        if from.is_nil() || to.is_nil() {
            return Err(LedgerError::ZeroAccount { operation });
        }
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: asset.to_string(),
                account: from.to_string(),
                available,
                required: amount,
            });
        }
        if from != to && self.balance_of(asset, to).checked_add(amount).is_none() {
            return Err(LedgerError::Overflow {
                asset: asset.to_string(),
                account: to.to_string(),
            });
        }
        Ok(())
    }

    /// Caller has already run `check_move`.
    fn apply_move(&mut self, asset: &AssetId, from: &AccountId, to: &AccountId, amount: Amount) {
        if from == to || amount == 0 {
            return;
        }
        let from_balance = self.balance_of(asset, from) - amount;
        let to_balance = self.balance_of(asset, to) + amount;
        self.set_balance(asset, from, from_balance);
        self.set_balance(asset, to, to_balance);
    }

    fn set_balance(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        let key = (asset.clone(), *account);
        if amount == 0 {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn weth() -> AssetId {
        AssetId::new("WETH").unwrap()
    }

    fn funded(account: &AccountId, amount: Amount) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.credit(&weth(), account, amount).unwrap();
        ledger
    }

    #[test]
    fn credit_and_balance() {
        let alice = AccountId::new();
        let ledger = funded(&alice, 10);
        assert_eq!(ledger.balance_of(&weth(), &alice), 10);
        assert_eq!(ledger.balance_of(&weth(), &AccountId::new()), 0);
    }

    #[test]
    fn credit_to_nil_rejected() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.credit(&weth(), &AccountId::nil(), 1),
            Err(LedgerError::ZeroAccount { operation: "credit" })
        );
    }

    #[test]
    fn transfer_moves_value() {
        let (alice, bob) = (AccountId::new(), AccountId::new());
        let mut ledger = funded(&alice, 10);
        ledger.transfer(&weth(), &alice, &bob, 4).unwrap();
        assert_eq!(ledger.balance_of(&weth(), &alice), 6);
        assert_eq!(ledger.balance_of(&weth(), &bob), 4);
    }

    #[test]
    fn transfer_insufficient_balance_changes_nothing() {
        let (alice, bob) = (AccountId::new(), AccountId::new());
        let mut ledger = funded(&alice, 3);
        let err = ledger.transfer(&weth(), &alice, &bob, 4).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 3, required: 4, .. }));
        assert_eq!(ledger.balance_of(&weth(), &alice), 3);
        assert_eq!(ledger.balance_of(&weth(), &bob), 0);
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let (alice, game) = (AccountId::new(), AccountId::new());
        let mut ledger = funded(&alice, 10);
        let err = ledger.transfer_from(&weth(), &game, &alice, &game, 2).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
        assert_eq!(ledger.balance_of(&weth(), &alice), 10);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let (alice, game) = (AccountId::new(), AccountId::new());
        let mut ledger = funded(&alice, 10);
        ledger.approve(&weth(), &alice, &game, 5).unwrap();
        ledger.transfer_from(&weth(), &game, &alice, &game, 2).unwrap();
        assert_eq!(ledger.allowance(&weth(), &alice, &game), 3);
        assert_eq!(ledger.balance_of(&weth(), &game), 2);
        ledger.transfer_from(&weth(), &game, &alice, &game, 3).unwrap();
        assert_eq!(ledger.allowance(&weth(), &alice, &game), 0);
    }

    #[test]
    fn transfer_from_with_allowance_but_no_balance_keeps_allowance() {
        let (alice, game) = (AccountId::new(), AccountId::new());
        let mut ledger = funded(&alice, 1);
        ledger.approve(&weth(), &alice, &game, 5).unwrap();
        assert!(ledger.transfer_from(&weth(), &game, &alice, &game, 2).is_err());
        assert_eq!(ledger.allowance(&weth(), &alice, &game), 5);
    }

    #[test]
    fn credit_overflow_rejected() {
        let alice = AccountId::new();
        let mut ledger = funded(&alice, Amount::MAX);
        assert!(matches!(
            ledger.credit(&weth(), &alice, 1),
            Err(LedgerError::Overflow { .. })
        ));
        assert_eq!(ledger.balance_of(&weth(), &alice), Amount::MAX);
    }

    #[test]
    fn assets_are_segregated() {
        let alice = AccountId::new();
        let usdc = AssetId::new("USDC").unwrap();
        let ledger = funded(&alice, 10);
        assert_eq!(ledger.balance_of(&usdc, &alice), 0);
    }

    proptest! {
        #[test]
        fn transfers_conserve_supply(start in 0u64..1_000_000, moves in proptest::collection::vec(0u64..2_000, 0..20)) {
            let (alice, bob) = (AccountId::new(), AccountId::new());
            let mut ledger = funded(&alice, start);
            for (i, amount) in moves.into_iter().enumerate() {
                let (from, to) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
                let _ = ledger.transfer(&weth(), &from, &to, amount);
            }
            prop_assert_eq!(
                ledger.balance_of(&weth(), &alice) + ledger.balance_of(&weth(), &bob),
                start
            );
        }
    }
}
