use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Side, Symbol, UserId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("no cash account for user")]
    UnknownUser,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no share position for user")]
    NoPosition,
    #[error("insufficient shares")]
    InsufficientShares,
}

/// A user's cash holdings. `balance` is free to spend or withdraw;
/// `locked` is committed to a resting order. `balance + locked` is
/// conserved by every operation except `deposit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CashAccount {
    pub balance: Decimal,
    pub locked: Decimal,
}

impl CashAccount {
    fn check_invariant(&self) {
        debug_assert!(self.balance >= Decimal::ZERO, "cash balance went negative");
        debug_assert!(self.locked >= Decimal::ZERO, "cash locked went negative");
    }
}

/// A user's holding of one side of one symbol's shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharePosition {
    pub quantity: Decimal,
    pub locked: Decimal,
}

impl SharePosition {
    fn check_invariant(&self) {
        debug_assert!(self.quantity >= Decimal::ZERO, "share quantity went negative");
        debug_assert!(self.locked >= Decimal::ZERO, "share locked went negative");
    }
}

/// Owner of every user's cash and share balances. The only component
/// that is allowed to mutate a `CashAccount` or `SharePosition`; the
/// matcher and market manager compose these primitives, they never poke
/// the maps directly.
#[derive(Debug, Default)]
pub struct Ledger {
    cash: HashMap<UserId, CashAccount>,
    positions: HashMap<(UserId, Symbol, Side), SharePosition>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cash_account(&self, user: &UserId) -> Option<&CashAccount> {
        self.cash.get(user)
    }

    pub fn position(&self, user: &UserId, symbol: &Symbol, side: Side) -> Option<&SharePosition> {
        self.positions.get(&(user.clone(), symbol.clone(), side))
    }

    /// Credits `amount` to `user`'s balance, creating the account if this
    /// is their first deposit. The only operation that grows
    /// `balance + locked` system-wide.
    pub fn deposit(&mut self, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let account = self.cash.entry(user.clone()).or_default();
        account.balance += amount;
        account.check_invariant();
        Ok(())
    }

    pub fn lock_cash(&mut self, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.cash.get_mut(user).ok_or(LedgerError::UnknownUser)?;
        if amount > account.balance {
            return Err(LedgerError::InsufficientFunds);
        }
        account.balance -= amount;
        account.locked += amount;
        account.check_invariant();
        Ok(())
    }

    pub fn unlock_cash(&mut self, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.cash.get_mut(user).ok_or(LedgerError::UnknownUser)?;
        if amount > account.locked {
            return Err(LedgerError::InsufficientFunds);
        }
        account.locked -= amount;
        account.balance += amount;
        account.check_invariant();
        Ok(())
    }

    /// Decrements locked cash without crediting balance: the cash has
    /// left the system to pay a counterparty in a mint.
    pub fn debit_locked(&mut self, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.cash.get_mut(user).ok_or(LedgerError::UnknownUser)?;
        if amount > account.locked {
            return Err(LedgerError::InsufficientFunds);
        }
        account.locked -= amount;
        account.check_invariant();
        Ok(())
    }

    /// Unconditional credit to balance: sale proceeds or a winning-share
    /// payout.
    pub fn credit_cash(&mut self, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        let account = self.cash.get_mut(user).ok_or(LedgerError::UnknownUser)?;
        account.balance += amount;
        account.check_invariant();
        Ok(())
    }

    pub fn lock_shares(
        &mut self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        qty: Decimal,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .get_mut(&(user.clone(), symbol.clone(), side))
            .ok_or(LedgerError::NoPosition)?;
        if qty > position.quantity {
            return Err(LedgerError::InsufficientShares);
        }
        position.quantity -= qty;
        position.locked += qty;
        position.check_invariant();
        Ok(())
    }

    pub fn unlock_shares(
        &mut self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        qty: Decimal,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .get_mut(&(user.clone(), symbol.clone(), side))
            .ok_or(LedgerError::NoPosition)?;
        if qty > position.locked {
            return Err(LedgerError::InsufficientShares);
        }
        position.locked -= qty;
        position.quantity += qty;
        position.check_invariant();
        Ok(())
    }

    /// Decrements locked shares without crediting quantity: the seller's
    /// shares have been transferred away in a swap.
    pub fn debit_locked_shares(
        &mut self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        qty: Decimal,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .get_mut(&(user.clone(), symbol.clone(), side))
            .ok_or(LedgerError::NoPosition)?;
        if qty > position.locked {
            return Err(LedgerError::InsufficientShares);
        }
        position.locked -= qty;
        position.check_invariant();
        Ok(())
    }

    /// Unconditional credit to quantity: the inbound leg of a swap or a
    /// mint. Creates the position if this is the user's first share of
    /// (symbol, side).
    pub fn credit_shares(
        &mut self,
        user: &UserId,
        symbol: &Symbol,
        side: Side,
        qty: Decimal,
    ) -> Result<(), LedgerError> {
        let position = self
            .positions
            .entry((user.clone(), symbol.clone(), side))
            .or_default();
        position.quantity += qty;
        position.check_invariant();
        Ok(())
    }

    /// Administrative wipe used by `end_market`: both sides' positions
    /// for `symbol` are cleared for every user, independent of whatever
    /// quantity or locked amount they held. Not one of the arithmetic
    /// primitives above — settlement discards the position outright
    /// rather than moving it anywhere.
    pub fn clear_positions_for_symbol(&mut self, symbol: &Symbol) {
        self.positions.retain(|(_, sym, _), _| sym != symbol);
    }

    /// Re-checks every account and position against the invariants each
    /// primitive above already enforces one mutation at a time. Called by
    /// the dispatcher after every command as a last line of defense —
    /// tripping this is a bug in the matcher or market manager, not a bad
    /// request, so it panics rather than returning a `Result` (§7).
    pub fn assert_invariants(&self) {
        for (user, account) in &self.cash {
            assert!(account.balance >= Decimal::ZERO, "negative cash balance for {user}");
            assert!(account.locked >= Decimal::ZERO, "negative cash lock for {user}");
        }
        for ((user, symbol, side), position) in &self.positions {
            assert!(position.quantity >= Decimal::ZERO, "negative share quantity for {user}/{symbol}/{side}");
            assert!(position.locked >= Decimal::ZERO, "negative share lock for {user}/{symbol}/{side}");
        }
    }

    /// All (user, side, position) entries currently open for `symbol`,
    /// used by `end_market` to compute payouts before the positions are
    /// cleared.
    pub fn positions_for_symbol(
        &self,
        symbol: &Symbol,
    ) -> Vec<(UserId, Side, SharePosition)> {
        self.positions
            .iter()
            .filter(|((_, sym, _), _)| sym == symbol)
            .map(|((user, _, side), pos)| (user.clone(), *side, *pos))
            .collect()
    }
}
