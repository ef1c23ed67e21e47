//! In-process currency provider.
//!
//! [`MemoryLedger`] keeps balances in a [`DashMap`]. It backs the simulation
//! binary and every engine test, and can be switched off or told to fail
//! deposits to exercise the compensation paths.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use dashmap::DashMap;

use lixi_core::error::CurrencyError;
use lixi_core::money::format_short;
use lixi_core::traits::CurrencyProvider;
use lixi_core::types::{AccountId, Amount, CurrencyKind};

#[derive(Debug)]
pub struct MemoryLedger {
    kind: CurrencyKind,
    balances: DashMap<AccountId, Amount>,
    available: AtomicBool,
    failing_deposits: AtomicU32,
}

impl MemoryLedger {
    pub fn new(kind: CurrencyKind) -> Self {
        Self {
            kind,
            balances: DashMap::new(),
            available: AtomicBool::new(true),
            failing_deposits: AtomicU32::new(0),
        }
    }

    pub fn set_balance(&self, account: &AccountId, amount: Amount) {
        self.balances.insert(*account, amount);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `count` deposits fail with a backend error.
    pub fn fail_next_deposits(&self, count: u32) {
        self.failing_deposits.store(count, Ordering::SeqCst);
    }

    /// Sum of every balance held.
    pub fn total(&self) -> Amount {
        self.balances
            .iter()
            .map(|e| *e.value())
            .fold(Amount::ZERO, |acc, v| acc.checked_add(v).unwrap_or(acc))
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_deposits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl CurrencyProvider for MemoryLedger {
    fn kind(&self) -> CurrencyKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn balance(&self, account: &AccountId) -> Result<Amount, CurrencyError> {
        if !self.is_available() {
            return Err(CurrencyError::Unavailable);
        }
        Ok(self.balances.get(account).map(|b| *b).unwrap_or(Amount::ZERO))
    }

    fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<(), CurrencyError> {
        if !self.is_available() {
            return Err(CurrencyError::Unavailable);
        }
        let mut balance = self.balances.entry(*account).or_default();
        let current = *balance;
        *balance = current
            .checked_sub(amount)
            .ok_or_else(|| CurrencyError::Rejected(format!("balance {current} below {amount}")))?;
        Ok(())
    }

    fn deposit(&self, account: &AccountId, amount: Amount) -> Result<(), CurrencyError> {
        if !self.is_available() {
            return Err(CurrencyError::Unavailable);
        }
        if self.take_injected_failure() {
            return Err(CurrencyError::Backend("injected deposit failure".into()));
        }
        let mut balance = self.balances.entry(*account).or_default();
        let current = *balance;
        *balance = current
            .checked_add(amount)
            .ok_or_else(|| CurrencyError::Backend("balance overflow".into()))?;
        Ok(())
    }

    fn format(&self, amount: Amount) -> String {
        match self.kind {
            CurrencyKind::Primary => format!("${}", format_short(amount)),
            CurrencyKind::Points => format!("{} points", format_short(amount)),
        }
    }
}
