//! Payment settlement boundary
//!
//! The marketplace decides amounts and recipients; a [`PaymentSettlement`]
//! moves the funds. A batch either applies in full or not at all, and the
//! marketplace only commits its ledger mutation once the batch succeeded.
//!
//! [`BalanceBook`] is an in-memory implementation with per-identity
//! balances. Clones share the same book, so a host can keep one handle for
//! funding and inspection while the marketplace owns another.

use crate::{error::SettlementError, types::Identity};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Why funds move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPurpose {
    /// Primary sale revenue to the operator
    PrimarySale,
    /// Resale price minus fee, to the seller
    ResaleProceeds,
    /// Resale fee, to the operator
    ResaleFee,
}

/// Single settlement leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Payer
    pub from: Identity,
    /// Payee
    pub to: Identity,
    /// Amount in base units
    pub amount: Decimal,
    /// Purpose
    pub purpose: TransferPurpose,
}

impl Transfer {
    /// Create transfer leg
    pub fn new(from: Identity, to: Identity, amount: Decimal, purpose: TransferPurpose) -> Self {
        Self {
            from,
            to,
            amount,
            purpose,
        }
    }
}

/// External value-transfer collaborator
pub trait PaymentSettlement: Send {
    /// Apply every leg of `transfers`, or none of them
    fn settle(&mut self, transfers: &[Transfer]) -> Result<(), SettlementError>;

    /// Single-leg convenience
    fn transfer(
        &mut self,
        from: &Identity,
        to: &Identity,
        amount: Decimal,
        purpose: TransferPurpose,
    ) -> Result<(), SettlementError> {
        self.settle(&[Transfer::new(from.clone(), to.clone(), amount, purpose)])
    }
}

#[derive(Debug, Default)]
struct BookState {
    balances: HashMap<Identity, Decimal>,
    frozen: HashSet<Identity>,
    settled_batches: u64,
}

/// Shared in-memory balance book
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    inner: Arc<Mutex<BookState>>,
}

impl BalanceBook {
    /// Create empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the marketplace
    pub fn deposit(&self, account: &Identity, amount: Decimal) -> Result<(), SettlementError> {
        let mut state = self.inner.lock();
        let balance = state.balances.entry(account.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| overflow(account))?;
        Ok(())
    }

    /// Current balance, zero for unknown accounts
    pub fn balance_of(&self, account: &Identity) -> Decimal {
        self.inner
            .lock()
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Refuse every batch touching this account
    pub fn freeze(&self, account: &Identity) {
        self.inner.lock().frozen.insert(account.clone());
    }

    /// Lift a freeze
    pub fn unfreeze(&self, account: &Identity) {
        self.inner.lock().frozen.remove(account);
    }

    /// Number of batches applied so far
    pub fn settled_batches(&self) -> u64 {
        self.inner.lock().settled_batches
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Decimal {
        self.inner.lock().balances.values().copied().sum()
    }
}

impl PaymentSettlement for BalanceBook {
    fn settle(&mut self, transfers: &[Transfer]) -> Result<(), SettlementError> {
        let mut state = self.inner.lock();

        // Net every account first so the check covers the whole batch
        let mut net: HashMap<&Identity, Decimal> = HashMap::new();
        for leg in transfers {
            if leg.amount <= Decimal::ZERO {
                return Err(SettlementError::Rejected(format!(
                    "non-positive amount {} from {} to {}",
                    leg.amount, leg.from, leg.to
                )));
            }
            if leg.from == leg.to {
                return Err(SettlementError::Rejected(format!(
                    "transfer from {} to itself",
                    leg.from
                )));
            }
            for account in [&leg.from, &leg.to] {
                if state.frozen.contains(account) {
                    return Err(SettlementError::Rejected(format!(
                        "account {} is frozen",
                        account
                    )));
                }
            }

            let debit = net.entry(&leg.from).or_default();
            *debit = debit
                .checked_sub(leg.amount)
                .ok_or_else(|| overflow(&leg.from))?;
            let credit = net.entry(&leg.to).or_default();
            *credit = credit
                .checked_add(leg.amount)
                .ok_or_else(|| overflow(&leg.to))?;
        }

        // Compute every new balance before writing any of them
        let mut updated = Vec::with_capacity(net.len());
        for (account, delta) in net {
            let available = state.balances.get(account).copied().unwrap_or_default();
            let balance = available
                .checked_add(delta)
                .ok_or_else(|| overflow(account))?;
            if balance < Decimal::ZERO {
                return Err(SettlementError::InsufficientFunds {
                    account: account.clone(),
                    required: -delta,
                    available,
                });
            }
            updated.push((account, balance));
        }

        for (account, balance) in updated {
            state.balances.insert(account.clone(), balance);
        }
        state.settled_batches += 1;

        tracing::debug!(legs = transfers.len(), "Settlement batch applied");

        Ok(())
    }
}

fn overflow(account: &Identity) -> SettlementError {
    SettlementError::Rejected(format!("balance overflow on {}", account))
}
