//! Marketplace context
//!
//! Ties together the sale parameters, the ticket ledger and the settlement
//! collaborator. Every operation runs to completion on `&mut self`; hosts
//! that share a marketplace across tasks go through
//! [`actor`](crate::actor).
//!
//! Operations live next to their channel:
//! [`primary`](crate::primary), [`swap`](crate::swap) and
//! [`resale`](crate::resale).
//!
//! # Example
//!
//! ```
//! use market_core::{BalanceBook, Identity, Marketplace, Sale, TicketId};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> market_core::Result<()> {
//! let sale = Sale {
//!     operator: Identity::new("operator"),
//!     ticket_price: Decimal::from(100),
//!     total_tickets: 10,
//!     fee_rate: Decimal::new(10, 2),
//!     max_markup: None,
//! };
//! let book = BalanceBook::new();
//! book.deposit(&Identity::new("alice"), Decimal::from(100))?;
//!
//! let mut market = Marketplace::new(sale, book.clone())?;
//! market.buy_ticket(TicketId::new(1), &Identity::new("alice"), Decimal::from(100))?;
//!
//! assert_eq!(market.ticket_of(&Identity::new("alice")), Some(TicketId::new(1)));
//! assert_eq!(book.balance_of(&Identity::new("operator")), Decimal::from(100));
//! # Ok(())
//! # }
//! ```

use crate::{
    ledger::TicketLedger,
    settlement::{PaymentSettlement, Transfer},
    types::{Identity, Sale, TicketId, TicketState},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Persistable marketplace state: the sale plus every ticket record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Sale parameters
    pub sale: Sale,
    /// Ticket states, slot `i` is ticket `i + 1`
    pub tickets: Vec<TicketState>,
}

/// Ticket marketplace
#[derive(Debug)]
pub struct Marketplace<S> {
    /// Immutable sale parameters
    pub(crate) sale: Sale,

    /// Ownership ledger
    pub(crate) ledger: TicketLedger,

    /// Value-transfer collaborator
    pub(crate) settlement: S,
}

impl<S: PaymentSettlement> Marketplace<S> {
    /// Initialize a sale with every ticket unsold
    pub fn new(sale: Sale, settlement: S) -> Result<Self> {
        sale.validate()?;

        tracing::info!(
            operator = %sale.operator,
            total_tickets = sale.total_tickets,
            ticket_price = %sale.ticket_price,
            fee_rate = %sale.fee_rate,
            "Sale initialized"
        );

        Ok(Self {
            ledger: TicketLedger::new(sale.total_tickets),
            sale,
            settlement,
        })
    }

    /// Rebuild a marketplace from a snapshot
    pub fn from_snapshot(snapshot: MarketSnapshot, settlement: S) -> Result<Self> {
        snapshot.sale.validate()?;

        if snapshot.tickets.len() != snapshot.sale.total_tickets as usize {
            return Err(Error::InvariantViolation(format!(
                "Snapshot has {} tickets, sale declares {}",
                snapshot.tickets.len(),
                snapshot.sale.total_tickets
            )));
        }

        let ledger = TicketLedger::from_states(snapshot.tickets)?;

        tracing::info!(
            total_tickets = snapshot.sale.total_tickets,
            sold = ledger.sold_count(),
            "Marketplace restored from snapshot"
        );

        Ok(Self {
            sale: snapshot.sale,
            ledger,
            settlement,
        })
    }

    /// Copy of the persistable state
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            sale: self.sale.clone(),
            tickets: self.ledger.states().to_vec(),
        }
    }

    /// Sale parameters
    pub fn sale(&self) -> &Sale {
        &self.sale
    }

    /// Party collecting sale revenue and resale fees
    pub fn operator(&self) -> &Identity {
        &self.sale.operator
    }

    /// Read-only ledger view
    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    /// Settlement collaborator
    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    /// Ticket state
    pub fn ticket_state(&self, id: TicketId) -> Result<&TicketState> {
        self.ledger.ticket_state(id)
    }

    /// Owner of a ticket, `None` if unsold
    pub fn owner_of(&self, id: TicketId) -> Result<Option<&Identity>> {
        self.ledger.owner_of(id)
    }

    /// Ticket held by an identity
    pub fn ticket_of(&self, identity: &Identity) -> Option<TicketId> {
        self.ledger.ticket_of(identity)
    }

    /// Apply `mutate` and settle `transfers` as one unit.
    ///
    /// The touched tickets are captured first; if settlement refuses the
    /// batch the ledger is restored before the error is returned. Legs that
    /// move nothing (zero amount, or payer and payee the same) are dropped.
    pub(crate) fn commit<F>(
        &mut self,
        touched: &[TicketId],
        transfers: Vec<Transfer>,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut TicketLedger) -> Result<()>,
    {
        let capture = self.ledger.capture(touched)?;
        mutate(&mut self.ledger)?;

        let transfers: Vec<Transfer> = transfers
            .into_iter()
            .filter(|t| !t.amount.is_zero() && t.from != t.to)
            .collect();
        if transfers.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.settlement.settle(&transfers) {
            tracing::warn!(error = %e, "Settlement failed, rolling back ledger");
            self.ledger.restore(capture);
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settlement::BalanceBook;
    use crate::types::Listing;
    use rust_decimal::Decimal;

    pub(crate) const PRICE: i64 = 100;

    pub(crate) fn sale(total_tickets: u32) -> Sale {
        Sale {
            operator: Identity::new("operator"),
            ticket_price: Decimal::from(PRICE),
            total_tickets,
            fee_rate: Decimal::new(10, 2),
            max_markup: None,
        }
    }

    /// Marketplace plus a shared handle on its balance book, with the
    /// given identities funded for 10 tickets each
    pub(crate) fn market(
        total_tickets: u32,
        funded: &[&str],
    ) -> (Marketplace<BalanceBook>, BalanceBook) {
        let book = BalanceBook::new();
        for name in funded {
            book.deposit(&Identity::new(*name), Decimal::from(PRICE * 10)).unwrap();
        }
        let market = Marketplace::new(sale(total_tickets), book.clone()).unwrap();
        (market, book)
    }

    #[test]
    fn test_new_rejects_invalid_sale() {
        let mut bad = sale(10);
        bad.total_tickets = 0;
        let result = Marketplace::new(bad, BalanceBook::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_operator_view() {
        let (market, _) = market(3, &[]);
        assert_eq!(market.operator(), &Identity::new("operator"));
        assert_eq!(market.sale().total_tickets, 3);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_index() {
        let (mut market, book) = market(4, &["alice", "bob"]);
        let (alice, bob) = (Identity::new("alice"), Identity::new("bob"));
        market.buy_ticket(TicketId::new(2), &alice, Decimal::from(PRICE)).unwrap();
        market.buy_ticket(TicketId::new(4), &bob, Decimal::from(PRICE)).unwrap();
        market.resale_ticket(Decimal::from(150), &bob).unwrap();

        let snapshot = market.snapshot();
        let restored = Marketplace::from_snapshot(snapshot.clone(), book).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.ticket_of(&alice), Some(TicketId::new(2)));
        assert_eq!(restored.check_resale(), vec![TicketId::new(4)]);
    }

    #[test]
    fn test_snapshot_ticket_count_mismatch() {
        let (market, book) = market(4, &[]);
        let mut snapshot = market.snapshot();
        snapshot.tickets.pop();

        let result = Marketplace::from_snapshot(snapshot, book);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_commit_rolls_back_on_settlement_failure() {
        let (mut market, book) = market(3, &[]);
        let alice = Identity::new("alice");
        book.deposit(&alice, Decimal::from(PRICE - 1)).unwrap();

        let result = market.buy_ticket(TicketId::new(1), &alice, Decimal::from(PRICE));

        assert!(matches!(result, Err(Error::Settlement(_))));
        assert_eq!(*market.ticket_state(TicketId::new(1)).unwrap(), TicketState::Unsold);
        assert_eq!(market.ticket_of(&alice), None);
        assert_eq!(book.balance_of(&alice), Decimal::from(PRICE - 1));
    }

    #[test]
    fn test_commit_skips_settlement_for_zero_amounts() {
        let book = BalanceBook::new();
        let mut free = sale(2);
        free.ticket_price = Decimal::ZERO;
        let mut market = Marketplace::new(free, book.clone()).unwrap();
        let alice = Identity::new("alice");

        market.buy_ticket(TicketId::new(1), &alice, Decimal::ZERO).unwrap();

        assert_eq!(market.ticket_of(&alice), Some(TicketId::new(1)));
        assert_eq!(book.settled_batches(), 0);
        assert_eq!(
            market.ticket_state(TicketId::new(1)).unwrap().listing(),
            Some(Listing::Unlisted)
        );
    }
}
