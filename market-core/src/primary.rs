//! Primary sale at the fixed ticket price

use crate::{
    market::Marketplace,
    settlement::{PaymentSettlement, Transfer, TransferPurpose},
    types::{EventKind, Identity, MarketEvent, TicketId},
    Error, Result,
};
use rust_decimal::Decimal;

impl<S: PaymentSettlement> Marketplace<S> {
    /// Buy an unsold ticket at the sale price.
    ///
    /// Checks, in order: range, unsold, exact amount, payer holds nothing.
    /// The payment goes to the operator in the same step as the ownership
    /// change.
    pub fn buy_ticket(
        &mut self,
        id: TicketId,
        payer: &Identity,
        amount: Decimal,
    ) -> Result<MarketEvent> {
        if self.ledger.ticket_state(id)?.owner().is_some() {
            tracing::debug!(ticket = %id, payer = %payer, "Ticket already sold");
            return Err(Error::AlreadySold(id));
        }

        if amount != self.sale.ticket_price {
            return Err(Error::WrongPayment {
                expected: self.sale.ticket_price,
                offered: amount,
            });
        }

        if let Some(held) = self.ledger.ticket_of(payer) {
            return Err(Error::AlreadyHolding {
                identity: payer.clone(),
                ticket: held,
            });
        }

        let payment = Transfer::new(
            payer.clone(),
            self.sale.operator.clone(),
            amount,
            TransferPurpose::PrimarySale,
        );
        let buyer = payer.clone();
        self.commit(&[id], vec![payment], move |ledger| {
            ledger.assign_owner(id, buyer)
        })?;

        tracing::info!(ticket = %id, buyer = %payer, price = %amount, "Ticket purchased");

        Ok(MarketEvent::new(EventKind::TicketPurchased {
            ticket: id,
            buyer: payer.clone(),
            price: amount,
        }))
    }
}
