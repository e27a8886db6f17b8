//! Fee-bearing resale market
//!
//! Owners list at a price of their choosing, capped only when the sale
//! carries a markup limit. A buyer pays exactly the asking price; the
//! operator keeps `floor(price * fee_rate)` and the seller receives the
//! rest.

use crate::{
    market::Marketplace,
    settlement::{PaymentSettlement, Transfer, TransferPurpose},
    types::{EventKind, Identity, Listing, MarketEvent, TicketId},
    Error, Result,
};
use rust_decimal::{Decimal, RoundingStrategy};

/// How a resale price is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    /// Credited to the seller
    pub seller_proceeds: Decimal,
    /// Credited to the operator
    pub operator_fee: Decimal,
}

impl FeeSplit {
    /// Split `price` at `fee_rate`, flooring the fee to whole base units
    pub fn compute(price: Decimal, fee_rate: Decimal) -> Result<Self> {
        let raw_fee = price.checked_mul(fee_rate).ok_or_else(|| {
            Error::InvariantViolation(format!("Fee overflow: {} * {}", price, fee_rate))
        })?;
        let operator_fee = raw_fee.round_dp_with_strategy(0, RoundingStrategy::ToZero);

        Ok(Self {
            seller_proceeds: price - operator_fee,
            operator_fee,
        })
    }
}

impl<S: PaymentSettlement> Marketplace<S> {
    /// List the caller's ticket for resale at `price`.
    ///
    /// Replaces any swap offer or earlier listing on that ticket.
    pub fn resale_ticket(&mut self, price: Decimal, caller: &Identity) -> Result<MarketEvent> {
        let own = self.ledger.held_by(caller)?;

        if price <= Decimal::ZERO {
            return Err(Error::InvalidPrice(price));
        }
        if let Some(cap) = self.sale.resale_cap() {
            if price > cap {
                return Err(Error::PriceCapExceeded { price, cap });
            }
        }

        self.ledger.set_listing(own, caller, Listing::Resale(price))?;

        tracing::info!(ticket = %own, seller = %caller, price = %price, "Ticket listed for resale");

        Ok(MarketEvent::new(EventKind::ResaleListed {
            ticket: own,
            seller: caller.clone(),
            price,
        }))
    }

    /// Ticket ids currently listed for resale, ascending
    pub fn check_resale(&self) -> Vec<TicketId> {
        self.ledger.resale_listings()
    }

    /// Buy a resale listing.
    ///
    /// Checks, in order: range, listed, exact amount, buyer is not the
    /// seller, buyer holds nothing. Proceeds and fee settle in one batch
    /// with the ownership transfer.
    pub fn accept_resale(
        &mut self,
        id: TicketId,
        buyer: &Identity,
        amount: Decimal,
    ) -> Result<MarketEvent> {
        let state = self.ledger.ticket_state(id)?;
        let (seller, price) = match (state.owner(), state.resale_price()) {
            (Some(seller), Some(price)) => (seller.clone(), price),
            _ => return Err(Error::NotListed(id)),
        };

        if amount != price {
            return Err(Error::WrongPayment {
                expected: price,
                offered: amount,
            });
        }

        if *buyer == seller {
            return Err(Error::SelfPurchase(buyer.clone()));
        }

        if let Some(held) = self.ledger.ticket_of(buyer) {
            return Err(Error::AlreadyHolding {
                identity: buyer.clone(),
                ticket: held,
            });
        }

        let split = FeeSplit::compute(price, self.sale.fee_rate)?;
        let transfers = vec![
            Transfer::new(
                buyer.clone(),
                seller.clone(),
                split.seller_proceeds,
                TransferPurpose::ResaleProceeds,
            ),
            Transfer::new(
                buyer.clone(),
                self.sale.operator.clone(),
                split.operator_fee,
                TransferPurpose::ResaleFee,
            ),
        ];

        let new_owner = buyer.clone();
        let from = seller.clone();
        self.commit(&[id], transfers, move |ledger| {
            ledger.transfer_owner(id, &from, new_owner)
        })?;

        tracing::info!(
            ticket = %id,
            seller = %seller,
            buyer = %buyer,
            price = %price,
            fee = %split.operator_fee,
            "Resale completed"
        );

        Ok(MarketEvent::new(EventKind::ResaleCompleted {
            ticket: id,
            seller,
            buyer: buyer.clone(),
            price,
            seller_proceeds: split.seller_proceeds,
            operator_fee: split.operator_fee,
        }))
    }
}
