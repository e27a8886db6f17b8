//! Peer-to-peer swap handshake
//!
//! An owner records an offer naming the ticket they want. The owner of that
//! ticket accepts by naming the offerer's ticket; the offer must name the
//! accepter's ticket exactly. Swaps move no funds.

use crate::{
    market::Marketplace,
    settlement::PaymentSettlement,
    types::{EventKind, Identity, Listing, MarketEvent, TicketId},
    Error, Result,
};

impl<S: PaymentSettlement> Marketplace<S> {
    /// Offer the caller's ticket in exchange for `desired`.
    ///
    /// Replaces any earlier offer or resale listing on the caller's ticket.
    pub fn offer_swap(&mut self, desired: TicketId, caller: &Identity) -> Result<MarketEvent> {
        let target = self.ledger.ticket_state(desired)?;
        let own = self.ledger.held_by(caller)?;

        if desired == own {
            return Err(Error::InvalidSwapTarget(desired));
        }
        if target.owner().is_none() {
            tracing::debug!(ticket = %desired, "Swap target is unsold");
            return Err(Error::InvalidSwapTarget(desired));
        }

        self.ledger
            .set_listing(own, caller, Listing::SwapOffer(desired))?;

        tracing::info!(ticket = %own, offerer = %caller, desired = %desired, "Swap offered");

        Ok(MarketEvent::new(EventKind::SwapOffered {
            ticket: own,
            offerer: caller.clone(),
            desired,
        }))
    }

    /// Accept the offer standing on `offerer_ticket`.
    ///
    /// The offer must name the caller's ticket; on success the two owners
    /// trade tickets and both listings are cleared.
    pub fn accept_swap(
        &mut self,
        offerer_ticket: TicketId,
        caller: &Identity,
    ) -> Result<MarketEvent> {
        let offer = self.ledger.ticket_state(offerer_ticket)?;
        let own = self.ledger.held_by(caller)?;

        let offerer = match offer.owner() {
            Some(offerer) if offer.swap_offer() == Some(own) => offerer.clone(),
            _ => {
                return Err(Error::NoMatchingOffer {
                    offerer_ticket,
                    caller_ticket: own,
                })
            }
        };

        self.commit(&[offerer_ticket, own], Vec::new(), |ledger| {
            ledger.exchange(offerer_ticket, own)
        })?;

        tracing::info!(
            offerer_ticket = %offerer_ticket,
            offerer = %offerer,
            accepter_ticket = %own,
            accepter = %caller,
            "Swap completed"
        );

        Ok(MarketEvent::new(EventKind::SwapCompleted {
            offerer_ticket,
            offerer,
            accepter_ticket: own,
            accepter: caller.clone(),
        }))
    }
}
