//! Ticket ledger
//!
//! Authoritative record of ticket ownership and listing state.
//!
//! # Invariants
//!
//! - Ticket ids outside `[1, total_tickets]` are never stored
//! - Ownership is injective: the reverse index maps each holder to exactly
//!   one ticket, and every owned ticket appears in it
//! - Listings exist only on owned tickets and are cleared on every change
//!   of owner
//!
//! Mutators validate every precondition before writing, so a failed call
//! leaves the ledger untouched. Callers that pair a mutation with an
//! external effect use [`TicketLedger::capture`] and
//! [`TicketLedger::restore`] to undo it.

use crate::{
    types::{Identity, Listing, TicketId, TicketState},
    Error, Result,
};
use std::collections::HashMap;

/// Ticket ownership ledger
#[derive(Debug, Clone)]
pub struct TicketLedger {
    /// Slot `i` holds ticket `i + 1`
    tickets: Vec<TicketState>,

    /// Reverse index: holder -> ticket
    holders: HashMap<Identity, TicketId>,
}

/// Pre-mutation state of a set of tickets
#[derive(Debug, Clone)]
pub struct Capture {
    entries: Vec<(TicketId, TicketState)>,
}

impl TicketLedger {
    /// Create ledger with every ticket unsold
    pub fn new(total_tickets: u32) -> Self {
        Self {
            tickets: vec![TicketState::Unsold; total_tickets as usize],
            holders: HashMap::new(),
        }
    }

    /// Rebuild ledger from stored ticket states
    pub fn from_states(tickets: Vec<TicketState>) -> Result<Self> {
        let total = tickets.len() as u32;
        let mut holders = HashMap::new();

        for (slot, state) in tickets.iter().enumerate() {
            let id = TicketId::new(slot as u32 + 1);
            let TicketState::Owned { owner, listing } = state else {
                continue;
            };

            if let Some(previous) = holders.insert(owner.clone(), id) {
                return Err(Error::InvariantViolation(format!(
                    "{} holds tickets {} and {}",
                    owner, previous, id
                )));
            }

            match *listing {
                Listing::SwapOffer(target)
                    if target == id || target.get() == 0 || target.get() > total =>
                {
                    return Err(Error::InvariantViolation(format!(
                        "Ticket {} has invalid swap target {}",
                        id, target
                    )));
                }
                Listing::Resale(price) if price <= rust_decimal::Decimal::ZERO => {
                    return Err(Error::InvariantViolation(format!(
                        "Ticket {} listed at non-positive price {}",
                        id, price
                    )));
                }
                _ => {}
            }
        }

        Ok(Self { tickets, holders })
    }

    /// Number of tickets in the sale
    pub fn total_tickets(&self) -> u32 {
        self.tickets.len() as u32
    }

    /// Validate id and return its slot
    pub fn check_range(&self, id: TicketId) -> Result<usize> {
        let total = self.total_tickets();
        if id.get() == 0 || id.get() > total {
            return Err(Error::OutOfRange {
                ticket: id,
                total_tickets: total,
            });
        }
        Ok(id.get() as usize - 1)
    }

    /// Ticket state
    pub fn ticket_state(&self, id: TicketId) -> Result<&TicketState> {
        let slot = self.check_range(id)?;
        Ok(&self.tickets[slot])
    }

    /// Current owner, `None` if unsold
    pub fn owner_of(&self, id: TicketId) -> Result<Option<&Identity>> {
        Ok(self.ticket_state(id)?.owner())
    }

    /// Ticket held by an identity
    pub fn ticket_of(&self, identity: &Identity) -> Option<TicketId> {
        self.holders.get(identity).copied()
    }

    /// Ticket the caller must hold to act, or `NotOwner`
    pub fn held_by(&self, identity: &Identity) -> Result<TicketId> {
        self.ticket_of(identity).ok_or_else(|| Error::NotOwner {
            identity: identity.clone(),
            ticket: None,
        })
    }

    /// Tickets listed for resale, ascending
    pub fn resale_listings(&self) -> Vec<TicketId> {
        self.iter()
            .filter(|(_, state)| state.resale_price().is_some())
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of owned tickets
    pub fn sold_count(&self) -> usize {
        self.holders.len()
    }

    /// Iterate `(id, state)` in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (TicketId, &TicketState)> + '_ {
        self.tickets
            .iter()
            .enumerate()
            .map(|(slot, state)| (TicketId::new(slot as u32 + 1), state))
    }

    /// All ticket states in id order
    pub fn states(&self) -> &[TicketState] {
        &self.tickets
    }

    /// Give an unsold ticket its first owner
    pub(crate) fn assign_owner(&mut self, id: TicketId, identity: Identity) -> Result<()> {
        let slot = self.check_range(id)?;

        if self.tickets[slot].owner().is_some() {
            return Err(Error::AlreadySold(id));
        }
        self.ensure_not_holding(&identity)?;

        self.holders.insert(identity.clone(), id);
        self.tickets[slot] = TicketState::Owned {
            owner: identity,
            listing: Listing::Unlisted,
        };

        Ok(())
    }

    /// Move an owned ticket from `from` to `to`, clearing its listing
    pub(crate) fn transfer_owner(
        &mut self,
        id: TicketId,
        from: &Identity,
        to: Identity,
    ) -> Result<()> {
        let slot = self.check_range(id)?;

        if self.tickets[slot].owner() != Some(from) {
            return Err(Error::NotOwner {
                identity: from.clone(),
                ticket: Some(id),
            });
        }
        self.ensure_not_holding(&to)?;

        self.holders.remove(from);
        self.holders.insert(to.clone(), id);
        self.tickets[slot] = TicketState::Owned {
            owner: to,
            listing: Listing::Unlisted,
        };

        Ok(())
    }

    /// Swap the owners of two owned tickets, clearing both listings
    pub(crate) fn exchange(&mut self, a: TicketId, b: TicketId) -> Result<()> {
        let slot_a = self.check_range(a)?;
        let slot_b = self.check_range(b)?;

        if slot_a == slot_b {
            return Err(Error::InvalidSwapTarget(b));
        }

        let owner_a = self.tickets[slot_a]
            .owner()
            .cloned()
            .ok_or(Error::InvalidSwapTarget(a))?;
        let owner_b = self.tickets[slot_b]
            .owner()
            .cloned()
            .ok_or(Error::InvalidSwapTarget(b))?;

        self.holders.insert(owner_a.clone(), b);
        self.holders.insert(owner_b.clone(), a);
        self.tickets[slot_a] = TicketState::Owned {
            owner: owner_b,
            listing: Listing::Unlisted,
        };
        self.tickets[slot_b] = TicketState::Owned {
            owner: owner_a,
            listing: Listing::Unlisted,
        };

        Ok(())
    }

    /// Replace the listing on a ticket owned by `caller`
    pub(crate) fn set_listing(
        &mut self,
        id: TicketId,
        caller: &Identity,
        listing: Listing,
    ) -> Result<()> {
        let slot = self.check_range(id)?;

        match &mut self.tickets[slot] {
            TicketState::Owned {
                owner,
                listing: current,
            } if owner == caller => {
                *current = listing;
                Ok(())
            }
            _ => Err(Error::NotOwner {
                identity: caller.clone(),
                ticket: Some(id),
            }),
        }
    }

    /// Record the current state of the given tickets
    pub(crate) fn capture(&self, ids: &[TicketId]) -> Result<Capture> {
        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            entries.push((id, self.ticket_state(id)?.clone()));
        }
        Ok(Capture { entries })
    }

    /// Put captured tickets back and repair the reverse index
    pub(crate) fn restore(&mut self, capture: Capture) {
        for (id, _) in &capture.entries {
            let slot = id.get() as usize - 1;
            if let Some(owner) = self.tickets[slot].owner() {
                if self.holders.get(owner) == Some(id) {
                    self.holders.remove(owner);
                }
            }
        }

        for (id, state) in capture.entries {
            let slot = id.get() as usize - 1;
            if let Some(owner) = state.owner() {
                self.holders.insert(owner.clone(), id);
            }
            self.tickets[slot] = state;
        }
    }

    fn ensure_not_holding(&self, identity: &Identity) -> Result<()> {
        match self.ticket_of(identity) {
            Some(ticket) => Err(Error::AlreadyHolding {
                identity: identity.clone(),
                ticket,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn alice() -> Identity {
        Identity::new("alice")
    }

    fn bob() -> Identity {
        Identity::new("bob")
    }

    #[test]
    fn test_new_ledger_all_unsold() {
        let ledger = TicketLedger::new(5);
        assert_eq!(ledger.total_tickets(), 5);
        assert!(ledger.iter().all(|(_, s)| *s == TicketState::Unsold));
        assert_eq!(ledger.sold_count(), 0);
    }

    #[test]
    fn test_range_check() {
        let ledger = TicketLedger::new(3);
        assert!(matches!(
            ledger.ticket_state(TicketId::new(0)),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            ledger.ticket_state(TicketId::new(4)),
            Err(Error::OutOfRange { .. })
        ));
        assert!(ledger.ticket_state(TicketId::new(3)).is_ok());
    }

    #[test]
    fn test_assign_owner() {
        let mut ledger = TicketLedger::new(3);
        ledger.assign_owner(TicketId::new(2), alice()).unwrap();

        assert_eq!(ledger.owner_of(TicketId::new(2)).unwrap(), Some(&alice()));
        assert_eq!(ledger.ticket_of(&alice()), Some(TicketId::new(2)));

        let result = ledger.assign_owner(TicketId::new(2), bob());
        assert!(matches!(result, Err(Error::AlreadySold(_))));

        let result = ledger.assign_owner(TicketId::new(3), alice());
        assert!(matches!(result, Err(Error::AlreadyHolding { .. })));
        assert_eq!(*ledger.ticket_state(TicketId::new(3)).unwrap(), TicketState::Unsold);
    }

    #[test]
    fn test_transfer_owner_clears_listing() {
        let mut ledger = TicketLedger::new(3);
        let t1 = TicketId::new(1);
        ledger.assign_owner(t1, alice()).unwrap();
        ledger
            .set_listing(t1, &alice(), Listing::Resale(Decimal::from(10)))
            .unwrap();

        let result = ledger.transfer_owner(t1, &bob(), alice());
        assert!(matches!(result, Err(Error::NotOwner { .. })));

        ledger.transfer_owner(t1, &alice(), bob()).unwrap();
        assert_eq!(ledger.ticket_of(&alice()), None);
        assert_eq!(ledger.ticket_of(&bob()), Some(t1));
        assert_eq!(ledger.ticket_state(t1).unwrap().listing(), Some(Listing::Unlisted));
    }

    #[test]
    fn test_exchange() {
        let mut ledger = TicketLedger::new(3);
        let (t1, t2) = (TicketId::new(1), TicketId::new(2));
        ledger.assign_owner(t1, alice()).unwrap();
        ledger.assign_owner(t2, bob()).unwrap();
        ledger.set_listing(t1, &alice(), Listing::SwapOffer(t2)).unwrap();

        ledger.exchange(t1, t2).unwrap();

        assert_eq!(ledger.ticket_of(&alice()), Some(t2));
        assert_eq!(ledger.ticket_of(&bob()), Some(t1));
        assert_eq!(ledger.ticket_state(t1).unwrap().swap_offer(), None);
        assert_eq!(ledger.ticket_state(t2).unwrap().swap_offer(), None);
    }

    #[test]
    fn test_set_listing_requires_owner() {
        let mut ledger = TicketLedger::new(3);
        let t1 = TicketId::new(1);

        let result = ledger.set_listing(t1, &alice(), Listing::Unlisted);
        assert!(matches!(result, Err(Error::NotOwner { .. })));

        ledger.assign_owner(t1, alice()).unwrap();
        let result = ledger.set_listing(t1, &bob(), Listing::Resale(Decimal::ONE));
        assert!(matches!(result, Err(Error::NotOwner { .. })));
    }

    #[test]
    fn test_resale_listings_ascending() {
        let mut ledger = TicketLedger::new(5);
        for (n, who) in [(4, "d"), (1, "a"), (3, "c")] {
            let id = TicketId::new(n);
            let owner = Identity::new(who);
            ledger.assign_owner(id, owner.clone()).unwrap();
            ledger
                .set_listing(id, &owner, Listing::Resale(Decimal::from(n)))
                .unwrap();
        }

        assert_eq!(
            ledger.resale_listings(),
            vec![TicketId::new(1), TicketId::new(3), TicketId::new(4)]
        );
    }

    #[test]
    fn test_capture_restore_after_transfer() {
        let mut ledger = TicketLedger::new(3);
        let t1 = TicketId::new(1);
        ledger.assign_owner(t1, alice()).unwrap();
        ledger
            .set_listing(t1, &alice(), Listing::Resale(Decimal::from(5)))
            .unwrap();

        let capture = ledger.capture(&[t1]).unwrap();
        ledger.transfer_owner(t1, &alice(), bob()).unwrap();
        ledger.restore(capture);

        assert_eq!(ledger.ticket_of(&alice()), Some(t1));
        assert_eq!(ledger.ticket_of(&bob()), None);
        assert_eq!(ledger.ticket_state(t1).unwrap().resale_price(), Some(Decimal::from(5)));
    }

    #[test]
    fn test_capture_restore_after_assign_and_exchange() {
        let mut ledger = TicketLedger::new(3);
        let (t1, t2) = (TicketId::new(1), TicketId::new(2));

        let capture = ledger.capture(&[t1]).unwrap();
        ledger.assign_owner(t1, alice()).unwrap();
        ledger.restore(capture);
        assert_eq!(ledger.ticket_of(&alice()), None);
        assert_eq!(ledger.sold_count(), 0);

        ledger.assign_owner(t1, alice()).unwrap();
        ledger.assign_owner(t2, bob()).unwrap();
        let capture = ledger.capture(&[t1, t2]).unwrap();
        ledger.exchange(t1, t2).unwrap();
        ledger.restore(capture);
        assert_eq!(ledger.ticket_of(&alice()), Some(t1));
        assert_eq!(ledger.ticket_of(&bob()), Some(t2));
    }

    #[test]
    fn test_from_states_rejects_double_holding() {
        let owned = TicketState::Owned {
            owner: alice(),
            listing: Listing::Unlisted,
        };
        let result = TicketLedger::from_states(vec![owned.clone(), owned]);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_from_states_rejects_self_swap() {
        let state = TicketState::Owned {
            owner: alice(),
            listing: Listing::SwapOffer(TicketId::new(1)),
        };
        let result = TicketLedger::from_states(vec![state, TicketState::Unsold]);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_from_states_rebuilds_index() {
        let states = vec![
            TicketState::Unsold,
            TicketState::Owned {
                owner: bob(),
                listing: Listing::Resale(Decimal::from(7)),
            },
        ];
        let ledger = TicketLedger::from_states(states).unwrap();
        assert_eq!(ledger.ticket_of(&bob()), Some(TicketId::new(2)));
        assert_eq!(ledger.resale_listings(), vec![TicketId::new(2)]);
    }
}
