//! Core types for the marketplace
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money, in whole base units)
//! - Mutually exclusive listing states enforced by the type system

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Participant identity (opaque, comparable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create new identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Ticket number, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(u32);

impl TicketId {
    /// Create new ticket id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw ticket number
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TicketId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Market state of an owned ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Listing {
    /// Not offered anywhere
    Unlisted,
    /// Owner wants to exchange for the target ticket
    SwapOffer(TicketId),
    /// Owner sells at this price
    Resale(Decimal),
}

/// Per-ticket state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketState {
    /// Never sold
    Unsold,
    /// Held by an identity
    Owned {
        /// Current owner
        owner: Identity,
        /// Listing, only ever set by the owner
        listing: Listing,
    },
}

impl TicketState {
    /// Owner if sold
    pub fn owner(&self) -> Option<&Identity> {
        match self {
            TicketState::Unsold => None,
            TicketState::Owned { owner, .. } => Some(owner),
        }
    }

    /// Listing if sold
    pub fn listing(&self) -> Option<Listing> {
        match self {
            TicketState::Unsold => None,
            TicketState::Owned { listing, .. } => Some(*listing),
        }
    }

    /// Resale price if listed for resale
    pub fn resale_price(&self) -> Option<Decimal> {
        match self.listing() {
            Some(Listing::Resale(price)) => Some(price),
            _ => None,
        }
    }

    /// Swap target if a swap is offered
    pub fn swap_offer(&self) -> Option<TicketId> {
        match self.listing() {
            Some(Listing::SwapOffer(target)) => Some(target),
            _ => None,
        }
    }
}

/// Sale parameters, fixed at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    /// Receives primary sale revenue and resale fees
    pub operator: Identity,

    /// Fixed primary price
    pub ticket_price: Decimal,

    /// Number of tickets, ids `1..=total_tickets`
    pub total_tickets: u32,

    /// Operator's share of each resale, in `[0, 1]`
    pub fee_rate: Decimal,

    /// Resale cap as a multiple of `ticket_price`
    pub max_markup: Option<Decimal>,
}

impl Sale {
    /// Check sale invariants
    pub fn validate(&self) -> crate::Result<()> {
        if self.total_tickets == 0 {
            return Err(crate::Error::Config(
                "total_tickets must be at least 1".to_string(),
            ));
        }

        if self.ticket_price.is_sign_negative() {
            return Err(crate::Error::Config(format!(
                "ticket_price must be non-negative, got {}",
                self.ticket_price
            )));
        }

        if self.fee_rate < Decimal::ZERO || self.fee_rate > Decimal::ONE {
            return Err(crate::Error::Config(format!(
                "fee_rate must be within [0, 1], got {}",
                self.fee_rate
            )));
        }

        if let Some(markup) = self.max_markup {
            if markup < Decimal::ONE {
                return Err(crate::Error::Config(format!(
                    "max_markup must be at least 1, got {}",
                    markup
                )));
            }
            if self.ticket_price.checked_mul(markup).is_none() {
                return Err(crate::Error::Config(format!(
                    "resale cap {} * {} overflows",
                    self.ticket_price, markup
                )));
            }
        }

        Ok(())
    }

    /// Highest resale price allowed, if capped
    ///
    /// `validate` rejects a markup whose cap overflows, so a validated sale
    /// with `max_markup` set always yields `Some`.
    pub fn resale_cap(&self) -> Option<Decimal> {
        self.max_markup
            .and_then(|markup| self.ticket_price.checked_mul(markup))
    }
}

/// Record of a committed transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Commit time
    pub occurred_at: DateTime<Utc>,

    /// What happened
    pub kind: EventKind,
}

impl MarketEvent {
    /// Stamp a new event
    pub fn new(kind: EventKind) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    /// Operation name, used for metric labels
    pub fn operation(&self) -> &'static str {
        match self.kind {
            EventKind::TicketPurchased { .. } => "buy_ticket",
            EventKind::SwapOffered { .. } => "offer_swap",
            EventKind::SwapCompleted { .. } => "accept_swap",
            EventKind::ResaleListed { .. } => "resale_ticket",
            EventKind::ResaleCompleted { .. } => "accept_resale",
        }
    }
}

/// Transition kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Primary sale
    TicketPurchased {
        /// Ticket sold
        ticket: TicketId,
        /// New owner
        buyer: Identity,
        /// Amount paid to the operator
        price: Decimal,
    },

    /// Swap offer recorded
    SwapOffered {
        /// Offerer's ticket
        ticket: TicketId,
        /// Offerer
        offerer: Identity,
        /// Ticket wanted in exchange
        desired: TicketId,
    },

    /// Two owners exchanged tickets
    SwapCompleted {
        /// Ticket that carried the offer
        offerer_ticket: TicketId,
        /// Offerer, now holding `accepter_ticket`
        offerer: Identity,
        /// Ticket of the accepting owner
        accepter_ticket: TicketId,
        /// Accepter, now holding `offerer_ticket`
        accepter: Identity,
    },

    /// Ticket listed for resale
    ResaleListed {
        /// Ticket listed
        ticket: TicketId,
        /// Owner
        seller: Identity,
        /// Asking price
        price: Decimal,
    },

    /// Resale purchase
    ResaleCompleted {
        /// Ticket sold
        ticket: TicketId,
        /// Previous owner
        seller: Identity,
        /// New owner
        buyer: Identity,
        /// Amount paid by the buyer
        price: Decimal,
        /// Amount credited to the seller
        seller_proceeds: Decimal,
        /// Amount credited to the operator
        operator_fee: Decimal,
    },
}
