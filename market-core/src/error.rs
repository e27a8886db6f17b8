//! Error types for the marketplace

use crate::types::{Identity, TicketId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Marketplace errors
///
/// Domain variants are precondition violations reported to the caller.
/// None of them leaves a partial effect behind.
#[derive(Error, Debug)]
pub enum Error {
    /// Ticket id outside `[1, total_tickets]`
    #[error("Ticket {ticket} out of range (1..={total_tickets})")]
    OutOfRange {
        /// Requested ticket
        ticket: TicketId,
        /// Size of the sale
        total_tickets: u32,
    },

    /// Ticket already has an owner
    #[error("Ticket {0} already sold")]
    AlreadySold(TicketId),

    /// Identity already holds a ticket
    #[error("{identity} already holds ticket {ticket}")]
    AlreadyHolding {
        /// Identity attempting to acquire a ticket
        identity: Identity,
        /// Ticket it currently holds
        ticket: TicketId,
    },

    /// Caller lacks authorization over the ticket
    #[error("{identity} does not own {}", ticket_label(.ticket))]
    NotOwner {
        /// Caller
        identity: Identity,
        /// Ticket the caller tried to act on, if any was named
        ticket: Option<TicketId>,
    },

    /// Amount does not exactly equal the required price
    #[error("Wrong payment: expected {expected}, got {offered}")]
    WrongPayment {
        /// Required amount
        expected: Decimal,
        /// Amount supplied
        offered: Decimal,
    },

    /// Ticket is not listed for resale
    #[error("Ticket {0} is not listed for resale")]
    NotListed(TicketId),

    /// No swap offer on the offerer's ticket names the caller's ticket
    #[error("No swap offer on ticket {offerer_ticket} for ticket {caller_ticket}")]
    NoMatchingOffer {
        /// Ticket the offer was expected on
        offerer_ticket: TicketId,
        /// Ticket the offer was expected to name
        caller_ticket: TicketId,
    },

    /// Buyer is the seller
    #[error("{0} cannot buy their own listing")]
    SelfPurchase(Identity),

    /// Resale price must be positive
    #[error("Invalid resale price: {0}")]
    InvalidPrice(Decimal),

    /// Swap target is the caller's own ticket or is unsold
    #[error("Invalid swap target: ticket {0}")]
    InvalidSwapTarget(TicketId),

    /// Resale price above the operator's markup cap
    #[error("Resale price {price} exceeds cap {cap}")]
    PriceCapExceeded {
        /// Requested price
        price: Decimal,
        /// Maximum allowed price
        cap: Decimal,
    },

    /// Settlement refused the transfer batch
    #[error("Settlement failed: {0}")]
    Settlement(#[from] SettlementError),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (corrupt snapshot, arithmetic overflow)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code, used for metric labels and client display
    pub fn code(&self) -> &'static str {
        match self {
            Error::OutOfRange { .. } => "out_of_range",
            Error::AlreadySold(_) => "already_sold",
            Error::AlreadyHolding { .. } => "already_holding",
            Error::NotOwner { .. } => "not_owner",
            Error::WrongPayment { .. } => "wrong_payment",
            Error::NotListed(_) => "not_listed",
            Error::NoMatchingOffer { .. } => "no_matching_offer",
            Error::SelfPurchase(_) => "self_purchase",
            Error::InvalidPrice(_) => "invalid_price",
            Error::InvalidSwapTarget(_) => "invalid_swap_target",
            Error::PriceCapExceeded { .. } => "price_cap_exceeded",
            Error::Settlement(SettlementError::InsufficientFunds { .. }) => "insufficient_funds",
            Error::Settlement(SettlementError::Rejected(_)) => "settlement_rejected",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    /// True for precondition violations caused by the caller's request
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Error::Storage(_)
                | Error::Serialization(_)
                | Error::InvariantViolation(_)
                | Error::Concurrency(_)
                | Error::Config(_)
                | Error::Io(_)
        )
    }
}

/// Errors reported by a [`PaymentSettlement`](crate::settlement::PaymentSettlement)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Payer balance does not cover the batch
    #[error("Insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        /// Account short of funds
        account: Identity,
        /// Net outflow the batch requires
        required: Decimal,
        /// Balance before the batch
        available: Decimal,
    },

    /// Settlement refused the batch for another reason
    #[error("Rejected: {0}")]
    Rejected(String),
}

fn ticket_label(ticket: &Option<TicketId>) -> String {
    match ticket {
        Some(t) => format!("ticket {}", t),
        None => "a ticket".to_string(),
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
