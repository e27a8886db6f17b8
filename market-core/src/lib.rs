//! Ticket Market Core
//!
//! Fixed-supply ticket sale with peer-to-peer swaps and a fee-bearing
//! resale market.
//!
//! # Architecture
//!
//! - **Ticket Ledger**: Ownership records plus a reverse holder index
//! - **Settlement Boundary**: Funds move through [`PaymentSettlement`], in
//!   the same step as the ownership change
//! - **Single Writer**: One actor task owns the marketplace and applies
//!   operations in mailbox order
//! - **Snapshots**: Sale and ticket states checkpointed to RocksDB
//!
//! # Invariants
//!
//! - One holder per ticket, one ticket per holder
//! - Unsold tickets carry no listing
//! - Ownership changes clear listings
//! - Failed operations leave ledger and balances untouched
//! - Resale proceeds + operator fee == resale price

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod primary;
pub mod resale;
pub mod settlement;
pub mod storage;
pub mod swap;
pub mod types;

// Re-exports
pub use actor::{spawn_market_actor, MarketHandle};
pub use config::Config;
pub use error::{Error, Result, SettlementError};
pub use ledger::TicketLedger;
pub use market::{MarketSnapshot, Marketplace};
pub use metrics::Metrics;
pub use resale::FeeSplit;
pub use settlement::{BalanceBook, PaymentSettlement, Transfer, TransferPurpose};
pub use storage::Storage;
pub use types::{EventKind, Identity, Listing, MarketEvent, Sale, TicketId, TicketState};
