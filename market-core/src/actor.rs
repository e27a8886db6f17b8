//! Actor-based concurrency for the marketplace
//!
//! Implements the single-writer pattern using Tokio actors:
//! - One task owns the [`Marketplace`], so operations are applied one at a
//!   time in mailbox order
//! - Async message passing with backpressure
//! - Snapshots are checkpointed to storage every `interval_ops` committed
//!   operations, on request and on shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               MarketHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              MarketActor (Single Task)                │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ Marketplace<S>: ledger + settlement            │  │
//! │  │ Metrics: operations, rejections, listings      │  │
//! │  └────────────────────────────────────────────────┘  │
//! │                       │                               │
//! │                       ▼                               │
//! │           Storage::save_snapshot()                    │
//! │          (atomic write to RocksDB)                    │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::Config,
    market::{MarketSnapshot, Marketplace},
    metrics::Metrics,
    settlement::PaymentSettlement,
    storage::Storage,
    types::{Identity, MarketEvent, Sale, TicketId, TicketState},
    Error, Result,
};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the market actor
#[derive(Debug)]
pub enum MarketMessage {
    /// Primary purchase
    BuyTicket {
        ticket: TicketId,
        payer: Identity,
        amount: Decimal,
        response: oneshot::Sender<Result<MarketEvent>>,
    },

    /// Record a swap offer
    OfferSwap {
        desired: TicketId,
        caller: Identity,
        response: oneshot::Sender<Result<MarketEvent>>,
    },

    /// Accept a swap offer
    AcceptSwap {
        offerer_ticket: TicketId,
        caller: Identity,
        response: oneshot::Sender<Result<MarketEvent>>,
    },

    /// List the caller's ticket for resale
    ResaleTicket {
        price: Decimal,
        caller: Identity,
        response: oneshot::Sender<Result<MarketEvent>>,
    },

    /// Buy a listed ticket
    AcceptResale {
        ticket: TicketId,
        buyer: Identity,
        amount: Decimal,
        response: oneshot::Sender<Result<MarketEvent>>,
    },

    /// Tickets listed for resale
    CheckResale {
        response: oneshot::Sender<Vec<TicketId>>,
    },

    /// Ticket state
    GetTicketState {
        ticket: TicketId,
        response: oneshot::Sender<Result<TicketState>>,
    },

    /// Ticket held by an identity
    GetTicketOf {
        identity: Identity,
        response: oneshot::Sender<Option<TicketId>>,
    },

    /// Sale parameters
    GetSale { response: oneshot::Sender<Sale> },

    /// Copy of the persistable state
    Snapshot {
        response: oneshot::Sender<MarketSnapshot>,
    },

    /// Write a snapshot now
    Checkpoint {
        response: oneshot::Sender<Result<()>>,
    },

    /// Checkpoint and stop the actor
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns the marketplace
#[derive(Debug)]
pub struct MarketActor<S> {
    /// Marketplace state
    market: Marketplace<S>,

    /// Snapshot backend, `None` for in-memory operation
    storage: Option<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<MarketMessage>,

    /// Metrics collector
    metrics: Metrics,

    /// Committed operations between automatic checkpoints (0 = never)
    checkpoint_interval: u64,

    /// Committed operations since the last checkpoint
    ops_since_checkpoint: u64,
}

impl<S: PaymentSettlement + 'static> MarketActor<S> {
    /// Create new actor
    pub fn new(
        market: Marketplace<S>,
        storage: Option<Storage>,
        mailbox: mpsc::Receiver<MarketMessage>,
        metrics: Metrics,
        checkpoint_interval: u64,
    ) -> Self {
        metrics.set_resale_listings(market.check_resale().len());

        Self {
            market,
            storage,
            mailbox,
            metrics,
            checkpoint_interval,
            ops_since_checkpoint: 0,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let MarketMessage::Shutdown { response } = msg {
                let result = self.shutdown();
                let _ = response.send(result);
                return;
            }
            self.handle_message(msg);
        }

        // Every handle dropped
        if let Err(e) = self.shutdown() {
            tracing::error!("Error writing final snapshot: {}", e);
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: MarketMessage) {
        match msg {
            MarketMessage::BuyTicket {
                ticket,
                payer,
                amount,
                response,
            } => {
                let result = self.market.buy_ticket(ticket, &payer, amount);
                let _ = response.send(self.observe(result));
            }

            MarketMessage::OfferSwap {
                desired,
                caller,
                response,
            } => {
                let result = self.market.offer_swap(desired, &caller);
                let _ = response.send(self.observe(result));
            }

            MarketMessage::AcceptSwap {
                offerer_ticket,
                caller,
                response,
            } => {
                let result = self.market.accept_swap(offerer_ticket, &caller);
                let _ = response.send(self.observe(result));
            }

            MarketMessage::ResaleTicket {
                price,
                caller,
                response,
            } => {
                let result = self.market.resale_ticket(price, &caller);
                let _ = response.send(self.observe(result));
            }

            MarketMessage::AcceptResale {
                ticket,
                buyer,
                amount,
                response,
            } => {
                let result = self.market.accept_resale(ticket, &buyer, amount);
                let _ = response.send(self.observe(result));
            }

            MarketMessage::CheckResale { response } => {
                let _ = response.send(self.market.check_resale());
            }

            MarketMessage::GetTicketState { ticket, response } => {
                let result = self.market.ticket_state(ticket).cloned();
                let _ = response.send(result);
            }

            MarketMessage::GetTicketOf { identity, response } => {
                let _ = response.send(self.market.ticket_of(&identity));
            }

            MarketMessage::GetSale { response } => {
                let _ = response.send(self.market.sale().clone());
            }

            MarketMessage::Snapshot { response } => {
                let _ = response.send(self.market.snapshot());
            }

            MarketMessage::Checkpoint { response } => {
                let _ = response.send(self.checkpoint());
            }

            MarketMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }

    /// Update metrics and checkpoint after an operation
    fn observe(&mut self, result: Result<MarketEvent>) -> Result<MarketEvent> {
        match &result {
            Ok(event) => {
                self.metrics.record_event(event);
                self.metrics
                    .set_resale_listings(self.market.check_resale().len());

                self.ops_since_checkpoint += 1;
                if self.checkpoint_interval > 0
                    && self.ops_since_checkpoint >= self.checkpoint_interval
                {
                    if let Err(e) = self.checkpoint() {
                        tracing::error!("Error writing checkpoint: {}", e);
                    }
                }
            }
            Err(e) => {
                self.metrics.record_rejection(e);
                if e.is_rejection() {
                    tracing::debug!(reason = e.code(), "Operation rejected: {}", e);
                } else {
                    tracing::error!(reason = e.code(), "Operation failed: {}", e);
                }
            }
        }

        result
    }

    /// Persist the current snapshot, if storage is attached
    fn checkpoint(&mut self) -> Result<()> {
        let Some(storage) = &self.storage else {
            tracing::debug!("No storage attached, skipping checkpoint");
            return Ok(());
        };

        storage.save_snapshot(&self.market.snapshot())?;
        self.metrics.record_checkpoint();
        self.ops_since_checkpoint = 0;

        tracing::info!(
            sold = self.market.ledger().sold_count(),
            listed = self.market.check_resale().len(),
            "Checkpoint written"
        );

        Ok(())
    }

    /// Final checkpoint, then release storage
    fn shutdown(&mut self) -> Result<()> {
        let result = self.checkpoint();
        if let Some(storage) = self.storage.take() {
            storage.close()?;
        }
        tracing::info!("Market actor stopped");
        result
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct MarketHandle {
    sender: mpsc::Sender<MarketMessage>,
}

impl MarketHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<MarketMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> MarketMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Buy an unsold ticket at the sale price
    pub async fn buy_ticket(
        &self,
        ticket: TicketId,
        payer: Identity,
        amount: Decimal,
    ) -> Result<MarketEvent> {
        self.request(|response| MarketMessage::BuyTicket {
            ticket,
            payer,
            amount,
            response,
        })
        .await?
    }

    /// Offer the caller's ticket in exchange for `desired`
    pub async fn offer_swap(&self, desired: TicketId, caller: Identity) -> Result<MarketEvent> {
        self.request(|response| MarketMessage::OfferSwap {
            desired,
            caller,
            response,
        })
        .await?
    }

    /// Accept the offer standing on `offerer_ticket`
    pub async fn accept_swap(
        &self,
        offerer_ticket: TicketId,
        caller: Identity,
    ) -> Result<MarketEvent> {
        self.request(|response| MarketMessage::AcceptSwap {
            offerer_ticket,
            caller,
            response,
        })
        .await?
    }

    /// List the caller's ticket for resale
    pub async fn resale_ticket(&self, price: Decimal, caller: Identity) -> Result<MarketEvent> {
        self.request(|response| MarketMessage::ResaleTicket {
            price,
            caller,
            response,
        })
        .await?
    }

    /// Buy a ticket listed for resale
    pub async fn accept_resale(
        &self,
        ticket: TicketId,
        buyer: Identity,
        amount: Decimal,
    ) -> Result<MarketEvent> {
        self.request(|response| MarketMessage::AcceptResale {
            ticket,
            buyer,
            amount,
            response,
        })
        .await?
    }

    /// Tickets listed for resale, ascending
    pub async fn check_resale(&self) -> Result<Vec<TicketId>> {
        self.request(|response| MarketMessage::CheckResale { response })
            .await
    }

    /// Ticket state
    pub async fn ticket_state(&self, ticket: TicketId) -> Result<TicketState> {
        self.request(|response| MarketMessage::GetTicketState { ticket, response })
            .await?
    }

    /// Ticket held by an identity
    pub async fn ticket_of(&self, identity: Identity) -> Result<Option<TicketId>> {
        self.request(|response| MarketMessage::GetTicketOf { identity, response })
            .await
    }

    /// Sale parameters
    pub async fn sale(&self) -> Result<Sale> {
        self.request(|response| MarketMessage::GetSale { response })
            .await
    }

    /// Operator identity
    pub async fn operator(&self) -> Result<Identity> {
        Ok(self.sale().await?.operator)
    }

    /// Copy of the persistable state
    pub async fn snapshot(&self) -> Result<MarketSnapshot> {
        self.request(|response| MarketMessage::Snapshot { response })
            .await
    }

    /// Write a snapshot immediately
    pub async fn checkpoint(&self) -> Result<()> {
        self.request(|response| MarketMessage::Checkpoint { response })
            .await?
    }

    /// Checkpoint and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| MarketMessage::Shutdown { response })
            .await?
    }
}

/// Spawn the market actor
pub fn spawn_market_actor<S>(
    market: Marketplace<S>,
    storage: Option<Storage>,
    metrics: Metrics,
    config: &Config,
) -> MarketHandle
where
    S: PaymentSettlement + 'static,
{
    let (tx, rx) = mpsc::channel(config.actor.mailbox_capacity); // Bounded channel for backpressure

    let storage = if config.snapshot.enabled { storage } else { None };
    let actor = MarketActor::new(market, storage, rx, metrics, config.snapshot.interval_ops);

    tokio::spawn(async move {
        actor.run().await;
    });

    MarketHandle::new(tx)
}
