//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the marketplace.
//!
//! # Metrics
//!
//! - `market_operations_total{operation}` - Committed operations by kind
//! - `market_rejections_total{reason}` - Rejected calls by error code
//! - `market_resale_fees_total` - Cumulative operator resale fees
//! - `market_resale_listings` - Tickets currently listed for resale
//! - `market_checkpoints_total` - Snapshots written to storage

use crate::types::{EventKind, MarketEvent};
use prometheus::{Counter, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;

/// Metrics collector
///
/// Owns its registry, so several marketplaces can run in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Committed operations
    pub operations_total: IntCounterVec,

    /// Rejected operations
    pub rejections_total: IntCounterVec,

    /// Resale fees collected, in base units.
    ///
    /// Prometheus samples are `f64`, so totals above 2^53 base units lose
    /// precision. The settlement book holds the exact figures.
    pub resale_fees_total: Counter,

    /// Current resale listings
    pub resale_listings: IntGauge,

    /// Snapshots written
    pub checkpoints_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("checkpoints_total", &self.checkpoints_total.get())
            .field("resale_listings", &self.resale_listings.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("market_operations_total", "Committed operations by kind"),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("market_rejections_total", "Rejected calls by error code"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let resale_fees_total = Counter::new(
            "market_resale_fees_total",
            "Cumulative operator resale fees in base units (approximate above 2^53)",
        )?;
        registry.register(Box::new(resale_fees_total.clone()))?;

        let resale_listings = IntGauge::new(
            "market_resale_listings",
            "Tickets currently listed for resale",
        )?;
        registry.register(Box::new(resale_listings.clone()))?;

        let checkpoints_total = IntCounter::new(
            "market_checkpoints_total",
            "Snapshots written to storage",
        )?;
        registry.register(Box::new(checkpoints_total.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            resale_fees_total,
            resale_listings,
            checkpoints_total,
            registry,
        })
    }

    /// Record a committed operation
    pub fn record_event(&self, event: &MarketEvent) {
        self.operations_total
            .with_label_values(&[event.operation()])
            .inc();

        if let EventKind::ResaleCompleted { operator_fee, .. } = &event.kind {
            self.resale_fees_total
                .inc_by(operator_fee.to_f64().unwrap_or_default());
        }
    }

    /// Record a rejected call
    pub fn record_rejection(&self, error: &crate::Error) {
        self.rejections_total
            .with_label_values(&[error.code()])
            .inc();
    }

    /// Update resale listing gauge
    pub fn set_resale_listings(&self, count: usize) {
        self.resale_listings.set(count as i64);
    }

    /// Record snapshot write
    pub fn record_checkpoint(&self) {
        self.checkpoints_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
