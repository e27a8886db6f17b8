//! Configuration for the marketplace

use crate::types::{Identity, Sale};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Marketplace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Sale parameters
    pub sale: SaleConfig,

    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Snapshot configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "ticket-market".to_string(),
            sale: SaleConfig::default(),
            actor: ActorConfig::default(),
            storage: StorageConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

/// Sale parameters, immutable once the marketplace starts
///
/// Amounts are whole base units written as strings in TOML, e.g.
/// `ticket_price = "100000000000000000"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Operator identity
    pub operator: String,

    /// Number of tickets
    pub total_tickets: u32,

    /// Primary price
    pub ticket_price: Decimal,

    /// Operator share of resale price
    pub fee_rate: Decimal,

    /// Optional resale cap as a multiple of the primary price
    #[serde(default)]
    pub max_markup: Option<Decimal>,
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            operator: "operator".to_string(),
            total_tickets: 100,
            ticket_price: Decimal::from(100_000_000_000_000_000u64), // 0.1 in 18-decimal units
            fee_rate: Decimal::new(10, 2),                            // 10% to the operator
            max_markup: None,
        }
    }
}

impl SaleConfig {
    /// Build validated sale parameters
    pub fn to_sale(&self) -> crate::Result<Sale> {
        if self.operator.trim().is_empty() {
            return Err(crate::Error::Config("operator must not be empty".to_string()));
        }

        let sale = Sale {
            operator: Identity::new(self.operator.clone()),
            ticket_price: self.ticket_price,
            total_tickets: self.total_tickets,
            fee_rate: self.fee_rate,
            max_markup: self.max_markup,
        };
        sale.validate()?;
        Ok(sale)
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/market"),
            write_buffer_size_mb: 16,
            enable_statistics: false,
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Persist snapshots at all
    pub enabled: bool,

    /// Snapshot every N committed operations (0 = only on demand and shutdown)
    pub interval_ops: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ops: 100,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(operator) = std::env::var("MARKET_OPERATOR") {
            config.sale.operator = operator;
        }

        if let Ok(total) = std::env::var("MARKET_TOTAL_TICKETS") {
            config.sale.total_tickets = total.parse().map_err(|e| {
                crate::Error::Config(format!("MARKET_TOTAL_TICKETS: {}", e))
            })?;
        }

        if let Ok(price) = std::env::var("MARKET_TICKET_PRICE") {
            config.sale.ticket_price = parse_decimal("MARKET_TICKET_PRICE", &price)?;
        }

        if let Ok(rate) = std::env::var("MARKET_FEE_RATE") {
            config.sale.fee_rate = parse_decimal("MARKET_FEE_RATE", &rate)?;
        }

        if let Ok(markup) = std::env::var("MARKET_MAX_MARKUP") {
            config.sale.max_markup = Some(parse_decimal("MARKET_MAX_MARKUP", &markup)?);
        }

        if let Ok(data_dir) = std::env::var("MARKET_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> crate::Result<()> {
        self.sale.to_sale()?;

        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_decimal(name: &str, value: &str) -> crate::Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| crate::Error::Config(format!("{}: {}", name, e)))
}
