//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `sale` - Sale parameters (single key)
//! - `tickets` - Ticket states (key: ticket id, big-endian)
//!
//! A snapshot is written in one `WriteBatch`, so a crash never leaves a
//! mix of two snapshots on disk.

use crate::{
    config::StorageConfig,
    error::{Error, Result},
    market::MarketSnapshot,
    types::{Sale, TicketState},
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

/// Column family names
const CF_SALE: &str = "sale";
const CF_TICKETS: &str = "tickets";

const SALE_KEY: &[u8] = b"sale";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);

        if config.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_SALE, Options::default()),
            ColumnFamilyDescriptor::new(CF_TICKETS, Self::cf_options_tickets()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db })
    }

    fn cf_options_tickets() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Write a full snapshot atomically
    pub fn save_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_sale = self.cf_handle(CF_SALE)?;
        batch.put_cf(cf_sale, SALE_KEY, bincode::serialize(&snapshot.sale)?);

        let cf_tickets = self.cf_handle(CF_TICKETS)?;
        for (slot, state) in snapshot.tickets.iter().enumerate() {
            let key = (slot as u32 + 1).to_be_bytes();
            batch.put_cf(cf_tickets, key, bincode::serialize(state)?);
        }

        self.db.write(batch)?;

        tracing::debug!(tickets = snapshot.tickets.len(), "Snapshot written");

        Ok(())
    }

    /// Load the last snapshot, `None` on a fresh database
    pub fn load_snapshot(&self) -> Result<Option<MarketSnapshot>> {
        let cf_sale = self.cf_handle(CF_SALE)?;
        let Some(raw_sale) = self.db.get_cf(cf_sale, SALE_KEY)? else {
            return Ok(None);
        };
        let sale: Sale = bincode::deserialize(&raw_sale)?;

        let cf_tickets = self.cf_handle(CF_TICKETS)?;
        let mut tickets = Vec::with_capacity(sale.total_tickets as usize);
        for item in self.db.iterator_cf(cf_tickets, IteratorMode::Start) {
            let (key, value) = item?;
            let id = u32::from_be_bytes(key[..].try_into().map_err(|_| {
                Error::Storage(format!("Malformed ticket key of {} bytes", key.len()))
            })?);

            if id as usize != tickets.len() + 1 {
                return Err(Error::InvariantViolation(format!(
                    "Ticket {} stored out of sequence",
                    id
                )));
            }
            if id > sale.total_tickets {
                break;
            }

            let state: TicketState = bincode::deserialize(&value)?;
            tickets.push(state);
        }

        Ok(Some(MarketSnapshot { sale, tickets }))
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}
