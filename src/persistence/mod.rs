//! Trade history storage
//!
//! Used by the replay market to load trades and by backfill to save them.
//! Every store upserts by trade id and returns range queries ordered by time,
//! then by venue sequence id. Both ends of the range are inclusive.

mod jsonl;
mod memory;
mod postgres;

pub use jsonl::JsonLinesTradeStore;
pub use memory::MemoryTradeStore;
pub use postgres::PostgresTradeStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::common::errors::Result;
use crate::common::types::Trade;
use crate::config::types::StorageConfig;

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert trades, replacing any stored trade with the same id
    async fn put_trades(&self, trades: &[Trade]) -> Result<()>;

    /// Trades of `venue`/`product` with `start <= time <= end`
    async fn get_trades(
        &self,
        venue: &str,
        product: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>>;
}

pub type SharedTradeStore = Arc<dyn TradeStore>;

/// Open the store selected in configuration
pub async fn from_config(config: &StorageConfig) -> Result<SharedTradeStore> {
    let store: SharedTradeStore = match config {
        StorageConfig::Memory => {
            info!("Using in-memory trade store");
            Arc::new(MemoryTradeStore::new())
        }
        StorageConfig::JsonLines { path } => {
            info!(path = %path, "Using JSON-lines trade store");
            Arc::new(JsonLinesTradeStore::new(path))
        }
        StorageConfig::Postgres(db) => {
            info!("Using Postgres trade store");
            Arc::new(PostgresTradeStore::connect(db).await?)
        }
    };
    Ok(store)
}

/// Order trades by time, then by sequence id
pub(crate) fn sort_for_replay(trades: &mut [Trade]) {
    trades.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.sequence_id.cmp(&b.sequence_id))
    });
}

pub(crate) fn in_range(
    trade: &Trade,
    venue: &str,
    product: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    trade.venue == venue
        && trade.product == product
        && trade.timestamp >= start
        && trade.timestamp <= end
}
