use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{in_range, sort_for_replay, TradeStore};
use crate::common::errors::Result;
use crate::common::types::Trade;

/// Trades kept in process memory, keyed by id
#[derive(Default)]
pub struct MemoryTradeStore {
    trades: RwLock<HashMap<String, Trade>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.read().await.is_empty()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn put_trades(&self, trades: &[Trade]) -> Result<()> {
        let mut stored = self.trades.write().await;
        for trade in trades {
            stored.insert(trade.id.clone(), trade.clone());
        }
        Ok(())
    }

    async fn get_trades(
        &self,
        venue: &str,
        product: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        let stored = self.trades.read().await;
        let mut trades: Vec<Trade> = stored
            .values()
            .filter(|trade| in_range(trade, venue, product, start, end))
            .cloned()
            .collect();
        sort_for_replay(&mut trades);
        Ok(trades)
    }
}
