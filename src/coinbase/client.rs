//! Live Coinbase market: public trade feed, paper account for orders

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::messages::VENUE;
use super::rest::CoinbaseRestClient;
use super::websocket::CoinbaseFeed;
use crate::common::channels::create_feed_channel;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{HandlerRegistry, Market, TradeHandler, UpdateHandler};
use crate::common::types::{Balance, ConnectionStatus, FeedEvent};
use crate::config::types::{AppSettings, ExchangeConfig};
use crate::market::{BalanceCache, PaperAccount};
use crate::persistence::SharedTradeStore;

/// Live market for one Coinbase product
///
/// Trades come from the public WebSocket feed. Orders are filled by a
/// [`PaperAccount`], their fills delivered right after the trade that
/// triggered them.
pub struct CoinbaseMarket {
    product: String,
    feed: CoinbaseFeed,
    rest: CoinbaseRestClient,
    store: Option<SharedTradeStore>,
    account: PaperAccount,
    cache: BalanceCache,
    trade_handlers: HandlerRegistry<dyn TradeHandler>,
    update_handlers: HandlerRegistry<dyn UpdateHandler>,
}

impl CoinbaseMarket {
    pub fn new(
        exchange: &ExchangeConfig,
        settings: &AppSettings,
        account: PaperAccount,
    ) -> Result<Self> {
        let rest = CoinbaseRestClient::with_timeout(
            &exchange.rest_url,
            Duration::from_secs(settings.request_timeout_seconds),
        )?;
        let feed = CoinbaseFeed::new(&exchange.websocket_url, &exchange.product).with_reconnect(
            Duration::from_millis(settings.reconnect_delay_ms),
            settings.max_reconnect_attempts,
        );

        Ok(Self {
            product: exchange.product.clone(),
            feed,
            rest,
            store: None,
            account,
            cache: BalanceCache::new(),
            trade_handlers: HandlerRegistry::new(),
            update_handlers: HandlerRegistry::new(),
        })
    }

    /// Trade store used by backfill, and to record live trades
    pub fn with_store(mut self, store: SharedTradeStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    async fn deliver_fills(&self) -> Result<()> {
        for update in self.account.take_pending() {
            self.cache.invalidate();
            self.update_handlers.deliver(&update).await?;
        }
        Ok(())
    }

    async fn handle_event(&self, event: FeedEvent) -> Result<()> {
        match event {
            FeedEvent::Trade(trade) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.put_trades(std::slice::from_ref(&trade)).await {
                        warn!(error = %e, trade_id = %trade.id, "Could not record trade");
                    }
                }
                self.trade_handlers.deliver(&trade).await?;
                self.deliver_fills().await?;
            }
            FeedEvent::ConnectionStatus(ConnectionStatus::Connected) => {
                info!(product = %self.product, "Market feed connected");
            }
            FeedEvent::ConnectionStatus(status) => {
                warn!(status = ?status, "Market feed status changed");
            }
            FeedEvent::Heartbeat => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Market for CoinbaseMarket {
    fn name(&self) -> &'static str {
        VENUE
    }

    fn register_for_trades(&self, handler: Arc<dyn TradeHandler>) {
        self.trade_handlers.register(handler);
    }

    fn register_for_updates(&self, handler: Arc<dyn UpdateHandler>) {
        self.update_handlers.register(handler);
    }

    async fn balance(&self) -> Result<Balance> {
        if let Some(balance) = self.cache.get() {
            return Ok(balance);
        }
        let balance = self.account.balance();
        self.cache.set(balance);
        Ok(balance)
    }

    async fn buy(&self, size: Decimal, price: Decimal) -> Result<()> {
        self.cache.invalidate();
        self.account.buy(size, price, Utc::now())
    }

    async fn sell(&self, size: Decimal, price: Decimal) -> Result<()> {
        self.cache.invalidate();
        self.account.sell(size, price, Utc::now())
    }

    #[instrument(skip(self), fields(product = %self.product))]
    async fn run(&self) -> Result<()> {
        let (sender, mut receiver) = create_feed_channel();

        // The feed stops on its own once the receiver below is dropped
        let feed = self.feed.run(sender);
        tokio::pin!(feed);
        let mut feed_done = false;

        loop {
            tokio::select! {
                result = &mut feed, if !feed_done => {
                    feed_done = true;
                    if let Err(e) = result {
                        // Drain what was already received before reporting
                        while let Ok(event) = receiver.try_recv() {
                            self.handle_event(event).await?;
                        }
                        return Err(e);
                    }
                }
                event = receiver.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => {
                        debug!("Market feed closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    #[instrument(skip(self), fields(product = %self.product))]
    async fn backfill(&self, until: DateTime<Utc>) -> Result<usize> {
        let store = self.store.as_ref().ok_or_else(|| {
            TradeError::Configuration("backfill needs a trade store".to_string())
        })?;

        info!(until = %until, "Backfilling {}.{}", VENUE, self.product);

        let mut cursor: Option<String> = None;
        let mut total = 0;
        loop {
            let page = self.rest.list_trades(&self.product, cursor.as_deref()).await?;
            if page.trades.is_empty() {
                break;
            }

            store.put_trades(&page.trades).await?;
            total += page.trades.len();

            // Pages are newest first, the last entry is the oldest
            let oldest = page.trades.last().map(|t| t.timestamp).unwrap_or(until);
            let hours_left = (oldest - until).num_seconds() as f64 / 3600.0;
            info!(
                total,
                hours_left = %format!("{:.2}", hours_left.max(0.0)),
                "Saved trades"
            );

            if oldest < until {
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(total, "Backfill finished");
        Ok(total)
    }
}
