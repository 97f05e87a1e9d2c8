use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, instrument, warn};

use super::paper::PaperAccount;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{HandlerRegistry, Market, TradeHandler, UpdateHandler};
use crate::common::types::{Balance, Trade};
use crate::persistence::SharedTradeStore;

/// Historical market: replays stored trades against a paper account
pub struct ReplayMarket {
    store: SharedTradeStore,
    venue: String,
    product: String,
    lookback: Duration,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    account: PaperAccount,
    trade_handlers: HandlerRegistry<dyn TradeHandler>,
    update_handlers: HandlerRegistry<dyn UpdateHandler>,
    /// Time of the trade being replayed, stamped on fills
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl ReplayMarket {
    /// Replay `venue`/`product` trades from the last `lookback`
    pub fn new(
        store: SharedTradeStore,
        venue: impl Into<String>,
        product: impl Into<String>,
        lookback: Duration,
        account: PaperAccount,
    ) -> Self {
        Self {
            store,
            venue: venue.into(),
            product: product.into(),
            lookback,
            range: None,
            account,
            trade_handlers: HandlerRegistry::new(),
            update_handlers: HandlerRegistry::new(),
            clock: Mutex::new(None),
        }
    }

    /// Replay a fixed range instead of the last `lookback`
    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.range = Some((start, end));
        self
    }

    fn replay_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.range.unwrap_or_else(|| {
            let end = Utc::now();
            (end - self.lookback, end)
        })
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(Utc::now)
    }

    fn advance_clock(&self, trade: &Trade) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) = Some(trade.timestamp);
    }

    async fn deliver_fills(&self) -> Result<()> {
        for update in self.account.take_pending() {
            self.update_handlers.deliver(&update).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Market for ReplayMarket {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn register_for_trades(&self, handler: Arc<dyn TradeHandler>) {
        self.trade_handlers.register(handler);
    }

    fn register_for_updates(&self, handler: Arc<dyn UpdateHandler>) {
        self.update_handlers.register(handler);
    }

    async fn balance(&self) -> Result<Balance> {
        Ok(self.account.balance())
    }

    async fn buy(&self, size: Decimal, price: Decimal) -> Result<()> {
        self.account.buy(size, price, self.now())
    }

    async fn sell(&self, size: Decimal, price: Decimal) -> Result<()> {
        self.account.sell(size, price, self.now())
    }

    #[instrument(skip(self), fields(venue = %self.venue, product = %self.product))]
    async fn run(&self) -> Result<()> {
        let (start, end) = self.replay_range();
        let trades = self
            .store
            .get_trades(&self.venue, &self.product, start, end)
            .await?;

        if trades.is_empty() {
            warn!(
                start = %start,
                end = %end,
                "No trades for the given duration, you might want to backfill first"
            );
            return Ok(());
        }

        if self.trade_handlers.is_empty() {
            warn!("Replaying without trade subscribers");
        }
        info!(
            count = trades.len(),
            subscribers = self.trade_handlers.len(),
            start = %start,
            end = %end,
            "Replaying trades"
        );
        for trade in &trades {
            self.advance_clock(trade);
            self.trade_handlers.deliver(trade).await?;
            self.deliver_fills().await?;
        }
        info!(count = trades.len(), "Replay finished");
        Ok(())
    }

    async fn backfill(&self, _until: DateTime<Utc>) -> Result<usize> {
        Err(TradeError::NotImplemented("backfill is not available when replaying"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::UpdateHandler;
    use crate::common::types::{Action, Side, Update};
    use crate::market::fees::FeeSchedule;
    use crate::persistence::{MemoryTradeStore, TradeStore};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn trade(seq: i64, seconds: i64, price: Decimal) -> Trade {
        Trade::new("coinbase", "BTC-USD", seq, price, dec!(1), at(seconds), Side::Buy)
    }

    async fn market_with(trades: &[Trade]) -> Arc<ReplayMarket> {
        let store = Arc::new(MemoryTradeStore::new());
        store.put_trades(trades).await.unwrap();
        let account = PaperAccount::new(Balance::new(dec!(0), dec!(1000)), FeeSchedule::free());
        Arc::new(
            ReplayMarket::new(store, "coinbase", "BTC-USD", Duration::hours(1), account)
                .with_range(at(0), at(3600)),
        )
    }

    /// Buys one unit on every trade, records the order of events
    struct BuyingRecorder {
        market: Arc<ReplayMarket>,
        events: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TradeHandler for BuyingRecorder {
        async fn handle_trade(&self, trade: &Trade) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("trade {}", trade.sequence_id));
            self.market.buy(dec!(1), trade.price).await
        }
    }

    #[async_trait]
    impl UpdateHandler for BuyingRecorder {
        async fn handle_update(&self, update: &Update) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("update {} {}", update.action, update.price));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fills_delivered_after_trade_dispatch() {
        let market = market_with(&[trade(2, 20, dec!(101)), trade(1, 10, dec!(100))]).await;
        let recorder = Arc::new(BuyingRecorder {
            market: market.clone(),
            events: std::sync::Mutex::new(Vec::new()),
        });
        market.register_for_trades(recorder.clone());
        market.register_for_updates(recorder.clone());

        market.run().await.unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["trade 1", "update BUY 100", "trade 2", "update BUY 101"]
        );
        assert_eq!(
            market.balance().await.unwrap(),
            Balance::new(dec!(2), dec!(799))
        );
    }

    #[tokio::test]
    async fn test_fill_stamped_with_replayed_time() {
        let market = market_with(&[trade(1, 10, dec!(100))]).await;
        market.advance_clock(&trade(1, 10, dec!(100)));

        market.buy(dec!(1), dec!(100)).await.unwrap();

        let pending = market.account.take_pending();
        assert_eq!(pending[0].timestamp, at(10));
        assert_eq!(pending[0].action, Action::Buy);
    }

    #[tokio::test]
    async fn test_empty_range_returns_cleanly() {
        let market = market_with(&[]).await;
        assert!(market.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_backfill_not_implemented() {
        let market = market_with(&[]).await;
        assert!(matches!(
            market.backfill(at(0)).await,
            Err(TradeError::NotImplemented(_))
        ));
    }

    #[tokio::test]
    async fn test_insufficient_currency_rejected() {
        let market = market_with(&[]).await;
        assert!(matches!(
            market.buy(dec!(20), dec!(100)).await,
            Err(TradeError::InsufficientBalance { .. })
        ));
    }
}
