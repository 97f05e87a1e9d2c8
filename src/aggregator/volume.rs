use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{sort_by_time, Aggregator, BarPublisher};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{BarHandler, BarIndexReceiver, TradeHandler};
use crate::common::types::{Bar, Trade};

/// Windows closed by accumulated volume.
///
/// A window closes once its volume reaches the threshold with more than
/// `min_trades` trades in it, or as soon as it holds more than `max_trades`
/// trades whatever the volume.
pub struct VolumeAggregator {
    threshold: Decimal,
    min_trades: usize,
    max_trades: usize,
    window: Mutex<VolumeWindow>,
    publisher: BarPublisher,
}

#[derive(Default)]
struct VolumeWindow {
    volume: Decimal,
    trades: Vec<Trade>,
    /// Time of the trade that closed the previous window
    reset_at: Option<DateTime<Utc>>,
}

impl VolumeAggregator {
    pub fn new(threshold: Decimal, min_trades: usize, max_trades: usize) -> Result<Self> {
        if threshold <= Decimal::ZERO {
            return Err(TradeError::Configuration(format!(
                "volume threshold must be positive, got {}",
                threshold
            )));
        }
        if max_trades < min_trades {
            return Err(TradeError::Configuration(format!(
                "max_trades ({}) is below min_trades ({})",
                max_trades, min_trades
            )));
        }
        Ok(Self {
            threshold,
            min_trades,
            max_trades,
            window: Mutex::new(VolumeWindow::default()),
            publisher: BarPublisher::new(),
        })
    }

    fn should_close(&self, window: &VolumeWindow) -> bool {
        let count = window.trades.len();
        (window.volume >= self.threshold && count > self.min_trades) || count > self.max_trades
    }
}

#[async_trait]
impl TradeHandler for VolumeAggregator {
    async fn handle_trade(&self, trade: &Trade) -> Result<()> {
        let mut window = self.window.lock().await;

        let reset_at = *window.reset_at.get_or_insert(trade.timestamp);
        window.volume += trade.size;
        window.trades.push(trade.clone());

        if !self.should_close(&window) {
            return Ok(());
        }

        let mut trades = std::mem::take(&mut window.trades);
        window.volume = Decimal::ZERO;
        window.reset_at = Some(trade.timestamp);

        sort_by_time(&mut trades);
        let Some(start) = trades.first().map(|t| t.timestamp) else {
            return Ok(());
        };
        if let Some(bar) = Bar::from_sorted_trades(start, &trades) {
            debug!(
                seconds = (trade.timestamp - reset_at).num_milliseconds() as f64 / 1000.0,
                volume = %self.threshold,
                trades = trades.len(),
                "Volume filled"
            );
            self.publisher.publish(bar).await?;
        }

        Ok(())
    }
}

impl Aggregator for VolumeAggregator {
    fn register(&self, handler: Arc<dyn BarHandler>) {
        self.publisher.register(handler);
    }

    fn add_tick_subscription(&self, receiver: Arc<dyn BarIndexReceiver>) {
        self.publisher.add_receiver(receiver);
    }

    fn bars_emitted(&self) -> u64 {
        self.publisher.emitted()
    }

    fn into_trade_handler(self: Arc<Self>) -> Arc<dyn TradeHandler> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::test_support::{CollectingBars, CollectingIndices};
    use crate::common::types::Side;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn trade(seq: i64, seconds: i64, price: Decimal, size: Decimal) -> Trade {
        Trade::new(
            "test",
            "BTC-USD",
            seq,
            price,
            size,
            Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
            Side::Sell,
        )
    }

    fn aggregator(threshold: Decimal) -> (VolumeAggregator, Arc<CollectingBars>) {
        let aggregator = VolumeAggregator::new(threshold, 1, 5).unwrap();
        let bars = Arc::new(CollectingBars::default());
        aggregator.register(bars.clone());
        (aggregator, bars)
    }

    #[tokio::test]
    async fn test_threshold_closes_window() {
        let (aggregator, bars) = aggregator(dec!(10));

        for seq in 1..=3 {
            aggregator
                .handle_trade(&trade(seq, seq, dec!(100) + Decimal::from(seq), dec!(3)))
                .await
                .unwrap();
        }
        assert!(bars.take().is_empty());

        aggregator.handle_trade(&trade(4, 4, dec!(99), dec!(3))).await.unwrap();
        let emitted = bars.take();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].volume, dec!(12));
        assert_eq!(emitted[0].open, dec!(101));
        assert_eq!(emitted[0].close, dec!(99));
        assert_eq!(emitted[0].high, dec!(103));
        assert_eq!(emitted[0].low, dec!(99));
        assert_eq!(
            emitted[0].window_start,
            Utc.timestamp_opt(1_700_000_001, 0).unwrap()
        );

        // the fifth trade starts a fresh window
        aggregator.handle_trade(&trade(5, 5, dec!(100), dec!(3))).await.unwrap();
        assert!(bars.take().is_empty());
    }

    #[tokio::test]
    async fn test_single_large_trade_waits_for_min_count() {
        let (aggregator, bars) = aggregator(dec!(1));

        aggregator.handle_trade(&trade(1, 1, dec!(100), dec!(50))).await.unwrap();
        assert!(bars.take().is_empty());

        aggregator.handle_trade(&trade(2, 2, dec!(100), dec!(0.1))).await.unwrap();
        assert_eq!(bars.take().len(), 1);
    }

    #[tokio::test]
    async fn test_max_count_closes_thin_window() {
        let (aggregator, bars) = aggregator(dec!(1000));

        for seq in 1..=5 {
            aggregator
                .handle_trade(&trade(seq, seq, dec!(100), dec!(0.01)))
                .await
                .unwrap();
        }
        assert!(bars.take().is_empty());

        aggregator.handle_trade(&trade(6, 6, dec!(100), dec!(0.01))).await.unwrap();
        let emitted = bars.take();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].volume, dec!(0.06));
    }

    #[tokio::test]
    async fn test_unordered_trades_sorted_before_building_bar() {
        let (aggregator, bars) = aggregator(dec!(2));

        aggregator.handle_trade(&trade(2, 20, dec!(110), dec!(1))).await.unwrap();
        aggregator.handle_trade(&trade(1, 10, dec!(90), dec!(1))).await.unwrap();

        let emitted = bars.take();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].open, dec!(90));
        assert_eq!(emitted[0].close, dec!(110));
        assert_eq!(
            emitted[0].window_start,
            Utc.timestamp_opt(1_700_000_010, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_indices_follow_emission_order() {
        let (aggregator, _bars) = aggregator(dec!(2));
        let indices = Arc::new(CollectingIndices::default());
        aggregator.add_tick_subscription(indices.clone());

        for seq in 1..=6 {
            aggregator
                .handle_trade(&trade(seq, seq, dec!(100), dec!(1)))
                .await
                .unwrap();
        }

        assert_eq!(*indices.indices.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_invalid_bounds() {
        assert!(VolumeAggregator::new(dec!(0), 1, 5).is_err());
        assert!(VolumeAggregator::new(dec!(1), 6, 5).is_err());
    }
}
