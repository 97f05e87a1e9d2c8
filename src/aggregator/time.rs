use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::{sort_by_time, Aggregator, BarPublisher};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::{BarHandler, BarIndexReceiver, TradeHandler};
use crate::common::types::{Bar, Trade};

/// Fixed-period windows.
///
/// The window boundary is derived from the trade that opens it: the trade's
/// time rounded to the nearest multiple of the period (halves round up), plus
/// one period. A window holds trades strictly inside
/// `(next_boundary - period, next_boundary)`; the first trade at or after
/// `next_boundary` closes it and seeds the next one. Anything else arrived
/// too late and is dropped.
pub struct TimeAggregator {
    period: Duration,
    window: Mutex<TimeWindow>,
    publisher: BarPublisher,
}

#[derive(Default)]
struct TimeWindow {
    /// Exclusive upper edge of the current window, unset until the first trade
    next_boundary: Option<DateTime<Utc>>,
    trades: Vec<Trade>,
}

impl TimeAggregator {
    pub fn new(period: Duration) -> Result<Self> {
        if period <= Duration::zero() {
            return Err(TradeError::Configuration(format!(
                "time aggregator period must be positive, got {}",
                period
            )));
        }
        Ok(Self {
            period,
            window: Mutex::new(TimeWindow::default()),
            publisher: BarPublisher::new(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn boundary_after(&self, time: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Ok(time.duration_round(self.period)? + self.period)
    }
}

#[async_trait]
impl TradeHandler for TimeAggregator {
    async fn handle_trade(&self, trade: &Trade) -> Result<()> {
        let mut window = self.window.lock().await;

        let Some(next_boundary) = window.next_boundary else {
            window.next_boundary = Some(self.boundary_after(trade.timestamp)?);
            window.trades = vec![trade.clone()];
            return Ok(());
        };

        let window_start = next_boundary - self.period;
        if trade.timestamp > window_start && trade.timestamp < next_boundary {
            window.trades.push(trade.clone());
            return Ok(());
        }

        if trade.timestamp < next_boundary {
            trace!(
                trade_id = %trade.id,
                time = %trade.timestamp,
                window_start = %window_start,
                "Dropping late trade"
            );
            return Ok(());
        }

        let boundary = self.boundary_after(trade.timestamp)?;
        let mut trades = std::mem::replace(&mut window.trades, vec![trade.clone()]);
        window.next_boundary = Some(boundary);

        sort_by_time(&mut trades);
        if let Some(bar) = Bar::from_sorted_trades(window_start, &trades) {
            debug!(
                window_start = %bar.window_start,
                trades = trades.len(),
                close = %bar.close,
                volume = %bar.volume,
                "Time window closed"
            );
            self.publisher.publish(bar).await?;
        }

        Ok(())
    }
}

impl Aggregator for TimeAggregator {
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
