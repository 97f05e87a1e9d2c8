//! Trade stream aggregation into OHLCV bars
//!
//! An aggregator is a [`TradeHandler`]: markets feed it trades, and every
//! time a window closes it publishes exactly one [`Bar`] to its subscribers.
//! Windows that saw no trades never produce a bar.
//!
//! Two windowing policies are provided:
//!
//! - [`TimeAggregator`]: fixed-length windows aligned to the period
//! - [`VolumeAggregator`]: windows closed by accumulated volume, bounded by
//!   trade counts so bars keep coming in illiquid markets

mod time;
mod volume;

pub use time::TimeAggregator;
pub use volume::VolumeAggregator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::errors::Result;
use crate::common::traits::{BarHandler, BarIndexReceiver, HandlerRegistry, TradeHandler};
use crate::common::types::{Bar, Trade};
use crate::config::types::{AggregatorConfig, AggregatorKind};

/// A trade handler that emits bars
pub trait Aggregator: TradeHandler {
    /// Subscribe to completed bars
    fn register(&self, handler: Arc<dyn BarHandler>);

    /// Subscribe to completed bars tagged with their ordinal
    fn add_tick_subscription(&self, receiver: Arc<dyn BarIndexReceiver>);

    /// Number of bars emitted so far
    fn bars_emitted(&self) -> u64;

    /// View this aggregator as a plain trade subscriber
    fn into_trade_handler(self: Arc<Self>) -> Arc<dyn TradeHandler>;
}

/// Boxed aggregator for dynamic dispatch
pub type SharedAggregator = Arc<dyn Aggregator>;

/// Build the aggregator selected in configuration
pub fn from_config(config: &AggregatorConfig) -> Result<SharedAggregator> {
    let aggregator: SharedAggregator = match config.kind {
        AggregatorKind::Time => Arc::new(TimeAggregator::new(config.period()?)?),
        AggregatorKind::Volume => Arc::new(VolumeAggregator::new(
            config.volume_threshold,
            config.min_trades,
            config.max_trades,
        )?),
    };
    Ok(aggregator)
}

/// Fan-out of completed bars to both subscriber protocols
pub(crate) struct BarPublisher {
    handlers: HandlerRegistry<dyn BarHandler>,
    receivers: HandlerRegistry<dyn BarIndexReceiver>,
    next_index: AtomicU64,
}

impl BarPublisher {
    pub(crate) fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            receivers: HandlerRegistry::new(),
            next_index: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(&self, handler: Arc<dyn BarHandler>) {
        self.handlers.register(handler);
    }

    pub(crate) fn add_receiver(&self, receiver: Arc<dyn BarIndexReceiver>) {
        self.receivers.register(receiver);
    }

    pub(crate) fn emitted(&self) -> u64 {
        self.next_index.load(Ordering::SeqCst)
    }

    pub(crate) async fn publish(&self, bar: Bar) -> Result<()> {
        debug_assert!(bar.is_sane(), "bar outside its own range: {:?}", bar);
        self.handlers.deliver(&bar).await?;
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        self.receivers.deliver(&bar, index);
        Ok(())
    }
}

/// Sort trades by time, keeping arrival order among equal timestamps
pub(crate) fn sort_by_time(trades: &mut [Trade]) {
    trades.sort_by_key(|trade| trade.timestamp);
}
