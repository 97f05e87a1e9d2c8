//! Subscriber capabilities and the market boundary contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

use super::errors::Result;
use super::types::{Balance, Bar, Trade, Update};

/// Receives every trade a market observes
#[async_trait]
pub trait TradeHandler: Send + Sync {
    async fn handle_trade(&self, trade: &Trade) -> Result<()>;
}

/// Receives every bar an aggregator completes
#[async_trait]
pub trait BarHandler: Send + Sync {
    async fn handle_bar(&self, bar: &Bar) -> Result<()>;
}

/// Receives fill and cancel notifications for our own orders
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle_update(&self, update: &Update) -> Result<()>;
}

/// Secondary bar protocol for charting and backtesting consumers.
///
/// `index` counts emitted bars from zero and increases by one per bar.
pub trait BarIndexReceiver: Send + Sync {
    fn receive_bar(&self, bar: &Bar, index: u64);
}

/// Trading venue as seen by the pipeline
///
/// Implemented by the live venue adapter and by the historical replay adapter.
///
/// # Implementation Notes
///
/// - Handlers are invoked in registration order, one event at a time
/// - `buy`/`sell` never fill partially in the call itself; fills arrive later
///   through the update stream
/// - Updates must not be delivered from inside `buy`/`sell`: the trader holds
///   its ledger lock across those calls
/// - A cached balance must be invalidated before `balance` returns after any
///   order or update
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Market: Send + Sync {
    /// Venue name used to tag trades
    fn name(&self) -> &'static str;

    /// Add a subscriber to the trade stream
    fn register_for_trades(&self, handler: Arc<dyn TradeHandler>);

    /// Add a subscriber to the fill/cancel update stream
    fn register_for_updates(&self, handler: Arc<dyn UpdateHandler>);

    /// Current asset and currency balances
    async fn balance(&self) -> Result<Balance>;

    /// Place a buy order for `size` asset units at `price`
    async fn buy(&self, size: Decimal, price: Decimal) -> Result<()>;

    /// Place a sell order for `size` asset units at `price`
    async fn sell(&self, size: Decimal, price: Decimal) -> Result<()>;

    /// Deliver events until the underlying stream ends
    async fn run(&self) -> Result<()>;

    /// Load historical trades back to `until`, returning how many were stored
    async fn backfill(&self, until: DateTime<Utc>) -> Result<usize>;
}

/// Ordered list of subscribers sharing one capability
pub struct HandlerRegistry<H: ?Sized> {
    handlers: RwLock<Vec<Arc<H>>>,
}

impl<H: ?Sized> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, handler: Arc<H>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Handlers in registration order
    pub fn snapshot(&self) -> Vec<Arc<H>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: ?Sized> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

// A failing subscriber does not stop delivery to the others. Only
// configuration errors travel back up to the caller.

impl HandlerRegistry<dyn TradeHandler> {
    pub async fn deliver(&self, trade: &Trade) -> Result<()> {
        for handler in self.snapshot() {
            if let Err(e) = handler.handle_trade(trade).await {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!(error = %e, trade_id = %trade.id, "Trade handler failed");
            }
        }
        Ok(())
    }
}

impl HandlerRegistry<dyn BarHandler> {
    pub async fn deliver(&self, bar: &Bar) -> Result<()> {
        for handler in self.snapshot() {
            if let Err(e) = handler.handle_bar(bar).await {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!(error = %e, window_start = %bar.window_start, "Bar handler failed");
            }
        }
        Ok(())
    }
}

impl HandlerRegistry<dyn UpdateHandler> {
    pub async fn deliver(&self, update: &Update) -> Result<()> {
        for handler in self.snapshot() {
            if let Err(e) = handler.handle_update(update).await {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!(error = %e, action = %update.action, "Update handler failed");
            }
        }
        Ok(())
    }
}

impl HandlerRegistry<dyn BarIndexReceiver> {
    pub fn deliver(&self, bar: &Bar, index: u64) {
        for receiver in self.snapshot() {
            receiver.receive_bar(bar, index);
        }
    }
}
