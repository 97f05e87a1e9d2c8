//! Data model shared by the aggregator, strategies, trader and markets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Taker side of an executed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// What a strategy wants done, and what an update reports as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Hold,
    Buy,
    Sell,
    Cancel,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Hold => write!(f, "HLD"),
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SLL"),
            Action::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// A single executed trade observed on a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique identifier, `<venue>.<product>.<sequence_id>`
    pub id: String,
    /// Venue the trade happened on
    pub venue: String,
    /// Product identifier, e.g. `BTC-USD`
    pub product: String,
    /// Venue-assigned trade sequence number
    pub sequence_id: i64,
    /// Execution price
    pub price: Decimal,
    /// Trade size in asset units
    pub size: Decimal,
    /// Execution time
    pub timestamp: DateTime<Utc>,
    /// Side of the taker order
    pub side: Side,
}

impl Trade {
    /// Create a trade with an id derived from venue, product and sequence
    pub fn new(
        venue: impl Into<String>,
        product: impl Into<String>,
        sequence_id: i64,
        price: Decimal,
        size: Decimal,
        timestamp: DateTime<Utc>,
        side: Side,
    ) -> Self {
        let venue = venue.into();
        let product = product.into();
        Self {
            id: Self::make_id(&venue, &product, sequence_id),
            venue,
            product,
            sequence_id,
            price,
            size,
            timestamp,
            side,
        }
    }

    pub fn make_id(venue: &str, product: &str, sequence_id: i64) -> String {
        format!("{}.{}.{}", venue, product, sequence_id)
    }
}

/// Turning point reported by a trend-following strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendEvent {
    Trough,
    Peak,
}

/// Side annotations a strategy produces for the bar it evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BarAnnotations {
    pub ema_value: Option<Decimal>,
    pub trend_event: Option<TrendEvent>,
}

/// OHLCV summary of the trades in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the window this bar covers
    pub window_start: DateTime<Utc>,
    /// Price of the earliest trade
    pub open: Decimal,
    /// Highest traded price
    pub high: Decimal,
    /// Lowest traded price
    pub low: Decimal,
    /// Price of the latest trade
    pub close: Decimal,
    /// Sum of trade sizes
    pub volume: Decimal,
    /// Exponential moving average at this bar, when a strategy computed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema_value: Option<Decimal>,
    /// Trend reversal detected at this bar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_event: Option<TrendEvent>,
}

impl Bar {
    /// Build a bar from trades already sorted by time.
    ///
    /// Returns `None` for an empty slice, no bar exists for an empty window.
    pub fn from_sorted_trades(window_start: DateTime<Utc>, trades: &[Trade]) -> Option<Self> {
        let first = trades.first()?;
        let last = trades.last()?;

        let mut bar = Bar {
            window_start,
            open: first.price,
            high: first.price,
            low: first.price,
            close: last.price,
            volume: Decimal::ZERO,
            ema_value: None,
            trend_event: None,
        };

        for trade in trades {
            if trade.price > bar.high {
                bar.high = trade.price;
            }
            if trade.price < bar.low {
                bar.low = trade.price;
            }
            bar.volume += trade.size;
        }

        Some(bar)
    }

    /// Copy of this bar carrying the strategy's annotations
    pub fn annotated(&self, annotations: BarAnnotations) -> Self {
        Self {
            ema_value: annotations.ema_value,
            trend_event: annotations.trend_event,
            ..self.clone()
        }
    }

    /// OHLC sanity: low bounds open/close from below, high from above
    pub fn is_sane(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.high >= self.open
            && self.high >= self.close
    }
}

/// Asynchronous notification that an order filled or was cancelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub action: Action,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Update {
    pub fn new(action: Action, price: Decimal, size: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            price,
            size,
            timestamp,
        }
    }
}

/// Account balances for the traded product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Amount held in the base asset
    pub asset: Decimal,
    /// Amount held in the quote currency
    pub currency: Decimal,
}

impl Balance {
    pub fn new(asset: Decimal, currency: Decimal) -> Self {
        Self { asset, currency }
    }

    /// Total holdings expressed in asset units at the given price
    pub fn total_in_asset(&self, price: Decimal) -> Decimal {
        if price.is_zero() {
            return self.asset;
        }
        self.asset + self.currency / price
    }
}

/// Connection status for a live feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Successfully connected
    Connected,
    /// Disconnected (with optional reason)
    Disconnected(Option<String>),
    /// Attempting to reconnect
    Reconnecting { attempt: u32 },
    /// Connection error
    Error(String),
}

/// Event produced by a live market data feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedEvent {
    /// Executed trade
    Trade(Trade),
    /// Connection status change
    ConnectionStatus(ConnectionStatus),
    /// Heartbeat from the venue
    Heartbeat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn trade_at(seconds: i64, price: Decimal, size: Decimal) -> Trade {
        Trade::new(
            "test",
            "BTC-USD",
            seconds,
            price,
            size,
            Utc.timestamp_opt(seconds, 0).unwrap(),
            Side::Buy,
        )
    }

    #[test]
    fn test_bar_from_sorted_trades() {
        let trades = vec![
            trade_at(1, dec!(100), dec!(1)),
            trade_at(2, dec!(104), dec!(0.5)),
            trade_at(3, dec!(98), dec!(2)),
            trade_at(4, dec!(101), dec!(1.5)),
        ];
        let start = Utc.timestamp_opt(0, 0).unwrap();

        let bar = Bar::from_sorted_trades(start, &trades).unwrap();

        assert_eq!(bar.window_start, start);
        assert_eq!(bar.open, dec!(100));
        assert_eq!(bar.close, dec!(101));
        assert_eq!(bar.high, dec!(104));
        assert_eq!(bar.low, dec!(98));
        assert_eq!(bar.volume, dec!(5));
        assert!(bar.is_sane());
        assert!(bar.ema_value.is_none());
    }

    #[test]
    fn test_no_bar_for_empty_window() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        assert!(Bar::from_sorted_trades(start, &[]).is_none());
    }

    #[test]
    fn test_annotated_keeps_ohlcv() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let bar = Bar::from_sorted_trades(start, &[trade_at(1, dec!(10), dec!(1))]).unwrap();

        let annotated = bar.annotated(BarAnnotations {
            ema_value: Some(dec!(9.5)),
            trend_event: Some(TrendEvent::Peak),
        });

        assert_eq!(annotated.close, bar.close);
        assert_eq!(annotated.ema_value, Some(dec!(9.5)));
        assert_eq!(annotated.trend_event, Some(TrendEvent::Peak));
    }

    #[test]
    fn test_trade_id_format() {
        let trade = trade_at(42, dec!(1), dec!(1));
        assert_eq!(trade.id, "test.BTC-USD.42");
    }

    #[test]
    fn test_balance_total_in_asset() {
        let balance = Balance::new(dec!(1), dec!(500));
        assert_eq!(balance.total_in_asset(dec!(250)), dec!(3));
    }
}
