//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use trade_pipeline::common::types::{Side, Trade};
use trade_pipeline::config::types::{AggregatorKind, AppConfig, SizingMode, StrategyKind};
use trade_pipeline::persistence::{MemoryTradeStore, SharedTradeStore, TradeStore};

/// Minute-aligned reference time
pub const T0: i64 = 1_700_000_040;

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + seconds, 0).unwrap()
}

/// A coinbase BTC-USD trade `seconds` after [`T0`]
pub fn trade(sequence_id: i64, seconds: i64, price: Decimal, size: Decimal) -> Trade {
    Trade::new(
        "coinbase",
        "BTC-USD",
        sequence_id,
        price,
        size,
        at(seconds),
        Side::Buy,
    )
}

/// One trade a second into each minute, closing at the given prices
pub fn minute_trades(closes: &[Decimal]) -> Vec<Trade> {
    closes
        .iter()
        .enumerate()
        .map(|(i, price)| trade(i as i64 + 1, i as i64 * 60 + 1, *price, dec!(1)))
        .collect()
}

pub async fn store_with(trades: &[Trade]) -> SharedTradeStore {
    let store = Arc::new(MemoryTradeStore::new());
    store.put_trades(trades).await.unwrap();
    store
}

/// Deterministic pipeline: one-minute bars, EMA over 3 bars without
/// warm-up, orders for half of the eligible size, 1000 currency to start
pub fn deterministic_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.aggregator.kind = AggregatorKind::Time;
    config.aggregator.period_seconds = 60;
    config.strategy.kind = StrategyKind::Ema;
    config.strategy.ema_window = 3;
    config.strategy.ema_warmup = 0;
    config.trader.sizing = SizingMode::Fixed {
        fraction: dec!(0.5),
    };
    config.simulation.asset_capital = Decimal::ZERO;
    config.simulation.currency_capital = dec!(1000);
    config.simulation.fee_rate = Decimal::ZERO;
    config
}

/// Sample Coinbase REST responses
pub mod api_responses {
    use serde_json::{json, Value};

    /// Trades endpoint body from `(trade_id, time, price)` entries
    pub fn trades(entries: &[(i64, String, &str)]) -> Value {
        Value::Array(
            entries
                .iter()
                .map(|(id, time, price)| {
                    json!({
                        "time": time,
                        "trade_id": id,
                        "price": price,
                        "size": "0.01000000",
                        "side": "sell"
                    })
                })
                .collect(),
        )
    }
}
