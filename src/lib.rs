//! Trade Pipeline Library
//!
//! Aggregates a stream of executed trades into OHLCV bars, derives trading
//! signals from the bars and turns them into risk-bounded orders, either
//! against a live venue or against a replay of stored trades.

pub mod aggregator;
pub mod app;
pub mod cli;
pub mod coinbase;
pub mod common;
pub mod config;
pub mod market;
pub mod persistence;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use common::errors::{Result, TradeError};
pub use common::traits::{BarHandler, BarIndexReceiver, Market, TradeHandler, UpdateHandler};
pub use common::types::{Action, Balance, Bar, Side, Trade, TrendEvent, Update};
pub use config::types::AppConfig;

pub use aggregator::{Aggregator, TimeAggregator, VolumeAggregator};
pub use app::{Pipeline, RunReport};
pub use coinbase::CoinbaseMarket;
pub use market::{PaperAccount, ReplayMarket};
pub use persistence::{SharedTradeStore, TradeStore};
pub use strategy::{BoxedStrategy, EmaStrategy, RandomStrategy, Signal, Strategy};
pub use trader::{Phase, Trader, TraderSummary};
