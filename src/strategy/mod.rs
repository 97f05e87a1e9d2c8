//! Strategy module for trade decision making
//!
//! A strategy turns one completed bar into a [`Signal`]: an action plus the
//! annotations the trader records on its copy of the bar.
//!
//! # Architecture
//!
//! ```text
//! Aggregator ── bar ──▶ Trader ── decide(bar) ──▶ Strategy
//!                         │                          │
//!                         ◀──── Signal { action } ───┘
//!                         │
//!                         ▼
//!                   sized order to the Market
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: trait implemented by every strategy
//! - [`RandomStrategy`]: weighted random baseline
//! - [`EmaStrategy`]: EMA trend reversal detector
//! - [`MovingAverage`]: the EWMA behind it

mod ema;
mod random;
mod traits;
mod types;

pub use ema::{EmaStrategy, MovingAverage};
pub use random::RandomStrategy;
pub use traits::{BoxedStrategy, Strategy};
pub use types::Signal;

use tracing::info;

use crate::common::errors::Result;
use crate::config::types::{StrategyConfig, StrategyKind};

/// Build the strategy selected in configuration
pub fn from_config(config: &StrategyConfig) -> Result<BoxedStrategy> {
    let strategy: BoxedStrategy = match config.kind {
        StrategyKind::Ema => {
            info!(
                window = config.ema_window,
                warmup = config.ema_warmup,
                "Using EMA trend strategy"
            );
            Box::new(EmaStrategy::new(config.ema_window, config.ema_warmup)?)
        }
        StrategyKind::Random => {
            let strategy = RandomStrategy::new(
                config.wait_weight,
                config.buy_weight,
                config.sell_weight,
            )?;
            info!(
                wait = %strategy.wait_weight(),
                buy = %config.buy_weight,
                sell = %config.sell_weight,
                "Using random strategy"
            );
            Box::new(strategy)
        }
    };
    Ok(strategy)
}
