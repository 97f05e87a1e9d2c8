//! Command line interface

use chrono::Duration;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::config::types::{AggregatorKind, AppConfig};

/// Trade stream to bars, bars to signals, signals to risk-bounded orders
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "TRADE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Product to trade, e.g. BTC-USD
    #[arg(long)]
    pub product: Option<String>,

    /// EMA smoothing window in bars
    #[arg(long)]
    pub ema_window: Option<u32>,

    /// Close bars every N seconds
    #[arg(long, conflicts_with = "aggregation_volume")]
    pub aggregation_period: Option<u64>,

    /// Close bars once this much volume traded
    #[arg(long)]
    pub aggregation_volume: Option<Decimal>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the pipeline against live market data
    Trade,
    /// Run a simulation on backfilled data
    Sim {
        /// Starting capital in asset
        #[arg(long)]
        asset_capital: Option<Decimal>,
        /// Starting capital in currency
        #[arg(long)]
        currency_capital: Option<Decimal>,
        /// How far back to simulate, e.g. 90m, 1h, 2d
        #[arg(long, value_parser = parse_lookback)]
        last: Option<Duration>,
        /// Where to write the bar history
        #[arg(long)]
        output: Option<String>,
    },
    /// Download historical trades for analysis and simulations
    Backfill {
        /// Number of days to backfill
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
}

impl Cli {
    /// Override file and environment settings with the flags that were given
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.settings.log_level = level.clone();
        }
        if let Some(product) = &self.product {
            config.exchange.product = product.clone();
        }
        if let Some(window) = self.ema_window {
            config.strategy.ema_window = window;
        }
        if let Some(period) = self.aggregation_period {
            config.aggregator.kind = AggregatorKind::Time;
            config.aggregator.period_seconds = period;
        }
        if let Some(volume) = self.aggregation_volume {
            config.aggregator.kind = AggregatorKind::Volume;
            config.aggregator.volume_threshold = volume;
        }

        if let Command::Sim {
            asset_capital,
            currency_capital,
            last,
            output,
        } = &self.command
        {
            if let Some(asset) = asset_capital {
                config.simulation.asset_capital = *asset;
            }
            if let Some(currency) = currency_capital {
                config.simulation.currency_capital = *currency;
            }
            if let Some(last) = last {
                config.simulation.lookback_seconds = last.num_seconds().max(0) as u64;
            }
            if let Some(output) = output {
                config.simulation.output_path = output.clone();
            }
        }
    }
}

/// Parse `<number><unit>` with unit one of s, m, h, d
fn parse_lookback(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in {:?}, expected e.g. 1h", value))?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid amount in {:?}", value))?;

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        other => return Err(format!("unknown unit {:?}, use s, m, h or d", other)),
    }
    .ok_or_else(|| format!("look-back {:?} is out of range", value))?;
    if duration <= Duration::zero() {
        return Err("look-back must be positive".to_string());
    }
    Ok(duration)
}
