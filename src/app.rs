//! Pipeline wiring and the three run modes
//!
//! ```text
//! Market ── trades ──▶ Aggregator ── bars ──▶ Trader ── orders ──▶ Market
//!    └──────────────────── updates ──────────────▲
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fs::File;
use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{self, Aggregator, SharedAggregator};
use crate::coinbase::{CoinbaseMarket, VENUE};
use crate::common::errors::{Result, TradeError};
use crate::common::traits::Market;
use crate::common::types::{Balance, Bar};
use crate::config::types::AppConfig;
use crate::market::{FeeSchedule, PaperAccount, ReplayMarket};
use crate::persistence::SharedTradeStore;
use crate::strategy;
use crate::trader::{Trader, TraderSummary};

/// Aggregator and trader attached to a market
pub struct Pipeline {
    pub aggregator: SharedAggregator,
    pub trader: Arc<Trader>,
}

impl Pipeline {
    /// Build the configured aggregator, strategy and trader and subscribe
    /// them to `market`
    pub fn attach(market: Arc<dyn Market>, config: &AppConfig) -> Result<Self> {
        let aggregator = aggregator::from_config(&config.aggregator)?;
        let strategy = strategy::from_config(&config.strategy)?;
        let trader = Arc::new(Trader::new(market.clone(), strategy, &config.trader));

        market.register_for_trades(aggregator.clone().into_trade_handler());
        market.register_for_updates(trader.clone());
        aggregator.register(trader.clone());

        Ok(Self { aggregator, trader })
    }

    pub async fn report(&self) -> RunReport {
        RunReport {
            bars: self.aggregator.bars_emitted(),
            summary: self.trader.summary().await,
            history: self.trader.history().await,
        }
    }
}

/// What a finished run leaves behind
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub bars: u64,
    pub summary: TraderSummary,
    pub history: Vec<Bar>,
}

impl RunReport {
    /// Write the bars that carry an EMA value as a JSON array, returning how
    /// many were written
    pub fn write_history(&self, path: impl AsRef<Path>) -> Result<usize> {
        let charted: Vec<&Bar> = self
            .history
            .iter()
            .filter(|bar| bar.ema_value.is_some())
            .collect();
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &charted)?;
        writer.flush()?;
        Ok(charted.len())
    }

    pub fn log(&self, mode: &str) {
        info!(
            mode,
            bars = self.bars,
            orders = self.summary.orders_submitted,
            updates = self.summary.updates_handled,
            first_total = ?self.summary.first_total,
            last_total = ?self.summary.last_total,
            change_percent = ?self.summary.change_percent(),
            "Completed {} with {} actions",
            mode,
            self.summary.updates_handled
        );
    }
}

fn paper_account(config: &AppConfig) -> PaperAccount {
    let starting = Balance::new(
        config.simulation.asset_capital,
        config.simulation.currency_capital,
    );
    PaperAccount::new(starting, FeeSchedule::flat(config.simulation.fee_rate))
}

/// Replay stored trades from the configured look-back window
pub async fn simulate(config: &AppConfig, store: SharedTradeStore) -> Result<RunReport> {
    let end = Utc::now();
    let start = end
        .checked_sub_signed(config.simulation.lookback()?)
        .ok_or_else(|| TradeError::Configuration("look-back reaches before year zero".into()))?;
    simulate_range(config, store, start, end).await
}

/// Replay stored trades with `start <= time <= end`
pub async fn simulate_range(
    config: &AppConfig,
    store: SharedTradeStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<RunReport> {
    let account = paper_account(config);
    info!(
        balance_assets = %account.balance().asset,
        balance_currency = %account.balance().currency,
        "Started market"
    );

    let market = Arc::new(
        ReplayMarket::new(
            store,
            VENUE,
            config.exchange.product.clone(),
            end - start,
            account,
        )
        .with_range(start, end),
    );
    let pipeline = Pipeline::attach(market.clone(), config)?;

    info!(
        aggregator = ?config.aggregator.kind,
        strategy = ?config.strategy.kind,
        "Started trading"
    );
    market.run().await?;

    Ok(pipeline.report().await)
}

/// Trade live until the feed gives up or `shutdown` resolves
pub async fn trade<F>(config: &AppConfig, store: SharedTradeStore, shutdown: F) -> Result<RunReport>
where
    F: Future<Output = ()>,
{
    let market = Arc::new(
        CoinbaseMarket::new(&config.exchange, &config.settings, paper_account(config))?
            .with_store(store),
    );
    let balance = market.balance().await?;
    info!(
        balance_assets = %balance.asset,
        balance_currency = %balance.currency,
        "Started market"
    );

    let pipeline = Pipeline::attach(market.clone(), config)?;
    info!(
        aggregator = ?config.aggregator.kind,
        strategy = ?config.strategy.kind,
        product = %config.exchange.product,
        "Started trading"
    );

    tokio::select! {
        result = market.run() => {
            if let Err(e) = result {
                warn!(error = %e, "Market stopped");
                return Err(e);
            }
        }
        _ = shutdown => info!("Interrupted"),
    }

    Ok(pipeline.report().await)
}

/// Fetch the last `days` of trades into the store
pub async fn backfill(config: &AppConfig, store: SharedTradeStore, days: u32) -> Result<usize> {
    if days == 0 {
        return Err(TradeError::Configuration(
            "backfill needs at least one day".to_string(),
        ));
    }
    let market = CoinbaseMarket::new(&config.exchange, &config.settings, paper_account(config))?
        .with_store(store);
    let until = Duration::try_days(i64::from(days))
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .ok_or_else(|| TradeError::Configuration(format!("cannot backfill {} days", days)))?;
    market.backfill(until).await
}
