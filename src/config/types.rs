//! Configuration types

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{Result, TradeError};
use crate::common::precision::Precision;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Venue and product to trade
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Where historical trades are kept
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bar windowing policy
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Signal strategy
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Order sizing and risk bounds
    #[serde(default)]
    pub trader: TraderConfig,
    /// Replay capital and output
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Reject configurations the pipeline cannot start with
    pub fn validate(&self) -> Result<()> {
        self.exchange.validate()?;
        self.aggregator.validate()?;
        self.strategy.validate()?;
        self.trader.validate()?;
        self.simulation.validate()
    }
}

/// Venue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Product identifier, `<ASSET>-<CURRENCY>`
    #[serde(default = "default_product")]
    pub product: String,
    /// Base URL for the public REST API
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// WebSocket URL for the public market data feed
    #[serde(default = "default_ws_url")]
    pub websocket_url: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            rest_url: default_rest_url(),
            websocket_url: default_ws_url(),
        }
    }
}

impl ExchangeConfig {
    fn validate(&self) -> Result<()> {
        let mut parts = self.product.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(asset), Some(currency), None) if !asset.is_empty() && !currency.is_empty() => {}
            _ => {
                return Err(TradeError::Configuration(format!(
                    "product must look like ASSET-CURRENCY, got {:?}",
                    self.product
                )))
            }
        }
        url::Url::parse(&self.rest_url)
            .map_err(|e| TradeError::Configuration(format!("invalid rest_url: {}", e)))?;
        url::Url::parse(&self.websocket_url)
            .map_err(|e| TradeError::Configuration(format!("invalid websocket_url: {}", e)))?;
        Ok(())
    }
}

fn default_product() -> String {
    "BTC-USD".to_string()
}

fn default_rest_url() -> String {
    "https://api.exchange.coinbase.com".to_string()
}

fn default_ws_url() -> String {
    "wss://ws-feed.exchange.coinbase.com".to_string()
}

/// Trade store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local, lost on exit
    Memory,
    /// Append-only JSON lines file
    JsonLines {
        #[serde(default = "default_trades_path")]
        path: String,
    },
    /// Postgres database
    Postgres(DatabaseConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::JsonLines {
            path: default_trades_path(),
        }
    }
}

fn default_trades_path() -> String {
    "trades.jsonl".to_string()
}

/// Database configuration for the trade store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

/// Which windowing policy turns trades into bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    Time,
    Volume,
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_kind")]
    pub kind: AggregatorKind,
    /// Window length for the time policy
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u64,
    /// Volume that closes a window for the volume policy
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: Decimal,
    /// A volume window needs more trades than this before it may close
    #[serde(default = "default_min_trades")]
    pub min_trades: usize,
    /// A volume window with more trades than this closes regardless of volume
    #[serde(default = "default_max_trades")]
    pub max_trades: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            kind: default_aggregator_kind(),
            period_seconds: default_period_seconds(),
            volume_threshold: default_volume_threshold(),
            min_trades: default_min_trades(),
            max_trades: default_max_trades(),
        }
    }
}

/// Whole seconds as a `chrono::Duration`, rejecting values it cannot hold
pub fn duration_from_secs(seconds: u64, field: &str) -> Result<Duration> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            TradeError::Configuration(format!("{} of {} seconds is out of range", field, seconds))
        })
}

impl AggregatorConfig {
    /// Window length of the time policy
    pub fn period(&self) -> Result<Duration> {
        if self.period_seconds == 0 {
            return Err(TradeError::Configuration(
                "aggregator period must be positive".into(),
            ));
        }
        duration_from_secs(self.period_seconds, "aggregator period")
    }

    fn validate(&self) -> Result<()> {
        self.period()?;
        if self.volume_threshold <= Decimal::ZERO {
            return Err(TradeError::Configuration(
                "aggregator volume threshold must be positive".into(),
            ));
        }
        if self.max_trades < self.min_trades {
            return Err(TradeError::Configuration(format!(
                "aggregator max_trades ({}) is below min_trades ({})",
                self.max_trades, self.min_trades
            )));
        }
        Ok(())
    }
}

fn default_aggregator_kind() -> AggregatorKind {
    AggregatorKind::Time
}

fn default_period_seconds() -> u64 {
    900
}

fn default_volume_threshold() -> Decimal {
    dec!(0.5)
}

fn default_min_trades() -> usize {
    1
}

fn default_max_trades() -> usize {
    5
}

/// Which strategy produces signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Ema,
    Random,
}

/// Strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_strategy_kind")]
    pub kind: StrategyKind,
    /// EMA smoothing window in bars
    #[serde(default = "default_ema_window")]
    pub ema_window: u32,
    /// Bars averaged before the EMA is reported
    #[serde(default = "default_ema_warmup")]
    pub ema_warmup: u32,
    /// Random strategy weights
    #[serde(default = "default_wait_weight")]
    pub wait_weight: Decimal,
    #[serde(default = "default_buy_weight")]
    pub buy_weight: Decimal,
    #[serde(default = "default_sell_weight")]
    pub sell_weight: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: default_strategy_kind(),
            ema_window: default_ema_window(),
            ema_warmup: default_ema_warmup(),
            wait_weight: default_wait_weight(),
            buy_weight: default_buy_weight(),
            sell_weight: default_sell_weight(),
        }
    }
}

impl StrategyConfig {
    fn validate(&self) -> Result<()> {
        if self.ema_window == 0 {
            return Err(TradeError::Configuration(
                "ema window must be at least one bar".into(),
            ));
        }
        Ok(())
    }
}

fn default_strategy_kind() -> StrategyKind {
    StrategyKind::Ema
}

fn default_ema_window() -> u32 {
    100
}

fn default_ema_warmup() -> u32 {
    10
}

fn default_wait_weight() -> Decimal {
    dec!(0.7)
}

fn default_buy_weight() -> Decimal {
    dec!(0.15)
}

fn default_sell_weight() -> Decimal {
    dec!(0.15)
}

/// How much of the eligible size a single decision commits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SizingMode {
    /// Uniformly random fraction in (0, 1]
    Random,
    /// Fixed fraction in (0, 1]
    Fixed { fraction: Decimal },
}

impl Default for SizingMode {
    fn default() -> Self {
        SizingMode::Random
    }
}

/// Trader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Smallest order the venue accepts, in asset units
    #[serde(default = "default_min_order_size")]
    pub min_order_size: Decimal,
    /// Decimal places for asset sizes
    #[serde(default = "default_asset_places")]
    pub asset_places: u32,
    /// Decimal places for prices and currency
    #[serde(default = "default_currency_places")]
    pub currency_places: u32,
    /// A buy may match a prior sale at level `p` while `price <= p * buy_margin`
    #[serde(default = "default_buy_margin")]
    pub buy_margin: Decimal,
    /// A sell may match a prior buy at level `p` while `price >= p * sell_margin`
    #[serde(default = "default_sell_margin")]
    pub sell_margin: Decimal,
    #[serde(default)]
    pub sizing: SizingMode,
    /// Annotated bars kept for the run report
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            min_order_size: default_min_order_size(),
            asset_places: default_asset_places(),
            currency_places: default_currency_places(),
            buy_margin: default_buy_margin(),
            sell_margin: default_sell_margin(),
            sizing: SizingMode::default(),
            history_limit: default_history_limit(),
        }
    }
}

impl TraderConfig {
    pub fn precision(&self) -> Precision {
        Precision::new(self.asset_places, self.currency_places)
    }

    fn validate(&self) -> Result<()> {
        if self.min_order_size <= Decimal::ZERO {
            return Err(TradeError::Configuration(
                "min_order_size must be positive".into(),
            ));
        }
        if self.buy_margin <= Decimal::ZERO || self.sell_margin <= Decimal::ZERO {
            return Err(TradeError::Configuration(
                "margin factors must be positive".into(),
            ));
        }
        if let SizingMode::Fixed { fraction } = self.sizing {
            if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
                return Err(TradeError::Configuration(format!(
                    "fixed sizing fraction must be in (0, 1], got {}",
                    fraction
                )));
            }
        }
        Ok(())
    }
}

fn default_min_order_size() -> Decimal {
    dec!(0.001)
}

fn default_asset_places() -> u32 {
    8
}

fn default_currency_places() -> u32 {
    2
}

fn default_buy_margin() -> Decimal {
    dec!(1.001)
}

fn default_sell_margin() -> Decimal {
    dec!(1.003)
}

fn default_history_limit() -> usize {
    10_000
}

/// Replay configuration for the `sim` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting asset balance
    #[serde(default)]
    pub asset_capital: Decimal,
    /// Starting currency balance
    #[serde(default = "default_currency_capital")]
    pub currency_capital: Decimal,
    /// How far back from now to replay
    #[serde(default = "default_lookback_seconds")]
    pub lookback_seconds: u64,
    /// Fee charged on every paper fill, as a fraction of notional
    #[serde(default)]
    pub fee_rate: Decimal,
    /// Where the annotated bar history is written
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            asset_capital: Decimal::ZERO,
            currency_capital: default_currency_capital(),
            lookback_seconds: default_lookback_seconds(),
            fee_rate: Decimal::ZERO,
            output_path: default_output_path(),
        }
    }
}

impl SimulationConfig {
    pub fn lookback(&self) -> Result<Duration> {
        duration_from_secs(self.lookback_seconds, "simulation look-back")
    }

    fn validate(&self) -> Result<()> {
        self.lookback()?;
        if self.asset_capital < Decimal::ZERO || self.currency_capital < Decimal::ZERO {
            return Err(TradeError::Configuration(
                "simulation capital cannot be negative".into(),
            ));
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(TradeError::Configuration(format!(
                "fee rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

fn default_currency_capital() -> Decimal {
    dec!(1000)
}

fn default_lookback_seconds() -> u64 {
    3600
}

fn default_output_path() -> String {
    "data-sim.json".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: 0,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    30
}
