//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{Result, TradeError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, `__` between sections)
/// 2. Configuration file (TOML format)
/// 3. Default values
///
/// The result is validated before it is returned.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| TradeError::Configuration(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| TradeError::Configuration(e.to_string()))?;

    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AggregatorKind, StorageConfig, StrategyKind};
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Some("definitely-not-here.toml")).unwrap();
        assert_eq!(config.exchange.product, "BTC-USD");
        assert_eq!(config.aggregator.kind, AggregatorKind::Time);
        assert_eq!(config.strategy.kind, StrategyKind::Ema);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[exchange]
product = "ETH-BTC"

[aggregator]
kind = "volume"
volume_threshold = "2.5"

[storage]
kind = "memory"

[trader]
min_order_size = "0.01"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.exchange.product, "ETH-BTC");
        assert_eq!(config.aggregator.kind, AggregatorKind::Volume);
        assert_eq!(config.aggregator.volume_threshold, dec!(2.5));
        assert_eq!(config.trader.min_order_size, dec!(0.01));
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_invalid_file_is_a_configuration_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[aggregator]\nperiod_seconds = 0").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        assert!(matches!(
            load_config(Some(&path)),
            Err(TradeError::Configuration(_))
        ));
    }
}
