//! Application configuration: typed settings and their loader

pub mod loader;
pub mod types;

pub use loader::load_config;
pub use types::{
    AggregatorConfig, AggregatorKind, AppConfig, AppSettings, DatabaseConfig, ExchangeConfig,
    SimulationConfig, SizingMode, StorageConfig, StrategyConfig, StrategyKind, TraderConfig,
};
