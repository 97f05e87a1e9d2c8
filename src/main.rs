//! Trade Pipeline - Main Entry Point
//!
//! `trade` runs against the live Coinbase feed, `sim` replays stored trades
//! and `backfill` downloads trade history for `sim`.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trade_pipeline::app;
use trade_pipeline::cli::{Cli, Command};
use trade_pipeline::config::load_config;
use trade_pipeline::persistence;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let mut config = load_config(Some(&cli.config)).context("Could not load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.settings.log_level.to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting trade pipeline");
    info!("Configuration file: {}", cli.config);

    let store = persistence::from_config(&config.storage)
        .await
        .context("Could not open trade store")?;

    match cli.command {
        Command::Trade => {
            let started = Utc::now();
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Could not listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };

            let report = app::trade(&config, store, shutdown).await?;

            let path = format!("data-trade-{}.json", started.format("%Y-%m-%dT%H:%M:%SZ"));
            let written = report.write_history(&path)?;
            info!(path = %path, bars = written, "Wrote bar history");
            report.log("trade");
        }
        Command::Sim { .. } => {
            let report = app::simulate(&config, store).await?;

            let path = &config.simulation.output_path;
            let written = report.write_history(path)?;
            info!(path = %path, bars = written, "Wrote bar history");
            report.log("simulation");
        }
        Command::Backfill { days } => {
            let saved = app::backfill(&config, store, days).await?;
            info!(saved, days, "Backfill complete");
        }
    }

    Ok(())
}
