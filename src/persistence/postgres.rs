use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

use super::TradeStore;
use crate::common::errors::{Result, TradeError};
use crate::common::types::{Side, Trade};
use crate::config::types::DatabaseConfig;

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS trades (
        id          TEXT PRIMARY KEY,
        venue       TEXT NOT NULL,
        product     TEXT NOT NULL,
        sequence_id BIGINT NOT NULL,
        price       NUMERIC NOT NULL,
        size        NUMERIC NOT NULL,
        side        TEXT NOT NULL,
        time        TIMESTAMPTZ NOT NULL
    )
";

const TIME_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS trades_venue_product_time
        ON trades (venue, product, time)
";

/// Trade history in a Postgres `trades` table
pub struct PostgresTradeStore {
    pool: PgPool,
}

impl PostgresTradeStore {
    /// Connect and make sure the schema exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!(max_connections = config.max_connections, "Connected to trade database");
        Ok(store)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(TIME_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_side(raw: &str) -> Result<Side> {
    match raw {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => Err(TradeError::InvalidResponse(format!(
            "unknown trade side '{}' in store",
            other
        ))),
    }
}

fn trade_from_row(row: &PgRow) -> Result<Trade> {
    Ok(Trade {
        id: row.try_get("id")?,
        venue: row.try_get("venue")?,
        product: row.try_get("product")?,
        sequence_id: row.try_get("sequence_id")?,
        price: row.try_get::<Decimal, _>("price")?,
        size: row.try_get::<Decimal, _>("size")?,
        side: parse_side(&row.try_get::<String, _>("side")?)?,
        timestamp: row.try_get("time")?,
    })
}

#[async_trait]
impl TradeStore for PostgresTradeStore {
    async fn put_trades(&self, trades: &[Trade]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            sqlx::query(
                r"
                INSERT INTO trades (id, venue, product, sequence_id, price, size, side, time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    price = EXCLUDED.price,
                    size = EXCLUDED.size,
                    side = EXCLUDED.side,
                    time = EXCLUDED.time
                ",
            )
            .bind(&trade.id)
            .bind(&trade.venue)
            .bind(&trade.product)
            .bind(trade.sequence_id)
            .bind(trade.price)
            .bind(trade.size)
            .bind(trade.side.to_string())
            .bind(trade.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = trades.len(), "Trades upserted");
        Ok(())
    }

    async fn get_trades(
        &self,
        venue: &str,
        product: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            r"
            SELECT id, venue, product, sequence_id, price, size, side, time
            FROM trades
            WHERE venue = $1 AND product = $2 AND time >= $3 AND time <= $4
            ORDER BY time, sequence_id
            ",
        )
        .bind(venue)
        .bind(product)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(trade_from_row).collect()
    }
}
