//! REST client for the Coinbase Exchange public API

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use super::messages::RestTrade;
use crate::common::errors::{Result, TradeError};
use crate::common::types::Trade;

/// Trades per page, the venue maximum
pub const PAGE_LIMIT: usize = 1000;

/// Header carrying the cursor for the next (older) page
const CURSOR_HEADER: &str = "cb-after";

/// One page of historical trades, newest first
#[derive(Debug, Clone)]
pub struct TradePage {
    pub trades: Vec<Trade>,
    /// Cursor to pass as `after` for older trades, absent on the last page
    pub next_cursor: Option<String>,
}

/// REST client for public market data endpoints
#[derive(Debug, Clone)]
pub struct CoinbaseRestClient {
    client: Client,
    base_url: String,
}

impl CoinbaseRestClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a REST client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        // The exchange rejects requests without a user agent
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List executed trades for `product`, starting after `cursor` when given
    #[instrument(skip(self))]
    pub async fn list_trades(&self, product: &str, cursor: Option<&str>) -> Result<TradePage> {
        let url = format!("{}/products/{}/trades", self.base_url, product);
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", PAGE_LIMIT.to_string())]);
        if let Some(after) = cursor {
            request = request.query(&[("after", after)]);
        }
        debug!("Fetching trades from: {}", url);

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradeError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            )));
        }

        let next_cursor = response
            .headers()
            .get(CURSOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let raw: Vec<RestTrade> = response.json().await?;
        let trades = raw.iter().map(|t| t.to_trade(product)).collect();

        Ok(TradePage {
            trades,
            next_cursor,
        })
    }
}
