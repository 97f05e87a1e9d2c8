use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{in_range, sort_for_replay, TradeStore};
use crate::common::errors::Result;
use crate::common::types::Trade;

/// Trades appended to a file, one JSON object per line.
///
/// A later line for the same id replaces earlier ones when reading, which
/// makes `put_trades` an upsert without rewriting the file.
pub struct JsonLinesTradeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesTradeStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Trade>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut trades = HashMap::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Trade>(line) {
                Ok(trade) => {
                    trades.insert(trade.id.clone(), trade);
                }
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    error = %e,
                    "Skipping unreadable trade"
                ),
            }
        }
        Ok(trades)
    }
}

#[async_trait]
impl TradeStore for JsonLinesTradeStore {
    async fn put_trades(&self, trades: &[Trade]) -> Result<()> {
        if trades.is_empty() {
            return Ok(());
        }

        let mut buffer = String::new();
        for trade in trades {
            buffer.push_str(&serde_json::to_string(trade)?);
            buffer.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), count = trades.len(), "Trades appended");
        Ok(())
    }

    async fn get_trades(
        &self,
        venue: &str,
        product: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        let _guard = self.write_lock.lock().await;
        let mut trades: Vec<Trade> = self
            .load()
            .await?
            .into_values()
            .filter(|trade| in_range(trade, venue, product, start, end))
            .collect();
        sort_for_replay(&mut trades);
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Side;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn trade(seq: i64, seconds: i64) -> Trade {
        Trade::new(
            "coinbase",
            "BTC-USD",
            seq,
            dec!(100.25),
            dec!(0.5),
            Utc.timestamp_opt(seconds, 0).unwrap(),
            Side::Sell,
        )
    }

    fn all_time() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(1_000_000, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesTradeStore::new(dir.path().join("none.jsonl"));
        let (start, end) = all_time();

        let trades = store.get_trades("coinbase", "BTC-USD", start, end).await.unwrap();
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_trades_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let (start, end) = all_time();

        JsonLinesTradeStore::new(&path)
            .put_trades(&[trade(2, 20), trade(1, 10)])
            .await
            .unwrap();

        let trades = JsonLinesTradeStore::new(&path)
            .get_trades("coinbase", "BTC-USD", start, end)
            .await
            .unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sequence_id, 1);
        assert_eq!(trades[0].price, dec!(100.25));
        assert_eq!(trades[1].timestamp, Utc.timestamp_opt(20, 0).unwrap());
    }

    #[tokio::test]
    async fn test_later_line_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesTradeStore::new(dir.path().join("trades.jsonl"));
        let (start, end) = all_time();

        store.put_trades(&[trade(1, 10)]).await.unwrap();
        let mut replacement = trade(1, 10);
        replacement.size = dec!(3);
        store.put_trades(&[replacement]).await.unwrap();

        let trades = store.get_trades("coinbase", "BTC-USD", start, end).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].size, dec!(3));
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let store = JsonLinesTradeStore::new(&path);
        store.put_trades(&[trade(1, 10)]).await.unwrap();
        let mut raw = fs::read_to_string(&path).await.unwrap();
        raw.push_str("{not json\n");
        fs::write(&path, raw).await.unwrap();

        let (start, end) = all_time();
        let trades = store.get_trades("coinbase", "BTC-USD", start, end).await.unwrap();
        assert_eq!(trades.len(), 1);
    }
}
