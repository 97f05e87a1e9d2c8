//! WebSocket client for the Coinbase Exchange public trade feed

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, trace, warn};

use super::messages::{FeedMessage, SubscribeRequest};
use crate::common::errors::{Result, TradeError};
use crate::common::types::{ConnectionStatus, FeedEvent};

/// How a connected session came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Nobody is listening any more, stop for good
    ReceiverDropped,
    /// The venue went away, reconnect
    Disconnected,
}

/// Streams executed trades for one product, reconnecting when the
/// connection drops
pub struct CoinbaseFeed {
    url: String,
    product: String,
    reconnect_delay: Duration,
    /// 0 retries forever
    max_reconnect_attempts: u32,
    /// The venue sends a heartbeat every second, silence this long means
    /// the connection is dead
    idle_timeout: Duration,
    is_connected: Arc<AtomicBool>,
}

impl CoinbaseFeed {
    pub fn new(url: &str, product: &str) -> Self {
        Self {
            url: url.to_string(),
            product: product.to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0,
            idle_timeout: Duration::from_secs(30),
            is_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the delay between attempts and the attempt limit (0 = infinite)
    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Stream feed events into `sender` until the receiver is dropped or
    /// reconnect attempts run out
    #[instrument(skip(self, sender), fields(product = %self.product))]
    pub async fn run(&self, sender: mpsc::Sender<FeedEvent>) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            match self.session(&sender).await {
                Ok(SessionEnd::ReceiverDropped) => {
                    info!("Feed receiver dropped, stopping");
                    return Ok(());
                }
                // A session that connected earns a fresh set of attempts
                Ok(SessionEnd::Disconnected) => attempt = 0,
                Err(e) => warn!(error = %e, "WebSocket session failed"),
            }

            attempt += 1;
            if self.max_reconnect_attempts > 0 && attempt > self.max_reconnect_attempts {
                error!(attempts = self.max_reconnect_attempts, "Giving up on reconnecting");
                let reason = format!(
                    "gave up after {} reconnect attempts",
                    self.max_reconnect_attempts
                );
                let _ = sender
                    .send(FeedEvent::ConnectionStatus(ConnectionStatus::Error(
                        reason.clone(),
                    )))
                    .await;
                return Err(TradeError::WebSocketConnection(reason));
            }

            if !notify(&sender, ConnectionStatus::Reconnecting { attempt }).await {
                return Ok(());
            }
            info!(
                attempt,
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Reconnecting"
            );
            sleep(self.reconnect_delay).await;
        }
    }

    async fn session(&self, sender: &mpsc::Sender<FeedEvent>) -> Result<SessionEnd> {
        info!("Connecting to Coinbase WebSocket: {}", self.url);

        let (ws_stream, _response) = connect_async(&self.url)
            .await
            .map_err(|e| TradeError::WebSocketConnection(e.to_string()))?;

        info!("WebSocket connection established");
        self.is_connected.store(true, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        let msg_json = serde_json::to_string(&SubscribeRequest::matches(&self.product))?;
        debug!("Sending subscription message: {}", msg_json);
        if let Err(e) = write.send(Message::Text(msg_json)).await {
            self.is_connected.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        if !notify(sender, ConnectionStatus::Connected).await {
            self.is_connected.store(false, Ordering::SeqCst);
            return Ok(SessionEnd::ReceiverDropped);
        }

        let status = loop {
            let next = match timeout(self.idle_timeout, read.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(idle_secs = self.idle_timeout.as_secs(), "Feed went quiet");
                    break ConnectionStatus::Disconnected(Some("idle timeout".to_string()));
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => match self.parse_message(&text) {
                    Ok(Some(event)) => {
                        if sender.send(event).await.is_err() {
                            self.is_connected.store(false, Ordering::SeqCst);
                            return Ok(SessionEnd::ReceiverDropped);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Failed to parse message: {} - {}", e, text),
                },
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong itself
                    debug!("Received Ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("WebSocket closed: {:?}", frame);
                    break ConnectionStatus::Disconnected(frame.map(|f| f.reason.to_string()));
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break ConnectionStatus::Error(e.to_string());
                }
                None => {
                    info!("WebSocket stream ended");
                    break ConnectionStatus::Disconnected(None);
                }
                _ => {}
            }
        };

        self.is_connected.store(false, Ordering::SeqCst);
        if notify(sender, status).await {
            Ok(SessionEnd::Disconnected)
        } else {
            Ok(SessionEnd::ReceiverDropped)
        }
    }

    /// Turn a raw feed message into an event for this product, if it is one
    fn parse_message(&self, text: &str) -> Result<Option<FeedEvent>> {
        let event = match serde_json::from_str::<FeedMessage>(text)? {
            FeedMessage::Match(m) if m.product_id == self.product => {
                Some(FeedEvent::Trade(m.to_trade()))
            }
            FeedMessage::Match(m) => {
                trace!(product = %m.product_id, "Ignoring match for another product");
                None
            }
            FeedMessage::LastMatch(m) => {
                // May predate the subscription, not replayed into the pipeline
                debug!(trade_id = m.trade_id, price = %m.price, "Last match before subscribing");
                None
            }
            FeedMessage::Heartbeat(h) => {
                trace!(last_trade_id = ?h.last_trade_id, "Heartbeat");
                Some(FeedEvent::Heartbeat)
            }
            FeedMessage::Subscriptions(channels) => {
                info!(channels = %channels, "Subscribed");
                None
            }
            FeedMessage::Error(e) => {
                warn!(message = %e.message, reason = ?e.reason, "Feed reported an error");
                Some(FeedEvent::ConnectionStatus(ConnectionStatus::Error(e.message)))
            }
            FeedMessage::Unknown => None,
        };
        Ok(event)
    }
}

/// Send a status event, false once the receiver is gone
async fn notify(sender: &mpsc::Sender<FeedEvent>, status: ConnectionStatus) -> bool {
    sender.send(FeedEvent::ConnectionStatus(status)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn feed() -> CoinbaseFeed {
        CoinbaseFeed::new("wss://ws-feed.exchange.coinbase.com", "BTC-USD")
    }

    #[test]
    fn test_new_feed_is_disconnected() {
        assert!(!feed().is_connected());
    }

    #[test]
    fn test_parse_match_for_product() {
        let json = r#"{
            "type": "match",
            "trade_id": 7,
            "time": "2024-01-01T00:00:00Z",
            "product_id": "BTC-USD",
            "size": "0.5",
            "price": "42000.10",
            "side": "buy"
        }"#;

        match feed().parse_message(json).unwrap() {
            Some(FeedEvent::Trade(trade)) => {
                assert_eq!(trade.id, "coinbase.BTC-USD.7");
                assert_eq!(trade.price, dec!(42000.10));
            }
            other => panic!("Expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_other_products_and_last_match_ignored() {
        let other = r#"{"type": "match", "trade_id": 1, "time": "2024-01-01T00:00:00Z",
            "product_id": "ETH-USD", "size": "1", "price": "1", "side": "buy"}"#;
        let last = r#"{"type": "last_match", "trade_id": 1, "time": "2024-01-01T00:00:00Z",
            "product_id": "BTC-USD", "size": "1", "price": "1", "side": "buy"}"#;

        assert!(feed().parse_message(other).unwrap().is_none());
        assert!(feed().parse_message(last).unwrap().is_none());
    }

    #[test]
    fn test_parse_heartbeat() {
        let json = r#"{"type": "heartbeat", "sequence": 90, "last_trade_id": 20,
            "product_id": "BTC-USD", "time": "2024-01-01T00:00:00.000000Z"}"#;
        assert_eq!(
            feed().parse_message(json).unwrap(),
            Some(FeedEvent::Heartbeat)
        );
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            feed().parse_message("not json"),
            Err(TradeError::JsonParse(_))
        ));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Nothing listens on this port
        let feed = CoinbaseFeed::new("ws://127.0.0.1:9", "BTC-USD")
            .with_reconnect(Duration::from_millis(1), 2);
        let (tx, mut rx) = mpsc::channel(16);

        let result = feed.run(tx).await;

        assert!(matches!(result, Err(TradeError::WebSocketConnection(_))));
        let mut statuses = Vec::new();
        while let Ok(FeedEvent::ConnectionStatus(status)) = rx.try_recv() {
            statuses.push(status);
        }
        assert_eq!(
            statuses[..2],
            [
                ConnectionStatus::Reconnecting { attempt: 1 },
                ConnectionStatus::Reconnecting { attempt: 2 },
            ]
        );
        assert!(matches!(statuses[2], ConnectionStatus::Error(_)));
    }
}
