//! Coinbase Exchange message types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{Side, Trade};

/// Venue name used in trade ids and trade store keys
pub const VENUE: &str = "coinbase";

/// Subscribe message for the public WebSocket feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub message_type: String,
    pub product_ids: Vec<String>,
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    /// Subscribe to executed trades and heartbeats for one product
    pub fn matches(product: &str) -> Self {
        Self {
            message_type: "subscribe".to_string(),
            product_ids: vec![product.to_string()],
            channels: vec!["matches".to_string(), "heartbeat".to_string()],
        }
    }
}

/// Incoming WebSocket message, tagged by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// A trade executed after we subscribed
    Match(MatchMessage),
    /// The most recent trade, sent once right after subscribing
    LastMatch(MatchMessage),
    /// Subscription acknowledgement
    Subscriptions(serde_json::Value),
    Heartbeat(HeartbeatMessage),
    Error(ErrorMessage),
    /// Any other channel message
    #[serde(other)]
    Unknown,
}

/// Executed trade on the `matches` channel
#[derive(Debug, Clone, Deserialize)]
pub struct MatchMessage {
    pub trade_id: i64,
    #[serde(default)]
    pub sequence: Option<i64>,
    pub time: DateTime<Utc>,
    pub product_id: String,
    pub size: Decimal,
    pub price: Decimal,
    pub side: String,
}

impl MatchMessage {
    pub fn to_trade(&self) -> Trade {
        Trade::new(
            VENUE,
            self.product_id.clone(),
            self.trade_id,
            self.price,
            self.size,
            self.time,
            parse_side(&self.side),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatMessage {
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub last_trade_id: Option<i64>,
    pub product_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Entry of `GET /products/{product}/trades`, newest first
#[derive(Debug, Clone, Deserialize)]
pub struct RestTrade {
    pub time: DateTime<Utc>,
    pub trade_id: i64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: String,
}

impl RestTrade {
    pub fn to_trade(&self, product: &str) -> Trade {
        Trade::new(
            VENUE,
            product,
            self.trade_id,
            self.price,
            self.size,
            self.time,
            parse_side(&self.side),
        )
    }
}

fn parse_side(side: &str) -> Side {
    match side.to_lowercase().as_str() {
        "buy" | "bid" => Side::Buy,
        _ => Side::Sell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscribe_request_shape() {
        let json = serde_json::to_value(SubscribeRequest::matches("BTC-USD")).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["product_ids"][0], "BTC-USD");
        assert_eq!(json["channels"][0], "matches");
    }

    #[test]
    fn test_parse_match() {
        let json = r#"{
            "type": "match",
            "trade_id": 10,
            "sequence": 50,
            "maker_order_id": "ac928c66-ca53-498f-9c13-a110027a60e8",
            "taker_order_id": "132fb6ae-456b-4654-b4e0-d681ac05cea1",
            "time": "2014-11-07T08:19:27.028459Z",
            "product_id": "BTC-USD",
            "size": "5.23512",
            "price": "400.23",
            "side": "sell"
        }"#;

        match serde_json::from_str::<FeedMessage>(json).unwrap() {
            FeedMessage::Match(m) => {
                let trade = m.to_trade();
                assert_eq!(trade.id, "coinbase.BTC-USD.10");
                assert_eq!(trade.price, dec!(400.23));
                assert_eq!(trade.size, dec!(5.23512));
                assert_eq!(trade.side, Side::Sell);
            }
            other => panic!("Expected match, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let json = r#"{"type": "ticker", "product_id": "BTC-USD", "price": "1"}"#;
        assert!(matches!(
            serde_json::from_str::<FeedMessage>(json).unwrap(),
            FeedMessage::Unknown
        ));
    }

    #[test]
    fn test_parse_error_message() {
        let json = r#"{"type": "error", "message": "Failed to subscribe", "reason": "BTC-XYZ is not a valid product"}"#;
        match serde_json::from_str::<FeedMessage>(json).unwrap() {
            FeedMessage::Error(e) => assert_eq!(e.message, "Failed to subscribe"),
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_rest_trade_conversion() {
        let json = r#"{"time": "2024-01-01T00:00:00.123Z", "trade_id": 74, "price": "10.00", "size": "0.01", "side": "buy"}"#;
        let trade = serde_json::from_str::<RestTrade>(json)
            .unwrap()
            .to_trade("ETH-USD");

        assert_eq!(trade.id, "coinbase.ETH-USD.74");
        assert_eq!(trade.sequence_id, 74);
        assert_eq!(trade.side, Side::Buy);
    }
}
