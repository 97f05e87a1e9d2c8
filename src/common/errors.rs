//! Error types for the application

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using our TradeError
pub type Result<T> = std::result::Result<T, TradeError>;

/// Main error type for pipeline and market operations
#[derive(Error, Debug)]
pub enum TradeError {
    /// Configuration errors, fatal at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The venue refused an order
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Not enough asset or currency to fill an order
    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Operation not supported by this market implementation
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Trade store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File based trade store errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Window boundary could not be computed for a timestamp
    #[error("Time rounding error: {0}")]
    TimeRounding(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TradeError {
    /// Errors that abort a single decision but leave the pipeline running.
    /// Configuration and internal contract errors stop it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TradeError::Configuration(_) | TradeError::Internal(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TradeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TradeError::WebSocketCommunication(err.to_string())
    }
}

impl From<chrono::RoundingError> for TradeError {
    fn from(err: chrono::RoundingError) -> Self {
        TradeError::TimeRounding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_configuration_is_not_recoverable() {
        assert!(!TradeError::Configuration("weights".into()).is_recoverable());
        assert!(!TradeError::Internal("cancel from strategy".into()).is_recoverable());
        assert!(TradeError::OrderRejected("post only".into()).is_recoverable());
    }

    #[test]
    fn test_insufficient_balance_message() {
        let err = TradeError::InsufficientBalance {
            needed: dec!(10.5),
            available: dec!(3),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: needed 10.5, available 3"
        );
    }
}
