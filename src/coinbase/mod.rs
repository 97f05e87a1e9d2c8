//! Coinbase Exchange live market
//!
//! This module provides:
//! - WebSocket feed for executed trades, with reconnect
//! - REST client for paging historical trades (backfill)
//! - [`CoinbaseMarket`], the live [`Market`](crate::common::traits::Market)

pub mod client;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use client::CoinbaseMarket;
pub use messages::VENUE;
pub use rest::{CoinbaseRestClient, TradePage};
pub use websocket::CoinbaseFeed;
