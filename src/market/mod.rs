//! Market adapters shared pieces and the historical replay market
//!
//! The live adapter lives in [`crate::coinbase`]; both use a
//! [`PaperAccount`] for orders.

mod cache;
mod fees;
mod paper;
mod replay;

pub use cache::BalanceCache;
pub use fees::FeeSchedule;
pub use paper::PaperAccount;
pub use replay::ReplayMarket;
