//! Order decisions and lot bookkeeping
//!
//! The [`Trader`] subscribes to bars (decisions) and updates (bookkeeping).
//! For each bar it asks the strategy for an action, bounds the order by the
//! lot ledgers and the balance, shrinks it with a [`PositionSizer`] and
//! submits it to the market.

mod engine;
mod ledger;
mod sizing;

pub use engine::{Phase, Trader, TraderSummary};
pub use ledger::LotLedger;
pub use sizing::{
    sizer_from_mode, BoxedPositionSizer, FixedSizer, OrderSizer, PositionSizer, RandomSizer,
};
