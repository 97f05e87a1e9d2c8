use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::common::types::Side;

/// Fee configuration for a venue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    /// Maker fee (providing liquidity) as a fraction of notional
    pub maker_rate: Decimal,
    /// Taker fee (taking liquidity) as a fraction of notional
    pub taker_rate: Decimal,
}

impl FeeSchedule {
    /// Same rate whichever side of the book the order lands on
    pub fn flat(rate: Decimal) -> Self {
        Self {
            maker_rate: rate,
            taker_rate: rate,
        }
    }

    pub fn free() -> Self {
        Self::flat(dec!(0))
    }

    /// Coinbase Exchange entry tier
    pub fn coinbase() -> Self {
        Self {
            maker_rate: dec!(0.004),
            taker_rate: dec!(0.006),
        }
    }

    /// Taker fee on `size` units at `price`
    pub fn fee(&self, price: Decimal, size: Decimal) -> Decimal {
        price * size * self.taker_rate
    }

    /// Currency moved by a taker order, fee included.
    ///
    /// A buy costs notional plus fee, a sell yields notional minus fee.
    pub fn settle(&self, side: Side, price: Decimal, size: Decimal) -> Decimal {
        let notional = price * size;
        match side {
            Side::Buy => notional + self.fee(price, size),
            Side::Sell => notional - self.fee(price, size),
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_schedule_settles_at_notional() {
        let fees = FeeSchedule::free();
        assert_eq!(fees.settle(Side::Buy, dec!(100), dec!(2)), dec!(200));
        assert_eq!(fees.settle(Side::Sell, dec!(100), dec!(2)), dec!(200));
    }

    #[test]
    fn test_taker_fee_applied_both_ways() {
        let fees = FeeSchedule::flat(dec!(0.01));
        assert_eq!(fees.fee(dec!(100), dec!(2)), dec!(2));
        assert_eq!(fees.settle(Side::Buy, dec!(100), dec!(2)), dec!(202));
        assert_eq!(fees.settle(Side::Sell, dec!(100), dec!(2)), dec!(198));
    }

    #[test]
    fn test_coinbase_uses_taker_rate() {
        let fees = FeeSchedule::coinbase();
        assert_eq!(fees.fee(dec!(1000), dec!(1)), dec!(6));
    }
}
