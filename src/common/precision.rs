//! Decimal place trimming for prices and sizes

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Floor `value` to `places` decimal places.
///
/// Orders and ledger price levels are always trimmed downwards so a trimmed
/// size never exceeds what the balance allows.
pub fn trim(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::ToNegativeInfinity)
}

/// Number of decimal places the venue accepts for each side of the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    /// Decimal places for asset quantities
    pub asset_places: u32,
    /// Decimal places for currency amounts and prices
    pub currency_places: u32,
}

impl Precision {
    pub fn new(asset_places: u32, currency_places: u32) -> Self {
        Self {
            asset_places,
            currency_places,
        }
    }

    pub fn asset(&self, value: Decimal) -> Decimal {
        trim(value, self.asset_places)
    }

    pub fn price(&self, value: Decimal) -> Decimal {
        trim(value, self.currency_places)
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::new(8, 2)
    }
}
