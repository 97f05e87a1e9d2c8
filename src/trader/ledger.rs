use rust_decimal::Decimal;
use std::collections::HashMap;

/// Recent fills on one side, aggregated by price level
///
/// Matching walks the levels in hash order, so lots are closed out
/// approximately rather than first-in first-out.
#[derive(Debug, Clone, Default)]
pub struct LotLedger {
    levels: HashMap<Decimal, Decimal>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `size` at price level `price`
    pub fn add(&mut self, price: Decimal, size: Decimal) {
        *self.levels.entry(price).or_insert(Decimal::ZERO) += size;
    }

    /// Replace whatever is held at `price`
    pub fn set(&mut self, price: Decimal, size: Decimal) {
        self.levels.insert(price, size);
    }

    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Total size over levels accepted by `eligible`
    pub fn eligible_size(&self, eligible: impl Fn(Decimal) -> bool) -> Decimal {
        self.levels
            .iter()
            .filter(|(price, _)| eligible(**price))
            .map(|(_, size)| *size)
            .sum()
    }

    /// Total size over all levels
    pub fn total(&self) -> Decimal {
        self.levels.values().copied().sum()
    }

    /// Close out up to `size` against levels accepted by `eligible`.
    ///
    /// Returns the part of `size` nothing could be matched against.
    pub fn reduce(&mut self, size: Decimal, eligible: impl Fn(Decimal) -> bool) -> Decimal {
        let mut left = size;
        for (price, held) in self.levels.iter_mut() {
            if left <= Decimal::ZERO {
                break;
            }
            if !eligible(*price) {
                continue;
            }
            if *held <= left {
                left -= *held;
                *held = Decimal::ZERO;
            } else {
                *held -= left;
                left = Decimal::ZERO;
            }
        }
        self.collect_garbage();
        left
    }

    /// Drop exhausted levels
    pub fn collect_garbage(&mut self) {
        self.levels.retain(|_, size| *size > Decimal::ZERO);
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
