use std::sync::{Mutex, PoisonError};

use crate::common::types::Balance;

/// Last known balance, owned by a market adapter
///
/// Adapters invalidate it on every order and every delivered update, so a
/// cached value is never used to size an order after the account changed.
#[derive(Debug, Default)]
pub struct BalanceCache {
    cached: Mutex<Option<Balance>>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Balance> {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, balance: Balance) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(balance);
    }

    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_set_get_invalidate() {
        let cache = BalanceCache::new();
        assert!(cache.get().is_none());

        cache.set(Balance::new(dec!(1), dec!(2)));
        assert_eq!(cache.get(), Some(Balance::new(dec!(1), dec!(2))));

        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
