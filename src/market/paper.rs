use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::fees::FeeSchedule;
use crate::common::errors::{Result, TradeError};
use crate::common::types::{Action, Balance, Side, Update};

#[derive(Debug)]
struct PaperState {
    balance: Balance,
    pending: Vec<Update>,
}

/// Simulated account filling every order immediately at its limit price.
///
/// Fills are queued as updates; the owning market delivers them once the
/// trade dispatch that led to the order has returned.
#[derive(Debug)]
pub struct PaperAccount {
    state: Mutex<PaperState>,
    fees: FeeSchedule,
}

impl PaperAccount {
    pub fn new(starting: Balance, fees: FeeSchedule) -> Self {
        Self {
            state: Mutex::new(PaperState {
                balance: starting,
                pending: Vec::new(),
            }),
            fees,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn balance(&self) -> Balance {
        self.lock().balance
    }

    pub fn buy(&self, size: Decimal, price: Decimal, at: DateTime<Utc>) -> Result<()> {
        info!(price = %price, size = %size, "Placed buy order");
        validate_order(size, price)?;

        let cost = self.fees.settle(Side::Buy, price, size);
        let mut state = self.lock();
        if cost > state.balance.currency {
            return Err(TradeError::InsufficientBalance {
                needed: cost,
                available: state.balance.currency,
            });
        }

        state.balance.currency -= cost;
        state.balance.asset += size;
        state.pending.push(Update::new(Action::Buy, price, size, at));
        Ok(())
    }

    pub fn sell(&self, size: Decimal, price: Decimal, at: DateTime<Utc>) -> Result<()> {
        info!(price = %price, size = %size, "Placed sell order");
        validate_order(size, price)?;

        let mut state = self.lock();
        if size > state.balance.asset {
            return Err(TradeError::InsufficientBalance {
                needed: size,
                available: state.balance.asset,
            });
        }

        state.balance.asset -= size;
        state.balance.currency += self.fees.settle(Side::Sell, price, size);
        state.pending.push(Update::new(Action::Sell, price, size, at));
        Ok(())
    }

    /// Fill updates not yet delivered, oldest first
    pub fn take_pending(&self) -> Vec<Update> {
        std::mem::take(&mut self.lock().pending)
    }
}

fn validate_order(size: Decimal, price: Decimal) -> Result<()> {
    if size <= Decimal::ZERO || price <= Decimal::ZERO {
        return Err(TradeError::OrderRejected(format!(
            "size and price must be positive, got size {} at {}",
            size, price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    fn account(asset: Decimal, currency: Decimal) -> PaperAccount {
        PaperAccount::new(Balance::new(asset, currency), FeeSchedule::free())
    }

    #[test]
    fn test_buy_moves_currency_into_asset() {
        let account = account(dec!(0), dec!(1000));
        account.buy(dec!(2), dec!(100), Utc::now()).unwrap();

        assert_eq!(account.balance(), Balance::new(dec!(2), dec!(800)));
    }

    #[test]
    fn test_sell_with_fee() {
        let account = PaperAccount::new(
            Balance::new(dec!(1), dec!(0)),
            FeeSchedule::flat(dec!(0.01)),
        );
        account.sell(dec!(1), dec!(100), Utc::now()).unwrap();

        assert_eq!(account.balance(), Balance::new(dec!(0), dec!(99)));
    }

    #[test]
    fn test_buy_beyond_currency_rejected() {
        let account = account(dec!(0), dec!(100));
        let err = account.buy(dec!(2), dec!(100), Utc::now()).unwrap_err();

        assert!(matches!(
            err,
            TradeError::InsufficientBalance { needed, available }
                if needed == dec!(200) && available == dec!(100)
        ));
        assert_eq!(account.balance(), Balance::new(dec!(0), dec!(100)));
        assert!(account.take_pending().is_empty());
    }

    #[test]
    fn test_sell_beyond_asset_rejected() {
        let account = account(dec!(0.5), dec!(0));
        assert_err!(account.sell(dec!(1), dec!(100), Utc::now()));
    }

    #[test]
    fn test_non_positive_order_rejected() {
        let account = account(dec!(1), dec!(1000));
        assert!(matches!(
            account.buy(dec!(0), dec!(100), Utc::now()),
            Err(TradeError::OrderRejected(_))
        ));
    }

    #[test]
    fn test_fills_queue_updates_in_order() {
        let account = account(dec!(1), dec!(1000));
        assert_ok!(account.buy(dec!(1), dec!(100), Utc::now()));
        assert_ok!(account.sell(dec!(0.5), dec!(110), Utc::now()));

        let pending = account.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].action, Action::Buy);
        assert_eq!(pending[1].action, Action::Sell);
        assert_eq!(pending[1].price, dec!(110));
        assert!(account.take_pending().is_empty());
    }
}
