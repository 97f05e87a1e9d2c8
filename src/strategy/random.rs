use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::common::errors::{Result, TradeError};
use crate::common::types::{Action, Bar};
use crate::strategy::traits::Strategy;
use crate::strategy::types::Signal;

/// Resolution of the uniform draw, in decimal places
const DRAW_SCALE: u32 = 9;
const DRAW_RANGE: i64 = 1_000_000_000;

/// Baseline strategy drawing an action at random with fixed weights
///
/// Ignores the bar entirely.
pub struct RandomStrategy<R = StdRng> {
    wait: Decimal,
    buy: Decimal,
    sell: Decimal,
    rng: R,
}

impl RandomStrategy<StdRng> {
    /// Weights must add up to exactly one
    pub fn new(wait: Decimal, buy: Decimal, sell: Decimal) -> Result<Self> {
        Self::with_rng(wait, buy, sell, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> RandomStrategy<R> {
    pub fn with_rng(wait: Decimal, buy: Decimal, sell: Decimal, rng: R) -> Result<Self> {
        if [wait, buy, sell].iter().any(|w| w.is_sign_negative()) {
            return Err(TradeError::Configuration(
                "random strategy weights must not be negative".to_string(),
            ));
        }
        if wait + buy + sell != Decimal::ONE {
            return Err(TradeError::Configuration(format!(
                "random strategy weights sum to {}, expected 1",
                wait + buy + sell
            )));
        }
        Ok(Self {
            wait,
            buy,
            sell,
            rng,
        })
    }

    /// Uniform draw in [0, 1)
    fn draw(&mut self) -> Decimal {
        Decimal::new(self.rng.gen_range(0..DRAW_RANGE), DRAW_SCALE)
    }

    fn action_for(&self, draw: Decimal) -> Action {
        if draw <= self.buy {
            Action::Buy
        } else if draw <= self.buy + self.sell {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    pub fn wait_weight(&self) -> Decimal {
        self.wait
    }
}

impl<R: Rng + Send> Strategy for RandomStrategy<R> {
    fn name(&self) -> &str {
        "random"
    }

    fn decide(&mut self, _bar: &Bar) -> Signal {
        let draw = self.draw();
        Signal::new(self.action_for(draw))
    }
}
