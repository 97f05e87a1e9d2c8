use rust_decimal::Decimal;

use crate::common::errors::{Result, TradeError};
use crate::common::types::{Action, Bar, TrendEvent};
use crate::strategy::traits::Strategy;
use crate::strategy::types::Signal;

/// Exponentially weighted moving average with an optional warm-up.
///
/// With a warm-up of `n` samples the average is undefined until `n` samples
/// were added, then seeded with their mean. Without one, the first sample
/// seeds it.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    decay: Decimal,
    warmup: u32,
    count: u32,
    sum: Decimal,
    value: Option<Decimal>,
}

impl MovingAverage {
    /// `age` is the averaging window, decay is `2 / (age + 1)`
    pub fn new(age: u32, warmup: u32) -> Result<Self> {
        if age == 0 {
            return Err(TradeError::Configuration(
                "moving average window must be positive".to_string(),
            ));
        }
        Ok(Self {
            decay: Decimal::TWO / Decimal::from(age + 1),
            warmup,
            count: 0,
            sum: Decimal::ZERO,
            value: None,
        })
    }

    pub fn add(&mut self, sample: Decimal) {
        if let Some(value) = self.value {
            self.value = Some(sample * self.decay + value * (Decimal::ONE - self.decay));
            return;
        }

        if self.warmup == 0 {
            self.value = Some(sample);
            return;
        }

        self.count += 1;
        self.sum += sample;
        if self.count >= self.warmup {
            self.value = Some(self.sum / Decimal::from(self.warmup));
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn decay(&self) -> Decimal {
        self.decay
    }
}

/// Trend reversal detector on the EMA of bar closes
///
/// Tracks the sign of `previous_ema - current_ema` between bars and acts when
/// it flips: to positive → Buy (trough), to negative → Sell (peak).
#[derive(Debug, Clone)]
pub struct EmaStrategy {
    ema: MovingAverage,
    last_ema: Option<Decimal>,
    last_direction: Decimal,
}

impl EmaStrategy {
    pub fn new(window: u32, warmup: u32) -> Result<Self> {
        Ok(Self {
            ema: MovingAverage::new(window, warmup)?,
            last_ema: None,
            last_direction: Decimal::ZERO,
        })
    }

    pub fn current(&self) -> Option<Decimal> {
        self.ema.value()
    }
}

impl Strategy for EmaStrategy {
    fn name(&self) -> &str {
        "ema"
    }

    fn decide(&mut self, bar: &Bar) -> Signal {
        self.ema.add(bar.close);
        let new_ema = self.ema.value();

        let direction = match (self.last_ema, new_ema) {
            (Some(last), Some(new)) => last - new,
            _ => Decimal::ZERO,
        };

        let (action, event) = if direction > Decimal::ZERO && self.last_direction < Decimal::ZERO {
            (Action::Buy, Some(TrendEvent::Trough))
        } else if direction < Decimal::ZERO && self.last_direction > Decimal::ZERO {
            (Action::Sell, Some(TrendEvent::Peak))
        } else {
            (Action::Hold, None)
        };

        self.last_ema = new_ema;
        self.last_direction = direction;

        Signal::new(action).with_ema(new_ema).with_trend_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> Bar {
        Bar {
            window_start: Utc.timestamp_opt(0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            ema_value: None,
            trend_event: None,
        }
    }

    fn actions(strategy: &mut EmaStrategy, closes: &[Decimal]) -> Vec<Action> {
        closes
            .iter()
            .map(|close| strategy.decide(&bar(*close)).action)
            .collect()
    }

    #[test]
    fn test_moving_average_without_warmup() {
        let mut ema = MovingAverage::new(3, 0).unwrap();
        assert_eq!(ema.decay(), dec!(0.5));
        assert!(ema.value().is_none());

        ema.add(dec!(10));
        assert_eq!(ema.value(), Some(dec!(10)));
        ema.add(dec!(20));
        assert_eq!(ema.value(), Some(dec!(15)));
        ema.add(dec!(5));
        assert_eq!(ema.value(), Some(dec!(10)));
    }

    #[test]
    fn test_moving_average_warmup_seeds_with_mean() {
        let mut ema = MovingAverage::new(3, 3).unwrap();

        ema.add(dec!(1));
        ema.add(dec!(2));
        assert!(ema.value().is_none());
        ema.add(dec!(6));
        assert_eq!(ema.value(), Some(dec!(3)));
        ema.add(dec!(5));
        assert_eq!(ema.value(), Some(dec!(4)));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(EmaStrategy::new(0, 0).is_err());
    }

    #[test]
    fn test_first_bar_never_signals() {
        let mut strategy = EmaStrategy::new(3, 0).unwrap();
        let signal = strategy.decide(&bar(dec!(100)));

        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.annotations.ema_value, Some(dec!(100)));
        assert!(signal.annotations.trend_event.is_none());
    }

    #[test]
    fn test_flip_from_rising_to_falling_ema_buys() {
        let mut strategy = EmaStrategy::new(3, 0).unwrap();

        // ema: 10, 15 (dir -5), 12.5 (dir +2.5) -> flip to positive
        let got = actions(&mut strategy, &[dec!(10), dec!(20), dec!(10)]);
        assert_eq!(got, vec![Action::Hold, Action::Hold, Action::Buy]);
    }

    #[test]
    fn test_flip_from_falling_to_rising_ema_sells() {
        let mut strategy = EmaStrategy::new(3, 0).unwrap();

        // ema: 20, 15 (dir +5), 17.5 (dir -2.5) -> flip to negative
        let got = actions(&mut strategy, &[dec!(20), dec!(10), dec!(20)]);
        assert_eq!(got, vec![Action::Hold, Action::Hold, Action::Sell]);
    }

    #[test]
    fn test_trend_event_annotations() {
        let mut strategy = EmaStrategy::new(3, 0).unwrap();
        strategy.decide(&bar(dec!(10)));
        strategy.decide(&bar(dec!(20)));

        let buy = strategy.decide(&bar(dec!(10)));
        assert_eq!(buy.annotations.trend_event, Some(TrendEvent::Trough));
        assert_eq!(buy.annotations.ema_value, Some(dec!(12.5)));

        let sell = strategy.decide(&bar(dec!(20)));
        assert_eq!(sell.action, Action::Sell);
        assert_eq!(sell.annotations.trend_event, Some(TrendEvent::Peak));
    }

    #[test]
    fn test_steady_trend_holds() {
        let mut strategy = EmaStrategy::new(3, 0).unwrap();
        let got = actions(
            &mut strategy,
            &[dec!(10), dec!(11), dec!(12), dec!(13), dec!(14)],
        );
        assert!(got.iter().all(|a| *a == Action::Hold));
    }

    #[test]
    fn test_no_direction_during_warmup() {
        let mut strategy = EmaStrategy::new(3, 3).unwrap();

        // values swing hard, but the average is undefined for the first two
        let got = actions(&mut strategy, &[dec!(10), dec!(50), dec!(0)]);
        assert_eq!(got, vec![Action::Hold, Action::Hold, Action::Hold]);
        assert_eq!(strategy.current(), Some(dec!(20)));
    }
}
