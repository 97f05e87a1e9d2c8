use serde::{Deserialize, Serialize};

use crate::common::types::{Action, BarAnnotations, TrendEvent};
use rust_decimal::Decimal;

/// Outcome of evaluating one bar
///
/// `action` is what the trader should attempt, `annotations` are recorded on
/// the trader's copy of the bar for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub annotations: BarAnnotations,
}

impl Signal {
    /// Do nothing, no annotations
    pub fn hold() -> Self {
        Self::new(Action::Hold)
    }

    pub fn new(action: Action) -> Self {
        Self {
            action,
            annotations: BarAnnotations::default(),
        }
    }

    pub fn with_ema(mut self, ema_value: Option<Decimal>) -> Self {
        self.annotations.ema_value = ema_value;
        self
    }

    pub fn with_trend_event(mut self, event: Option<TrendEvent>) -> Self {
        self.annotations.trend_event = event;
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::hold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hold_has_no_annotations() {
        let signal = Signal::hold();
        assert!(signal.is_hold());
        assert_eq!(signal.annotations, BarAnnotations::default());
    }

    #[test]
    fn test_builder_sets_annotations() {
        let signal = Signal::new(Action::Buy)
            .with_ema(Some(dec!(101.5)))
            .with_trend_event(Some(TrendEvent::Trough));

        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.annotations.ema_value, Some(dec!(101.5)));
        assert_eq!(signal.annotations.trend_event, Some(TrendEvent::Trough));
    }
}
