use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::common::precision::Precision;
use crate::config::types::SizingMode;

/// Fraction of the eligible size a single decision commits
///
/// Implementations return a value in (0, 1].
pub trait PositionSizer: Send {
    fn fraction(&mut self) -> Decimal;
}

/// Boxed sizer for dynamic dispatch
pub type BoxedPositionSizer = Box<dyn PositionSizer>;

/// Always the same fraction
#[derive(Debug, Clone, Copy)]
pub struct FixedSizer {
    fraction: Decimal,
}

impl FixedSizer {
    pub fn new(fraction: Decimal) -> Self {
        Self { fraction }
    }
}

impl PositionSizer for FixedSizer {
    fn fraction(&mut self) -> Decimal {
        self.fraction
    }
}

/// Uniform fraction in (0, 1]
pub struct RandomSizer<R = StdRng> {
    rng: R,
}

impl RandomSizer<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for RandomSizer<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> RandomSizer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> PositionSizer for RandomSizer<R> {
    fn fraction(&mut self) -> Decimal {
        Decimal::new(self.rng.gen_range(1..=1_000_000_000), 9)
    }
}

pub fn sizer_from_mode(mode: SizingMode) -> BoxedPositionSizer {
    match mode {
        SizingMode::Random => Box::new(RandomSizer::new()),
        SizingMode::Fixed { fraction } => Box::new(FixedSizer::new(fraction)),
    }
}

/// Turns an eligible size into the size of one order
pub struct OrderSizer {
    min_order_size: Decimal,
    precision: Precision,
    sizer: BoxedPositionSizer,
}

impl OrderSizer {
    pub fn new(min_order_size: Decimal, precision: Precision, sizer: BoxedPositionSizer) -> Self {
        Self {
            min_order_size,
            precision,
            sizer,
        }
    }

    pub fn min_order_size(&self) -> Decimal {
        self.min_order_size
    }

    /// Size to submit for `eligible`, or zero when nothing can be ordered.
    ///
    /// - Below the minimum order size nothing is ordered
    /// - A reduced size below the minimum becomes the minimum
    /// - A remainder below the minimum is folded into this order
    pub fn quantity(&mut self, eligible: Decimal) -> Decimal {
        if eligible < self.min_order_size {
            return Decimal::ZERO;
        }

        let eligible = self.precision.asset(eligible);
        let mut size = self.precision.asset(eligible * self.sizer.fraction());

        if size < self.min_order_size {
            size = self.min_order_size;
        }
        if eligible - size < self.min_order_size {
            size = eligible;
        }

        size
    }
}
