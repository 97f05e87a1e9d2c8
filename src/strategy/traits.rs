use crate::common::types::Bar;
use crate::strategy::types::Signal;

/// Core strategy trait
///
/// Strategies receive completed bars and answer with a [`Signal`].
/// They own whatever indicator state they need.
///
/// # Implementation Notes
///
/// - `decide` must be fast: no I/O, it runs while the trader holds its lock
/// - It cannot fail; anything that could go wrong is checked at construction
/// - Internal state is updated on every bar, whatever the returned action
pub trait Strategy: Send {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Evaluate one completed bar
    fn decide(&mut self, bar: &Bar) -> Signal;
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
