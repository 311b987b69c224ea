//! Orderer trait for sequenced execution
//!
//! An order is one declared unit of work. Every kind shares the [`Order`]
//! header and is executed against an [`OrderContext`], producing a
//! [`Report`] whose effects the engine distributes afterwards.

use crate::environment::Environment;
use crate::types::{EngineOptions, Order, OrderContext, Report};
use std::fmt;

/// Host resources an order executes against
pub struct Host<'a> {
    /// Process environment, mutated by env and script orders
    pub env: &'a mut dyn Environment,
    /// Run-wide options
    pub options: &'a EngineOptions,
}

impl<'a> Host<'a> {
    pub fn new(env: &'a mut dyn Environment, options: &'a EngineOptions) -> Self {
        Self { env, options }
    }
}

/// Core trait for all order kinds
///
/// # Example
///
/// ```ignore
/// use orderkit::{Host, Order, OrderContext, Orderer, Report};
///
/// #[derive(Debug)]
/// struct Noop { order: Order }
///
/// impl Orderer for Noop {
///     fn order(&self) -> &Order { &self.order }
///     fn kind(&self) -> &'static str { "noop" }
///     fn execute(&self, _context: &OrderContext, _host: &mut Host<'_>) -> Report {
///         Report::default()
///     }
/// }
/// ```
pub trait Orderer: fmt::Debug {
    /// Shared header of this order
    fn order(&self) -> &Order;

    /// Kind label used in logs and output (e.g. "env", "script")
    fn kind(&self) -> &'static str;

    /// Execute against `context`
    ///
    /// Implementations must not fail outright: every problem is recorded in
    /// the returned report, and all effects on contexts travel through it.
    fn execute(&self, context: &OrderContext, host: &mut Host<'_>) -> Report;

    /// Position in the run
    fn sequence(&self) -> i64 {
        self.order().sequence
    }

    fn id(&self) -> &str {
        &self.order().id
    }
}

/// A boxed order for type-erased storage
pub type BoxedOrder = Box<dyn Orderer>;

/// Stable sort by sequence; equal sequences keep declaration order
pub fn sort_orders(orders: &mut [BoxedOrder]) {
    orders.sort_by_key(|order| order.sequence());
}
