//! Context merging and progress callbacks
//!
//! The callback traits let the engine report progress without depending
//! on a specific terminal UI.

use crate::types::{OrderContext, Report};

/// Build the effective context for an order
///
/// The order's own variables shadow global ones; shared data is always
/// inherited in full from the global context.
pub fn merge(global: &OrderContext, specific: &OrderContext) -> OrderContext {
    let mut env_vars = specific.env_vars.clone();
    for (key, value) in &global.env_vars {
        env_vars
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    OrderContext {
        owner: specific.owner.clone(),
        env_vars,
        data: global.data.clone(),
    }
}

/// Progress callback for a run
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once with the number of orders about to run
    fn on_run_start(&mut self, count: usize);

    /// Called when starting to execute an order
    fn on_order_start(&mut self, id: &str, kind: &str);

    /// Called when an order has executed and its effects were distributed
    fn on_order_complete(&mut self, id: &str, report: &Report);

    /// Called for each order left unexecuted after the run halted
    fn on_order_skipped(&mut self, id: &str, reason: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize) {}
    fn on_order_start(&mut self, _id: &str, _kind: &str) {}
    fn on_order_complete(&mut self, _id: &str, _report: &Report) {}
    fn on_order_skipped(&mut self, _id: &str, _reason: &str) {}
}
