//! Execution engine - runs orders in sequence and distributes their effects

use crate::context::{NoProgress, ProgressCallback, merge};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::order::{BoxedOrder, Host, Orderer, sort_orders};
use crate::types::{
    EngineOptions, FailurePolicy, GLOBAL_OWNER, OrderContext, Report, RunSummary,
};
use std::collections::{BTreeMap, HashSet};

/// Report of one executed order
#[derive(Debug)]
pub struct OrderOutcome {
    pub id: String,
    pub kind: &'static str,
    pub report: Report,
}

/// Everything a run leaves behind
#[derive(Debug)]
pub struct RunOutcome {
    /// Accumulated global context
    pub global: OrderContext,
    /// Final per-order contexts, keyed by order id
    pub contexts: BTreeMap<String, OrderContext>,
    /// Executed orders, in execution order
    pub outcomes: Vec<OrderOutcome>,
    /// Ids of orders not executed because the run halted
    pub skipped: Vec<String>,
}

impl RunOutcome {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            skipped: self.skipped.len(),
            ..Default::default()
        };
        for outcome in &self.outcomes {
            summary.add_report(&outcome.report);
        }
        summary
    }

    /// Report of the order with `id`, if it executed
    pub fn report(&self, id: &str) -> Option<&Report> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.id == id)
            .map(|outcome| &outcome.report)
    }

    /// Halting order, if the run stopped early
    pub fn halted_by(&self) -> Option<&str> {
        if self.skipped.is_empty() {
            return None;
        }
        self.outcomes.last().map(|outcome| outcome.id.as_str())
    }
}

/// Execute orders in sequence
///
/// # Arguments
/// * `orders` - Orders in declaration order
/// * `env` - Process environment the orders mutate
/// * `opts` - Failure, restore and script options
/// * `progress` - Progress callback
///
/// # Returns
/// The final contexts and every report. Only id validation fails the call;
/// per-order failures are recorded in their reports.
pub fn execute<P>(
    mut orders: Vec<BoxedOrder>,
    env: &mut dyn Environment,
    opts: &EngineOptions,
    progress: &mut P,
) -> Result<RunOutcome>
where
    P: ProgressCallback,
{
    validate_ids(&orders)?;
    sort_orders(&mut orders);

    let mut global = OrderContext::global();
    let mut contexts: BTreeMap<String, OrderContext> = orders
        .iter()
        .map(|order| (order.id().to_string(), OrderContext::new(order.id())))
        .collect();
    let mut outcomes = Vec::with_capacity(orders.len());
    let mut skipped = Vec::new();

    progress.on_run_start(orders.len());

    let mut remaining = orders.iter();
    for order in remaining.by_ref() {
        let own = contexts
            .get(order.id())
            .cloned()
            .unwrap_or_else(|| OrderContext::new(order.id()));
        let effective = if order.order().ignore_global {
            own
        } else {
            merge(&global, &own)
        };

        progress.on_order_start(order.id(), order.kind());
        log::info!("executing {} order {}", order.kind(), order.id());

        let report = {
            let mut host = Host::new(&mut *env, opts);
            order.execute(&effective, &mut host)
        };

        distribute(&report, &mut global, &mut contexts);
        progress.on_order_complete(order.id(), &report);

        let halt = should_halt(order.as_ref(), &report, opts.failure);
        if !report.is_success() {
            for error in &report.errors {
                log::warn!("order {} failed: {error}", order.id());
            }
        }

        outcomes.push(OrderOutcome {
            id: order.id().to_string(),
            kind: order.kind(),
            report,
        });

        if halt {
            log::warn!("halting run after failed order {}", order.id());
            break;
        }
    }

    for order in remaining {
        let reason = format!("run halted before order {}", order.id());
        progress.on_order_skipped(order.id(), &reason);
        skipped.push(order.id().to_string());
    }

    Ok(RunOutcome {
        global,
        contexts,
        outcomes,
        skipped,
    })
}

/// Execute without progress reporting
pub fn execute_simple(
    orders: Vec<BoxedOrder>,
    env: &mut dyn Environment,
    opts: &EngineOptions,
) -> Result<RunOutcome> {
    execute(orders, env, opts, &mut NoProgress)
}

/// Reject duplicate ids and the reserved global id
pub fn validate_ids(orders: &[BoxedOrder]) -> Result<()> {
    let mut seen = HashSet::new();
    for order in orders {
        if order.id() == GLOBAL_OWNER {
            return Err(Error::ReservedId(order.id().to_string()));
        }
        if !seen.insert(order.id()) {
            return Err(Error::DuplicateId(order.id().to_string()));
        }
    }
    Ok(())
}

/// Apply a report's directions and shared data to the held contexts
fn distribute(
    report: &Report,
    global: &mut OrderContext,
    contexts: &mut BTreeMap<String, OrderContext>,
) {
    for direction in &report.env_directions {
        if direction.is_global() {
            global
                .env_vars
                .insert(direction.key.clone(), direction.value.clone());
            continue;
        }

        match contexts.get_mut(&direction.target) {
            Some(context) => {
                context
                    .env_vars
                    .insert(direction.key.clone(), direction.value.clone());
            }
            None => log::warn!(
                "no order {:?} to receive {}, skipping",
                direction.target,
                direction.key
            ),
        }
    }

    for (key, value) in &report.data {
        global.data.insert(key.clone(), value.clone());
    }
}

fn should_halt(order: &dyn Orderer, report: &Report, policy: FailurePolicy) -> bool {
    match policy {
        FailurePolicy::Continue => false,
        FailurePolicy::Halt => !report.is_success() && !order.order().ignore_fail,
    }
}
