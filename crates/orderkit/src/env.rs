//! Env order - sets a variable globally or routes it to named orders

use crate::order::{Host, Orderer};
use crate::types::{EnvDirection, Order, OrderContext, Report};
use serde::{Deserialize, Serialize};

/// Sets `key=value` for the whole run, or only for the listed orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOrder {
    pub order: Order,
    pub key: String,
    pub value: String,
    /// Order ids that receive the variable; empty means global
    #[serde(default)]
    pub targets: Vec<String>,
}

impl EnvOrder {
    pub fn new(order: Order, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            order,
            key: key.into(),
            value: value.into(),
            targets: Vec::new(),
        }
    }

    /// Route the variable to `targets` instead of the global context
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_global(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Orderer for EnvOrder {
    fn order(&self) -> &Order {
        &self.order
    }

    fn kind(&self) -> &'static str {
        "env"
    }

    fn execute(&self, _context: &OrderContext, host: &mut Host<'_>) -> Report {
        let mut report = Report::default();

        if self.is_global() {
            // Visible to every child process spawned from here on
            if let Err(e) = host.env.set_var(&self.key, &self.value) {
                report.fail(e);
                return report;
            }
            report
                .env_directions
                .push(EnvDirection::global(&self.key, &self.value));
        } else {
            report.env_directions = self
                .targets
                .iter()
                .map(|target| EnvDirection::targeted(target, &self.key, &self.value))
                .collect();
        }

        report
    }
}
