//! Data order - publishes a shared value to every later order

use crate::order::{Host, Orderer};
use crate::types::{Order, OrderContext, Report, shared_key};
use serde::{Deserialize, Serialize};

/// Publishes `value` as shared data under `#data:<id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOrder {
    pub order: Order,
    pub value: String,
}

impl DataOrder {
    pub fn new(order: Order, value: impl Into<String>) -> Self {
        Self {
            order,
            value: value.into(),
        }
    }
}

impl Orderer for DataOrder {
    fn order(&self) -> &Order {
        &self.order
    }

    fn kind(&self) -> &'static str {
        "data"
    }

    fn execute(&self, _context: &OrderContext, _host: &mut Host<'_>) -> Report {
        let mut report = Report::default();

        // Empty values never become placeholder entries
        if !self.value.is_empty() {
            report
                .data
                .insert(shared_key(&self.order.id), self.value.clone());
        }

        report
    }
}
