//! Run order - direct command execution (not implemented yet)

use crate::order::{Host, Orderer};
use crate::types::{Order, OrderContext, Report};
use serde::{Deserialize, Serialize};

/// Runs `command` with `args`, resolving it on the search path when `find` is set
///
/// Declared so schematics with run orders load and sequence; executing one
/// currently produces an empty report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOrder {
    pub order: Order,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub find: bool,
}

impl Orderer for RunOrder {
    fn order(&self) -> &Order {
        &self.order
    }

    fn kind(&self) -> &'static str {
        "run"
    }

    fn execute(&self, _context: &OrderContext, _host: &mut Host<'_>) -> Report {
        log::debug!(
            "run order {} ({}) is not implemented, skipping",
            self.order.id,
            self.command
        );
        Report::default()
    }
}
