//! Core types shared by every order kind and the engine

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owner of the process-wide context, and the target of global env directions
pub const GLOBAL_OWNER: &str = "#GLOBAL#";

/// Prefix for shared-data keys published by data orders
pub const SHARED_DATA_PREFIX: &str = "#data:";

/// Identity fields carried by every order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Position in the run; lower runs first
    pub sequence: i64,
    /// Unique id, also the key of the order's context
    pub id: String,
    /// Keep going after this order fails under [`FailurePolicy::Halt`]
    #[serde(default)]
    pub ignore_fail: bool,
    /// Execute against the order's own context only
    #[serde(default)]
    pub ignore_global: bool,
}

impl Order {
    /// Create an order header with both flags off
    pub fn new(sequence: i64, id: impl Into<String>) -> Self {
        Self {
            sequence,
            id: id.into(),
            ignore_fail: false,
            ignore_global: false,
        }
    }

    pub fn ignore_fail(mut self, ignore: bool) -> Self {
        self.ignore_fail = ignore;
        self
    }

    pub fn ignore_global(mut self, ignore: bool) -> Self {
        self.ignore_global = ignore;
        self
    }
}

/// Environment variables and shared data visible to one order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContext {
    pub owner: String,
    pub env_vars: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

impl OrderContext {
    /// Empty context owned by `owner`
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            env_vars: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// Empty global context
    pub fn global() -> Self {
        Self::new(GLOBAL_OWNER)
    }

}

/// Build the namespaced shared-data key for `name`
pub fn shared_key(name: &str) -> String {
    format!("{SHARED_DATA_PREFIX}{name}")
}

/// Deferred instruction to set a variable in a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDirection {
    /// Order id, or [`GLOBAL_OWNER`]
    pub target: String,
    pub key: String,
    pub value: String,
}

impl EnvDirection {
    pub fn global(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target: GLOBAL_OWNER.to_string(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn targeted(
        target: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.target == GLOBAL_OWNER
    }
}

/// Effects of executing one order
#[derive(Debug, Default)]
pub struct Report {
    pub env_directions: Vec<EnvDirection>,
    pub data: BTreeMap<String, String>,
    pub exit_code: i32,
    pub errors: Vec<Error>,
    /// Combined stdout/stderr of a script, empty for other kinds
    pub output: Vec<u8>,
}

impl Report {
    /// Record a failure and mark the report as failed
    pub fn fail(&mut self, error: Error) {
        self.errors.push(error);
        self.exit_code = 1;
    }

    /// Check if the order succeeded
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.errors.is_empty()
    }

    /// Captured output as text
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }

    /// Check if the report carries no effects at all
    pub fn is_empty(&self) -> bool {
        self.env_directions.is_empty()
            && self.data.is_empty()
            && self.errors.is_empty()
            && self.output.is_empty()
            && self.exit_code == 0
    }
}

/// What the engine does after an order fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Run every order regardless of earlier failures
    #[default]
    Continue,
    /// Stop at the first failing order unless it sets `ignore_fail`
    Halt,
}

/// How script executions put the environment back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// Restore previous values and remove variables that were unset
    #[default]
    Exact,
    /// Restore only variables that previously held a non-empty value
    Legacy,
}

/// Options for a run
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub failure: FailurePolicy,
    pub restore: RestorePolicy,
    /// Leave generated scripts on disk for debugging
    pub keep_scripts: bool,
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Check if every executed order succeeded and none were skipped
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Total number of orders in the run
    pub fn total(&self) -> usize {
        self.executed + self.skipped
    }

    /// Add an executed order's report to the summary
    pub fn add_report(&mut self, report: &Report) {
        self.executed += 1;
        if !report.is_success() {
            self.failed += 1;
        }
    }
}
