//! # orderkit
//!
//! Sequenced execution of bootstrap orders.
//!
//! A run is a list of orders - env, data, script and run - executed one at a
//! time in ascending sequence. Each order sees an effective context built from
//! the global context and its own, and hands back a [`Report`]. The engine
//! distributes the report's environment directions and shared data into the
//! held contexts before the next order starts, so later orders observe the
//! effects of earlier ones.
//!
//! ## Core Concepts
//!
//! - **Orderer**: Something with a sequence and an id that can execute
//! - **OrderContext**: Environment variables and shared data visible to one order
//! - **Report**: Effects of one execution (directions, data, exit code, output)
//! - **Environment**: The process environment, passed explicitly into a run
//!
//! ## Example
//!
//! ```no_run
//! use orderkit::{
//!     BoxedOrder, DataOrder, EngineOptions, EnvOrder, Order, ScriptOrder,
//!     SystemEnvironment, execute_simple,
//! };
//!
//! let orders: Vec<BoxedOrder> = vec![
//!     Box::new(EnvOrder::new(Order::new(0, "mode"), "APP_MODE", "dev")),
//!     Box::new(DataOrder::new(Order::new(1, "port"), "8080")),
//!     Box::new(ScriptOrder::new(
//!         Order::new(2, "announce"),
//!         "echo \"$APP_MODE on #shared[port]\"",
//!     )),
//! ];
//!
//! let outcome = execute_simple(orders, &mut SystemEnvironment, &EngineOptions::default())?;
//! assert!(outcome.summary().is_success());
//! # Ok::<(), orderkit::Error>(())
//! ```
//!
//! ## Reserved tokens
//!
//! - [`GLOBAL_OWNER`] (`#GLOBAL#`): owner of the global context
//! - [`SHARED_DATA_PREFIX`] (`#data:`): namespace of shared data keys
//! - `#shared[name]`: placeholder substituted in script sources

pub mod context;
pub mod data;
pub mod env;
pub mod environment;
pub mod error;
pub mod executor;
pub mod order;
pub mod run;
pub mod script;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, merge};
pub use data::DataOrder;
pub use env::EnvOrder;
pub use environment::{EnvGuard, Environment, MemoryEnvironment, SystemEnvironment, validate_var};
pub use error::{Error, Result};
pub use executor::{OrderOutcome, RunOutcome, execute, execute_simple, validate_ids};
pub use order::{BoxedOrder, Host, Orderer, sort_orders};
pub use run::RunOrder;
pub use script::{DEFAULT_SHELL, ScriptFile, ScriptOrder, substitute_shared};
pub use types::{
    EngineOptions, EnvDirection, FailurePolicy, GLOBAL_OWNER, Order, OrderContext, Report,
    RestorePolicy, RunSummary, SHARED_DATA_PREFIX, shared_key,
};
