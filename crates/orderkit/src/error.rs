//! Error types for the orderkit crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while executing orders
///
/// Per-order failures are collected into [`Report::errors`](crate::Report)
/// rather than returned; only run validation surfaces as `Err`.
#[derive(Error, Debug)]
pub enum Error {
    /// Key or value cannot be stored in a process environment
    #[error("invalid environment variable {key:?}: {reason}")]
    InvalidEnvVar { key: String, reason: &'static str },

    /// Original value could not be put back after a script ran
    #[error("failed to restore environment variable {key:?}: {source}")]
    RestoreFailed {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Temporary script could not be written
    #[error("failed to write script {}: {source}", .path.display())]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script process could not be started
    #[error("failed to spawn script {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script output could not be collected
    #[error("failed to capture output of {}: {source}", .path.display())]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script exited unsuccessfully
    #[error("script {} failed: {status}", .path.display())]
    ScriptFailed {
        path: PathBuf,
        status: String,
        code: Option<i32>,
    },

    /// Two orders share an id
    #[error("duplicate order id: {0}")]
    DuplicateId(String),

    /// An order uses the global sentinel as its id
    #[error("order id {0:?} is reserved")]
    ReservedId(String),
}

impl Error {
    /// Returns true if this error came from the script child process itself
    /// rather than from preparing it
    pub fn is_script_failure(&self) -> bool {
        matches!(self, Error::ScriptFailed { .. })
    }
}

/// Result type for orderkit operations
pub type Result<T> = std::result::Result<T, Error>;
