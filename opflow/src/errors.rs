//! Error types for the opflow engine.
//!
//! Three layers of failure exist:
//! - [`PipelineError`]: usage errors raised while building a pipeline.
//! - [`OperationError`]: a single operation (or its fallback) failed.
//! - [`RunError`]: the terminal, unrecoverable outcome of a run, carried in
//!   [`Output`](crate::core::Output) rather than returned as an `Err`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Type name used for failures that don't name their own type.
pub const DEFAULT_ERROR_TYPE: &str = "Error";

/// Exit code reported for a failed operation unless it supplies its own.
pub const DEFAULT_FAILURE_EXIT_CODE: i32 = 1;

/// Errors raised by the pipeline builder when its contract is violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The pipeline was already run (or explicitly locked).
    #[error("Cannot modify Operation Pipeline \"{description}\": it is locked")]
    Locked {
        /// Description of the locked pipeline.
        description: String,
    },

    /// A fallback was attached before any operation was appended.
    #[error("Cannot attach fallback Operation \"{name}\": the Operation Pipeline has no Operation to fall back from")]
    EmptyQueue {
        /// Name of the rejected fallback.
        name: String,
    },

    /// The most recent operation already has a fallback.
    #[error("Operation \"{step}\" already has a fallback Operation")]
    FallbackAlreadyAttached {
        /// Name of the operation that already owns a fallback.
        step: String,
    },

    /// A shell command was appended to a pipeline without shell mode.
    #[error("Cannot append shell Operation \"{name}\": shell mode is disabled for this Operation Pipeline")]
    ShellDisabled {
        /// Name of the rejected shell operation.
        name: String,
    },
}

impl PipelineError {
    /// Creates a locked error.
    #[must_use]
    pub fn locked(description: impl Into<String>) -> Self {
        Self::Locked {
            description: description.into(),
        }
    }

    /// Creates an empty queue error.
    #[must_use]
    pub fn empty_queue(name: impl Into<String>) -> Self {
        Self::EmptyQueue { name: name.into() }
    }

    /// Creates a fallback-already-attached error.
    #[must_use]
    pub fn fallback_already_attached(step: impl Into<String>) -> Self {
        Self::FallbackAlreadyAttached { step: step.into() }
    }

    /// Creates a shell-disabled error.
    #[must_use]
    pub fn shell_disabled(name: impl Into<String>) -> Self {
        Self::ShellDisabled { name: name.into() }
    }

    /// Returns a stable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Locked { .. } => "LockedPipelineError",
            Self::EmptyQueue { .. } => "EmptyQueueError",
            Self::FallbackAlreadyAttached { .. } => "AlreadyHasFallbackError",
            Self::ShellDisabled { .. } => "ShellDisabledError",
        }
    }
}

/// A failure raised by an operation.
///
/// Displays like a thrown error value: the bare type name when there is no
/// message, otherwise `"<type>: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub struct OperationError {
    /// The failure's type name (e.g. `"Error"`, `"TypeError"`).
    pub type_name: String,
    /// The failure message, possibly empty.
    pub message: String,
    /// Exit code to report for this failure.
    pub exit_code: i32,
}

impl Default for OperationError {
    fn default() -> Self {
        Self {
            type_name: DEFAULT_ERROR_TYPE.to_string(),
            message: String::new(),
            exit_code: DEFAULT_FAILURE_EXIT_CODE,
        }
    }
}

impl OperationError {
    /// Creates a new operation error of the default type.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates an error of the default type with no message.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets the type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Sets the exit code.
    #[must_use]
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.type_name));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("exit_code".to_string(), serde_json::json!(self.exit_code));
        map
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string()).with_type_name("IoError")
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string()).with_type_name("SyntaxError")
    }
}

/// Terminal outcome of a run that could not be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunError {
    /// The main operation failed and had no fallback.
    #[error("ERROR: Operations Pipeline had an unrecoverable failure: The main Operation failed, and there was no fallback Operation for it.")]
    NoFallback,

    /// The main operation failed and its fallback failed too.
    #[error("ERROR: Operations Pipeline had an unrecoverable failure: The main Operation failed, and every fallback Operation for it also failed.")]
    FallbackFailed,
}

impl RunError {
    /// Returns a stable code for the outcome.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFallback => "UnrecoverableNoFallback",
            Self::FallbackFailed => "UnrecoverableFallbackFailed",
        }
    }
}
