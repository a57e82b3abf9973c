//! # Opflow
//!
//! Sequential composition of fallible async operations.
//!
//! Opflow runs a queue of operations in order, feeding each one the output
//! of the previous one, with support for:
//!
//! - **Fallbacks**: each operation may carry one fallback tried on failure
//! - **Nesting**: a locked pipeline can be appended as a single step
//! - **Failure reports**: nested, human-readable reports instead of panics
//! - **Tracing**: optional per-pipeline run traces, nested traces included
//! - **Shell mode**: operations delegated to shell commands
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use opflow::prelude::*;
//! use serde_json::json;
//!
//! let mut pipeline = PipelineBuilder::new("greeting");
//! pipeline
//!     .append_fn(|args| Ok(json!(format!("hello {}", args[0]))), "greet")?
//!     .attach_fallback_fn(|_| Ok(json!("hello")), "plain greeting")?;
//!
//! let output = pipeline.run(vec![json!("world")]).await;
//! assert!(output.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod operation;
pub mod pipeline;
pub mod shell;
pub mod testing;
pub mod trace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EnvironmentSettings, LoopbackPolicy};
    pub use crate::core::{FailureReport, Output};
    pub use crate::errors::{OperationError, PipelineError, RunError};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::operation::{from_async, from_fn, IdentityOperation, Operation};
    pub use crate::pipeline::{Pipeline, PipelineBuilder};
    pub use crate::shell::{CommandRunner, ProcessCommandRunner, ShellOperation};
    pub use crate::trace::Trace;
}
