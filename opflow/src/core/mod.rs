//! Core result types.
//!
//! This module contains:
//! - The run output with its exit-code invariants
//! - Structured, nestable failure reports

mod output;
mod report;

pub use output::{Output, EXIT_FAILURE, EXIT_SUCCESS};
pub use report::{FailureDetail, FailureReport, FailureSubject};
