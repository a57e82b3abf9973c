//! Testing utilities for opflow pipelines.
//!
//! This module provides:
//! - Mock operations that count, record, fail or sleep
//! - Assertions for run outputs

mod assertions;
mod mocks;

pub use assertions::{
    assert_error, assert_output_failed, assert_output_succeeded, assert_pipe_eq,
};
pub use mocks::{FailingOperation, MockOperation, RecordingOperation, SlowOperation};
