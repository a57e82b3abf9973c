//! Test assertions for run outputs.

use crate::core::Output;
use crate::errors::RunError;
use serde_json::Value;

/// Asserts that the output indicates success and carries no failure.
pub fn assert_output_succeeded(output: &Output) {
    assert!(
        output.is_success(),
        "Expected success, got exit code {}: {}",
        output.exit_code,
        output.error_msg
    );
    assert!(output.error.is_none(), "Successful output carries an error");
    assert!(output.error_msg.is_empty(), "Successful output carries an error message");
}

/// Asserts that the output indicates failure with a rendered report.
pub fn assert_output_failed(output: &Output) {
    assert!(
        output.is_failure(),
        "Expected failure, got pipe {:?}",
        output.pipe
    );
    assert!(output.error.is_some(), "Failed output has no error");
    assert!(!output.error_msg.is_empty(), "Failed output has no error message");
}

/// Asserts that the output's pipe equals `expected`.
pub fn assert_pipe_eq(output: &Output, expected: &[Value]) {
    assert_eq!(
        output.pipe, expected,
        "Expected pipe {:?}, got {:?}",
        expected, output.pipe
    );
}

/// Asserts that the output failed with the given high-level error.
pub fn assert_error(output: &Output, expected: RunError) {
    assert_eq!(
        output.error,
        Some(expected),
        "Expected error {:?}, got {:?}",
        expected,
        output.error
    );
}
