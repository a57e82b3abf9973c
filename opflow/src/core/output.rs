//! The result of running a pipeline.

use super::FailureReport;
use crate::errors::RunError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Exit code of a successful run.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a failed run.
pub const EXIT_FAILURE: i32 = 1;

/// The outcome of a pipeline run.
///
/// `exit_code == 0`, `error_msg.is_empty()` and `error.is_none()` always
/// agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// `0` on success, `1` on failure.
    pub exit_code: i32,

    /// The produced pipe value.
    pub pipe: Vec<Value>,

    /// The high-level failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,

    /// The rendered failure report, empty on success.
    #[serde(default)]
    pub error_msg: String,

    /// The structured failure report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<FailureReport>,
}

impl Output {
    /// Creates a successful output.
    #[must_use]
    pub fn success(pipe: Vec<Value>) -> Self {
        Self {
            exit_code: EXIT_SUCCESS,
            pipe,
            error: None,
            error_msg: String::new(),
            report: None,
        }
    }

    /// Creates a failed output.
    #[must_use]
    pub fn failure(pipe: Vec<Value>, error: RunError, report: FailureReport) -> Self {
        Self {
            exit_code: EXIT_FAILURE,
            pipe,
            error: Some(error),
            error_msg: report.to_string(),
            report: Some(report),
        }
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }

    /// Returns true if the run failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns the high-level error message, or an empty string.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error.map(|e| e.to_string()).unwrap_or_default()
    }

    /// Returns the first pipe element.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.pipe.first()
    }

    /// Converts into a `Result` of the pipe value.
    ///
    /// # Errors
    ///
    /// Returns the failure report if the run failed.
    pub fn into_result(self) -> Result<Vec<Value>, FailureReport> {
        match self.report {
            Some(report) => Err(report),
            None => Ok(self.pipe),
        }
    }

    /// Converts the output to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("exit_code".to_string(), serde_json::json!(self.exit_code));
        map.insert("pipe".to_string(), Value::Array(self.pipe.clone()));
        map.insert("error".to_string(), serde_json::json!(self.error_message()));
        map.insert("error_msg".to_string(), serde_json::json!(self.error_msg));
        map
    }
}
