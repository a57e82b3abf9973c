//! Structured failure reports and their text rendering.

use crate::errors::{OperationError, DEFAULT_ERROR_TYPE, DEFAULT_FAILURE_EXIT_CODE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What failed: a single operation or a whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureSubject {
    /// A named operation.
    Operation {
        /// The operation's name.
        name: String,
    },
    /// A described pipeline.
    Pipeline {
        /// The pipeline's description.
        description: String,
    },
}

/// The body of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDetail {
    /// The stringified failure value.
    Message(String),
    /// Inner reports, each rendered one level deeper.
    Nested(Vec<FailureReport>),
}

/// A recursively nestable failure report.
///
/// Renders as:
///
/// ```text
/// ERROR! Error type: <type>
/// Name of the Operation that failed: "<name>"
/// Error exit code: <code>
/// Error output: <detail>
/// ```
///
/// Pipeline reports say `Operation Pipeline` instead of `Operation`. Each
/// nested report is prefixed with one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Type name of the underlying failure.
    pub type_name: String,
    /// The failing entity.
    pub subject: FailureSubject,
    /// Exit code of the failing entity.
    pub exit_code: i32,
    /// The report body.
    pub detail: FailureDetail,
}

impl FailureReport {
    /// Creates a report for a failed operation.
    #[must_use]
    pub fn operation(name: impl Into<String>, error: &OperationError) -> Self {
        Self {
            type_name: error.type_name.clone(),
            subject: FailureSubject::Operation { name: name.into() },
            exit_code: error.exit_code,
            detail: FailureDetail::Message(error.to_string()),
        }
    }

    /// Creates a pipeline report wrapping inner reports.
    ///
    /// The type name is taken from the first inner report.
    #[must_use]
    pub fn pipeline(description: impl Into<String>, inner: Vec<FailureReport>) -> Self {
        let type_name = inner
            .first()
            .map_or_else(|| DEFAULT_ERROR_TYPE.to_string(), |r| r.type_name.clone());

        Self {
            type_name,
            subject: FailureSubject::Pipeline {
                description: description.into(),
            },
            exit_code: DEFAULT_FAILURE_EXIT_CODE,
            detail: FailureDetail::Nested(inner),
        }
    }

    /// Creates a pipeline report with a plain message body.
    #[must_use]
    pub fn pipeline_message(description: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: DEFAULT_ERROR_TYPE.to_string(),
            subject: FailureSubject::Pipeline {
                description: description.into(),
            },
            exit_code: DEFAULT_FAILURE_EXIT_CODE,
            detail: FailureDetail::Message(message.into()),
        }
    }

    /// Returns the name or description of the failing entity.
    #[must_use]
    pub fn subject_name(&self) -> &str {
        match &self.subject {
            FailureSubject::Operation { name } => name,
            FailureSubject::Pipeline { description } => description,
        }
    }

    /// Returns the innermost operation reports, depth first.
    #[must_use]
    pub fn leaves(&self) -> Vec<&FailureReport> {
        match &self.detail {
            FailureDetail::Message(_) => vec![self],
            FailureDetail::Nested(inner) => inner.iter().flat_map(Self::leaves).collect(),
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR! Error type: {}", self.type_name)?;
        match &self.subject {
            FailureSubject::Operation { name } => {
                writeln!(f, "Name of the Operation that failed: \"{name}\"")?;
            }
            FailureSubject::Pipeline { description } => {
                writeln!(f, "Name of the Operation Pipeline that failed: \"{description}\"")?;
            }
        }
        writeln!(f, "Error exit code: {}", self.exit_code)?;
        f.write_str("Error output: ")?;

        match &self.detail {
            FailureDetail::Message(message) => f.write_str(message),
            FailureDetail::Nested(inner) => {
                for (i, report) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, " {report}")?;
                }
                Ok(())
            }
        }
    }
}
