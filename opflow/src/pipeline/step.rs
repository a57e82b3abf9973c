//! Steps: a primary task plus at most one fallback.

use super::Pipeline;
use crate::core::FailureReport;
use crate::errors::RunError;
use crate::observability::SpanTimer;
use crate::operation::Operation;
use crate::trace::Trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// An in-process operation.
    Operation,
    /// A shell-delegated operation.
    Shell,
    /// A nested pipeline.
    Pipeline,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation => write!(f, "operation"),
            Self::Shell => write!(f, "shell"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// Identity of an enqueued step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepIdentity {
    /// Unique id of the step.
    pub id: Uuid,
    /// What the step runs.
    pub kind: StepKind,
    /// Position in the queue; a fallback shares its owner's position.
    pub position: usize,
}

impl StepIdentity {
    /// Creates a fresh identity.
    #[must_use]
    pub fn new(kind: StepKind, position: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            position,
        }
    }
}

/// Per-step settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StepEnvironment {
    /// Inherited shell-mode tag of the owning pipeline.
    pub use_shell: bool,
    /// Whether this step is a fallback.
    pub is_fallback: bool,
}

#[derive(Clone)]
pub(crate) enum Task {
    Operation(Arc<dyn Operation>),
    Pipeline(Arc<Pipeline>),
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(op) => f.debug_tuple("Operation").field(op).finish(),
            Self::Pipeline(p) => f.debug_tuple("Pipeline").field(&p.description()).finish(),
        }
    }
}

/// Result of invoking a single task.
struct TaskRun {
    result: Result<Vec<Value>, FailureReport>,
    nested_trace: Option<Trace>,
}

impl Task {
    async fn invoke(&self, name: &str, args: &[Value]) -> TaskRun {
        match self {
            Self::Operation(op) => TaskRun {
                result: op
                    .invoke(args)
                    .await
                    .map(|value| vec![value])
                    .map_err(|e| FailureReport::operation(name, &e)),
                nested_trace: None,
            },
            Self::Pipeline(nested) => {
                let output = nested.run(args.to_vec()).await;
                let nested_trace = nested.traceback();
                let result = if output.is_success() {
                    Ok(output.pipe)
                } else {
                    let message = output.error_msg;
                    Err(output.report.unwrap_or_else(|| {
                        FailureReport::pipeline_message(nested.description(), message)
                    }))
                };
                TaskRun {
                    result,
                    nested_trace,
                }
            }
        }
    }
}

/// How a step ended.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    /// The primary task succeeded.
    Completed(Vec<Value>),
    /// The primary failed and the fallback succeeded.
    Recovered {
        pipe: Vec<Value>,
        primary: FailureReport,
    },
    /// No usable recovery. Reports are ordered fallback first.
    Failed {
        error: RunError,
        reports: Vec<FailureReport>,
    },
}

/// A named unit holding a primary task and an optional fallback.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    task: Task,
    fallback: Option<Box<Step>>,
    identity: StepIdentity,
    environment: StepEnvironment,
}

impl Step {
    pub(crate) fn new(
        name: impl Into<String>,
        task: Task,
        identity: StepIdentity,
        environment: StepEnvironment,
    ) -> Self {
        Self {
            name: name.into(),
            task,
            fallback: None,
            identity,
            environment,
        }
    }

    /// Returns the step's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the step's identity.
    #[must_use]
    pub fn identity(&self) -> &StepIdentity {
        &self.identity
    }

    /// Returns the step's local settings.
    #[must_use]
    pub fn environment(&self) -> &StepEnvironment {
        &self.environment
    }

    /// Returns the fallback, if any.
    #[must_use]
    pub fn fallback(&self) -> Option<&Step> {
        self.fallback.as_deref()
    }

    pub(crate) fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub(crate) fn set_fallback(&mut self, fallback: Step) {
        self.fallback = Some(Box::new(fallback));
    }

    /// Runs the step, consulting the fallback on failure.
    ///
    /// Also returns the traces of any nested pipelines that ran.
    pub(crate) async fn execute(&self, args: &[Value]) -> (StepOutcome, Vec<Trace>) {
        let mut nested = Vec::new();
        let timer = SpanTimer::start(&self.name);
        debug!(step = %self.name, kind = %self.identity.kind, "Running operation");

        let primary = self.task.invoke(&self.name, args).await;
        nested.extend(primary.nested_trace);

        let primary_report = match primary.result {
            Ok(pipe) => {
                debug!(step = %self.name, duration_ms = timer.elapsed_ms(), "Operation succeeded");
                return (StepOutcome::Completed(pipe), nested);
            }
            Err(report) => report,
        };

        // One level deep: a fallback's own fallback is never consulted.
        let Some(fallback) = self.fallback.as_deref() else {
            warn!(step = %self.name, "Operation failed with no fallback");
            let outcome = StepOutcome::Failed {
                error: RunError::NoFallback,
                reports: vec![primary_report],
            };
            return (outcome, nested);
        };

        warn!(step = %self.name, fallback = %fallback.name, "Operation failed, running fallback");
        let secondary = fallback.task.invoke(&fallback.name, args).await;
        nested.extend(secondary.nested_trace);

        let outcome = match secondary.result {
            Ok(pipe) => {
                debug!(step = %self.name, duration_ms = timer.elapsed_ms(), "Fallback recovered operation");
                StepOutcome::Recovered {
                    pipe,
                    primary: primary_report,
                }
            }
            Err(fallback_report) => {
                warn!(step = %self.name, fallback = %fallback.name, "Fallback failed");
                StepOutcome::Failed {
                    error: RunError::FallbackFailed,
                    reports: vec![fallback_report, primary_report],
                }
            }
        };
        (outcome, nested)
    }
}
