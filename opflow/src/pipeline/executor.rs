//! The frozen pipeline and its run loop.

use super::step::{Step, StepOutcome};
use crate::config::{EnvironmentSettings, LoopbackPolicy};
use crate::core::{FailureReport, Output};
use crate::observability::SpanTimer;
use crate::trace::{Trace, TraceRecorder};
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimal introspection view of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescription {
    /// Whether the queue is frozen.
    pub locked: bool,
    /// Number of steps, fallbacks excluded.
    pub queue_length: usize,
    /// The pipeline's settings.
    pub settings: EnvironmentSettings,
}

/// An immutable, runnable pipeline.
///
/// Produced by [`PipelineBuilder::lock`](super::PipelineBuilder::lock) or by
/// the builder's first run. Runs never fail: every outcome is encoded in the
/// returned [`Output`].
#[derive(Debug)]
pub struct Pipeline {
    settings: EnvironmentSettings,
    queue: Vec<Step>,
    recorder: Option<TraceRecorder>,
}

impl Pipeline {
    pub(crate) fn new(
        settings: EnvironmentSettings,
        queue: Vec<Step>,
        recorder: Option<TraceRecorder>,
    ) -> Self {
        Self {
            settings,
            queue,
            recorder,
        }
    }

    /// Returns the pipeline description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.settings.description
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    /// Returns the steps in run order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.queue
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns a snapshot of the trace, or `None` if tracing is disabled.
    #[must_use]
    pub fn traceback(&self) -> Option<Trace> {
        self.recorder.as_ref().map(TraceRecorder::snapshot)
    }

    /// Returns the introspection view.
    #[must_use]
    pub fn describe(&self) -> PipelineDescription {
        PipelineDescription {
            locked: true,
            queue_length: self.queue.len(),
            settings: self.settings.clone(),
        }
    }

    /// Runs the pipeline against `input`.
    ///
    /// Steps run strictly in order; each successful step's output becomes
    /// the next step's input. The first unrecovered failure stops the run.
    pub fn run(&self, input: Vec<Value>) -> BoxFuture<'_, Output> {
        Box::pin(self.execute(input))
    }

    async fn execute(&self, input: Vec<Value>) -> Output {
        let description = self.description();

        if self.queue.is_empty() {
            debug!(pipeline = %description, "Empty Operation Pipeline, passing input through");
            let pipe = if self.settings.use_empty_loopback {
                input
            } else {
                vec![Value::Array(input)]
            };
            return Output::success(pipe);
        }

        let timer = SpanTimer::start(description);
        let run_id = Uuid::new_v4();
        if let Some(recorder) = &self.recorder {
            recorder.record_run(json!({
                "run_id": run_id.to_string(),
                "started_at": Utc::now().to_rfc3339(),
                "queue_length": self.queue.len(),
            }));
        }
        info!(pipeline = %description, %run_id, steps = self.queue.len(), "Running Operation Pipeline");

        let policy = self.settings.loopback_policy();
        let mut current = input.clone();

        for step in &self.queue {
            let (outcome, nested) = step.execute(&current).await;
            self.record_nested(nested);

            match outcome {
                StepOutcome::Completed(pipe) => self.advance(&mut current, pipe),
                StepOutcome::Recovered { pipe, primary } => {
                    warn!(
                        pipeline = %description,
                        step = step.name(),
                        failure = %primary.type_name,
                        "Operation recovered by its fallback"
                    );
                    self.advance(&mut current, pipe);
                }
                StepOutcome::Failed { error, reports } => {
                    let carried = match policy {
                        LoopbackPolicy::Normal => current,
                        LoopbackPolicy::ForceOriginalInputOnSuccess => input,
                    };
                    warn!(
                        pipeline = %description,
                        %run_id,
                        step = step.name(),
                        code = error.code(),
                        duration_ms = timer.elapsed_ms(),
                        "Operation Pipeline failed"
                    );
                    let report = FailureReport::pipeline(description, reports);
                    return Output::failure(vec![Value::Array(carried)], error, report);
                }
            }
        }

        info!(
            pipeline = %description,
            %run_id,
            duration_ms = timer.elapsed_ms(),
            "Operation Pipeline completed"
        );

        let pipe = match policy {
            LoopbackPolicy::Normal => current,
            LoopbackPolicy::ForceOriginalInputOnSuccess => input,
        };
        Output::success(pipe)
    }

    fn advance(&self, current: &mut Vec<Value>, pipe: Vec<Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.record_run_step(current, &pipe);
        }
        *current = pipe;
    }

    fn record_nested(&self, nested: Vec<Trace>) {
        let Some(recorder) = self.recorder.as_ref().filter(|r| r.records_nested()) else {
            return;
        };
        for child in nested {
            recorder.record_nested(child);
        }
    }
}
