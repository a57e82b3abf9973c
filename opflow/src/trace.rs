//! Opt-in execution traces.
//!
//! A [`Trace`] records a pipeline's configuration, every enqueued step and
//! every value observed while running. It is only allocated when the
//! pipeline's settings ask for it.

use crate::config::EnvironmentSettings;
use crate::pipeline::{StepEnvironment, StepIdentity};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of a pipeline's recorded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Settings the pipeline was built with.
    pub global_environment: EnvironmentSettings,
    /// Names of enqueued steps, fallbacks included.
    pub enqueue_child_descriptions: Vec<String>,
    /// Identities of enqueued steps.
    pub enqueue_instance_info: Vec<StepIdentity>,
    /// Per-step settings of enqueued steps.
    pub enqueue_local_environments: Vec<StepEnvironment>,
    /// Argument lists passed to successful steps.
    pub pipeline_inputs: Vec<Value>,
    /// One entry per non-empty run.
    pub pipeline_instance_info: Vec<Value>,
    /// Outputs of successful steps.
    pub pipeline_outputs: Vec<Value>,
    /// Traces of nested pipelines; present only with nesting debug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_traces: Option<Vec<Trace>>,
}

impl Trace {
    /// Creates an empty trace for the given settings.
    #[must_use]
    pub fn new(settings: &EnvironmentSettings) -> Self {
        Self {
            global_environment: settings.clone(),
            enqueue_child_descriptions: Vec::new(),
            enqueue_instance_info: Vec::new(),
            enqueue_local_environments: Vec::new(),
            pipeline_inputs: Vec::new(),
            pipeline_instance_info: Vec::new(),
            pipeline_outputs: Vec::new(),
            nested_traces: settings.records_nested_traces().then(Vec::new),
        }
    }

    /// Converts the trace to JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Append-only accumulator behind a pipeline's trace.
#[derive(Debug)]
pub(crate) struct TraceRecorder {
    trace: Mutex<Trace>,
}

impl TraceRecorder {
    /// Allocates a recorder if the settings ask for one.
    pub(crate) fn for_settings(settings: &EnvironmentSettings) -> Option<Self> {
        settings.records_trace().then(|| Self {
            trace: Mutex::new(Trace::new(settings)),
        })
    }

    pub(crate) fn record_enqueue(
        &self,
        name: &str,
        identity: &StepIdentity,
        environment: &StepEnvironment,
    ) {
        let mut trace = self.trace.lock();
        trace.enqueue_child_descriptions.push(name.to_string());
        trace.enqueue_instance_info.push(identity.clone());
        trace.enqueue_local_environments.push(*environment);
    }

    pub(crate) fn record_run(&self, info: Value) {
        self.trace.lock().pipeline_instance_info.push(info);
    }

    pub(crate) fn record_run_step(&self, input: &[Value], output: &[Value]) {
        let mut trace = self.trace.lock();
        trace.pipeline_inputs.push(Value::Array(input.to_vec()));
        trace.pipeline_outputs.push(Value::Array(output.to_vec()));
    }

    /// Records a nested trace; ignored unless nesting debug is enabled.
    pub(crate) fn record_nested(&self, child: Trace) {
        if let Some(nested) = self.trace.lock().nested_traces.as_mut() {
            nested.push(child);
        }
    }

    pub(crate) fn records_nested(&self) -> bool {
        self.trace.lock().nested_traces.is_some()
    }

    pub(crate) fn snapshot(&self) -> Trace {
        self.trace.lock().clone()
    }
}
