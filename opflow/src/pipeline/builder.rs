//! Pipeline builder: the mutable phase of a pipeline.

use super::executor::{Pipeline, PipelineDescription};
use super::step::{Step, StepEnvironment, StepIdentity, StepKind, Task};
use crate::config::EnvironmentSettings;
use crate::core::Output;
use crate::errors::{OperationError, PipelineError};
use crate::operation::{from_fn, Operation};
use crate::shell::{CommandRunner, ProcessCommandRunner, ShellOperation};
use crate::trace::{Trace, TraceRecorder};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Builder for pipelines.
///
/// Steps are appended in run order. The first call to [`run`](Self::run) or
/// [`lock`](Self::lock) freezes the queue into a [`Pipeline`]; afterwards
/// every mutation fails with [`PipelineError::Locked`] while `run` and
/// `traceback` keep working on the frozen pipeline.
pub struct PipelineBuilder {
    settings: EnvironmentSettings,
    queue: Vec<Step>,
    recorder: Option<TraceRecorder>,
    runner: Arc<dyn CommandRunner>,
    frozen: Option<Arc<Pipeline>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("settings", &self.settings)
            .field("queue", &self.queue)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_settings(EnvironmentSettings::new(description))
    }

    /// Creates a builder with the given settings.
    #[must_use]
    pub fn with_settings(settings: EnvironmentSettings) -> Self {
        let settings = settings.normalized();
        Self {
            recorder: TraceRecorder::for_settings(&settings),
            settings,
            queue: Vec::new(),
            runner: Arc::new(ProcessCommandRunner::default()),
            frozen: None,
        }
    }

    /// Sets the runner used by shell operations appended afterwards.
    #[must_use]
    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Returns the pipeline description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.settings.description
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    /// Returns true once the pipeline has been run or locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.frozen.is_some()
    }

    /// Returns the number of steps, fallbacks excluded.
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.frozen
            .as_ref()
            .map_or(self.queue.len(), |pipeline| pipeline.len())
    }

    /// Appends an operation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Locked`] if the pipeline is locked.
    pub fn append(
        &mut self,
        operation: Arc<dyn Operation>,
        name: impl Into<String>,
    ) -> Result<&mut Self, PipelineError> {
        self.push_step(name.into(), Task::Operation(operation), StepKind::Operation)
    }

    /// Appends a synchronous closure.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Locked`] if the pipeline is locked.
    pub fn append_fn<F>(&mut self, func: F, name: impl Into<String>) -> Result<&mut Self, PipelineError>
    where
        F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync + 'static,
    {
        self.append(from_fn(func), name)
    }

    /// Appends a shell command run through the builder's [`CommandRunner`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ShellDisabled`] without `use_shell`, or
    /// [`PipelineError::Locked`] if the pipeline is locked.
    pub fn append_command(
        &mut self,
        command: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<&mut Self, PipelineError> {
        let name = name.into();
        self.ensure_mutable()?;
        if !self.settings.use_shell {
            return Err(PipelineError::shell_disabled(name));
        }

        let operation = ShellOperation::new(command, Arc::clone(&self.runner));
        self.push_step(name, Task::Operation(Arc::new(operation)), StepKind::Shell)
    }

    /// Appends a nested pipeline as a single step named by its description.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Locked`] if the pipeline is locked.
    pub fn append_pipeline(&mut self, nested: Arc<Pipeline>) -> Result<&mut Self, PipelineError> {
        let name = nested.description().to_string();
        self.push_step(name, Task::Pipeline(nested), StepKind::Pipeline)
    }

    /// Locks `nested` and appends it as a single step.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Locked`] if this pipeline is locked.
    pub fn nest(&mut self, mut nested: PipelineBuilder) -> Result<&mut Self, PipelineError> {
        self.ensure_mutable()?;
        self.append_pipeline(nested.lock())
    }

    /// Attaches a fallback to the most recently appended step.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyQueue`] if no step exists,
    /// [`PipelineError::FallbackAlreadyAttached`] if the step already has a
    /// fallback, or [`PipelineError::Locked`] if the pipeline is locked.
    pub fn attach_fallback(
        &mut self,
        operation: Arc<dyn Operation>,
        name: impl Into<String>,
    ) -> Result<&mut Self, PipelineError> {
        self.ensure_mutable()?;
        let name = name.into();

        let Some(owner) = self.queue.last_mut() else {
            return Err(PipelineError::empty_queue(name));
        };
        if owner.has_fallback() {
            return Err(PipelineError::fallback_already_attached(owner.name()));
        }

        let identity = StepIdentity::new(StepKind::Operation, owner.identity().position);
        let environment = StepEnvironment {
            use_shell: self.settings.use_shell,
            is_fallback: true,
        };
        if let Some(recorder) = &self.recorder {
            recorder.record_enqueue(&name, &identity, &environment);
        }

        debug!(pipeline = %self.settings.description, step = owner.name(), fallback = %name, "Attached fallback Operation");
        owner.set_fallback(Step::new(name, Task::Operation(operation), identity, environment));
        Ok(self)
    }

    /// Attaches a synchronous closure as fallback.
    ///
    /// # Errors
    ///
    /// Same as [`attach_fallback`](Self::attach_fallback).
    pub fn attach_fallback_fn<F>(
        &mut self,
        func: F,
        name: impl Into<String>,
    ) -> Result<&mut Self, PipelineError>
    where
        F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync + 'static,
    {
        self.attach_fallback(from_fn(func), name)
    }

    /// Freezes the queue. Idempotent: later calls return the same pipeline.
    pub fn lock(&mut self) -> Arc<Pipeline> {
        if let Some(pipeline) = &self.frozen {
            return Arc::clone(pipeline);
        }

        let pipeline = Arc::new(Pipeline::new(
            self.settings.clone(),
            std::mem::take(&mut self.queue),
            self.recorder.take(),
        ));
        debug!(pipeline = %self.settings.description, steps = pipeline.len(), "Locked Operation Pipeline");
        self.frozen = Some(Arc::clone(&pipeline));
        pipeline
    }

    /// Locks the pipeline and runs it against `input`.
    pub async fn run(&mut self, input: Vec<Value>) -> Output {
        let pipeline = self.lock();
        pipeline.run(input).await
    }

    /// Returns a snapshot of the trace, or `None` if tracing is disabled.
    #[must_use]
    pub fn traceback(&self) -> Option<Trace> {
        match &self.frozen {
            Some(pipeline) => pipeline.traceback(),
            None => self.recorder.as_ref().map(TraceRecorder::snapshot),
        }
    }

    /// Returns the introspection view.
    #[must_use]
    pub fn describe(&self) -> PipelineDescription {
        PipelineDescription {
            locked: self.is_locked(),
            queue_length: self.queue_length(),
            settings: self.settings.clone(),
        }
    }

    fn ensure_mutable(&self) -> Result<(), PipelineError> {
        if self.is_locked() {
            Err(PipelineError::locked(self.settings.description.clone()))
        } else {
            Ok(())
        }
    }

    fn push_step(
        &mut self,
        name: String,
        task: Task,
        kind: StepKind,
    ) -> Result<&mut Self, PipelineError> {
        self.ensure_mutable()?;

        let identity = StepIdentity::new(kind, self.queue.len());
        let environment = StepEnvironment {
            use_shell: self.settings.use_shell,
            is_fallback: false,
        };
        if let Some(recorder) = &self.recorder {
            recorder.record_enqueue(&name, &identity, &environment);
        }

        debug!(pipeline = %self.settings.description, step = %name, %kind, "Appended Operation");
        self.queue.push(Step::new(name, task, identity, environment));
        Ok(self)
    }
}
