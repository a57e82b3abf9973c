//! Mock operations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::OperationError;
use crate::operation::Operation;

/// An operation that records calls and returns a configurable response.
#[derive(Debug)]
pub struct MockOperation {
    response: Mutex<Result<Value, OperationError>>,
    calls: Mutex<Vec<Vec<Value>>>,
}

impl MockOperation {
    /// Creates a mock that succeeds with `value`.
    #[must_use]
    pub fn returning(value: Value) -> Self {
        Self {
            response: Mutex::new(Ok(value)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that fails with `error`.
    #[must_use]
    pub fn failing(error: OperationError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the response.
    pub fn set_response(&self, response: Result<Value, OperationError>) {
        *self.response.lock() = response;
    }

    /// Returns the number of times the operation was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the arguments of each call.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Operation for MockOperation {
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        self.calls.lock().push(args.to_vec());
        self.response.lock().clone()
    }
}

/// An operation that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingOperation {
    error: OperationError,
}

impl FailingOperation {
    /// Creates an operation failing with a message-less `Error`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an operation failing with `error`.
    #[must_use]
    pub fn with_error(error: OperationError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Operation for FailingOperation {
    async fn invoke(&self, _args: &[Value]) -> Result<Value, OperationError> {
        Err(self.error.clone())
    }
}

/// An operation that appends its label to a shared log and returns it.
#[derive(Debug, Clone)]
pub struct RecordingOperation {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingOperation {
    /// Creates a recording operation writing to `log`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.into(),
            log,
        }
    }
}

#[async_trait]
impl Operation for RecordingOperation {
    async fn invoke(&self, _args: &[Value]) -> Result<Value, OperationError> {
        self.log.lock().push(self.label.clone());
        Ok(Value::String(self.label.clone()))
    }
}

/// An operation that sleeps before echoing its first argument.
#[derive(Debug, Clone)]
pub struct SlowOperation {
    delay: Duration,
}

impl SlowOperation {
    /// Creates a slow operation.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Operation for SlowOperation {
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        tokio::time::sleep(self.delay).await;
        Ok(args.first().cloned().unwrap_or(Value::Null))
    }
}
