//! The `Operation` trait and closure-backed implementations.
//!
//! Operations are the caller-supplied units of work a pipeline runs. They
//! receive the current pipe value spread as positional arguments and either
//! produce a new value or fail.

use crate::errors::OperationError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Trait for pipeline operations.
#[async_trait]
pub trait Operation: Send + Sync + Debug {
    /// Runs the operation.
    ///
    /// # Arguments
    ///
    /// * `args` - The current pipe value; its arity is the operation's concern
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError>;
}

/// A synchronous closure operation.
pub struct FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync,
{
    func: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync,
{
    /// Creates a new closure operation.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOperation").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Operation for FnOperation<F>
where
    F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync,
{
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        (self.func)(args)
    }
}

/// An async closure operation.
pub struct AsyncFnOperation<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnOperation<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    /// Creates a new async closure operation.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnOperation<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnOperation").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Operation for AsyncFnOperation<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        (self.func)(args.to_vec()).await
    }
}

/// An operation that returns its first argument, or `null` with none.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOperation;

#[async_trait]
impl Operation for IdentityOperation {
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        Ok(args.first().cloned().unwrap_or(Value::Null))
    }
}

/// Wraps a synchronous closure as a shared operation.
pub fn from_fn<F>(func: F) -> Arc<dyn Operation>
where
    F: Fn(&[Value]) -> Result<Value, OperationError> + Send + Sync + 'static,
{
    Arc::new(FnOperation::new(func))
}

/// Wraps an async closure as a shared operation.
pub fn from_async<F, Fut>(func: F) -> Arc<dyn Operation>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
{
    Arc::new(AsyncFnOperation::new(func))
}
