//! Typed async task-graph scheduler.
//!
//! An operation is expressed as a graph of stages. Each stage produces one
//! typed result; downstream stages capture the handles of their dependencies
//! at construction time and await them inside their own body, so the result
//! types are resolved at compile time rather than by runtime lookup.
//!
//! Stages spawn eagerly onto the tokio worker pool: building a graph never
//! blocks the builder, independent branches run concurrently, and a stage's
//! body runs only after all of its dependencies resolved successfully; the
//! first upstream error propagates along every path to the final stage.
//! Once spawned, a graph runs to completion or failure; there is no
//! mid-graph cancellation.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use thiserror::Error;

/// A stage body panicked instead of returning a result.
///
/// Graph error types convert this into their own failure variant via
/// `From<StagePanic>` so a panic surfaces like any other stage error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pipeline stage panicked: {0}")]
pub struct StagePanic(pub String);

/// Handle to one spawned stage and its shared, cloneable result.
///
/// Any number of downstream stages may `get()` the result; the body runs
/// exactly once regardless of how many consumers await it.
pub struct Stage<T, E> {
    future: Shared<BoxFuture<'static, Result<T, E>>>,
}

impl<T, E> Clone for Stage<T, E> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T, E> Stage<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<StagePanic> + 'static,
{
    /// Spawns a stage onto the worker pool.
    ///
    /// To depend on earlier stages, capture their `get()` futures in the
    /// body and `?`-await them before doing any work.
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(E::from(StagePanic(join_err.to_string()))),
            }
        }
        .boxed()
        .shared();
        Self { future }
    }

    /// A stage that is already complete with `value`; used for graph inputs.
    pub fn ready(value: T) -> Self {
        Self {
            future: async move { Ok(value) }.boxed().shared(),
        }
    }

    /// Returns a future for this stage's result. Cheap to call repeatedly;
    /// every consumer observes the same single execution.
    pub fn get(&self) -> impl Future<Output = Result<T, E>> + Send + use<T, E> {
        self.future.clone()
    }

    /// Awaits the stage outcome, consuming the handle.
    pub async fn join(self) -> Result<T, E> {
        self.future.await
    }
}

/// Runs `op(false)`; if the error satisfies `is_retryable`, runs `op(true)`
/// exactly once more. Any other failure, or a failure of the second run, is
/// returned as-is; there is never a third attempt.
///
/// This is the only retry policy in the system: the vault applies it to
/// authorization failures with a forced token reload.
pub async fn retry_once_on<T, E, P, F, Fut>(is_retryable: P, mut op: F) -> Result<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op(false).await {
        Err(err) if is_retryable(&err) => op(true).await,
        other => other,
    }
}
