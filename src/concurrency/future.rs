// src/concurrency/future.rs

//! Launch/await fan-out with ordered fan-in.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{CtxError, Result};
use crate::types::DEFAULT_AWAIT_DEADLINE;

/// Handle to a body running as a parallel worker.
///
/// Awaiting consumes the handle, so a result can be taken exactly once.
#[derive(Debug)]
pub struct FutureHandle<T> {
    label: String,
    handle: JoinHandle<T>,
    launched: Instant,
    deadline: Duration,
}

/// Start `body(arg)` as a parallel worker.
pub fn launch<A, F, Fut, T>(arg: A, body: F) -> FutureHandle<T>
where
    A: Send + 'static,
    F: FnOnce(A) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    FutureHandle {
        label: "future".to_string(),
        handle: tokio::spawn(async move { body(arg).await }),
        launched: Instant::now(),
        deadline: DEFAULT_AWAIT_DEADLINE,
    }
}

/// Start a synchronous `body(arg)` on the blocking pool.
///
/// A deadline still cancels the await, but a blocking body cannot be
/// interrupted and runs to its end in the background.
pub fn launch_blocking<A, F, T>(arg: A, body: F) -> FutureHandle<T>
where
    A: Send + 'static,
    F: FnOnce(A) -> T + Send + 'static,
    T: Send + 'static,
{
    FutureHandle {
        label: "blocking future".to_string(),
        handle: tokio::task::spawn_blocking(move || body(arg)),
        launched: Instant::now(),
        deadline: DEFAULT_AWAIT_DEADLINE,
    }
}

impl<T: Send + 'static> FutureHandle<T> {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the body's result, or [`CtxError::Cancelled`] once the
    /// deadline (counted from launch) passes. A result that is already
    /// available wins over an expired deadline. On cancellation the worker
    /// is aborted.
    pub async fn wait(mut self) -> Result<T> {
        let outcome = tokio::time::timeout_at(self.launched + self.deadline, &mut self.handle).await;
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) if join_err.is_cancelled() => Err(CtxError::Cancelled(self.label)),
            Ok(Err(join_err)) => Err(CtxError::Other(anyhow::anyhow!(
                "worker '{}' panicked: {join_err}",
                self.label
            ))),
            Err(_elapsed) => {
                warn!(label = %self.label, deadline = ?self.deadline, "await deadline elapsed; aborting worker");
                self.handle.abort();
                Err(CtxError::Cancelled(self.label))
            }
        }
    }
}

/// Ordered set of [`FutureHandle`]s.
#[derive(Debug)]
pub struct FutureGroup<T> {
    handles: Vec<FutureHandle<T>>,
}

impl<T> Default for FutureGroup<T> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<T: Send + 'static> FutureGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch one worker per `(argument, body)` entry, keeping entry order.
    pub fn launch_group<I, A, F, Fut>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, F)>,
        A: Send + 'static,
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut group = Self::new();
        for (arg, body) in entries {
            group.launch(arg, body);
        }
        debug!(workers = group.handles.len(), "launched future group");
        group
    }

    pub fn launch<A, F, Fut>(&mut self, arg: A, body: F) -> &mut Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let index = self.handles.len();
        self.handles
            .push(launch(arg, body).with_label(format!("future #{index}")));
        self
    }

    pub fn push(&mut self, handle: FutureHandle<T>) -> &mut Self {
        self.handles.push(handle);
        self
    }

    /// Apply the same deadline to every handle (each still expires on its own).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.handles = self
            .handles
            .into_iter()
            .map(|h| h.with_deadline(deadline))
            .collect();
        self
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Await every handle in submission order and return results in that
    /// order. A slow early handle holds back collection of later ones.
    pub async fn await_all(self) -> Vec<Result<T>> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            results.push(handle.wait().await);
        }
        results
    }
}
