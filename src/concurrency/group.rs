// src/concurrency/group.rs

//! Ordered mixed sync/async scheduling of [`RunTracker`]s.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::concurrency::tracker::RunTracker;
use crate::errors::{CtxError, Result};
use crate::types::ExecMode;

/// Ordered collection of trackers.
///
/// [`exec`](TaskGroup::exec) walks the entries in declared order. `Async`
/// entries are spawned and the walk continues at once; `Sync` entries are
/// awaited before the next entry is looked at. Async entries have no
/// ordering among themselves.
///
/// [`wait`](TaskGroup::wait) blocks until every spawned worker has returned
/// and every tracker reports not running. It has no timeout; deadlines live
/// on the trackers.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Vec<RunTracker>,
    workers: Vec<(String, JoinHandle<Result<()>>)>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: RunTracker) -> &mut Self {
        self.tasks.push(task);
        self
    }

    pub fn with_task(mut self, task: RunTracker) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[RunTracker] {
        &self.tasks
    }

    /// Launch or run every entry in declared order.
    ///
    /// A failing `Sync` entry stops the walk and its error is returned; async
    /// workers already spawned keep running and can still be collected with
    /// [`wait`](TaskGroup::wait).
    pub async fn exec(&mut self) -> Result<()> {
        for task in &self.tasks {
            match task.mode() {
                ExecMode::Async => {
                    debug!(task = %task.name(), "launching async group entry");
                    let worker = task.clone();
                    let handle = tokio::spawn(async move { worker.run().await });
                    self.workers.push((task.name().to_string(), handle));
                }
                ExecMode::Sync => {
                    debug!(task = %task.name(), "running sync group entry");
                    task.run().await?;
                }
            }
        }
        Ok(())
    }

    /// Block until all entries are done. Returns the first async worker error.
    pub async fn wait(&mut self) -> Result<()> {
        let mut first_error: Option<CtxError> = None;

        for (name, handle) in self.workers.drain(..) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(CtxError::Other(anyhow::anyhow!(
                    "worker for '{name}' did not complete: {join_err}"
                ))),
            };
            if let Err(e) = outcome {
                warn!(task = %name, error = %e, "async group entry failed");
                first_error.get_or_insert(e);
            }
        }

        for task in &self.tasks {
            task.registry().wait_until_idle(task.run_id()).await;
        }

        debug!(tasks = self.tasks.len(), "task group finished");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
