// src/concurrency/tracker.rs

//! Per-identity mutual exclusion with an advisory deadline.
//!
//! A [`RunTracker`] wraps a body. `run()` claims the tracker's RunId in the
//! shared [`RunRegistry`], arms a deadline timer and awaits the body inline.
//! The body receives a [`TaskContext`] and must call [`TaskContext::done`]
//! once its work is finished; until then the RunId stays claimed and further
//! `run()` calls for it are rejected (or silently skipped).
//!
//! The deadline never interrupts the body. When it fires, the record is
//! flagged `timed_out` and the timeout handler is called; a body that wants
//! to give up early polls [`TaskContext::timed_out`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::concurrency::registry::{Claim, RunRecord, RunRegistry};
use crate::errors::{CtxError, Result};
use crate::types::{DEFAULT_TRACKER_TIMEOUT, ExecMode};

type BodyFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Body invoked by [`RunTracker::run`].
pub type TaskBody = Arc<dyn Fn(TaskContext) -> BodyFuture + Send + Sync>;

/// Decides whether a blocked claim may run anyway. Gets the holder's record.
pub type CanRunHook = Arc<dyn Fn(&RunRecord) -> bool + Send + Sync>;

/// Called with the RunId when the deadline passes before the run is done.
pub type TimeoutHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle passed to a running body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    name: String,
    run_id: String,
    registry: Arc<RunRegistry>,
}

impl TaskContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Whether the advisory deadline of this run has passed.
    pub fn timed_out(&self) -> bool {
        self.registry.is_timed_out(&self.run_id)
    }

    /// Release the RunId.
    pub fn done(&self) {
        debug!(task = %self.name, run_id = %self.run_id, "marking run done");
        self.registry.mark_done(&self.run_id);
    }
}

#[derive(Clone)]
pub struct RunTracker {
    name: String,
    run_id: String,
    body: Option<TaskBody>,
    mode: ExecMode,
    timeout: Duration,
    no_error_if_blocked: bool,
    can_run: Option<CanRunHook>,
    on_timeout: Option<TimeoutHandler>,
    registry: Arc<RunRegistry>,
}

impl fmt::Debug for RunTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunTracker")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("no_error_if_blocked", &self.no_error_if_blocked)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

impl RunTracker {
    /// New tracker whose RunId is `name`, with a 30 minute deadline.
    pub fn new(name: impl Into<String>, registry: Arc<RunRegistry>) -> Self {
        let name = name.into();
        Self {
            run_id: name.clone(),
            name,
            body: None,
            mode: ExecMode::Sync,
            timeout: DEFAULT_TRACKER_TIMEOUT,
            no_error_if_blocked: false,
            can_run: None,
            on_timeout: None,
            registry,
        }
    }

    /// Derive the RunId from the name instead of using the name itself.
    pub fn with_id_generator(mut self, generate: impl FnOnce(&str) -> String) -> Self {
        self.run_id = generate(&self.name);
        self
    }

    pub fn with_body<F, Fut>(mut self, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let body: TaskBody = Arc::new(move |ctx: TaskContext| Box::pin(body(ctx)) as BodyFuture);
        self.body = Some(body);
        self
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Treat a blocked claim as success without running the body.
    pub fn no_error_if_blocked(mut self, value: bool) -> Self {
        self.no_error_if_blocked = value;
        self
    }

    pub fn with_can_run(mut self, hook: impl Fn(&RunRecord) -> bool + Send + Sync + 'static) -> Self {
        self.can_run = Some(Arc::new(hook));
        self
    }

    pub fn on_timeout(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// True unless this RunId's record is marked done.
    pub fn is_running(&self) -> bool {
        self.registry.is_running(&self.run_id)
    }

    pub fn record(&self) -> Option<RunRecord> {
        self.registry.get(&self.run_id)
    }

    /// Claim the RunId and run the body.
    ///
    /// - no body: [`CtxError::BodyUndefined`]
    /// - RunId held elsewhere: the `can_run` hook decides; without one, or if
    ///   it says no, returns `Ok(())` when `no_error_if_blocked` is set and
    ///   [`CtxError::AlreadyRunning`] otherwise.
    pub async fn run(&self) -> Result<()> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| CtxError::BodyUndefined(self.name.clone()))?;

        let generation = match self.registry.try_claim(&self.run_id) {
            Claim::Claimed(generation) => generation,
            Claim::Blocked(holder) => {
                let allowed = self.can_run.as_ref().is_some_and(|hook| hook(&holder));
                if allowed {
                    debug!(task = %self.name, run_id = %self.run_id, "can_run hook allowed a concurrent run");
                    self.registry.force_claim(&self.run_id)
                } else if self.no_error_if_blocked {
                    debug!(task = %self.name, run_id = %self.run_id, "already running; skipping");
                    return Ok(());
                } else {
                    return Err(CtxError::AlreadyRunning(self.run_id.clone()));
                }
            }
        };

        self.arm_deadline(generation);

        let ctx = TaskContext {
            name: self.name.clone(),
            run_id: self.run_id.clone(),
            registry: Arc::clone(&self.registry),
        };

        body(ctx).await.map_err(|e| match e.downcast::<CtxError>() {
            Ok(ctx_err) => ctx_err,
            Err(other) => CtxError::Other(other),
        })
    }

    /// Every successful claim gets its own timer. It fires unless the
    /// generation it joined is done first.
    fn arm_deadline(&self, generation: u64) {
        let registry = Arc::clone(&self.registry);
        let run_id = self.run_id.clone();
        let timeout = self.timeout;
        let handler = self.on_timeout.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = registry.wait_until_released(&run_id, generation) => {}
                _ = tokio::time::sleep(timeout) => {
                    if registry.mark_timed_out(&run_id, generation) {
                        warn!(%run_id, ?timeout, "run exceeded its deadline");
                        if let Some(handler) = handler {
                            handler(&run_id);
                        }
                    }
                }
            }
        });
    }
}
