use std::time::Duration;

/// How a [`crate::concurrency::TaskGroup`] schedules one of its entries.
///
/// - `Sync`: run inline; the group does not move on until it returns.
/// - `Async`: launch as a parallel worker and move on immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Sync,
    Async,
}

/// Default advisory deadline for a [`crate::concurrency::RunTracker`].
pub const DEFAULT_TRACKER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default cancellation deadline for a [`crate::concurrency::FutureHandle`].
pub const DEFAULT_AWAIT_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Shell used for script lines when a target does not set `options.maincmd`.
pub const DEFAULT_MAIN_CMD: &str = "bash";
