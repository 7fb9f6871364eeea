// src/concurrency/registry.rs

//! Shared RunId table backing [`super::RunTracker`].

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, trace};

/// Snapshot of one RunId's state.
///
/// Records are only ever replaced as a whole; readers always get a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: String,
    pub started: bool,
    pub done: bool,
    pub timed_out: bool,
    /// Claims currently holding this RunId (more than one only when a
    /// `can_run` hook lets a second claim through).
    pub running_count: u32,
    /// Total successful claims so far.
    pub claims: u64,
    /// Bumped when the RunId goes from idle to running. Claims that overlap
    /// (via `can_run`) share one generation.
    pub generation: u64,
}

impl RunRecord {
    fn idle(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            started: false,
            done: false,
            timed_out: false,
            running_count: 0,
            claims: 0,
            generation: 0,
        }
    }

    fn is_running(&self) -> bool {
        self.started && !self.done
    }
}

/// Result of an attempt to claim a RunId.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller now holds the RunId. Carries the run generation.
    Claimed(u64),
    /// Someone else holds it; carries their record.
    Blocked(RunRecord),
}

/// Concurrency-safe RunId → [`RunRecord`] table.
///
/// Every mutation bumps a version on a `watch` channel so waiters can block
/// until something changes instead of polling.
#[derive(Debug)]
pub struct RunRegistry {
    records: Mutex<HashMap<String, RunRecord>>,
    changes: watch::Sender<u64>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        let (changes, _rx) = watch::channel(0);
        Self {
            records: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Claim `run_id` unless it is currently running.
    pub fn try_claim(&self, run_id: &str) -> Claim {
        let claim = self.replace(run_id, |current| {
            if current.is_running() {
                return None;
            }
            Some(RunRecord {
                started: true,
                done: false,
                timed_out: false,
                running_count: 1,
                claims: current.claims + 1,
                generation: current.generation + 1,
                ..current.clone()
            })
        });

        match claim {
            Ok(record) => Claim::Claimed(record.generation),
            Err(existing) => Claim::Blocked(existing),
        }
    }

    /// Claim `run_id` even if it is running. Used when a `can_run` hook
    /// allowed a concurrent instance; it joins the running generation.
    /// Returns the generation.
    pub fn force_claim(&self, run_id: &str) -> u64 {
        let claimed = self.replace(run_id, |current| {
            let next = if current.is_running() {
                RunRecord {
                    running_count: current.running_count + 1,
                    claims: current.claims + 1,
                    ..current.clone()
                }
            } else {
                RunRecord {
                    started: true,
                    done: false,
                    timed_out: false,
                    running_count: 1,
                    claims: current.claims + 1,
                    generation: current.generation + 1,
                    ..current.clone()
                }
            };
            Some(next)
        });
        claimed.map(|r| r.generation).unwrap_or_default()
    }

    /// Release one claim. The record becomes `done` once no claim is left.
    pub fn mark_done(&self, run_id: &str) {
        let _ = self.replace(run_id, |current| {
            let running_count = current.running_count.saturating_sub(1);
            Some(RunRecord {
                running_count,
                done: running_count == 0,
                ..current.clone()
            })
        });
    }

    /// Set the advisory timeout flag if generation `generation` is still
    /// running.
    pub fn mark_timed_out(&self, run_id: &str, generation: u64) -> bool {
        self.replace(run_id, |current| {
            if !current.is_running() || current.generation != generation {
                return None;
            }
            Some(RunRecord {
                timed_out: true,
                ..current.clone()
            })
        })
        .is_ok()
    }

    pub fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.lock().get(run_id).cloned()
    }

    /// True unless the record is marked done. Unknown ids are not running.
    pub fn is_running(&self, run_id: &str) -> bool {
        self.get(run_id).is_some_and(|r| r.is_running())
    }

    pub fn is_timed_out(&self, run_id: &str) -> bool {
        self.get(run_id).is_some_and(|r| r.timed_out)
    }

    /// Block until `run_id` is not running.
    pub async fn wait_until_idle(&self, run_id: &str) {
        self.wait_for(|| !self.is_running(run_id)).await;
    }

    /// Block until generation `generation` of `run_id` is done, that is
    /// until every overlapping claim of it has been released.
    pub async fn wait_until_released(&self, run_id: &str, generation: u64) {
        self.wait_for(|| {
            self.get(run_id)
                .is_none_or(|r| !r.is_running() || r.generation != generation)
        })
        .await;
    }

    async fn wait_for(&self, mut ready: impl FnMut() -> bool) {
        let mut rx = self.changes.subscribe();
        loop {
            if ready() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Compute a replacement for `run_id`'s record and swap it in.
    ///
    /// `f` returns `None` to leave the record untouched; the current record
    /// is then handed back as the error.
    fn replace(
        &self,
        run_id: &str,
        f: impl FnOnce(&RunRecord) -> Option<RunRecord>,
    ) -> std::result::Result<RunRecord, RunRecord> {
        let outcome = {
            let mut records = self.lock();
            let current = records
                .entry(run_id.to_string())
                .or_insert_with(|| RunRecord::idle(run_id))
                .clone();
            match f(&current) {
                Some(next) => {
                    trace!(?current, ?next, "run record replaced");
                    records.insert(run_id.to_string(), next.clone());
                    Ok(next)
                }
                None => Err(current),
            }
        };

        if outcome.is_ok() {
            self.changes.send_modify(|v| *v = v.wrapping_add(1));
        } else {
            debug!(%run_id, "run record left unchanged");
        }
        outcome
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}
