// src/concurrency/mod.rs

//! Reusable concurrency primitives.
//!
//! - [`registry`]: the shared RunId table ([`RunRegistry`]).
//! - [`tracker`]: [`RunTracker`], mutual exclusion + advisory deadline
//!   around a body.
//! - [`group`]: [`TaskGroup`], ordered sync/async scheduling of trackers.
//! - [`future`]: [`FutureGroup`], launch N workers and collect their results
//!   in submission order.

pub mod future;
pub mod group;
pub mod registry;
pub mod tracker;

pub use future::{FutureGroup, FutureHandle, launch, launch_blocking};
pub use group::TaskGroup;
pub use registry::{Claim, RunRecord, RunRegistry};
pub use tracker::{RunTracker, TaskContext};
