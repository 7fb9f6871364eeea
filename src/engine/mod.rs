// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`executor`]: [`TargetExecutor`], which resolves Requires/Needs/Next and
//!   drives script lines through the process runner.
//! - [`events`]: progress events and the sinks that receive them.
//! - [`report`]: the [`RunReport`] returned by every run.

pub mod events;
pub mod executor;
pub mod report;

pub use events::{ConsoleSink, EventSink, ExecutionEvent, TracingSink};
pub use executor::TargetExecutor;
pub use report::{RunReport, SkippedTarget, StopRecord};
