// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] runs one script line as a shell subprocess and streams its
//!   stdout through a per-line callback that can kill it.
//! - [`stop_reason`] decides, line by line, whether that callback should
//!   stop the process.

pub mod process;
pub mod stop_reason;

pub use process::{ProcessOutcome, ProcessRunner, ShellRunner};
pub use stop_reason::{StopRule, matching_rules, should_stop};
