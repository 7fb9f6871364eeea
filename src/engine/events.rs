// src/engine/events.rs

//! Progress events emitted by the executor and the sinks that consume them.
//!
//! The executor never formats or prints anything itself; it hands
//! [`ExecutionEvent`]s to an [`EventSink`]. [`ConsoleSink`] is what the
//! binary uses, [`TracingSink`] only logs.

use std::io::Write;

use tracing::{debug, info, warn};

use crate::exec::StopRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// Requires passed and Needs finished; the script is about to run.
    TargetStarted { target: String },
    /// Script (and nothing after it) finished.
    TargetFinished { target: String },
    /// A `requires` check failed; nothing of the target ran.
    TargetSkipped { target: String, reason: String },
    /// A selector or reference matched no definition.
    TargetNotFound { target: String },
    /// `displaycmd` echo of the command about to run.
    CommandEchoed { target: String, command: String },
    ProcessStarted { target: String, pid: Option<u32> },
    /// One stdout line, already rendered through `options.format`.
    OutputLine { target: String, line: String },
    /// A stop reason killed the current subprocess.
    StopFired {
        target: String,
        command: String,
        line: String,
        rules: Vec<StopRule>,
    },
    /// `onerror` skipped the rest of the script after a failing line.
    ScriptAborted {
        target: String,
        command: String,
        exit_code: i32,
    },
}

/// Receiver of [`ExecutionEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

/// Logs every event through `tracing`; prints nothing.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ExecutionEvent) {
        log_event(&event);
    }
}

/// Prints output lines and echoed commands to stdout, logs the rest.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: ExecutionEvent) {
        let mut out = std::io::stdout().lock();
        let written = match &event {
            ExecutionEvent::OutputLine { line, .. } => writeln!(out, "{line}"),
            ExecutionEvent::CommandEchoed { target, command } => {
                writeln!(out, "[{target}] $ {command}")
            }
            ExecutionEvent::TargetSkipped { target, reason } => {
                writeln!(out, "[{target}] skipped: {reason}")
            }
            ExecutionEvent::StopFired { target, line, .. } => {
                writeln!(out, "[{target}] stopped on: {line}")
            }
            _ => Ok(()),
        };
        if let Err(e) = written {
            debug!(error = %e, "failed to write to stdout");
        }
        log_event(&event);
    }
}

fn log_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::TargetStarted { target } => info!(%target, "target started"),
        ExecutionEvent::TargetFinished { target } => info!(%target, "target finished"),
        ExecutionEvent::TargetSkipped { target, reason } => {
            info!(%target, %reason, "target skipped")
        }
        ExecutionEvent::TargetNotFound { target } => warn!(%target, "no target with this id"),
        ExecutionEvent::CommandEchoed { target, command } => debug!(%target, %command, "command"),
        ExecutionEvent::ProcessStarted { target, pid } => debug!(%target, ?pid, "process started"),
        ExecutionEvent::OutputLine { target, line } => debug!(%target, "stdout: {}", line),
        ExecutionEvent::StopFired {
            target,
            command,
            line,
            rules,
        } => info!(%target, %command, %line, ?rules, "stop reason fired; process killed"),
        ExecutionEvent::ScriptAborted {
            target,
            command,
            exit_code,
        } => warn!(%target, %command, exit_code, "command failed; rest of script skipped"),
    }
}
