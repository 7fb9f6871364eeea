// src/exec/process.rs

//! Shell subprocess execution with line-by-line stdout streaming.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{CtxError, Result};

/// How a subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own. `-1` when killed by a signal.
    Exited(i32),
    /// The line callback asked to stop and the process was killed.
    Stopped,
}

impl ProcessOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessOutcome::Exited(code) if *code != 0)
    }
}

/// Callback receiving each stdout line; returns `false` to kill the process.
pub type LineCallback<'a> = dyn FnMut(&str) -> bool + Send + 'a;

/// Callback receiving the PID of the spawned child, if the OS reported one.
pub type StartCallback<'a> = dyn FnMut(Option<u32>) + Send + 'a;

/// Trait abstracting how a script line is executed.
///
/// Production code uses [`ShellRunner`]; tests can provide a runner that
/// replays canned output instead of spawning processes.
pub trait ProcessRunner: Send + Sync {
    /// Run `cmd` through `shell`, feeding stdout lines to `on_line`.
    ///
    /// Stderr is not captured. Spawn failures are returned as
    /// [`CtxError::ProcessStart`] and never retried.
    fn run<'a>(
        &'a self,
        shell: &'a str,
        cmd: &'a str,
        on_start: &'a mut StartCallback<'a>,
        on_line: &'a mut LineCallback<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + 'a>>;
}

/// Runs `<shell> -c <cmd>` with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    fn run<'a>(
        &'a self,
        shell: &'a str,
        cmd: &'a str,
        on_start: &'a mut StartCallback<'a>,
        on_line: &'a mut LineCallback<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + 'a>> {
        Box::pin(async move { run_shell(shell, cmd, on_start, on_line).await })
    }
}

async fn run_shell(
    shell: &str,
    cmd: &str,
    on_start: &mut StartCallback<'_>,
    on_line: &mut LineCallback<'_>,
) -> Result<ProcessOutcome> {
    let mut child = Command::new(shell)
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CtxError::ProcessStart {
            shell: shell.to_string(),
            cmd: cmd.to_string(),
            source,
        })?;

    let pid = child.id();
    debug!(?pid, %shell, %cmd, "process started");
    on_start(pid);

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(?pid, %cmd, error = %e, "failed to read stdout; no further lines");
                    break;
                }
            }
            // Output is arbitrary bytes; invalid UTF-8 is replaced, not rejected.
            let line = String::from_utf8_lossy(trim_line_end(&buf));
            if !on_line(&line) {
                debug!(?pid, %cmd, "line callback requested stop; killing process");
                if let Err(e) = child.kill().await {
                    warn!(?pid, error = %e, "failed to kill process");
                }
                return Ok(ProcessOutcome::Stopped);
            }
        }
    }

    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);
    debug!(?pid, exit_code = code, success = status.success(), "process exited");

    Ok(ProcessOutcome::Exited(code))
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
