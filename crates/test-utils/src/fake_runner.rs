use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ctxrun::errors::Result;
use ctxrun::exec::ProcessOutcome;
use ctxrun::exec::process::{LineCallback, ProcessRunner, StartCallback};

#[derive(Debug, Clone, Default)]
struct Scripted {
    lines: Vec<String>,
    exit_code: i32,
}

/// A fake process runner that:
/// - records every command it was asked to run (after substitution)
/// - replays canned stdout lines per command, honouring the stop callback
/// - exits 0 with no output for commands it does not know.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    scripts: Arc<Mutex<HashMap<String, Scripted>>>,
    executed: Arc<Mutex<Vec<String>>>,
    delivered: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, cmd: &str, lines: &[&str]) -> Self {
        self.with_exit(cmd, lines, 0)
    }

    pub fn with_exit(self, cmd: &str, lines: &[&str], exit_code: i32) -> Self {
        self.scripts.lock().unwrap().insert(
            cmd.to_string(),
            Scripted {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                exit_code,
            },
        );
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// How many lines of `cmd`'s output reached the callback last time.
    pub fn delivered(&self, cmd: &str) -> usize {
        self.delivered
            .lock()
            .unwrap()
            .get(cmd)
            .copied()
            .unwrap_or_default()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        _shell: &'a str,
        cmd: &'a str,
        on_start: &'a mut StartCallback<'a>,
        on_line: &'a mut LineCallback<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(cmd.to_string());
            let scripted = self
                .scripts
                .lock()
                .unwrap()
                .get(cmd)
                .cloned()
                .unwrap_or_default();

            on_start(Some(4242));

            let mut count = 0;
            let mut outcome = ProcessOutcome::Exited(scripted.exit_code);
            for line in &scripted.lines {
                count += 1;
                if !on_line(line) {
                    outcome = ProcessOutcome::Stopped;
                    break;
                }
            }

            self.delivered
                .lock()
                .unwrap()
                .insert(cmd.to_string(), count);
            Ok(outcome)
        })
    }
}
