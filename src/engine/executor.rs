// src/engine/executor.rs

//! Target resolution and execution.
//!
//! For every definition matching a requested ID:
//! 1. publish its `variables`,
//! 2. check `requires`; on failure record a skip and stop there,
//! 3. run each `needs` entry (depth-first, left to right),
//! 4. run the script line by line, checking stop reasons on every stdout
//!    line,
//! 5. run each `next` entry.
//!
//! A stop reason only kills the subprocess of the current line; the next
//! script line still runs.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::concurrency::{RunRegistry, RunTracker, TaskGroup};
use crate::config::model::{StopReasons, TargetDefinition};
use crate::dag::{TaskGraph, split_selector};
use crate::engine::events::{EventSink, ExecutionEvent, TracingSink};
use crate::engine::report::{RunReport, SkippedTarget, StopRecord};
use crate::errors::{CtxError, Result};
use crate::exec::{ProcessOutcome, ProcessRunner, ShellRunner, StopRule, matching_rules};
use crate::fs::{FileSystem, RealFileSystem};
use crate::placeholders::{PlaceholderStore, SCRIPT_LINE_KEY, log_hit_key, log_last_key};
use crate::types::ExecMode;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a target's script ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptOutcome {
    Completed,
    /// `onerror` cut it short; `next` is not run.
    Aborted,
}

/// Runs targets of a [`TaskGraph`].
///
/// Cheap to clone; clones share the placeholder store, the RunId registry
/// and the collaborators.
#[derive(Clone)]
pub struct TargetExecutor {
    graph: Arc<TaskGraph>,
    placeholders: PlaceholderStore,
    registry: Arc<RunRegistry>,
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn ProcessRunner>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for TargetExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetExecutor")
            .field("targets", &self.graph.targets().len())
            .field("placeholders", &self.placeholders)
            .finish_non_exhaustive()
    }
}

impl TargetExecutor {
    /// Executor with real processes, the real filesystem and log-only events.
    /// Graph `variables` are published into a fresh placeholder store.
    pub fn new(graph: TaskGraph) -> Self {
        let placeholders = PlaceholderStore::new();
        placeholders.extend(graph.variables());
        Self {
            graph: Arc::new(graph),
            placeholders,
            registry: Arc::new(RunRegistry::new()),
            fs: Arc::new(RealFileSystem),
            runner: Arc::new(ShellRunner),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn placeholders(&self) -> &PlaceholderStore {
        &self.placeholders
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Run every target named in `selector` (comma-separated).
    ///
    /// Sequential unless the graph sets `config.sequential = false` and more
    /// than one name is given.
    pub async fn run(&self, selector: &str) -> Result<RunReport> {
        let names = split_selector(selector);
        if self.graph.config().sequential || names.len() <= 1 {
            self.run_sequential(&names).await
        } else {
            self.run_parallel(&names).await
        }
    }

    /// Run the named targets one after another.
    pub async fn run_sequential(&self, names: &[String]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for name in names {
            let mut path = Vec::new();
            self.run_target(name, &mut path, &mut report).await?;
        }
        Ok(report)
    }

    /// Run the named targets as parallel workers of a [`TaskGroup`].
    ///
    /// Each worker is a [`RunTracker`] keyed on the folded target ID, so the
    /// same target requested twice runs once; the duplicate is skipped.
    pub async fn run_parallel(&self, names: &[String]) -> Result<RunReport> {
        let collected: Arc<Mutex<Vec<(usize, RunReport)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut group = TaskGroup::new();

        for (index, name) in names.iter().enumerate() {
            let executor = self.clone();
            let collected = Arc::clone(&collected);
            let target = name.clone();

            let tracker = RunTracker::new(name.clone(), Arc::clone(&self.registry))
                .with_id_generator(|n| format!("target:{}", n.to_lowercase()))
                .with_mode(ExecMode::Async)
                .no_error_if_blocked(true)
                .on_timeout(|run_id| warn!(%run_id, "target still running after its deadline"))
                .with_body(move |ctx| {
                    let executor = executor.clone();
                    let collected = Arc::clone(&collected);
                    let target = target.clone();
                    async move {
                        let mut report = RunReport::default();
                        let mut path = Vec::new();
                        let result = executor.run_target(&target, &mut path, &mut report).await;
                        ctx.done();
                        collected
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push((index, report));
                        result.map_err(anyhow::Error::from)
                    }
                });

            group.add(tracker);
        }

        group.exec().await?;
        group.wait().await?;

        let mut parts = std::mem::take(&mut *collected.lock().unwrap_or_else(|e| e.into_inner()));
        parts.sort_by_key(|(index, _)| *index);

        let mut report = RunReport::default();
        for (_, part) in parts {
            report.merge(part);
        }
        Ok(report)
    }

    /// Run every definition matching `id`. `path` holds the folded IDs being
    /// resolved above this call and guards against Needs/Next cycles.
    fn run_target<'a>(
        &'a self,
        id: &'a str,
        path: &'a mut Vec<String>,
        report: &'a mut RunReport,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let folded = id.to_lowercase();
            if path.contains(&folded) {
                return Err(CtxError::TargetCycle(format!(
                    "{} -> {}",
                    path.join(" -> "),
                    folded
                )));
            }

            let matches: Vec<&TargetDefinition> = self.graph.find(id).collect();
            if matches.is_empty() {
                self.sink.emit(ExecutionEvent::TargetNotFound {
                    target: id.to_string(),
                });
                report.not_found.push(id.to_string());
                return Ok(());
            }

            path.push(folded);
            let mut result = Ok(());
            for def in matches {
                result = self.run_definition(def, path, report).await;
                if result.is_err() {
                    break;
                }
            }
            path.pop();
            result
        })
    }

    async fn run_definition(
        &self,
        def: &TargetDefinition,
        path: &mut Vec<String>,
        report: &mut RunReport,
    ) -> Result<()> {
        self.placeholders.extend(&def.variables);

        if let Some(reason) = self.unmet_requirement(def) {
            info!(target = %def.id, %reason, "requirement not met; skipping target");
            self.sink.emit(ExecutionEvent::TargetSkipped {
                target: def.id.clone(),
                reason: reason.clone(),
            });
            report.skipped.push(SkippedTarget {
                target: def.id.clone(),
                reason,
            });
            return Ok(());
        }

        for need in &def.needs {
            debug!(target = %def.id, need = %need, "resolving need");
            self.run_target(need, path, report).await?;
        }

        self.sink.emit(ExecutionEvent::TargetStarted {
            target: def.id.clone(),
        });
        report.executed.push(def.id.clone());

        let outcome = self.run_script(def, report).await?;

        self.sink.emit(ExecutionEvent::TargetFinished {
            target: def.id.clone(),
        });

        if outcome == ScriptOutcome::Aborted {
            debug!(target = %def.id, "script aborted; not running `next`");
            return Ok(());
        }

        for next in &def.next {
            debug!(target = %def.id, next = %next, "resolving next");
            self.run_target(next, path, report).await?;
        }

        Ok(())
    }

    /// Reason the `requires` gate fails, if it does.
    fn unmet_requirement(&self, def: &TargetDefinition) -> Option<String> {
        for raw in &def.requires.fileexists {
            let file = self.placeholders.substitute(raw);
            if !self.fs.exists(Path::new(&file)) {
                return Some(format!("required file '{file}' does not exist"));
            }
        }
        for raw in &def.requires.filenotexists {
            let file = self.placeholders.substitute(raw);
            if self.fs.exists(Path::new(&file)) {
                return Some(format!("file '{file}' exists but must not"));
            }
        }
        None
    }

    async fn run_script(&self, def: &TargetDefinition, report: &mut RunReport) -> Result<ScriptOutcome> {
        let reasons = StopReasons {
            on_output_contains: def
                .stopreasons
                .on_output_contains
                .iter()
                .map(|s| self.placeholders.substitute(s))
                .collect(),
            ..def.stopreasons.clone()
        };

        for raw in &def.script {
            let command = self.placeholders.substitute(raw);
            self.placeholders.set(SCRIPT_LINE_KEY, command.as_str());

            if def.options.displaycmd {
                self.sink.emit(ExecutionEvent::CommandEchoed {
                    target: def.id.clone(),
                    command: command.clone(),
                });
            }

            let mut last_line: Option<String> = None;
            let mut hit: Option<(String, Vec<StopRule>)> = None;

            let outcome = {
                let target = def.id.as_str();
                let sink = &self.sink;
                let options = &def.options;
                let reasons = &reasons;
                let cmd = command.as_str();
                let last_line = &mut last_line;
                let hit = &mut hit;

                let mut on_start = |pid: Option<u32>| {
                    info!(%target, ?pid, %cmd, "running command");
                    sink.emit(ExecutionEvent::ProcessStarted {
                        target: target.to_string(),
                        pid,
                    });
                };

                let mut on_line = |line: &str| -> bool {
                    if !options.hideout {
                        sink.emit(ExecutionEvent::OutputLine {
                            target: target.to_string(),
                            line: options.render(line),
                        });
                    }
                    *last_line = Some(line.to_string());

                    let rules = matching_rules(reasons, line);
                    if rules.is_empty() {
                        true
                    } else {
                        *hit = Some((line.to_string(), rules));
                        false
                    }
                };

                self.runner
                    .run(&options.maincmd, cmd, &mut on_start, &mut on_line)
                    .await?
            };

            self.placeholders
                .set(log_last_key(&def.id), last_line.unwrap_or_default());

            if let Some((line, rules)) = hit {
                self.placeholders.set(log_hit_key(&def.id), line.as_str());
                self.sink.emit(ExecutionEvent::StopFired {
                    target: def.id.clone(),
                    command: command.clone(),
                    line: line.clone(),
                    rules,
                });
                report.stops.push(StopRecord {
                    target: def.id.clone(),
                    command: command.clone(),
                    line,
                });
            }

            if let ProcessOutcome::Exited(code) = outcome {
                if code != 0 && def.stopreasons.onerror {
                    self.sink.emit(ExecutionEvent::ScriptAborted {
                        target: def.id.clone(),
                        command,
                        exit_code: code,
                    });
                    report.aborted.push(def.id.clone());
                    return Ok(ScriptOutcome::Aborted);
                }
            }
        }

        Ok(ScriptOutcome::Completed)
    }
}
