// src/lib.rs

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod placeholders;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::dag::TaskGraph;
use crate::engine::{ConsoleSink, RunReport, TargetExecutor};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the task file, publishes `--var` overrides, runs the
/// requested targets and logs a summary. Skipped targets and fired stop
/// reasons are reported, not returned as errors.
pub async fn run(args: CliArgs) -> Result<()> {
    let graph = load_and_validate(&args.config)
        .with_context(|| format!("loading task file {}", args.config.display()))?;

    if args.dry_run {
        print_dry_run(&graph);
        return Ok(());
    }

    let executor = TargetExecutor::new(graph).with_sink(Arc::new(ConsoleSink));
    for (key, value) in &args.vars {
        executor.placeholders().set(key.as_str(), value.as_str());
    }

    let selector = args.selector();
    info!(%selector, "running targets");

    let report = executor.run(&selector).await?;
    log_summary(&report);

    Ok(())
}

fn log_summary(report: &RunReport) {
    info!(
        executed = report.executed.len(),
        skipped = report.skipped.len(),
        stops = report.stops.len(),
        aborted = report.aborted.len(),
        "run finished"
    );
    for name in &report.not_found {
        info!(target = %name, "requested target does not exist");
    }
}

/// Print targets, their dependencies and scripts without running anything.
fn print_dry_run(graph: &TaskGraph) {
    println!("ctxrun dry-run");
    println!("  config.sequential = {}", graph.config().sequential);
    if !graph.variables().is_empty() {
        println!("  variables:");
        for (k, v) in graph.variables() {
            println!("    {k} = {v}");
        }
    }
    println!();

    println!("targets ({}):", graph.targets().len());
    for target in graph.targets() {
        println!("  - {}", target.id);
        if !target.needs.is_empty() {
            println!("      needs: {:?}", target.needs);
        }
        if !target.next.is_empty() {
            println!("      next: {:?}", target.next);
        }
        if !target.requires.is_empty() {
            println!(
                "      requires: exists {:?}, not exists {:?}",
                target.requires.fileexists, target.requires.filenotexists
            );
        }
        for line in &target.script {
            println!("      $ {line}");
        }
        if !target.listener.is_empty() {
            println!("      listeners: {} (not executed)", target.listener.len());
        }
    }

    debug!("dry-run complete (no execution)");
}
