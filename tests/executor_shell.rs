// tests/executor_shell.rs
//
// These tests spawn real `sh` subprocesses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use ctxrun::engine::TargetExecutor;
use ctxrun::errors::CtxError;
use ctxrun::exec::{ProcessOutcome, ProcessRunner, ShellRunner};
use ctxrun::placeholders::log_last_key;
use ctxrun_test_utils::builders::{TargetBuilder, TaskGraphBuilder};
use ctxrun_test_utils::recording_sink::RecordingSink;
use ctxrun_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn last_output_line_is_published() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("test1").script("echo hello").build())
        .build();
    let executor = TargetExecutor::new(graph);

    with_timeout(executor.run("test1")).await.unwrap();

    assert_eq!(
        executor.placeholders().get(&log_last_key("test1")).as_deref(),
        Some("hello")
    );
}

#[tokio::test]
async fn invalid_utf8_output_does_not_fail_the_run() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("bin")
                .script("printf 'ok\\n\\377\\376\\n'")
                .script("printf 'crlf\\r\\n'")
                .script("echo after")
                .build(),
        )
        .build();
    let sink = RecordingSink::new();
    let executor = TargetExecutor::new(graph).with_sink(Arc::new(sink.clone()));

    let report = with_timeout(executor.run("bin")).await.unwrap();

    assert!(report.was_executed("bin"));
    assert_eq!(
        sink.output_of("bin"),
        vec!["ok", "\u{FFFD}\u{FFFD}", "crlf", "after"]
    );
    assert_eq!(
        executor.placeholders().get(&log_last_key("bin")).as_deref(),
        Some("after")
    );
}

#[tokio::test]
async fn stop_reason_kills_long_running_process() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("server")
                .stop_on_contains("ready")
                .script("echo starting; echo ready; sleep 30; echo late")
                .script("echo next line")
                .build(),
        )
        .build();
    let sink = RecordingSink::new();
    let executor = TargetExecutor::new(graph).with_sink(Arc::new(sink.clone()));

    let started = Instant::now();
    let report = with_timeout(executor.run("server")).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.stops.len(), 1);
    assert_eq!(report.stops[0].line, "ready");
    assert_eq!(
        sink.output_of("server"),
        vec!["starting", "ready", "next line"]
    );
}

#[tokio::test]
async fn onerror_uses_real_exit_codes() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("check")
                .stop_on_error(true)
                .script("exit 3")
                .script("echo unreachable")
                .build(),
        )
        .build();
    let sink = RecordingSink::new();
    let executor = TargetExecutor::new(graph).with_sink(Arc::new(sink.clone()));

    let report = with_timeout(executor.run("check")).await.unwrap();

    assert_eq!(report.aborted, vec!["check"]);
    assert!(sink.output_of("check").is_empty());
}

#[tokio::test]
async fn requires_checks_the_real_filesystem() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("ready.flag");

    let graph = TaskGraphBuilder::new()
        .with_variable("marker", marker.to_str().unwrap())
        .with_target(
            TargetBuilder::new("gated")
                .requires_file("${marker}")
                .script("echo ran")
                .build(),
        )
        .build();
    let executor = TargetExecutor::new(graph);

    let report = with_timeout(executor.run("gated")).await.unwrap();
    assert!(report.was_skipped("gated"));

    std::fs::write(&marker, "").unwrap();
    let report = with_timeout(executor.run("gated")).await.unwrap();
    assert!(report.was_executed("gated"));
}

#[tokio::test]
async fn missing_shell_is_a_start_error() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("broken")
                .maincmd("/definitely/not/a/shell")
                .script("echo hi")
                .build(),
        )
        .build();
    let executor = TargetExecutor::new(graph);

    let err = with_timeout(executor.run("broken")).await.unwrap_err();
    assert!(matches!(err, CtxError::ProcessStart { .. }));
}

#[tokio::test]
async fn shell_runner_reports_pid_and_exit_code() {
    init_tracing();

    let runner = ShellRunner;
    let mut pid = None;
    let mut lines = Vec::new();

    let outcome = {
        let mut on_start = |p: Option<u32>| pid = p;
        let mut on_line = |line: &str| {
            lines.push(line.to_string());
            true
        };
        with_timeout(runner.run("sh", "printf 'a\\nb\\n'; exit 2", &mut on_start, &mut on_line))
            .await
            .unwrap()
    };

    assert_eq!(outcome, ProcessOutcome::Exited(2));
    assert!(outcome.is_failure());
    assert!(pid.is_some());
    assert_eq!(lines, vec!["a", "b"]);
}
