// tests/executor_order.rs

use std::sync::Arc;

use ctxrun::engine::{ExecutionEvent, TargetExecutor};
use ctxrun::errors::CtxError;
use ctxrun::fs::mock::MockFileSystem;
use ctxrun::placeholders::{log_hit_key, log_last_key};
use ctxrun_test_utils::builders::{TargetBuilder, TaskGraphBuilder};
use ctxrun_test_utils::fake_runner::ScriptedRunner;
use ctxrun_test_utils::recording_sink::RecordingSink;
use ctxrun_test_utils::{init_tracing, with_timeout};

struct Harness {
    executor: TargetExecutor,
    runner: ScriptedRunner,
    sink: RecordingSink,
    fs: MockFileSystem,
}

fn harness(builder: TaskGraphBuilder, runner: ScriptedRunner) -> Harness {
    harness_for(builder.build(), runner)
}

fn harness_for(graph: ctxrun::dag::TaskGraph, runner: ScriptedRunner) -> Harness {
    let sink = RecordingSink::new();
    let fs = MockFileSystem::new();
    let executor = TargetExecutor::new(graph)
        .with_runner(Arc::new(runner.clone()))
        .with_sink(Arc::new(sink.clone()))
        .with_fs(Arc::new(fs.clone()));
    Harness {
        executor,
        runner,
        sink,
        fs,
    }
}

fn p_t_q() -> TaskGraphBuilder {
    TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("P").script("echo p").build())
        .with_target(
            TargetBuilder::new("T")
                .needs("P")
                .next("Q")
                .requires_file("marker")
                .script("echo t")
                .build(),
        )
        .with_target(TargetBuilder::new("Q").script("echo q").build())
}

#[tokio::test]
async fn needs_run_before_and_next_after() {
    init_tracing();

    let h = harness(p_t_q(), ScriptedRunner::new());
    h.fs.add_file("marker", "");

    let report = with_timeout(h.executor.run("T")).await.unwrap();

    assert_eq!(report.executed, vec!["P", "T", "Q"]);
    assert_eq!(h.sink.started(), vec!["P", "T", "Q"]);
    assert_eq!(h.runner.executed(), vec!["echo p", "echo t", "echo q"]);
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn unmet_requirement_skips_needs_script_and_next() {
    init_tracing();

    let h = harness(p_t_q(), ScriptedRunner::new());

    let report = with_timeout(h.executor.run("T")).await.unwrap();

    assert!(report.executed.is_empty());
    assert!(h.runner.executed().is_empty());
    assert!(report.was_skipped("T"));
    assert!(report.skipped[0].reason.contains("marker"));
    assert!(h.sink.events().iter().any(|e| matches!(
        e,
        ExecutionEvent::TargetSkipped { target, .. } if target == "T"
    )));
}

#[tokio::test]
async fn file_not_exists_gate() {
    init_tracing();

    let graph = TaskGraphBuilder::new().with_target(
        TargetBuilder::new("clean")
            .requires_no_file("lock")
            .script("rm -rf out")
            .build(),
    );
    let h = harness(graph, ScriptedRunner::new());

    h.fs.add_file("lock", "");
    let report = h.executor.run("clean").await.unwrap();
    assert!(report.was_skipped("clean"));

    h.fs.remove_file("lock");
    let report = h.executor.run("clean").await.unwrap();
    assert!(report.was_executed("clean"));
}

#[tokio::test]
async fn requirement_paths_use_placeholders() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_variable("dir", "build")
        .with_target(
            TargetBuilder::new("pack")
                .requires_file("${dir}/app")
                .script("tar cf app.tar ${dir}")
                .build(),
        );
    let h = harness(graph, ScriptedRunner::new());
    h.fs.add_file("build/app", "");

    let report = h.executor.run("pack").await.unwrap();

    assert!(report.was_executed("pack"));
    assert_eq!(h.runner.executed(), vec!["tar cf app.tar build"]);
}

#[tokio::test]
async fn duplicate_ids_all_execute_in_declaration_order() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("lint").script("echo one").build())
        .with_target(TargetBuilder::new("other").script("echo other").build())
        .with_target(TargetBuilder::new("Lint").script("echo two").build());
    let h = harness(graph, ScriptedRunner::new());

    let report = h.executor.run("lint").await.unwrap();

    assert_eq!(report.executed, vec!["lint", "Lint"]);
    assert_eq!(h.runner.executed(), vec!["echo one", "echo two"]);
}

#[tokio::test]
async fn unknown_selector_is_reported_not_failed() {
    init_tracing();

    let graph = TaskGraphBuilder::new().with_target(TargetBuilder::new("a").script("echo a").build());
    let h = harness(graph, ScriptedRunner::new());

    let report = h.executor.run("missing, a").await.unwrap();

    assert_eq!(report.not_found, vec!["missing"]);
    assert_eq!(report.executed, vec!["a"]);
    assert!(h.sink.events().contains(&ExecutionEvent::TargetNotFound {
        target: "missing".to_string()
    }));
}

#[tokio::test]
async fn runtime_cycle_guard_stops_recursion() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("a").needs("b").script("echo a").build())
        .with_target(TargetBuilder::new("b").needs("a").script("echo b").build())
        .build_unchecked();
    let h = harness_for(graph, ScriptedRunner::new());

    let err = with_timeout(h.executor.run("a")).await.unwrap_err();

    match err {
        CtxError::TargetCycle(path) => assert_eq!(path, "a -> b -> a"),
        other => panic!("expected TargetCycle, got {other:?}"),
    }
    assert!(h.runner.executed().is_empty());
}

#[tokio::test]
async fn stop_reason_kills_current_line_only() {
    init_tracing();

    let runner = ScriptedRunner::new()
        .with_output("serve", &["booting", "ready on :8080", "request 1", "request 2"])
        .with_output("echo after", &["after"]);
    let graph = TaskGraphBuilder::new().with_target(
        TargetBuilder::new("server")
            .stop_on_contains("ready")
            .script("serve")
            .script("echo after")
            .build(),
    );
    let h = harness(graph, runner);

    let report = h.executor.run("server").await.unwrap();

    // output after the matching line is never read
    assert_eq!(h.runner.delivered("serve"), 2);
    assert_eq!(h.runner.executed(), vec!["serve", "echo after"]);
    assert_eq!(
        h.sink.output_of("server"),
        vec!["booting", "ready on :8080", "after"]
    );

    assert_eq!(report.stops.len(), 1);
    assert_eq!(report.stops[0].command, "serve");
    assert_eq!(report.stops[0].line, "ready on :8080");

    let store = h.executor.placeholders();
    assert_eq!(store.get(&log_hit_key("server")).as_deref(), Some("ready on :8080"));
    assert_eq!(store.get(&log_last_key("server")).as_deref(), Some("after"));
}

#[tokio::test]
async fn output_length_stop_reasons() {
    init_tracing();

    let runner = ScriptedRunner::new().with_output("gen", &["long enough", "ok", "never"]);
    let graph = TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("gen").stop_on_less(3).script("gen").build());
    let h = harness(graph, runner);

    let report = h.executor.run("gen").await.unwrap();

    assert_eq!(report.stops[0].line, "ok");
    assert_eq!(h.runner.delivered("gen"), 2);
}

#[tokio::test]
async fn stop_needles_are_substituted() {
    init_tracing();

    let runner = ScriptedRunner::new().with_output("tail log", &["v1 starting", "v2 starting"]);
    let graph = TaskGraphBuilder::new()
        .with_variable("version", "v2")
        .with_target(
            TargetBuilder::new("watch")
                .stop_on_contains("${version}")
                .script("tail log")
                .build(),
        );
    let h = harness(graph, runner);

    let report = h.executor.run("watch").await.unwrap();

    assert_eq!(report.stops[0].line, "v2 starting");
}

#[tokio::test]
async fn onerror_aborts_script_and_skips_next() {
    init_tracing();

    let runner = ScriptedRunner::new().with_exit("false", &[], 1);
    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("build")
                .stop_on_error(true)
                .script("false")
                .script("echo unreachable")
                .next("deploy")
                .build(),
        )
        .with_target(TargetBuilder::new("deploy").script("echo deploy").build());
    let h = harness(graph, runner);

    let report = h.executor.run("build").await.unwrap();

    assert_eq!(report.aborted, vec!["build"]);
    assert_eq!(h.runner.executed(), vec!["false"]);
    assert!(!report.was_executed("deploy"));
    assert!(h.sink.events().contains(&ExecutionEvent::ScriptAborted {
        target: "build".to_string(),
        command: "false".to_string(),
        exit_code: 1,
    }));
}

#[tokio::test]
async fn failing_command_without_onerror_continues() {
    init_tracing();

    let runner = ScriptedRunner::new().with_exit("false", &[], 1);
    let graph = TaskGraphBuilder::new().with_target(
        TargetBuilder::new("build")
            .script("false")
            .script("echo still here")
            .build(),
    );
    let h = harness(graph, runner);

    let report = h.executor.run("build").await.unwrap();

    assert!(report.aborted.is_empty());
    assert_eq!(h.runner.executed(), vec!["false", "echo still here"]);
}

#[tokio::test]
async fn variables_and_earlier_output_feed_later_commands() {
    init_tracing();

    let runner = ScriptedRunner::new().with_output("git rev-parse HEAD", &["abc123"]);
    let graph = TaskGraphBuilder::new()
        .with_variable("registry", "ghcr.io")
        .with_target(TargetBuilder::new("rev").script("git rev-parse HEAD").build())
        .with_target(
            TargetBuilder::new("image")
                .needs("rev")
                .variable("name", "app")
                .script("docker build -t ${registry}/${name}:${RUN.rev.LOG.LAST}")
                .build(),
        );
    let h = harness(graph, runner);

    h.executor.run("image").await.unwrap();

    assert_eq!(
        h.runner.executed(),
        vec!["git rev-parse HEAD", "docker build -t ghcr.io/app:abc123"]
    );
    assert_eq!(
        h.executor.placeholders().get("RUN.SCRIPT_LINE").as_deref(),
        Some("docker build -t ghcr.io/app:abc123")
    );
    // no output: LOG.LAST is cleared
    assert_eq!(
        h.executor.placeholders().get(&log_last_key("image")).as_deref(),
        Some("")
    );
}

#[tokio::test]
async fn output_options_shape_emitted_lines() {
    init_tracing();

    let runner = ScriptedRunner::new()
        .with_output("loud", &["a", "b"])
        .with_output("quiet", &["hidden"]);
    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("fmt")
                .format("[fmt] %s")
                .displaycmd(true)
                .script("loud")
                .build(),
        )
        .with_target(TargetBuilder::new("silent").hideout(true).script("quiet").build());
    let h = harness(graph, runner);

    h.executor.run("fmt,silent").await.unwrap();

    assert_eq!(h.sink.output_of("fmt"), vec!["[fmt] a", "[fmt] b"]);
    assert!(h.sink.output_of("silent").is_empty());
    assert!(h.sink.events().contains(&ExecutionEvent::CommandEchoed {
        target: "fmt".to_string(),
        command: "loud".to_string(),
    }));
    // hidden output still feeds LOG.LAST
    assert_eq!(
        h.executor.placeholders().get(&log_last_key("silent")).as_deref(),
        Some("hidden")
    );
}

#[tokio::test]
async fn diamond_dependencies_run_shared_target_each_time() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(TargetBuilder::new("base").script("echo base").build())
        .with_target(TargetBuilder::new("left").needs("base").script("echo left").build())
        .with_target(TargetBuilder::new("right").needs("base").script("echo right").build())
        .with_target(
            TargetBuilder::new("top")
                .needs("left")
                .needs("right")
                .script("echo top")
                .build(),
        );
    let h = harness(graph, ScriptedRunner::new());

    let report = h.executor.run("top").await.unwrap();

    assert_eq!(report.executed, vec!["base", "left", "base", "right", "top"]);
}

#[tokio::test]
async fn parallel_selection_runs_every_target() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .sequential(false)
        .with_target(TargetBuilder::new("a").script("echo a").build())
        .with_target(TargetBuilder::new("b").script("echo b").build());
    let h = harness(graph, ScriptedRunner::new());

    let report = with_timeout(h.executor.run("a, b")).await.unwrap();

    let mut executed = report.executed.clone();
    executed.sort();
    assert_eq!(executed, vec!["a", "b"]);
    assert!(!h.executor.registry().is_running("target:a"));
    assert!(!h.executor.registry().is_running("target:b"));
}

#[tokio::test]
async fn parallel_selection_merges_reports_in_selector_order() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .sequential(false)
        .with_target(TargetBuilder::new("first").script("echo 1").build())
        .with_target(TargetBuilder::new("second").script("echo 2").build());
    let h = harness(graph, ScriptedRunner::new());

    let report = with_timeout(h.executor.run("second,first,nope")).await.unwrap();

    assert_eq!(report.executed, vec!["second", "first"]);
    assert_eq!(report.not_found, vec!["nope"]);
}

#[tokio::test]
async fn unknown_reference_in_unchecked_graph_is_reported() {
    init_tracing();

    let graph = TaskGraphBuilder::new()
        .with_target(
            TargetBuilder::new("app")
                .needs("ghost")
                .script("echo app")
                .build(),
        )
        .build_unchecked();
    let h = harness_for(graph, ScriptedRunner::new());

    let report = with_timeout(h.executor.run("app")).await.unwrap();

    assert_eq!(report.not_found, vec!["ghost"]);
    assert_eq!(report.executed, vec!["app"]);
}
