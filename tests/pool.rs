// tests/pool.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use buildwatch::errors::BuildwatchError;
use buildwatch::exec::{BuildDispatcher, BuildFuture, BuildOutput};
use buildwatch::report::RunSummary;
use buildwatch::sched::{run_batch, BuildScheduler};
use buildwatch::types::{BuildStatus, TargetDescriptor};
use buildwatch_test_utils::builders::target;
use buildwatch_test_utils::fake_dispatcher::ScriptedDispatcher;
use buildwatch_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn targets(names: &[&str]) -> Vec<TargetDescriptor> {
    names.iter().map(|n| target(n, n)).collect()
}

/// Panics while building `target`; every other target succeeds.
struct PanickingDispatcher {
    target: &'static str,
}

impl BuildDispatcher for PanickingDispatcher {
    fn execute<'a>(&'a self, target: &'a TargetDescriptor, _output_dir: &'a Path) -> BuildFuture<'a> {
        Box::pin(async move {
            if target.name == self.target {
                panic!("build of {} blew up", target.name);
            }
            Ok(BuildOutput {
                exit_code: Some(0),
                ..BuildOutput::default()
            })
        })
    }
}

#[tokio::test(start_paused = true)]
async fn one_failing_target_does_not_affect_the_others() -> TestResult {
    init_tracing();
    let dispatcher = ScriptedDispatcher::new(Duration::from_millis(50)).failing("b");
    let mut scheduler = BuildScheduler::new(3);

    let results = with_timeout(run_batch(
        &mut scheduler,
        targets(&["a", "b", "c"]),
        Arc::new(dispatcher.clone()),
        Path::new("/out"),
        None,
    ))
    .await?;

    assert_eq!(results.get("a").unwrap().status, BuildStatus::Success);
    assert_eq!(results.get("c").unwrap().status, BuildStatus::Success);

    let failed = results.get("b").unwrap();
    assert_eq!(failed.status, BuildStatus::Failure);
    assert_eq!(failed.exit_code, Some(1));
    assert!(failed.errors.iter().any(|e| e.contains("scripted failure")));

    let summary = RunSummary::from_results(&results);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert!(!summary.all_succeeded());
    let failed: Vec<_> = summary.failed_targets().map(|t| t.name.as_str()).collect();
    assert_eq!(failed, vec!["b"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_max_parallel() -> TestResult {
    let dispatcher = ScriptedDispatcher::new(Duration::from_millis(10))
        .with_delay_for("t2", Duration::from_millis(200))
        .with_delay_for("t5", Duration::from_millis(70));
    let mut scheduler = BuildScheduler::new(3);
    let names: Vec<String> = (0..12).map(|i| format!("t{i}")).collect();
    let batch: Vec<_> = names.iter().map(|n| target(n, n)).collect();

    let results = with_timeout(run_batch(
        &mut scheduler,
        batch,
        Arc::new(dispatcher.clone()),
        Path::new("/out"),
        None,
    ))
    .await?;

    assert_eq!(results.len(), 12);
    assert!(results.tasks.values().all(|t| t.status == BuildStatus::Success));
    assert_eq!(dispatcher.max_concurrency(), 3);
    assert_eq!(dispatcher.started().len(), 12);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_build_does_not_hold_back_the_queue() -> TestResult {
    // With a pool of 2, "slow" occupies one slot while the other slot
    // works through the rest of the queue.
    let dispatcher = ScriptedDispatcher::new(Duration::from_millis(10))
        .with_delay_for("slow", Duration::from_millis(500));
    let mut scheduler = BuildScheduler::new(2);

    with_timeout(run_batch(
        &mut scheduler,
        targets(&["slow", "b", "c", "d"]),
        Arc::new(dispatcher.clone()),
        Path::new("/out"),
        None,
    ))
    .await?;

    let records = dispatcher.records();
    let slow = records.iter().find(|r| r.target == "slow").unwrap();
    let d = records.iter().find(|r| r.target == "d").unwrap();
    assert!(d.finished < slow.finished, "d waited for the slow build");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_only_the_slow_target() -> TestResult {
    let dispatcher = ScriptedDispatcher::new(Duration::from_millis(10))
        .with_delay_for("hang", Duration::from_secs(3600));
    let mut scheduler = BuildScheduler::new(2);

    let results = run_batch(
        &mut scheduler,
        targets(&["hang", "ok"]),
        Arc::new(dispatcher),
        Path::new("/out"),
        Some(Duration::from_secs(1)),
    )
    .await?;

    let hang = results.get("hang").unwrap();
    assert_eq!(hang.status, BuildStatus::Failure);
    assert!(hang.errors.iter().any(|e| e.contains("timed out")), "{:?}", hang.errors);
    assert_eq!(results.get("ok").unwrap().status, BuildStatus::Success);
    Ok(())
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let mut scheduler = BuildScheduler::new(2);
    let err = run_batch(
        &mut scheduler,
        Vec::new(),
        Arc::new(ScriptedDispatcher::default()),
        Path::new("/out"),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildwatchError::InvalidInput(_)));
}

#[tokio::test(start_paused = true)]
async fn summary_keeps_submission_order() -> TestResult {
    // "z" finishes first but was submitted last.
    let dispatcher = ScriptedDispatcher::new(Duration::from_millis(100))
        .with_delay_for("z", Duration::from_millis(1));
    let mut scheduler = BuildScheduler::new(3);

    let results = run_batch(
        &mut scheduler,
        targets(&["x", "y", "z"]),
        Arc::new(dispatcher),
        Path::new("/out"),
        None,
    )
    .await?;

    let summary = RunSummary::from_results(&results);
    let order: Vec<_> = summary.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(order, vec!["x", "y", "z"]);
    assert_eq!(summary.total(), 3);
    assert!(summary.mean_duration.is_some());

    let table = summary.to_string();
    assert!(table.contains("x"));
    assert!(table.contains("success"));
    Ok(())
}

#[tokio::test]
async fn panicking_build_fails_its_target_and_frees_the_scheduler() -> TestResult {
    init_tracing();
    let mut scheduler = BuildScheduler::new(2);
    let dispatcher: Arc<dyn BuildDispatcher> = Arc::new(PanickingDispatcher { target: "boom" });

    let results = with_timeout(run_batch(
        &mut scheduler,
        targets(&["boom", "fine"]),
        Arc::clone(&dispatcher),
        Path::new("/out"),
        None,
    ))
    .await?;

    let failed = results.get("boom").unwrap();
    assert_eq!(failed.status, BuildStatus::Failure);
    assert!(!failed.errors.is_empty());
    assert_eq!(results.get("fine").unwrap().status, BuildStatus::Success);
    assert!(scheduler.is_idle());

    // The same scheduler accepts the next batch.
    let results = with_timeout(run_batch(
        &mut scheduler,
        targets(&["fine"]),
        dispatcher,
        Path::new("/out"),
        None,
    ))
    .await?;
    assert_eq!(results.get("fine").unwrap().status, BuildStatus::Success);
    Ok(())
}
