// tests/core_runtime.rs
//
// Drives the pure core directly: no Tokio tasks, channels or IO.

use std::path::PathBuf;
use std::time::Duration;

use buildwatch::config::EngineSettings;
use buildwatch::engine::core::Phase;
use buildwatch::engine::{CoreCommand, CoreRuntime, CoreStep, OrchestratorEvent, RuntimeEvent, RuntimeOptions};
use buildwatch::sched::{BuildOutcome, BuildScheduler};
use buildwatch::types::BuildStatus;
use buildwatch::watch::{ChangeBatch, RestartSupervisor, WatchState};
use buildwatch_test_utils::builders::target;

fn core(max_parallel: usize, exit_when_idle: bool) -> CoreRuntime {
    CoreRuntime::new(
        BuildScheduler::new(max_parallel),
        RestartSupervisor::new(2, Duration::from_secs(1)),
        RuntimeOptions { exit_when_idle },
    )
}

fn batch(paths: &[&str]) -> ChangeBatch {
    paths.iter().map(PathBuf::from).collect()
}

fn resolve_requests(step: &CoreStep) -> Vec<ChangeBatch> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::ResolveTargets(b) => Some(b.clone()),
            _ => None,
        })
        .collect()
}

fn dispatched(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .flat_map(|c| match c {
            CoreCommand::DispatchBuilds { targets, .. } => {
                targets.iter().map(|t| t.name.clone()).collect()
            }
            _ => Vec::new(),
        })
        .collect()
}

fn emitted(step: &CoreStep) -> Vec<&OrchestratorEvent> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Emit(e) => Some(e),
            _ => None,
        })
        .collect()
}

#[test]
fn files_changed_when_idle_starts_resolution() {
    let mut core = core(2, false);
    let step = core.step(RuntimeEvent::FilesChanged(batch(&["a/x.ts"])));

    assert_eq!(resolve_requests(&step).len(), 1);
    assert_eq!(core.phase(), Phase::Resolving { changed: 1 });
    assert!(step.keep_running);
}

#[test]
fn selected_targets_are_dispatched_up_to_the_limit() {
    let mut core = core(1, false);
    core.step(RuntimeEvent::FilesChanged(ChangeBatch::new()));

    let step = core.step(RuntimeEvent::TargetsSelected(vec![target("a", "a"), target("b", "b")]));
    assert_eq!(dispatched(&step), vec!["a"]);
    assert_eq!(core.phase(), Phase::Building);
    assert!(core.is_building());

    let step = core.step(RuntimeEvent::BuildFinished {
        target: "a".into(),
        outcome: BuildOutcome::succeeded(),
    });
    assert_eq!(dispatched(&step), vec!["b"]);

    let step = core.step(RuntimeEvent::BuildFinished {
        target: "b".into(),
        outcome: BuildOutcome::failed("exit 1"),
    });
    let events = emitted(&step);
    let summary = events
        .iter()
        .find_map(|e| match e {
            OrchestratorEvent::AllBuildsComplete { summary, .. } => Some(summary),
            _ => None,
        })
        .expect("batch summary");
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 1);
    assert!(core.is_idle());

    let snapshot = core.snapshot();
    assert_eq!(snapshot.targets.get("a"), Some(&BuildStatus::Success));
    assert_eq!(snapshot.targets.get("b"), Some(&BuildStatus::Failure));
    assert!(!snapshot.building);
}

#[test]
fn empty_selection_is_nothing_to_build_not_an_error() {
    let mut core = core(2, true);
    core.step(RuntimeEvent::FilesChanged(batch(&["docs/x.md"])));

    let step = core.step(RuntimeEvent::TargetsSelected(Vec::new()));
    assert!(emitted(&step)
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::NothingToBuild { changed: 1 })));
    assert!(dispatched(&step).is_empty());
    assert!(!step.keep_running, "--once exits when there is nothing to build");
    assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
}

#[test]
fn batches_during_a_build_are_merged_and_resolved_afterwards() {
    let mut core = core(2, false);
    core.step(RuntimeEvent::FilesChanged(batch(&["a/x.ts"])));
    core.step(RuntimeEvent::TargetsSelected(vec![target("a", "a")]));

    let step = core.step(RuntimeEvent::FilesChanged(batch(&["b/1.ts"])));
    assert!(resolve_requests(&step).is_empty());
    core.step(RuntimeEvent::FilesChanged(batch(&["b/2.ts", "b/1.ts"])));
    assert!(!core.pending_is_empty());

    let step = core.step(RuntimeEvent::BuildFinished {
        target: "a".into(),
        outcome: BuildOutcome::succeeded(),
    });
    let follow_up = resolve_requests(&step);
    assert_eq!(follow_up.len(), 1);
    assert_eq!(follow_up[0].sorted_paths(), vec![PathBuf::from("b/1.ts"), PathBuf::from("b/2.ts")]);
    assert!(core.pending_is_empty());
    assert_eq!(core.phase(), Phase::Resolving { changed: 2 });
}

#[test]
fn queued_full_run_dominates_queued_paths() {
    let mut core = core(2, false);
    core.step(RuntimeEvent::FilesChanged(batch(&["a/x.ts"])));

    core.step(RuntimeEvent::FilesChanged(batch(&["b/1.ts"])));
    core.step(RuntimeEvent::FilesChanged(ChangeBatch::new()));

    let step = core.step(RuntimeEvent::TargetsSelected(Vec::new()));
    let follow_up = resolve_requests(&step);
    assert_eq!(follow_up.len(), 1);
    assert!(follow_up[0].is_empty());
}

#[test]
fn once_mode_waits_for_queued_changes_before_exiting() {
    let mut core = core(2, true);
    core.step(RuntimeEvent::FilesChanged(ChangeBatch::new()));
    core.step(RuntimeEvent::TargetsSelected(vec![target("a", "a")]));
    core.step(RuntimeEvent::FilesChanged(batch(&["a/y.ts"])));

    let step = core.step(RuntimeEvent::BuildFinished {
        target: "a".into(),
        outcome: BuildOutcome::succeeded(),
    });
    assert!(step.keep_running);
    assert_eq!(resolve_requests(&step).len(), 1);

    let step = core.step(RuntimeEvent::TargetsSelected(Vec::new()));
    assert!(!step.keep_running);
}

#[test]
fn shutdown_when_idle_exits_immediately() {
    let mut core = core(2, false);
    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert!(step.commands.iter().any(|c| matches!(c, CoreCommand::ShutdownAggregator)));
    assert!(step.commands.iter().any(|c| matches!(c, CoreCommand::StopWatcher)));
}

#[test]
fn shutdown_drains_in_flight_builds_then_exits() {
    let mut core = core(1, false);
    core.step(RuntimeEvent::FilesChanged(ChangeBatch::new()));
    core.step(RuntimeEvent::TargetsSelected(vec![target("a", "a"), target("b", "b")]));

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(step.keep_running, "a is still building");

    // Late notifications are dropped.
    let step = core.step(RuntimeEvent::FilesChanged(batch(&["a/x.ts"])));
    assert!(step.commands.is_empty());

    let step = core.step(RuntimeEvent::BuildFinished {
        target: "a".into(),
        outcome: BuildOutcome::succeeded(),
    });
    assert!(dispatched(&step).is_empty(), "b must not be admitted after shutdown");
    assert!(!emitted(&step)
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::AllBuildsComplete { .. })));
    assert!(!step.keep_running);
    assert_eq!(core.snapshot().targets.get("b"), Some(&BuildStatus::Pending));
}

#[test]
fn watcher_crash_schedules_a_restart_and_gives_up_at_the_ceiling() {
    let mut core = core(1, false);

    let step = core.step(RuntimeEvent::StartWatching);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::StartWatcher]));
    core.step(RuntimeEvent::WatcherStarted);
    assert_eq!(core.watch_state(), WatchState::Watching);

    let step = core.step(RuntimeEvent::WatcherCrashed("gone".into()));
    assert!(step
        .commands
        .iter()
        .any(|c| matches!(c, CoreCommand::ScheduleRestart(d) if *d == Duration::from_secs(1))));
    assert_eq!(core.watch_state(), WatchState::Restarting);

    let step = core.step(RuntimeEvent::RestartTimerElapsed);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::StartWatcher]));

    let step = core.step(RuntimeEvent::WatcherCrashed("gone".into()));
    assert!(step
        .commands
        .iter()
        .any(|c| matches!(c, CoreCommand::ScheduleRestart(d) if *d == Duration::from_secs(2))));
    core.step(RuntimeEvent::RestartTimerElapsed);

    let step = core.step(RuntimeEvent::WatcherCrashed("gone".into()));
    assert!(emitted(&step)
        .iter()
        .any(|e| matches!(
            e,
            OrchestratorEvent::WatcherFailed { attempts: 2, error }
                if error.contains("restart limit") && error.contains("gone")
        )));
    assert!(!step.commands.iter().any(|c| matches!(c, CoreCommand::ScheduleRestart(_))));
    assert_eq!(core.watch_state(), WatchState::Failed);
    // Permanent watcher failure does not stop the process.
    assert!(step.keep_running);

    let step = core.step(RuntimeEvent::ResetWatcher);
    assert!(step.commands.iter().any(|c| matches!(c, CoreCommand::StartWatcher)));
    assert_eq!(core.restart_attempts(), 0);
}

#[test]
fn applied_settings_reach_scheduler_supervisor_and_aggregator() {
    let mut core = core(1, false);
    let settings = EngineSettings {
        debounce_delay: Duration::from_millis(50),
        max_parallel: 4,
        max_restart_attempts: 9,
        restart_base_delay: Duration::from_millis(250),
        ..EngineSettings::default()
    };

    let step = core.step(RuntimeEvent::ApplySettings(settings));
    assert!(matches!(
        step.commands.as_slice(),
        [CoreCommand::ConfigureAggregator(d)] if *d == Duration::from_millis(50)
    ));
    assert_eq!(core.max_parallel(), 4);

    core.step(RuntimeEvent::StartWatching);
    core.step(RuntimeEvent::WatcherStarted);
    let step = core.step(RuntimeEvent::WatcherCrashed("x".into()));
    assert!(emitted(&step).iter().any(|e| matches!(
        e,
        OrchestratorEvent::WatcherRestarting { max_attempts: 9, delay, .. } if *delay == Duration::from_millis(250)
    )));
}

#[test]
fn raw_paths_are_forwarded_to_the_aggregator() {
    let mut core = core(1, false);
    let step = core.step(RuntimeEvent::PathsChanged(vec![PathBuf::from("a/x.ts")]));
    assert!(matches!(step.commands.as_slice(), [CoreCommand::ForwardToAggregator(p)] if p.len() == 1));

    let step = core.step(RuntimeEvent::FlushRequested);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::FlushAggregator]));
}
