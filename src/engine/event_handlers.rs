// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::engine::core::{CoreRuntime, Phase};
use crate::engine::events::OrchestratorEvent;
use crate::errors::BuildwatchError;
use crate::report::RunSummary;
use crate::sched::{BuildOutcome, SchedulerStep};
use crate::types::{BuildStatus, TargetDescriptor, TargetName};
use crate::watch::{ChangeBatch, SupervisorDecision};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Publish an event to observers.
    Emit(OrchestratorEvent),
    /// Run the staleness resolver over this batch and report back with
    /// `RuntimeEvent::TargetsSelected`.
    ResolveTargets(ChangeBatch),
    /// Start these builds through the build backend.
    DispatchBuilds {
        batch_id: u64,
        targets: Vec<TargetDescriptor>,
    },
    /// (Re)start the watch source.
    StartWatcher,
    /// Tear down the watch source.
    StopWatcher,
    /// Send `RuntimeEvent::RestartTimerElapsed` after this delay.
    ScheduleRestart(Duration),
    /// Feed raw paths into the change aggregator.
    ForwardToAggregator(Vec<PathBuf>),
    FlushAggregator,
    ConfigureAggregator(Duration),
    /// Cancel the debounce timer and drop its pending batch.
    ShutdownAggregator,
    /// Request that the process exits (`--once` when idle, or shutdown).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn none() -> Self {
        Self::with(Vec::new())
    }
}

impl CoreRuntime {
    pub(super) fn handle_start_watching(&mut self) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }
        match self.supervisor.request_start() {
            SupervisorDecision::Start => CoreStep::with(vec![CoreCommand::StartWatcher]),
            _ => CoreStep::none(),
        }
    }

    pub(super) fn handle_watcher_started(&mut self) -> CoreStep {
        if self.supervisor.on_started() {
            info!("watching for changes");
            CoreStep::with(vec![CoreCommand::Emit(OrchestratorEvent::WatchStarted)])
        } else {
            CoreStep::none()
        }
    }

    /// A crash (or failed start) moves the supervisor through `Restarting`.
    ///
    /// Every crash and every restart decision is emitted individually, so the
    /// whole streak is observable, not just where it ends.
    pub(super) fn handle_watcher_crashed(&mut self, error: String) -> CoreStep {
        if self.shutting_down {
            debug!(%error, "watcher crash during shutdown; ignoring");
            return CoreStep::none();
        }

        let decision = self.supervisor.on_crash();
        if decision == SupervisorDecision::Ignore {
            return CoreStep::none();
        }

        let mut commands = vec![
            CoreCommand::Emit(OrchestratorEvent::WatcherCrashed {
                error: error.clone(),
            }),
            CoreCommand::StopWatcher,
        ];

        match decision {
            SupervisorDecision::RestartAfter { attempt, delay } => {
                commands.push(CoreCommand::Emit(OrchestratorEvent::WatcherRestarting {
                    attempt,
                    max_attempts: self.supervisor.max_attempts(),
                    delay,
                }));
                commands.push(CoreCommand::ScheduleRestart(delay));
            }
            SupervisorDecision::GiveUp { attempts } => {
                let exhausted = BuildwatchError::RestartExhausted { attempts };
                commands.push(CoreCommand::Emit(OrchestratorEvent::WatcherFailed {
                    attempts,
                    error: format!("{exhausted}; last error: {error}"),
                }));
            }
            SupervisorDecision::Start | SupervisorDecision::Ignore => {}
        }

        CoreStep::with(commands)
    }

    pub(super) fn handle_restart_timer(&mut self) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }
        match self.supervisor.on_backoff_elapsed() {
            SupervisorDecision::Start => CoreStep::with(vec![CoreCommand::StartWatcher]),
            _ => CoreStep::none(),
        }
    }

    /// Operator reset: clear the attempt counter and start watching again.
    pub(super) fn handle_reset_watcher(&mut self) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }
        self.supervisor.reset();
        let mut commands = vec![CoreCommand::StopWatcher];
        if self.supervisor.request_start() == SupervisorDecision::Start {
            commands.push(CoreCommand::StartWatcher);
        }
        CoreStep::with(commands)
    }

    pub(super) fn handle_paths_changed(&mut self, paths: Vec<PathBuf>) -> CoreStep {
        if self.shutting_down || paths.is_empty() {
            return CoreStep::none();
        }
        CoreStep::with(vec![CoreCommand::ForwardToAggregator(paths)])
    }

    pub(super) fn handle_flush_requested(&mut self) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }
        CoreStep::with(vec![CoreCommand::FlushAggregator])
    }

    /// A debounced batch arrived.
    ///
    /// - Idle: resolve it right away.
    /// - Resolving or building: merge it into the pending follow-up batch,
    ///   resolved once the current batch is done.
    pub(super) fn handle_files_changed(&mut self, batch: ChangeBatch) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }

        let mut commands = vec![CoreCommand::Emit(OrchestratorEvent::FilesChanged {
            paths: batch.sorted_paths(),
        })];

        if self.phase == Phase::Idle {
            commands.push(self.begin_resolving(batch));
        } else {
            debug!(phase = ?self.phase, paths = batch.len(), "batch in progress; queueing changes");
            self.pending.record(batch);
        }

        CoreStep::with(commands)
    }

    pub(super) fn handle_targets_selected(&mut self, targets: Vec<TargetDescriptor>) -> CoreStep {
        let Phase::Resolving { changed } = self.phase else {
            warn!(phase = ?self.phase, "target selection outside of resolution; ignoring");
            return CoreStep::none();
        };

        if self.shutting_down {
            self.phase = Phase::Idle;
            return self.finish_step(Vec::new());
        }

        let mut commands = Vec::new();

        if targets.is_empty() {
            info!(changed, "no stale targets; nothing to build");
            commands.push(CoreCommand::Emit(OrchestratorEvent::NothingToBuild { changed }));
            self.phase = Phase::Idle;
            self.start_pending(&mut commands);
            return self.finish_step(commands);
        }

        match self.scheduler.start_batch(targets) {
            Ok(step) => {
                self.phase = Phase::Building;
                self.apply_scheduler_step(step, &mut commands);
            }
            Err(err) => {
                warn!(error = %err, "could not start build batch");
                self.phase = Phase::Idle;
                self.start_pending(&mut commands);
            }
        }

        self.finish_step(commands)
    }

    pub(super) fn handle_build_finished(
        &mut self,
        target: TargetName,
        outcome: BuildOutcome,
    ) -> CoreStep {
        let step = self.scheduler.complete(&target, outcome);
        let mut commands = Vec::new();
        self.apply_scheduler_step(step, &mut commands);
        self.finish_step(commands)
    }

    /// Explicit re-application of configuration values. Only the values the
    /// running engine can honour are taken; `max_parallel` applies from the
    /// next batch.
    pub(super) fn handle_apply_settings(&mut self, settings: EngineSettings) -> CoreStep {
        info!(
            debounce = ?settings.debounce_delay,
            max_parallel = settings.max_parallel,
            max_restart_attempts = settings.max_restart_attempts,
            restart_base_delay = ?settings.restart_base_delay,
            "applying settings"
        );
        self.scheduler.set_max_parallel(settings.max_parallel);
        self.supervisor
            .reconfigure(settings.max_restart_attempts, settings.restart_base_delay);
        CoreStep::with(vec![CoreCommand::ConfigureAggregator(settings.debounce_delay)])
    }

    /// Stop admitting builds, drop queued changes and stop watching.
    ///
    /// In-flight builds are allowed to finish; the loop exits once the last
    /// one has reported back.
    pub(super) fn handle_shutdown(&mut self) -> CoreStep {
        if self.shutting_down {
            return CoreStep::none();
        }
        info!("shutdown requested");
        self.shutting_down = true;
        self.pending.clear();
        self.supervisor.stop();

        let dropped = self.scheduler.begin_shutdown();
        for name in dropped {
            self.statuses.insert(name, BuildStatus::Pending);
        }

        let mut commands = vec![CoreCommand::StopWatcher, CoreCommand::ShutdownAggregator];

        if self.scheduler.is_idle() {
            self.phase = Phase::Idle;
            commands.push(CoreCommand::RequestExit);
            return CoreStep {
                commands,
                keep_running: false,
            };
        }

        info!(
            in_flight = self.scheduler.active_count(),
            "waiting for in-flight builds to finish"
        );
        CoreStep::with(commands)
    }

    fn begin_resolving(&mut self, batch: ChangeBatch) -> CoreCommand {
        self.phase = Phase::Resolving {
            changed: batch.len(),
        };
        CoreCommand::ResolveTargets(batch)
    }

    /// Start the queued follow-up batch, if there is one.
    fn start_pending(&mut self, commands: &mut Vec<CoreCommand>) {
        if self.phase != Phase::Idle || self.shutting_down {
            return;
        }
        if let Some(batch) = self.pending.drain() {
            debug!(paths = batch.len(), "resolving queued changes");
            commands.push(self.begin_resolving(batch));
        }
    }

    fn apply_scheduler_step(&mut self, step: SchedulerStep, commands: &mut Vec<CoreCommand>) {
        let batch_id = self.scheduler.current_batch_id();
        for (name, status) in self.scheduler.statuses() {
            self.statuses.insert(name, status);
        }

        if let Some(done) = step.completed {
            let status = if done.success {
                BuildStatus::Success
            } else {
                BuildStatus::Failure
            };
            self.statuses.insert(done.target.clone(), status);
            commands.push(CoreCommand::Emit(OrchestratorEvent::BuildCompleted {
                target: done.target,
                success: done.success,
                duration: done.duration,
                errors: done.errors,
            }));
        }

        if !step.admitted.is_empty() {
            for target in &step.admitted {
                commands.push(CoreCommand::Emit(OrchestratorEvent::BuildStarted {
                    target: target.name.clone(),
                }));
            }
            commands.push(CoreCommand::DispatchBuilds {
                batch_id: batch_id.unwrap_or_default(),
                targets: step.admitted,
            });
        }

        if let Some(results) = step.finished {
            for task in results.tasks.values() {
                self.statuses.insert(task.target.name.clone(), task.status);
            }
            let summary = RunSummary::from_results(&results);
            info!(
                batch_id = summary.batch_id,
                succeeded = summary.success_count,
                failed = summary.failure_count,
                "build batch complete"
            );
            commands.push(CoreCommand::Emit(OrchestratorEvent::AllBuildsComplete {
                summary,
                results,
            }));
            self.phase = Phase::Idle;
            self.start_pending(commands);
        } else if step.drained {
            self.phase = Phase::Idle;
        }
    }

    /// Decide whether the loop keeps running after this step.
    fn finish_step(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let idle = self.phase == Phase::Idle && self.scheduler.is_idle();

        let exit = if self.shutting_down {
            idle
        } else {
            // In `--once` mode, exit when nothing is building and nothing
            // is queued behind it.
            self.options.exit_when_idle && idle && self.pending.is_empty()
        };

        if exit {
            commands.push(CoreCommand::RequestExit);
        }

        CoreStep {
            commands,
            keep_running: !exit,
        }
    }
}
