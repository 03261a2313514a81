// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - starting builds through the build backend
//! - owning the watch source, the change aggregator and the restart timer
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use std::collections::BTreeMap;

use crate::engine::event_handlers::CoreStep;
use crate::engine::queue::PendingChanges;
use crate::engine::status::StatusSnapshot;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::sched::BuildScheduler;
use crate::types::{BuildStatus, TargetName};
use crate::watch::{RestartSupervisor, WatchState};

/// Where the core is in the change → resolve → build cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting for the staleness resolver; `changed` is the batch size.
    Resolving { changed: usize },
    Building,
}

/// Pure core runtime state.
///
/// This owns:
/// - the build scheduler
/// - the restart supervisor
/// - change batches queued behind the current batch
/// - the last known status of every target
///
/// It has **no** channels, no Tokio tasks, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    pub(super) scheduler: BuildScheduler,
    pub(super) supervisor: RestartSupervisor,
    pub(super) pending: PendingChanges,
    pub(super) phase: Phase,
    pub(super) options: RuntimeOptions,
    pub(super) shutting_down: bool,
    pub(super) statuses: BTreeMap<TargetName, BuildStatus>,
}

impl CoreRuntime {
    pub fn new(
        scheduler: BuildScheduler,
        supervisor: RestartSupervisor,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            supervisor,
            pending: PendingChanges::new(),
            phase: Phase::Idle,
            options,
            shutting_down: false,
            statuses: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// No batch resolving or building.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn is_building(&self) -> bool {
        self.scheduler.is_building()
    }

    /// Expose queue emptiness (for tests).
    pub fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn watch_state(&self) -> WatchState {
        self.supervisor.state()
    }

    pub fn restart_attempts(&self) -> u32 {
        self.supervisor.attempts()
    }

    pub fn max_parallel(&self) -> usize {
        self.scheduler.max_parallel()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            targets: self.statuses.clone(),
            building: self.scheduler.is_building(),
            watch_state: self.supervisor.state(),
        }
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::StartWatching => self.handle_start_watching(),
            RuntimeEvent::WatcherStarted => self.handle_watcher_started(),
            RuntimeEvent::WatcherCrashed(error) => self.handle_watcher_crashed(error),
            RuntimeEvent::RestartTimerElapsed => self.handle_restart_timer(),
            RuntimeEvent::ResetWatcher => self.handle_reset_watcher(),
            RuntimeEvent::PathsChanged(paths) => self.handle_paths_changed(paths),
            RuntimeEvent::FlushRequested => self.handle_flush_requested(),
            RuntimeEvent::FilesChanged(batch) => self.handle_files_changed(batch),
            RuntimeEvent::TargetsSelected(targets) => self.handle_targets_selected(targets),
            RuntimeEvent::BuildFinished { target, outcome } => {
                self.handle_build_finished(target, outcome)
            }
            RuntimeEvent::ApplySettings(settings) => self.handle_apply_settings(settings),
            RuntimeEvent::ShutdownRequested => self.handle_shutdown(),
        }
    }
}
