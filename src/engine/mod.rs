// src/engine/mod.rs

//! Orchestration engine for buildwatch.
//!
//! This module ties together:
//! - the restart supervisor that owns the watch process lifecycle
//! - the change aggregator fed by raw watch notifications
//! - the staleness resolver that turns a change batch into targets
//! - the build scheduler and the reporter
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. Everything flows through a single channel of
//! [`RuntimeEvent`]s, so the core is the only writer of scheduler state.

use std::path::PathBuf;

use crate::config::EngineSettings;
use crate::sched::BuildOutcome;
use crate::types::{TargetDescriptor, TargetName};
use crate::watch::ChangeBatch;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once a batch has completed (or there was
    /// nothing to build) and no changes are pending (used for `--once`).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, aggregator, builds and
/// the operator.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Ask the supervisor to start the watch process.
    StartWatching,
    /// Raw paths reported by the watch source.
    PathsChanged(Vec<PathBuf>),
    /// Force the aggregator to emit its pending batch now.
    FlushRequested,
    /// A debounced batch from the aggregator. Empty means "full run".
    FilesChanged(ChangeBatch),
    /// The staleness resolver's selection for the batch being resolved.
    TargetsSelected(Vec<TargetDescriptor>),
    /// A build process ended.
    BuildFinished {
        target: TargetName,
        outcome: BuildOutcome,
    },
    /// The watch source confirmed a successful start.
    WatcherStarted,
    /// The watch source died or failed to start.
    WatcherCrashed(String),
    /// The supervisor's backoff delay elapsed.
    RestartTimerElapsed,
    /// Operator reset of a permanently failed watcher.
    ResetWatcher,
    /// Explicitly re-apply configuration values.
    ApplySettings(EngineSettings),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod events;
pub mod queue;
pub mod runtime;
pub mod status;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use events::OrchestratorEvent;
pub use queue::PendingChanges;
pub use runtime::{Runtime, RuntimeContext};
pub use status::{StatusHandle, StatusSnapshot};
