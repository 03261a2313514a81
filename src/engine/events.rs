// src/engine/events.rs

//! Outbound events for loggers, UIs and tests.

use std::path::PathBuf;
use std::time::Duration;

use crate::report::RunSummary;
use crate::sched::BatchResults;
use crate::types::TargetName;

/// Lifecycle events published by the runtime on a broadcast channel.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    WatchStarted,
    FilesChanged {
        paths: Vec<PathBuf>,
    },
    /// A batch resolved to no stale targets.
    NothingToBuild {
        changed: usize,
    },
    BuildStarted {
        target: TargetName,
    },
    BuildCompleted {
        target: TargetName,
        success: bool,
        duration: Duration,
        errors: Vec<String>,
    },
    /// Emitted exactly once per batch, after the last build is terminal.
    AllBuildsComplete {
        summary: RunSummary,
        results: BatchResults,
    },
    WatcherCrashed {
        error: String,
    },
    WatcherRestarting {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    /// Restart ceiling reached; requires an explicit reset.
    WatcherFailed {
        attempts: u32,
        error: String,
    },
}
