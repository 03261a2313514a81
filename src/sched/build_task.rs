// src/sched/build_task.rs

//! Per-target build attempt records.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::{BuildStatus, TargetDescriptor, TargetName};

/// What a finished build reports back to the scheduler.
///
/// Built by the exec layer from the dispatcher's result; the scheduler only
/// looks at `success` and copies the rest onto the [`BuildTask`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Human-readable error list; empty on success.
    pub errors: Vec<String>,
}

impl BuildOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// One target's build attempt within a batch.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub target: TargetDescriptor,
    pub status: BuildStatus,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub errors: Vec<String>,
}

impl BuildTask {
    pub(crate) fn queued(target: TargetDescriptor) -> Self {
        Self {
            target,
            status: BuildStatus::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn mark_running(&mut self, now: Instant) {
        self.status = BuildStatus::Running;
        self.started_at = Some(now);
    }

    pub(crate) fn finish(&mut self, outcome: BuildOutcome, now: Instant) {
        self.status = if outcome.success {
            BuildStatus::Success
        } else {
            BuildStatus::Failure
        };
        self.finished_at = Some(now);
        self.exit_code = outcome.exit_code;
        self.stdout = outcome.stdout;
        self.stderr = outcome.stderr;
        self.errors = outcome.errors;

        if self.status == BuildStatus::Failure && self.errors.is_empty() {
            self.errors.push(match self.exit_code {
                Some(code) => format!("build failed with exit code {code}"),
                None => "build failed".to_string(),
            });
        }
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock time between admission and completion.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

/// Every task of a finished batch, plus the order they were submitted in.
#[derive(Debug, Clone)]
pub struct BatchResults {
    pub batch_id: u64,
    pub order: Vec<TargetName>,
    pub tasks: HashMap<TargetName, BuildTask>,
}

impl BatchResults {
    pub fn get(&self, name: &str) -> Option<&BuildTask> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tasks in submission order, not completion order.
    pub fn in_submission_order(&self) -> impl Iterator<Item = &BuildTask> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }
}
