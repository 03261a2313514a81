// src/sched/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use std::time::Duration;

use crate::sched::build_task::BatchResults;
use crate::types::{TargetDescriptor, TargetName};

/// A build that just reached a terminal state.
#[derive(Debug, Clone)]
pub struct CompletedBuild {
    pub target: TargetName,
    pub success: bool,
    pub duration: Duration,
    pub errors: Vec<String>,
}

/// Structured result of a single scheduler "step".
///
/// The async drivers act on it; tests use it to step the pool manually and
/// make assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Targets admitted into `running` by this step; the caller must start
    /// exactly these builds.
    pub admitted: Vec<TargetDescriptor>,
    /// The build whose completion was processed by this step, if any.
    pub completed: Option<CompletedBuild>,
    /// Set exactly once per batch, on the step that made the last task
    /// terminal.
    pub finished: Option<BatchResults>,
    /// Set when a shutdown was requested and the last in-flight build has
    /// now ended; the batch is abandoned without a summary.
    pub drained: bool,
}
