// src/sched/mod.rs

//! Bounded-parallel build scheduling.
//!
//! - [`scheduler`] contains the per-batch state machine that decides which
//!   targets run and when queued targets are admitted.
//! - [`build_task`] provides the per-target build record and batch results.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`pool`] drives a scheduler to completion with real concurrent builds.

pub mod build_task;
pub mod pool;
pub mod scheduler;
pub mod scheduler_step;

pub use build_task::{BatchResults, BuildOutcome, BuildTask};
pub use pool::run_batch;
pub use scheduler::BuildScheduler;
pub use scheduler_step::{CompletedBuild, SchedulerStep};
