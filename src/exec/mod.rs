// src/exec/mod.rs

//! Build execution layer.
//!
//! This module is responsible for actually running builds, using
//! `tokio::process::Command`, and reporting back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`dispatch`] maps a target's build method onto a concrete tool.
//! - [`task_runner`] runs one build with an optional timeout and converts the
//!   result into a `BuildOutcome`.
//! - [`diagnostics`] extracts readable error lines from failed builds.
//! - [`backend`] provides the `BuildBackend` trait and the
//!   `RealBuildBackend` that the runtime uses in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod diagnostics;
pub mod dispatch;
pub mod task_runner;

pub use backend::{BuildBackend, RealBuildBackend, ScheduledBuild};
pub use dispatch::{BuildDispatcher, BuildFuture, BuildOutput, MethodDispatcher};
pub use task_runner::{outcome_from_result, run_build, spawn_guarded_build};
