// src/sched/scheduler.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{BuildwatchError, Result};
use crate::sched::build_task::{BatchResults, BuildOutcome, BuildTask};
use crate::sched::scheduler_step::{CompletedBuild, SchedulerStep};
use crate::types::{BuildStatus, TargetDescriptor, TargetName};

/// Per-batch state. Exists only while a batch is in flight.
#[derive(Debug)]
struct RunState {
    batch_id: u64,
    /// Concurrency limit captured when the batch started.
    max_parallel: usize,
    queue: VecDeque<TargetName>,
    active: HashSet<TargetName>,
    tasks: HashMap<TargetName, BuildTask>,
    order: Vec<TargetName>,
    total_expected: usize,
    completed: usize,
}

impl RunState {
    fn is_complete(&self) -> bool {
        self.active.is_empty() && self.queue.is_empty() && self.completed == self.total_expected
    }
}

/// Work-conserving build pool.
///
/// Pure state machine: it never spawns anything. The caller starts the
/// builds listed in [`SchedulerStep::admitted`] and reports each result via
/// [`BuildScheduler::complete`], which admits the next queued target.
///
/// Per target: `queued → running → {success | failure}`. At no point are more
/// than `max_parallel` targets running.
#[derive(Debug)]
pub struct BuildScheduler {
    max_parallel: usize,
    run: Option<RunState>,
    batch_counter: u64,
    admitting: bool,
}

impl BuildScheduler {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            run: None,
            batch_counter: 0,
            admitting: true,
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Applies from the next batch; a running batch keeps its limit.
    pub fn set_max_parallel(&mut self, max_parallel: usize) {
        self.max_parallel = max_parallel.max(1);
    }

    pub fn is_idle(&self) -> bool {
        self.run.is_none()
    }

    pub fn is_building(&self) -> bool {
        self.run.is_some()
    }

    pub fn current_batch_id(&self) -> Option<u64> {
        self.run.as_ref().map(|r| r.batch_id)
    }

    pub fn active_count(&self) -> usize {
        self.run.as_ref().map(|r| r.active.len()).unwrap_or(0)
    }

    pub fn queued_count(&self) -> usize {
        self.run.as_ref().map(|r| r.queue.len()).unwrap_or(0)
    }

    /// Status of every target in the current batch.
    pub fn statuses(&self) -> BTreeMap<TargetName, BuildStatus> {
        self.run
            .as_ref()
            .map(|r| {
                r.tasks
                    .iter()
                    .map(|(name, task)| (name.clone(), task.status))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn task(&self, name: &str) -> Option<&BuildTask> {
        self.run.as_ref()?.tasks.get(name)
    }

    /// Start a new batch and admit the first `max_parallel` targets.
    ///
    /// Fails with `InvalidInput` if `targets` is empty, contains duplicate
    /// names, or another batch is still running. "Nothing to build" is the
    /// caller's business, not a scheduler outcome.
    pub fn start_batch(&mut self, targets: Vec<TargetDescriptor>) -> Result<SchedulerStep> {
        if targets.is_empty() {
            return Err(BuildwatchError::InvalidInput(
                "cannot schedule an empty target list".to_string(),
            ));
        }
        if let Some(run) = &self.run {
            return Err(BuildwatchError::InvalidInput(format!(
                "batch {} is still running",
                run.batch_id
            )));
        }
        if !self.admitting {
            return Err(BuildwatchError::InvalidInput(
                "scheduler is shutting down".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.name.as_str()) {
                return Err(BuildwatchError::InvalidInput(format!(
                    "target '{}' submitted twice in one batch",
                    target.name
                )));
            }
        }

        self.batch_counter += 1;
        let order: Vec<TargetName> = targets.iter().map(|t| t.name.clone()).collect();
        let tasks: HashMap<TargetName, BuildTask> = targets
            .into_iter()
            .map(|t| (t.name.clone(), BuildTask::queued(t)))
            .collect();

        let mut run = RunState {
            batch_id: self.batch_counter,
            max_parallel: self.max_parallel,
            queue: order.iter().cloned().collect(),
            active: HashSet::new(),
            total_expected: order.len(),
            order,
            tasks,
            completed: 0,
        };

        info!(
            batch_id = run.batch_id,
            targets = run.total_expected,
            max_parallel = run.max_parallel,
            "scheduler: starting build batch"
        );

        let admitted = Self::admit_ready(&mut run, true);
        self.run = Some(run);

        Ok(SchedulerStep {
            admitted,
            ..SchedulerStep::default()
        })
    }

    /// Record the result of a running build and admit the next queued
    /// target, if any.
    pub fn complete(&mut self, name: &str, outcome: BuildOutcome) -> SchedulerStep {
        let admitting = self.admitting;
        let Some(run) = self.run.as_mut() else {
            warn!(target_name = %name, "completion with no active batch; ignoring");
            return SchedulerStep::default();
        };

        if !run.active.remove(name) {
            warn!(
                target_name = %name,
                batch_id = run.batch_id,
                "completion for a target that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        let now = Instant::now();
        let completed = match run.tasks.get_mut(name) {
            Some(task) => {
                task.finish(outcome, now);
                CompletedBuild {
                    target: task.target.name.clone(),
                    success: task.status == BuildStatus::Success,
                    duration: task.duration().unwrap_or_default(),
                    errors: task.errors.clone(),
                }
            }
            None => {
                warn!(target_name = %name, "running target has no task record");
                return SchedulerStep::default();
            }
        };
        run.completed += 1;

        debug!(
            target_name = %name,
            batch_id = run.batch_id,
            success = completed.success,
            completed = run.completed,
            total = run.total_expected,
            "scheduler: build finished"
        );

        let admitted = Self::admit_ready(run, admitting);

        let mut step = SchedulerStep {
            admitted,
            completed: Some(completed),
            ..SchedulerStep::default()
        };

        if run.is_complete() {
            if let Some(run) = self.run.take() {
                info!(batch_id = run.batch_id, "scheduler: all builds terminal; batch finished");
                step.finished = Some(BatchResults {
                    batch_id: run.batch_id,
                    order: run.order,
                    tasks: run.tasks,
                });
            }
        } else if !admitting && run.active.is_empty() {
            info!(batch_id = run.batch_id, "scheduler: in-flight builds drained after shutdown");
            self.run = None;
            step.drained = true;
        }

        step
    }

    /// Stop admitting queued targets. In-flight builds may still complete.
    ///
    /// Returns the names of targets that will now never start; they stay
    /// `pending` with an explanatory error.
    pub fn begin_shutdown(&mut self) -> Vec<TargetName> {
        self.admitting = false;

        let Some(run) = self.run.as_mut() else {
            return Vec::new();
        };

        let dropped: Vec<TargetName> = run.queue.drain(..).collect();
        for name in &dropped {
            if let Some(task) = run.tasks.get_mut(name) {
                task.errors.push("not started: shutdown requested".to_string());
            }
        }

        if run.active.is_empty() {
            self.run = None;
        }

        if !dropped.is_empty() {
            info!(dropped = dropped.len(), "scheduler: shutdown; queued builds will not start");
        }
        dropped
    }

    pub fn is_shutting_down(&self) -> bool {
        !self.admitting
    }

    fn admit_ready(run: &mut RunState, admitting: bool) -> Vec<TargetDescriptor> {
        let mut admitted = Vec::new();
        if !admitting {
            return admitted;
        }

        let now = Instant::now();
        while run.active.len() < run.max_parallel {
            let Some(name) = run.queue.pop_front() else {
                break;
            };
            if let Some(task) = run.tasks.get_mut(&name) {
                task.mark_running(now);
                admitted.push(task.target.clone());
            }
            run.active.insert(name);
        }

        debug_assert!(run.active.len() <= run.max_parallel);
        admitted
    }
}
