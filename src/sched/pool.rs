// src/sched/pool.rs

//! Standalone batch driver: one call, one batch, all results.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

use crate::errors::{BuildwatchError, Result};
use crate::exec::{spawn_guarded_build, BuildDispatcher};
use crate::sched::build_task::{BatchResults, BuildOutcome};
use crate::sched::scheduler::BuildScheduler;
use crate::types::{TargetDescriptor, TargetName};

/// Build `targets` under `scheduler`'s concurrency limit and return every
/// task once all of them are terminal.
///
/// Completions are applied one at a time from this task, so the scheduler is
/// never touched concurrently. Individual build failures end up on their
/// `BuildTask`; only an empty (or otherwise invalid) target list is an error.
pub async fn run_batch(
    scheduler: &mut BuildScheduler,
    targets: Vec<TargetDescriptor>,
    dispatcher: Arc<dyn BuildDispatcher>,
    output_root: &Path,
    timeout: Option<Duration>,
) -> Result<BatchResults> {
    let mut step = scheduler.start_batch(targets)?;
    let mut running: JoinSet<(TargetName, BuildOutcome)> = JoinSet::new();
    let mut in_flight: HashMap<Id, TargetName> = HashMap::new();

    loop {
        for target in step.admitted.drain(..) {
            let output_dir = output_root.join(&target.name);
            debug!(target_name = %target.name, "pool: starting build");
            let name = target.name.clone();
            let handle = running.spawn(spawn_guarded_build(
                Arc::clone(&dispatcher),
                target,
                output_dir,
                timeout,
            ));
            in_flight.insert(handle.id(), name);
        }

        if let Some(results) = step.finished.take() {
            return Ok(results);
        }

        match running.join_next_with_id().await {
            Some(Ok((id, (name, outcome)))) => {
                in_flight.remove(&id);
                step = scheduler.complete(&name, outcome);
            }
            // The batch still has to finish, or the scheduler stays busy.
            Some(Err(err)) => {
                let Some(name) = in_flight.remove(&err.id()) else {
                    return Err(BuildwatchError::Other(anyhow::anyhow!(
                        "unknown build driver task failed: {err}"
                    )));
                };
                error!(target_name = %name, error = %err, "build driver task failed");
                step = scheduler.complete(
                    &name,
                    BuildOutcome::failed(format!("build driver for '{name}' failed: {err}")),
                );
            }
            None => {
                return Err(BuildwatchError::Other(anyhow::anyhow!(
                    "scheduler stalled with no running builds"
                )));
            }
        }
    }
}
