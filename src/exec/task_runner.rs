// src/exec/task_runner.rs

//! Individual build runner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::BuildError;
use crate::exec::diagnostics::extract_errors;
use crate::exec::dispatch::{BuildDispatcher, BuildOutput};
use crate::sched::BuildOutcome;
use crate::types::{TargetDescriptor, TargetName};

/// Run one target's build through `dispatcher`, applying the optional
/// wall-clock timeout, and fold whatever happens into a [`BuildOutcome`].
///
/// This never fails: spawn errors, unsupported methods, timeouts and
/// non-zero exits all become a failed outcome with an error list.
pub async fn run_build(
    dispatcher: &dyn BuildDispatcher,
    target: &TargetDescriptor,
    output_dir: &std::path::Path,
    timeout: Option<Duration>,
) -> BuildOutcome {
    let fut = dispatcher.execute(target, output_dir);

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            // Dropping the future kills the child (kill_on_drop).
            Err(_) => Err(BuildError::TimedOut {
                target: target.name.clone(),
                timeout: limit,
            }),
        },
        None => fut.await,
    };

    outcome_from_result(target, result)
}

/// Map a dispatcher result onto the scheduler's outcome type.
pub fn outcome_from_result(
    target: &TargetDescriptor,
    result: Result<BuildOutput, BuildError>,
) -> BuildOutcome {
    match result {
        Ok(output) if output.success() => {
            info!(target_name = %target.name, "build succeeded");
            BuildOutcome {
                success: true,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                errors: Vec::new(),
            }
        }
        Ok(output) => {
            let errors = extract_errors(target, &output);
            warn!(
                target_name = %target.name,
                exit_code = ?output.exit_code,
                "build failed"
            );
            BuildOutcome {
                success: false,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                errors,
            }
        }
        Err(err) => {
            error!(target_name = %target.name, error = %err, "build could not run");
            BuildOutcome::failed(err.to_string())
        }
    }
}

/// Run a build on its own Tokio task and always yield a result for it.
///
/// A panicking dispatcher is reported as a failed build of that target
/// instead of taking the batch down with it.
pub async fn spawn_guarded_build(
    dispatcher: Arc<dyn BuildDispatcher>,
    target: TargetDescriptor,
    output_dir: PathBuf,
    timeout: Option<Duration>,
) -> (TargetName, BuildOutcome) {
    let name = target.name.clone();
    let handle = tokio::spawn(async move {
        run_build(dispatcher.as_ref(), &target, &output_dir, timeout).await
    });

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(target_name = %name, error = %err, "build task aborted");
            BuildOutcome::failed(format!("build task for '{name}' aborted: {err}"))
        }
    };
    (name, outcome)
}
