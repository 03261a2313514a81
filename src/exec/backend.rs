// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The runtime talks to a `BuildBackend` instead of spawning builds itself.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! production implementation in [`RealBuildBackend`].
//!
//! - `RealBuildBackend` runs each build on its own Tokio task through a
//!   [`BuildDispatcher`] and reports back with `RuntimeEvent::BuildFinished`.
//! - Tests can provide their own `BuildBackend` that, for example, records
//!   which targets were started and emits completions on demand.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::dispatch::BuildDispatcher;
use crate::exec::task_runner::spawn_guarded_build;
use crate::types::TargetDescriptor;

/// A build admitted by the scheduler, ready to be started.
#[derive(Debug, Clone)]
pub struct ScheduledBuild {
    pub batch_id: u64,
    pub target: TargetDescriptor,
    pub output_dir: PathBuf,
}

/// Trait abstracting how admitted builds are started.
///
/// Implementations must eventually send exactly one
/// `RuntimeEvent::BuildFinished` per started build.
pub trait BuildBackend: Send {
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real build backend used in production.
pub struct RealBuildBackend {
    dispatcher: Arc<dyn BuildDispatcher>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for RealBuildBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealBuildBackend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RealBuildBackend {
    pub fn new(
        dispatcher: Arc<dyn BuildDispatcher>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            dispatcher,
            runtime_tx,
            timeout,
        }
    }
}

impl BuildBackend for RealBuildBackend {
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for build in builds {
                let dispatcher = Arc::clone(&self.dispatcher);
                let tx = self.runtime_tx.clone();
                let timeout = self.timeout;
                debug!(
                    target_name = %build.target.name,
                    batch_id = build.batch_id,
                    "spawning build"
                );

                tokio::spawn(async move {
                    let (target, outcome) =
                        spawn_guarded_build(dispatcher, build.target, build.output_dir, timeout)
                            .await;
                    if tx
                        .send(RuntimeEvent::BuildFinished { target, outcome })
                        .await
                        .is_err()
                    {
                        warn!("runtime gone before build result could be delivered");
                    }
                });
            }
            Ok(())
        })
    }
}
