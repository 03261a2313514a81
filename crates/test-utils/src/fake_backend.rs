use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use buildwatch::engine::RuntimeEvent;
use buildwatch::errors::Result;
use buildwatch::exec::{BuildBackend, ScheduledBuild};
use buildwatch::sched::BuildOutcome;

/// A fake backend that:
/// - records which targets were "built"
/// - immediately reports BuildFinished for each scheduled build, failing the
///   targets listed in `failing`.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: Vec::new(),
        }
    }

    pub fn failing(mut self, target: &str) -> Self {
        self.failing.push(target.to_string());
        self
    }
}

impl BuildBackend for FakeBackend {
    fn spawn_builds(
        &mut self,
        builds: Vec<ScheduledBuild>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for b in builds {
                let name = b.target.name.clone();
                executed.lock().unwrap().push(name.clone());

                let outcome = if failing.contains(&name) {
                    BuildOutcome::failed("scripted failure")
                } else {
                    BuildOutcome::succeeded()
                };

                // Report from a separate task: the runtime is busy awaiting
                // this future and the channel may be full.
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx
                        .send(RuntimeEvent::BuildFinished {
                            target: name,
                            outcome,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }
}
