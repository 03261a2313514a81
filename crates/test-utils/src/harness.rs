use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use buildwatch::engine::{
    CoreRuntime, OrchestratorEvent, Runtime, RuntimeContext, RuntimeEvent, RuntimeOptions,
    StatusHandle,
};
use buildwatch::exec::BuildBackend;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::sched::BuildScheduler;
use buildwatch::stale::StalenessResolver;
use buildwatch::types::TargetDescriptor;
use buildwatch::watch::{ExcludeSet, RestartSupervisor};

/// Mock project root used by harness resolvers.
pub const ROOT: &str = "/proj";

/// Wires a `Runtime` over an in-memory filesystem.
pub struct HarnessBuilder {
    targets: Vec<TargetDescriptor>,
    fs: MockFileSystem,
    max_parallel: usize,
    max_restart_attempts: u32,
    restart_base_delay: Duration,
    debounce: Duration,
    exit_when_idle: bool,
}

/// A runtime ready to `run()`, plus everything a test needs to drive and
/// observe it.
pub struct Harness<B: BuildBackend> {
    pub runtime: Runtime<B>,
    pub tx: mpsc::Sender<RuntimeEvent>,
    pub events: broadcast::Receiver<OrchestratorEvent>,
    pub status: StatusHandle,
}

impl HarnessBuilder {
    pub fn new(targets: Vec<TargetDescriptor>) -> Self {
        Self {
            targets,
            fs: MockFileSystem::new(),
            max_parallel: 2,
            max_restart_attempts: 3,
            restart_base_delay: Duration::from_millis(10),
            debounce: Duration::from_millis(20),
            exit_when_idle: false,
        }
    }

    pub fn fs(mut self, fs: MockFileSystem) -> Self {
        self.fs = fs;
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n;
        self
    }

    pub fn restarts(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_restart_attempts = max_attempts;
        self.restart_base_delay = base_delay;
        self
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    pub fn exit_when_idle(mut self, val: bool) -> Self {
        self.exit_when_idle = val;
        self
    }

    /// `make_backend` receives the runtime's event sender.
    pub fn build<B, F>(self, make_backend: F) -> Harness<B>
    where
        B: BuildBackend,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> B,
    {
        let (tx, rx) = mpsc::channel(256);
        let (events_tx, events) = broadcast::channel(256);
        let status = StatusHandle::new();

        let resolver = StalenessResolver::new(
            Arc::new(self.fs),
            ROOT,
            ".buildwatch",
            ExcludeSet::empty(),
        );

        let ctx = RuntimeContext {
            resolver: Arc::new(resolver),
            targets: Arc::new(self.targets),
            status: status.clone(),
            events: events_tx,
            debounce_delay: self.debounce,
        };

        let core = CoreRuntime::new(
            BuildScheduler::new(self.max_parallel),
            RestartSupervisor::new(self.max_restart_attempts, self.restart_base_delay),
            RuntimeOptions {
                exit_when_idle: self.exit_when_idle,
            },
        );

        let backend = make_backend(tx.clone());
        let runtime = Runtime::new(core, rx, tx.clone(), backend, ctx);

        Harness {
            runtime,
            tx,
            events,
            status,
        }
    }
}

/// Receive the next orchestrator event, failing the test after 5 seconds.
pub async fn next_event(events: &mut broadcast::Receiver<OrchestratorEvent>) -> OrchestratorEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an orchestrator event")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`; returns it.
pub async fn wait_for<F>(
    events: &mut broadcast::Receiver<OrchestratorEvent>,
    mut pred: F,
) -> OrchestratorEvent
where
    F: FnMut(&OrchestratorEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Everything still buffered on the receiver.
pub fn drain(events: &mut broadcast::Receiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
