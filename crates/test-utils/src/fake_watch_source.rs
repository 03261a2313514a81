use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;
use buildwatch::engine::RuntimeEvent;
use buildwatch::watch::WatchSource;

#[derive(Debug, Default)]
struct State {
    starts: usize,
    stops: usize,
    /// Scripted start failures, consumed one per `start` call.
    start_failures: VecDeque<String>,
    tx: Option<mpsc::Sender<RuntimeEvent>>,
}

/// A watch source driven entirely by the test through a [`FakeWatchHandle`].
#[derive(Debug, Default)]
pub struct FakeWatchSource {
    state: Arc<Mutex<State>>,
}

/// Test-side control over a [`FakeWatchSource`].
#[derive(Debug, Clone)]
pub struct FakeWatchHandle {
    state: Arc<Mutex<State>>,
}

impl FakeWatchSource {
    pub fn new() -> (Self, FakeWatchHandle) {
        let state = Arc::new(Mutex::new(State::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            FakeWatchHandle { state },
        )
    }
}

impl WatchSource for FakeWatchSource {
    fn start(&mut self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.starts += 1;
        if let Some(reason) = state.start_failures.pop_front() {
            return Err(anyhow!(reason));
        }
        state.tx = Some(runtime_tx);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.tx.take().is_some() {
            state.stops += 1;
        }
    }
}

impl FakeWatchHandle {
    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().tx.is_some()
    }

    /// Make the next `n` start attempts fail.
    pub fn fail_next_starts(&self, n: usize, reason: &str) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            state.start_failures.push_back(reason.to_string());
        }
    }

    /// Report raw paths as if the watcher saw them. No-op while stopped.
    pub async fn change(&self, paths: &[&str]) {
        let tx = self.state.lock().unwrap().tx.clone();
        if let Some(tx) = tx {
            let paths = paths.iter().map(PathBuf::from).collect();
            let _ = tx.send(RuntimeEvent::PathsChanged(paths)).await;
        }
    }

    /// Simulate the watcher dying.
    pub async fn crash(&self, reason: &str) {
        let tx = self.state.lock().unwrap().tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(RuntimeEvent::WatcherCrashed(reason.to_string())).await;
        }
    }
}
