use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildwatch::exec::{BuildDispatcher, BuildFuture, BuildOutput};
use buildwatch::types::TargetDescriptor;
use tokio::time::Instant;

/// One observed build.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub target: String,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Default)]
struct Shared {
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<String>>,
    records: Mutex<Vec<BuildRecord>>,
}

/// A dispatcher that never spawns processes:
/// - every build sleeps for a fixed (or per-target) delay
/// - targets in the failing set exit with code 1 and an error on stderr
/// - the peak number of concurrent builds is recorded
#[derive(Debug, Clone, Default)]
pub struct ScriptedDispatcher {
    delay: Duration,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    shared: Arc<Shared>,
}

impl ScriptedDispatcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    pub fn with_delay_for(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    /// Highest number of builds observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.shared.max_running.load(Ordering::SeqCst)
    }

    /// Target names in the order their builds started.
    pub fn started(&self) -> Vec<String> {
        self.shared.started.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<BuildRecord> {
        self.shared.records.lock().unwrap().clone()
    }
}

impl BuildDispatcher for ScriptedDispatcher {
    fn execute<'a>(&'a self, target: &'a TargetDescriptor, _output_dir: &'a Path) -> BuildFuture<'a> {
        Box::pin(async move {
            let shared = &self.shared;
            let now_running = shared.running.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_running.fetch_max(now_running, Ordering::SeqCst);
            shared.started.lock().unwrap().push(target.name.clone());

            let started = Instant::now();
            let delay = self.delays.get(&target.name).copied().unwrap_or(self.delay);
            tokio::time::sleep(delay).await;

            shared.running.fetch_sub(1, Ordering::SeqCst);
            shared.records.lock().unwrap().push(BuildRecord {
                target: target.name.clone(),
                started,
                finished: Instant::now(),
            });

            if self.failing.contains(&target.name) {
                Ok(BuildOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: format!("error: scripted failure for {}\n", target.name),
                })
            } else {
                Ok(BuildOutput {
                    exit_code: Some(0),
                    stdout: format!("built {}\n", target.name),
                    stderr: String::new(),
                })
            }
        })
    }
}
