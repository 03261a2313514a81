// src/watch/aggregator.rs

//! Change aggregation (debouncing).
//!
//! - [`ChangeBatch`] is the deduplicated set of paths seen in one quiet period.
//! - [`Debouncer`] is the synchronous core: it owns the pending batch and the
//!   deadline, and is driven with explicit instants so it can be tested
//!   without a clock.
//! - [`ChangeAggregator`] is the async shell: a Tokio task owning a
//!   `Debouncer`, fed through an unbounded channel and emitting
//!   `RuntimeEvent::FilesChanged` into the runtime.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;

/// Set of changed paths collected during one debounce window.
///
/// An empty batch has a special meaning downstream: "full run", every target
/// is selected without a staleness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    paths: HashSet<PathBuf>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the path was not already part of the batch.
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
    }

    /// Set union with another batch.
    pub fn merge(&mut self, other: ChangeBatch) {
        self.paths.extend(other.paths);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Paths in sorted order, for logs and display.
    pub fn sorted_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.paths.iter().cloned().collect();
        paths.sort();
        paths
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut batch = ChangeBatch::new();
        batch.extend(iter);
        batch
    }
}

/// Synchronous debounce state: one pending batch and at most one deadline.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    batch: ChangeBatch,
    deadline: Option<Instant>,
    pending_count: usize,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            batch: ChangeBatch::new(),
            deadline: None,
            pending_count: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Takes effect from the next `notify`; an armed deadline is left alone.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Number of raw path notifications since the last emission
    /// (duplicates included).
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record changed paths and restart the quiet-period timer.
    ///
    /// An empty notification is ignored and does not touch the timer.
    pub fn notify<I, P>(&mut self, paths: I, now: Instant)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen = 0usize;
        for path in paths {
            self.batch.insert(path);
            seen += 1;
        }
        if seen == 0 {
            return;
        }
        self.pending_count += seen;
        self.deadline = Some(now + self.delay);
    }

    /// Emit the batch if the deadline has passed without interruption.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline {
            Some(deadline) if deadline <= now => Some(self.take()),
            _ => None,
        }
    }

    /// Emit whatever is pending right now, even if that is nothing.
    pub fn flush(&mut self) -> ChangeBatch {
        self.take()
    }

    /// Drop the pending batch and disarm the timer; returns how many
    /// distinct paths were discarded.
    pub fn discard(&mut self) -> usize {
        self.take().len()
    }

    fn take(&mut self) -> ChangeBatch {
        self.deadline = None;
        self.pending_count = 0;
        std::mem::take(&mut self.batch)
    }
}

#[derive(Debug)]
enum AggregatorCommand {
    Notify(Vec<PathBuf>),
    Flush,
    SetDelay(Duration),
    Shutdown,
}

/// Handle to a running change aggregator task.
///
/// All methods are non-blocking and may be called at any frequency. The
/// debounce timer belongs to this instance only.
#[derive(Debug)]
pub struct ChangeAggregator {
    tx: mpsc::UnboundedSender<AggregatorCommand>,
    handle: JoinHandle<()>,
}

impl ChangeAggregator {
    /// Spawn the aggregator loop. Emitted batches are sent to `runtime_tx` as
    /// `RuntimeEvent::FilesChanged`.
    pub fn spawn(delay: Duration, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(aggregator_loop(Debouncer::new(delay), rx, runtime_tx));
        Self { tx, handle }
    }

    pub fn notify(&self, paths: Vec<PathBuf>) {
        self.send(AggregatorCommand::Notify(paths));
    }

    /// Force immediate emission regardless of the timer.
    pub fn flush(&self) {
        self.send(AggregatorCommand::Flush);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.send(AggregatorCommand::SetDelay(delay));
    }

    /// Cancel the pending timer, drop the pending batch and wait for the
    /// aggregator task to finish.
    pub async fn shutdown(self) {
        self.send(AggregatorCommand::Shutdown);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "change aggregator task ended abnormally");
        }
    }

    fn send(&self, cmd: AggregatorCommand) {
        if self.tx.send(cmd).is_err() {
            debug!("change aggregator already stopped; dropping command");
        }
    }
}

async fn aggregator_loop(
    mut debouncer: Debouncer,
    mut rx: mpsc::UnboundedReceiver<AggregatorCommand>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    debug!(delay = ?debouncer.delay(), "change aggregator started");

    loop {
        let cmd = match debouncer.deadline() {
            Some(deadline) => {
                tokio::select! {
                    cmd = rx.recv() => cmd,
                    _ = sleep_until(deadline) => {
                        if let Some(batch) = debouncer.poll(Instant::now()) {
                            if !emit(&runtime_tx, batch).await {
                                break;
                            }
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match cmd {
            Some(AggregatorCommand::Notify(paths)) => {
                debouncer.notify(paths, Instant::now());
            }
            Some(AggregatorCommand::Flush) => {
                let batch = debouncer.flush();
                debug!(paths = batch.len(), "manual flush of change batch");
                if !emit(&runtime_tx, batch).await {
                    break;
                }
            }
            Some(AggregatorCommand::SetDelay(delay)) => {
                debug!(?delay, "debounce delay updated");
                debouncer.set_delay(delay);
            }
            Some(AggregatorCommand::Shutdown) => {
                let dropped = debouncer.discard();
                if dropped > 0 {
                    info!(dropped, "shutdown: discarded pending file changes");
                }
                break;
            }
            None => break,
        }
    }

    debug!("change aggregator finished");
}

/// Returns false if the runtime is gone and the loop should stop.
async fn emit(runtime_tx: &mpsc::Sender<RuntimeEvent>, batch: ChangeBatch) -> bool {
    debug!(paths = batch.len(), "emitting change batch");
    runtime_tx.send(RuntimeEvent::FilesChanged(batch)).await.is_ok()
}
