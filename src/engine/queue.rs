// src/engine/queue.rs

use tracing::debug;

use crate::watch::ChangeBatch;

/// Change batches that arrive while a batch is already resolving or
/// building.
///
/// Semantics:
/// - All pending batches are coalesced into one (set union); at most one
///   follow-up batch is ever queued.
/// - An empty batch means "full run" and dominates the merge: once one is
///   recorded, the follow-up is a full run no matter what else arrives.
/// - `drain()` hands the merged batch to the runtime when the current batch
///   finishes.
#[derive(Debug, Default)]
pub struct PendingChanges {
    batch: Option<ChangeBatch>,
    full_run: bool,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there is nothing queued.
    pub fn is_empty(&self) -> bool {
        self.batch.is_none() && !self.full_run
    }

    pub fn is_full_run(&self) -> bool {
        self.full_run
    }

    /// Record a batch that could not be processed immediately.
    pub fn record(&mut self, batch: ChangeBatch) {
        if batch.is_empty() {
            debug!("queued full run while a batch is in progress");
            self.full_run = true;
            return;
        }

        let queued = self.batch.get_or_insert_with(ChangeBatch::new);
        queued.merge(batch);
        debug!(paths = queued.len(), "merged change batch into pending follow-up");
    }

    /// Take the merged follow-up batch, if any.
    pub fn drain(&mut self) -> Option<ChangeBatch> {
        let batch = self.batch.take();
        if std::mem::take(&mut self.full_run) {
            return Some(ChangeBatch::new());
        }
        batch
    }

    pub fn clear(&mut self) {
        self.batch = None;
        self.full_run = false;
    }
}
