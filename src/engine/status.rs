// src/engine/status.rs

//! Queryable build status for external polling.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::types::{BuildStatus, TargetName};
use crate::watch::WatchState;

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Last known status per target; targets never built are absent.
    pub targets: BTreeMap<TargetName, BuildStatus>,
    pub building: bool,
    pub watch_state: WatchState,
}

/// Cheaply clonable read handle; the runtime is the only writer.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_building(&self) -> bool {
        self.read(|s| s.building)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.read(Clone::clone)
    }

    pub fn status_of(&self, target: &str) -> Option<BuildStatus> {
        self.read(|s| s.targets.get(target).copied())
    }

    pub fn watch_state(&self) -> WatchState {
        self.read(|s| s.watch_state)
    }

    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        *guard = snapshot;
    }

    fn read<T>(&self, f: impl FnOnce(&StatusSnapshot) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
        f(&guard)
    }
}
