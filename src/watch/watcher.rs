// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::path_utils::{is_under, relative_path};
use crate::watch::patterns::ExcludeSet;

/// Something that produces raw change notifications and may crash.
///
/// The runtime owns exactly one `WatchSource` and restarts it through the
/// restart supervisor. Implementations report:
/// - `RuntimeEvent::PathsChanged` for every batch of raw paths,
/// - `RuntimeEvent::WatcherCrashed` when the underlying watcher dies.
///
/// `start` returning an error is treated the same as a crash.
pub trait WatchSource: Send {
    fn start(&mut self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<()>;

    /// Stop watching. Must be idempotent.
    fn stop(&mut self);
}

/// Live watcher: the `notify` watcher plus the task forwarding its events.
struct WatcherHandle {
    _inner: RecommendedWatcher,
    forwarder: JoinHandle<()>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// `notify`-backed watch source observing the project root recursively.
pub struct NotifyWatchSource {
    root: PathBuf,
    output_dir: PathBuf,
    excludes: ExcludeSet,
    active: Option<WatcherHandle>,
}

impl std::fmt::Debug for NotifyWatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatchSource")
            .field("root", &self.root)
            .field("active", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl NotifyWatchSource {
    /// - `root` is the project root; forwarded paths are relative to it.
    /// - `output_dir` (relative to `root`) is ignored so builds writing their
    ///   artifacts do not retrigger themselves.
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, excludes: ExcludeSet) -> Self {
        let root = root.into();
        // Canonicalize once so we have a stable base path.
        let root = root.canonicalize().unwrap_or(root);
        let output_dir = output_dir.into();
        let output_dir = relative_path(&root, &output_dir).unwrap_or(output_dir);
        Self {
            root,
            output_dir,
            excludes,
            active: None,
        }
    }
}

impl WatchSource for NotifyWatchSource {
    fn start(&mut self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<()> {
        self.stop();

        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away when the watcher is being torn down.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .context("creating file watcher")?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {:?}", self.root))?;

        info!("file watcher started on {:?}", self.root);

        let forwarder = tokio::spawn(forward_events(
            self.root.clone(),
            self.output_dir.clone(),
            self.excludes.clone(),
            event_rx,
            runtime_tx,
        ));

        self.active = Some(WatcherHandle {
            _inner: watcher,
            forwarder,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if self.active.take().is_some() {
            debug!("file watcher stopped");
        }
    }
}

/// Consume notify events and turn them into runtime events.
async fn forward_events(
    root: PathBuf,
    output_dir: PathBuf,
    excludes: ExcludeSet,
    mut event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    while let Some(res) = event_rx.recv().await {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    continue;
                }
                let paths = filter_event_paths(&root, &output_dir, &excludes, &event.paths);
                if paths.is_empty() {
                    continue;
                }
                debug!(?paths, "file change notification");
                if runtime_tx.send(RuntimeEvent::PathsChanged(paths)).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "file watcher reported an error");
                let _ = runtime_tx
                    .send(RuntimeEvent::WatcherCrashed(err.to_string()))
                    .await;
                break;
            }
        }
    }
    debug!("watcher event loop finished");
}

/// Relativize event paths against `root` and drop the ones nobody builds
/// from: excluded directories and the output tree.
pub fn filter_event_paths(
    root: &Path,
    output_dir: &Path,
    excludes: &ExcludeSet,
    paths: &[PathBuf],
) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|path| {
            let rel = relative_path(root, path);
            if rel.is_none() {
                warn!("could not relativize path {:?} against root {:?}", path, root);
            }
            rel
        })
        .filter(|rel| !excludes.contains_excluded(rel))
        .filter(|rel| !is_under(rel, output_dir))
        .collect()
}
