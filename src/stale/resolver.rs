// src/stale/resolver.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::BuildwatchError;
use crate::fs::FileSystem;
use crate::stale::scan::newest_mtime;
use crate::types::TargetDescriptor;
use crate::watch::aggregator::ChangeBatch;
use crate::watch::path_utils::{is_under, normalize, relative_path};
use crate::watch::patterns::ExcludeSet;

/// Why a target was (or was not) considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No output directory for the target.
    MissingOutput,
    /// Output directory exists but holds no files.
    EmptyOutput,
    /// Newest source file is strictly newer than the newest output file.
    SourcesNewer,
    /// Scanning failed; treated as stale.
    ScanFailed,
    UpToDate,
}

impl Staleness {
    pub fn is_stale(self) -> bool {
        !matches!(self, Staleness::UpToDate)
    }
}

/// Decides which targets a change batch affects and which of those actually
/// need a rebuild.
#[derive(Debug, Clone)]
pub struct StalenessResolver {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    output_root: PathBuf,
    excludes: ExcludeSet,
}

impl StalenessResolver {
    /// - `root` is the project root; relative source roots resolve against it.
    /// - `output_root` holds one directory per target name (relative to `root`
    ///   unless absolute).
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        output_root: impl AsRef<Path>,
        excludes: ExcludeSet,
    ) -> Self {
        let root = normalize(&root.into());
        let output_root = normalize(&root.join(output_root.as_ref()));
        Self {
            fs,
            root,
            output_root,
            excludes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory the dispatcher writes this target's artifacts into.
    pub fn output_dir_for(&self, target: &TargetDescriptor) -> PathBuf {
        self.output_root.join(&target.name)
    }

    pub fn source_dir_for(&self, target: &TargetDescriptor) -> PathBuf {
        normalize(&self.root.join(&target.source_root))
    }

    /// Targets whose normalized `source_root` is a prefix of at least one
    /// changed path. Order of `targets` is preserved.
    ///
    /// Changed paths and source roots are both compared relative to the
    /// project root, whichever form they were given in.
    pub fn affected_targets(
        &self,
        batch: &ChangeBatch,
        targets: &[TargetDescriptor],
    ) -> Vec<TargetDescriptor> {
        let changed: Vec<PathBuf> = batch.iter().map(|p| self.relative_to_root(p)).collect();

        targets
            .iter()
            .filter(|target| {
                let source_root = self.relative_to_root(&target.source_root);
                changed.iter().any(|path| is_under(path, &source_root))
            })
            .cloned()
            .collect()
    }

    /// Full staleness verdict, surfacing scan errors.
    pub fn check(&self, target: &TargetDescriptor) -> Result<Staleness, BuildwatchError> {
        let output_dir = self.output_dir_for(target);
        if !self.fs.exists(&output_dir) {
            return Ok(Staleness::MissingOutput);
        }

        let scan_err = |source| BuildwatchError::StalenessCheck {
            target: target.name.clone(),
            source,
        };

        let output_time = newest_mtime(self.fs.as_ref(), &output_dir, &ExcludeSet::empty(), None)
            .map_err(scan_err)?;
        let Some(output_time) = output_time else {
            return Ok(Staleness::EmptyOutput);
        };

        let source_time = newest_mtime(
            self.fs.as_ref(),
            &self.source_dir_for(target),
            &self.excludes,
            Some(&self.output_root),
        )
        .map_err(scan_err)?;

        match source_time {
            Some(source_time) if source_time > output_time => Ok(Staleness::SourcesNewer),
            _ => Ok(Staleness::UpToDate),
        }
    }

    /// Staleness verdict that fails open: a scan error means "rebuild".
    pub fn staleness(&self, target: &TargetDescriptor) -> Staleness {
        match self.check(target) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(
                    target_name = %target.name,
                    error = %err,
                    "staleness check failed; treating target as stale"
                );
                Staleness::ScanFailed
            }
        }
    }

    pub fn is_stale(&self, target: &TargetDescriptor) -> bool {
        self.staleness(target).is_stale()
    }

    /// Targets to hand to the scheduler for this batch.
    ///
    /// An empty batch is a full run: every target, no staleness check.
    pub fn select(&self, batch: &ChangeBatch, targets: &[TargetDescriptor]) -> Vec<TargetDescriptor> {
        if batch.is_empty() {
            info!(targets = targets.len(), "full run requested; selecting every target");
            return targets.to_vec();
        }

        let affected = self.affected_targets(batch, targets);
        let selected: Vec<TargetDescriptor> = affected
            .into_iter()
            .filter(|target| {
                let verdict = self.staleness(target);
                debug!(target_name = %target.name, ?verdict, "staleness verdict");
                verdict.is_stale()
            })
            .collect();

        let names: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
        info!(changed = batch.len(), ?names, "selected targets for rebuild");
        selected
    }

    fn relative_to_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            relative_path(&self.root, path).unwrap_or_else(|| normalize(path))
        } else {
            normalize(path)
        }
    }
}
