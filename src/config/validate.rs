// src/config/validate.rs

use std::path::Path;

use globset::Glob;
use regex::Regex;
use tracing::warn;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{BuildwatchError, Result};
use crate::types::BuildMethod;
use crate::watch::path_utils::normalize;

impl TryFrom<RawManifest> for Manifest {
    type Error = crate::errors::BuildwatchError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.config, raw.target))
    }
}

fn validate_raw_manifest(manifest: &RawManifest) -> Result<()> {
    ensure_has_targets(manifest)?;
    validate_global_config(manifest)?;
    validate_targets(manifest)?;
    Ok(())
}

fn ensure_has_targets(manifest: &RawManifest) -> Result<()> {
    if manifest.target.is_empty() {
        return Err(BuildwatchError::ConfigError(
            "manifest must contain at least one [target.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(manifest: &RawManifest) -> Result<()> {
    let cfg = &manifest.config;

    if cfg.debounce_ms == 0 {
        return Err(BuildwatchError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.max_parallel == Some(0) {
        return Err(BuildwatchError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.output_dir.trim().is_empty() {
        return Err(BuildwatchError::ConfigError(
            "[config].output_dir must not be empty".to_string(),
        ));
    }

    for pattern in cfg.exclude_dirs.iter() {
        Glob::new(pattern).map_err(|e| {
            BuildwatchError::ConfigError(format!(
                "[config].exclude_dirs has invalid pattern '{pattern}': {e}"
            ))
        })?;
    }

    Ok(())
}

fn validate_targets(manifest: &RawManifest) -> Result<()> {
    for (name, target) in manifest.target.iter() {
        if target.source_root.trim().is_empty() {
            return Err(BuildwatchError::ConfigError(format!(
                "target '{name}' has an empty `source_root`"
            )));
        }

        let source_root = normalize(Path::new(&target.source_root));
        if source_root.starts_with("..") {
            return Err(BuildwatchError::ConfigError(format!(
                "target '{name}' has a `source_root` outside the project root: {}",
                target.source_root
            )));
        }

        if target.build_method == BuildMethod::Command && !target.params.contains_key("cmd") {
            return Err(BuildwatchError::ConfigError(format!(
                "target '{name}' uses build_method = \"command\" but has no `params.cmd`"
            )));
        }

        if let Some(pattern) = target.params.get("error_pattern") {
            Regex::new(pattern).map_err(|e| {
                BuildwatchError::ConfigError(format!(
                    "target '{name}' has invalid `params.error_pattern`: {e}"
                ))
            })?;
        }

        if let BuildMethod::Unsupported(method) = &target.build_method {
            warn!(
                target_name = %name,
                method = %method,
                "unsupported build method; builds of this target will fail"
            );
        }
    }
    Ok(())
}
