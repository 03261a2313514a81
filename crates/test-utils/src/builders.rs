#![allow(dead_code)]

use std::collections::BTreeMap;

use buildwatch::config::{ConfigSection, Manifest, RawManifest, TargetConfig};
use buildwatch::types::{BuildMethod, TargetDescriptor};

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                config: ConfigSection::default(),
                target: BTreeMap::new(),
            },
        }
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.manifest.target.insert(name.to_string(), target);
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.manifest.config.debounce_ms = ms;
        self
    }

    pub fn parallel(mut self, val: bool) -> Self {
        self.manifest.config.parallel = val;
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.manifest.config.max_parallel = Some(n);
        self
    }

    pub fn restarts(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.manifest.config.max_restart_attempts = max_attempts;
        self.manifest.config.restart_base_delay_ms = base_delay_ms;
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.manifest.config.output_dir = dir.to_string();
        self
    }

    pub fn exclude_dir(mut self, pattern: &str) -> Self {
        self.manifest.config.exclude_dirs.push(pattern.to_string());
        self
    }

    /// The unvalidated manifest, for exercising validation errors.
    pub fn build_raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
pub struct TargetBuilder {
    target: TargetConfig,
}

impl TargetBuilder {
    pub fn new(source_root: &str, method: &str) -> Self {
        Self {
            target: TargetConfig {
                source_root: source_root.to_string(),
                build_method: BuildMethod::from(method),
                params: BTreeMap::new(),
            },
        }
    }

    /// A `command` target running `cmd`.
    pub fn command(source_root: &str, cmd: &str) -> Self {
        Self::new(source_root, "command").param("cmd", cmd)
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.target.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}

/// Shorthand for a `command` descriptor; the command itself never runs
/// under the fake dispatcher.
pub fn target(name: &str, source_root: &str) -> TargetDescriptor {
    TargetDescriptor::new(name, source_root, BuildMethod::Command).with_param("cmd", "true")
}
