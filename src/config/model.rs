// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{BuildMethod, BuildParameters, TargetDescriptor};

/// Top-level manifest as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 300
/// max_parallel = 2
///
/// [target.api]
/// source_root = "functions/api"
/// build_method = "command"
///
/// [target.api.params]
/// cmd = "npm run build"
/// ```
///
/// All sections are optional at this stage; [`Manifest`] enforces that at
/// least one target exists.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    /// Orchestrator behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All targets from `[target.<name>]`, keyed by target name.
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// A validated manifest. Only constructed through `TryFrom<RawManifest>`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: ConfigSection,
    pub target: BTreeMap<String, TargetConfig>,
}

impl Manifest {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        target: BTreeMap<String, TargetConfig>,
    ) -> Self {
        Self { config, target }
    }

    /// Target descriptors in submission order (sorted by name).
    pub fn targets(&self) -> Vec<TargetDescriptor> {
        self.target
            .iter()
            .map(|(name, tc)| tc.to_descriptor(name))
            .collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Quiet period (milliseconds) before a burst of changes is emitted.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// When `false`, builds run one at a time regardless of `max_parallel`.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Concurrency cap; `None` means `max(1, cpus / 2)`.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// How many consecutive watcher restarts to attempt before giving up.
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,

    /// First backoff delay (milliseconds); doubles per consecutive attempt.
    #[serde(default = "default_restart_base_delay_ms")]
    pub restart_base_delay_ms: u64,

    /// Root of the per-target output directories, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory-name globs skipped when scanning sources and watching.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Optional wall-clock limit per build.
    #[serde(default)]
    pub build_timeout_secs: Option<u64>,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_parallel() -> bool {
    true
}

fn default_max_restart_attempts() -> u32 {
    5
}

fn default_restart_base_delay_ms() -> u64 {
    1000
}

fn default_output_dir() -> String {
    ".buildwatch".to_string()
}

pub fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        ".hg",
        ".svn",
        "target",
        "dist",
        "build",
        ".buildwatch",
        "__pycache__",
        ".venv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            parallel: default_parallel(),
            max_parallel: None,
            max_restart_attempts: default_max_restart_attempts(),
            restart_base_delay_ms: default_restart_base_delay_ms(),
            output_dir: default_output_dir(),
            exclude_dirs: default_exclude_dirs(),
            build_timeout_secs: None,
        }
    }
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Source tree of the target, relative to the manifest directory.
    pub source_root: String,

    /// `command`, `make`, `npm`, `cargo`, `copy`; anything else fails at
    /// build time.
    pub build_method: BuildMethod,

    /// Free-form parameters for the build method (`cmd`, `script`, ...).
    #[serde(default)]
    pub params: BuildParameters,
}

impl TargetConfig {
    pub fn to_descriptor(&self, name: &str) -> TargetDescriptor {
        TargetDescriptor {
            name: name.to_string(),
            source_root: crate::watch::path_utils::normalize(self.source_root.as_ref()),
            build_method: self.build_method.clone(),
            build_parameters: self.params.clone(),
        }
    }
}
