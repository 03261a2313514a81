// src/config/settings.rs

//! Typed engine settings resolved from the `[config]` section.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::ConfigSection;

/// Settings read by the engine components at construction time.
///
/// A change to these while running only takes effect once it is applied
/// explicitly (see `RuntimeEvent::ApplySettings`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub debounce_delay: Duration,
    pub max_parallel: usize,
    pub max_restart_attempts: u32,
    pub restart_base_delay: Duration,
    pub output_dir: PathBuf,
    pub exclude_dirs: Vec<String>,
    pub build_timeout: Option<Duration>,
}

/// `max(1, available CPUs / 2)`.
pub fn default_max_parallel() -> usize {
    (num_cpus::get() / 2).max(1)
}

impl EngineSettings {
    pub fn from_section(cfg: &ConfigSection) -> Self {
        let max_parallel = if cfg.parallel {
            cfg.max_parallel.unwrap_or_else(default_max_parallel).max(1)
        } else {
            1
        };

        Self {
            debounce_delay: Duration::from_millis(cfg.debounce_ms),
            max_parallel,
            max_restart_attempts: cfg.max_restart_attempts,
            restart_base_delay: Duration::from_millis(cfg.restart_base_delay_ms),
            output_dir: PathBuf::from(&cfg.output_dir),
            exclude_dirs: cfg.exclude_dirs.clone(),
            build_timeout: cfg.build_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_section(&ConfigSection::default())
    }
}
