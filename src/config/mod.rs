// src/config/mod.rs

//! Manifest loading and validation for buildwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate basic invariants like parameter presence (`validate.rs`).
//! - Resolve the typed engine settings (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigSection, Manifest, RawManifest, TargetConfig};
pub use settings::{default_max_parallel, EngineSettings};
