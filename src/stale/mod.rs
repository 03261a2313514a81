// src/stale/mod.rs

//! Incremental target selection.
//!
//! - [`resolver`] maps a change batch onto affected targets and filters them
//!   by output freshness.
//! - [`scan`] walks a tree and reports its newest modification time.

pub mod resolver;
pub mod scan;

pub use resolver::{Staleness, StalenessResolver};
