// src/watch/mod.rs

//! File watching and change aggregation.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) behind the
//!   [`WatchSource`] trait.
//! - Collapsing bursts of notifications into one [`ChangeBatch`] per quiet
//!   period ([`aggregator`]).
//! - Supervising the watcher and restarting it with exponential backoff
//!   ([`supervisor`]).
//!
//! It does **not** know which targets a change affects; that is the job of
//! the staleness resolver.

pub mod aggregator;
pub mod path_utils;
pub mod patterns;
pub mod supervisor;
pub mod watcher;

pub use aggregator::{ChangeAggregator, ChangeBatch, Debouncer};
pub use patterns::ExcludeSet;
pub use supervisor::{backoff_delay, RestartSupervisor, SupervisorDecision, WatchState};
pub use watcher::{NotifyWatchSource, WatchSource};
