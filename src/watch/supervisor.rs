// src/watch/supervisor.rs

//! Restart supervisor for the watch process.
//!
//! Pure finite-state machine: it never sleeps and never touches the watcher.
//! The runtime feeds it lifecycle facts (started, crashed, backoff elapsed)
//! and executes the [`SupervisorDecision`]s it returns.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// Lifecycle of the watch process as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Stopped,
    Starting,
    Watching,
    Restarting,
    Failed,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchState::Stopped => "stopped",
            WatchState::Starting => "starting",
            WatchState::Watching => "watching",
            WatchState::Restarting => "restarting",
            WatchState::Failed => "failed",
        };
        f.pad(s)
    }
}

/// What the runtime should do after a supervisor transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorDecision {
    /// Start the watch process now.
    Start,
    /// Start the watch process again once `delay` has elapsed.
    RestartAfter { attempt: u32, delay: Duration },
    /// Attempt ceiling reached; no further automatic restarts.
    GiveUp { attempts: u32 },
    /// The event does not apply in the current state.
    Ignore,
}

/// Restart bookkeeping that survives across build batches.
#[derive(Debug, Clone)]
pub struct RestartSupervisor {
    state: WatchState,
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
}

/// `base × 2^(attempt − 1)`, saturating instead of overflowing.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent).unwrap_or(Duration::MAX)
}

impl RestartSupervisor {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            state: WatchState::Stopped,
            attempts: 0,
            max_attempts,
            base_delay,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Apply new limits. The current streak keeps its attempt count.
    pub fn reconfigure(&mut self, max_attempts: u32, base_delay: Duration) {
        self.max_attempts = max_attempts;
        self.base_delay = base_delay;
    }

    /// `Stopped → Starting` on an explicit start request.
    pub fn request_start(&mut self) -> SupervisorDecision {
        match self.state {
            WatchState::Stopped => {
                self.state = WatchState::Starting;
                SupervisorDecision::Start
            }
            other => {
                debug!(state = %other, "start requested while not stopped; ignoring");
                SupervisorDecision::Ignore
            }
        }
    }

    /// `Starting → Watching` on a confirmed start. Ends any failure streak.
    pub fn on_started(&mut self) -> bool {
        if self.state != WatchState::Starting {
            debug!(state = %self.state, "unexpected watcher start confirmation; ignoring");
            return false;
        }
        if self.attempts > 0 {
            info!(attempts = self.attempts, "watcher recovered; resetting restart attempts");
        }
        self.state = WatchState::Watching;
        self.attempts = 0;
        true
    }

    /// The watch process crashed (or failed to start).
    ///
    /// Moves through `Restarting` and either schedules a delayed restart or
    /// lands in the terminal `Failed` state.
    pub fn on_crash(&mut self) -> SupervisorDecision {
        match self.state {
            WatchState::Watching | WatchState::Starting => {}
            other => {
                debug!(state = %other, "crash reported in state without a live watcher; ignoring");
                return SupervisorDecision::Ignore;
            }
        }

        self.state = WatchState::Restarting;

        if self.attempts >= self.max_attempts {
            self.state = WatchState::Failed;
            error!(
                attempts = self.attempts,
                max_attempts = self.max_attempts,
                "watcher restart limit reached; giving up"
            );
            return SupervisorDecision::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        let delay = backoff_delay(self.base_delay, self.attempts);
        warn!(
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            ?delay,
            "watcher crashed; scheduling restart"
        );
        SupervisorDecision::RestartAfter {
            attempt: self.attempts,
            delay,
        }
    }

    /// `Restarting → Starting` once the backoff timer fires.
    pub fn on_backoff_elapsed(&mut self) -> SupervisorDecision {
        if self.state != WatchState::Restarting {
            debug!(state = %self.state, "stale backoff timer; ignoring");
            return SupervisorDecision::Ignore;
        }
        self.state = WatchState::Starting;
        SupervisorDecision::Start
    }

    /// Leave `Failed` (or any state) and go back to `Stopped` with a clean
    /// attempt counter.
    pub fn reset(&mut self) {
        info!(state = %self.state, "restart supervisor reset");
        self.state = WatchState::Stopped;
        self.attempts = 0;
    }

    /// Explicit shutdown; any pending backoff timer becomes stale.
    pub fn stop(&mut self) {
        if self.state != WatchState::Failed {
            self.state = WatchState::Stopped;
        }
    }
}
