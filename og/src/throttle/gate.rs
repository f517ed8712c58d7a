//! Cooldown gate

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Outcome of asking the gate for permission to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The operation may run; the gate is now held
    Granted,

    /// Another run is still in progress
    InProgress,

    /// The previous run started too recently
    CoolingDown { remaining: Duration },
}

/// Gates an operation so it runs at most once per `min_interval` and never
/// overlaps itself.
///
/// `last_run_at` moves only when a run starts and never goes backwards.
/// `in_progress` is the only mutual exclusion; whoever is granted must call
/// [`CooldownGate::release`] on every exit path.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    min_interval: Duration,
    last_run_at: Option<Instant>,
    in_progress: bool,
}

impl CooldownGate {
    /// Create an open gate
    pub fn new(min_interval: Duration) -> Self {
        debug!(?min_interval, "CooldownGate::new: called");
        Self {
            min_interval,
            last_run_at: None,
            in_progress: false,
        }
    }

    /// Ask to run at `now`, returning why not when refused
    pub fn check(&mut self, now: Instant) -> Acquire {
        if self.in_progress {
            debug!("CooldownGate::check: in progress");
            return Acquire::InProgress;
        }

        let remaining = self.remaining(now);
        if !remaining.is_zero() {
            debug!(?remaining, "CooldownGate::check: cooling down");
            return Acquire::CoolingDown { remaining };
        }

        self.in_progress = true;
        self.last_run_at = Some(match self.last_run_at {
            Some(last) => last.max(now),
            None => now,
        });
        Acquire::Granted
    }

    /// Ask to run at `now`
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.check(now) == Acquire::Granted
    }

    /// Mark the current run as finished, successful or not
    pub fn release(&mut self, now: Instant) {
        if let Some(started) = self.last_run_at {
            debug!(held = ?now.saturating_duration_since(started), "CooldownGate::release");
        }
        self.in_progress = false;
    }

    /// Time left before the gate opens again, ignoring `in_progress`
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_run_at {
            Some(last) => self.min_interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn last_run_at(&self) -> Option<Instant> {
        self.last_run_at
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
