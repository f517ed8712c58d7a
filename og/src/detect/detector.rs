//! Sliding-window loop detector

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::LoopDetectorConfig;

#[derive(Debug, Default)]
struct DetectorState {
    attempts_in_window: u32,
    last_attempt_at: Option<Instant>,
    loop_flag: bool,
    total_attempts: u64,
    loops_detected: u64,
}

/// Point-in-time view of a detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSnapshot {
    pub attempts_in_window: u32,
    pub loop_detected: bool,
    pub total_attempts: u64,
    pub loops_detected: u64,
}

/// Flags a loop when attempts come too densely.
///
/// The window restarts from zero whenever the gap since the previous attempt
/// exceeds `window_ms`, which approximates a sliding window in O(1) memory.
/// Once set, the loop flag stays set until [`LoopDetector::reset`].
///
/// Methods take `&self` so one detector can be shared (via `Arc`) between the
/// code recording attempts and the recovery that resets it.
#[derive(Debug)]
pub struct LoopDetector {
    config: LoopDetectorConfig,
    state: Mutex<DetectorState>,
}

impl LoopDetector {
    pub fn new(config: LoopDetectorConfig) -> Self {
        debug!(?config, "LoopDetector::new: called");
        Self {
            config,
            state: Mutex::new(DetectorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an attempt at `now`
    ///
    /// Returns true only on the call that newly sets the loop flag.
    pub fn record_attempt(&self, now: Instant) -> bool {
        let mut state = self.lock();

        let window_elapsed = state
            .last_attempt_at
            .map(|last| now.saturating_duration_since(last) > self.config.window())
            .unwrap_or(false);
        if window_elapsed {
            debug!("LoopDetector::record_attempt: window elapsed, restarting count");
            state.attempts_in_window = 0;
        }

        state.attempts_in_window = state.attempts_in_window.saturating_add(1);
        state.total_attempts = state.total_attempts.saturating_add(1);
        state.last_attempt_at = Some(match state.last_attempt_at {
            Some(last) => last.max(now),
            None => now,
        });

        let attempts = state.attempts_in_window;
        debug!(attempts, threshold = self.config.threshold, "LoopDetector::record_attempt");

        if attempts >= self.config.threshold.max(1) && !state.loop_flag {
            state.loop_flag = true;
            state.loops_detected = state.loops_detected.saturating_add(1);
            warn!(
                attempts,
                window_ms = self.config.window_ms,
                "Loop detected: too many attempts in window"
            );
            return true;
        }
        false
    }

    /// Check if a loop has been flagged
    pub fn is_loop_detected(&self) -> bool {
        self.lock().loop_flag
    }

    /// Clear the loop flag and the window count
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.loop_flag {
            info!("Loop detector reset");
        }
        state.loop_flag = false;
        state.attempts_in_window = 0;
        state.last_attempt_at = None;
    }

    pub fn attempts_in_window(&self) -> u32 {
        self.lock().attempts_in_window
    }

    pub fn config(&self) -> &LoopDetectorConfig {
        &self.config
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        let state = self.lock();
        LoopSnapshot {
            attempts_in_window: state.attempts_in_window,
            loop_detected: state.loop_flag,
            total_attempts: state.total_attempts,
            loops_detected: state.loops_detected,
        }
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(LoopDetectorConfig::default())
    }
}
