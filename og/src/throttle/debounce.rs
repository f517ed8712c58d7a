//! Trailing-edge debounce scheduler

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::gate::{Acquire, CooldownGate};
use crate::error::OperationResult;

/// What happened to a triggered operation
#[derive(Debug)]
pub enum Trigger<T> {
    /// The gate was open; the operation ran right away
    Ran(OperationResult<T>),

    /// Too soon: one trailing run is scheduled after `delay`.
    ///
    /// `result` resolves with the operation's result, or closes without a
    /// value if a later trigger supersedes this one or the scheduler is
    /// cleaned up first.
    Deferred {
        delay: Duration,
        result: oneshot::Receiver<OperationResult<T>>,
    },

    /// An operation or a recovery run is in flight; the request was dropped
    Dropped,

    /// The scheduler has been cleaned up
    Disposed,
}

impl<T> Trigger<T> {
    /// Check if the operation ran during the trigger call
    pub fn ran(&self) -> bool {
        matches!(self, Trigger::Ran(_))
    }

    /// Check if a trailing run was scheduled
    pub fn deferred(&self) -> bool {
        matches!(self, Trigger::Deferred { .. })
    }
}

/// Counters for one scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DebounceStats {
    /// Triggers that ran immediately
    pub immediate: u64,
    /// Triggers that scheduled a trailing run
    pub deferred: u64,
    /// Pending runs cancelled before firing (newer trigger, cancel or cleanup)
    pub superseded: u64,
    /// Triggers dropped because a run was in flight
    pub dropped: u64,
    /// Runs that finished with Ok
    pub completed: u64,
    /// Runs that finished with Err
    pub failed: u64,
}

struct PendingRun {
    generation: u64,
    handle: JoinHandle<()>,
}

/// State shared with the timer tasks
struct DebounceInner {
    gate: CooldownGate,
    pending: Option<PendingRun>,
    generation: u64,
    disposed: bool,
    stats: DebounceStats,
}

impl DebounceInner {
    fn cancel_pending(&mut self, name: &str) {
        if let Some(pending) = self.pending.take() {
            debug!(%name, generation = pending.generation, "DebounceScheduler: cancelling pending run");
            pending.handle.abort();
            self.stats.superseded += 1;
        }
    }
}

fn lock(inner: &Mutex<DebounceInner>) -> MutexGuard<'_, DebounceInner> {
    // Critical sections never panic midway; recover the data if one did
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the gate for one run and releases it when dropped
///
/// Dropping covers every exit path: completion, error, panic, or the caller
/// abandoning the future.
struct GatePermit {
    inner: Arc<Mutex<DebounceInner>>,
}

impl GatePermit {
    fn record<T>(&self, result: &OperationResult<T>) {
        let mut inner = lock(&self.inner);
        match result {
            Ok(_) => inner.stats.completed += 1,
            Err(_) => inner.stats.failed += 1,
        }
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        lock(&self.inner).gate.release(Instant::now());
    }
}

/// Coalesces rapid triggers of one operation stream into at most one live
/// trailing execution.
///
/// Only the most recent trigger survives while a run is deferred; earlier ones
/// are superseded, never executed in order. Dropping the scheduler cancels any
/// pending timer.
pub struct DebounceScheduler {
    name: String,
    inner: Arc<Mutex<DebounceInner>>,
}

impl DebounceScheduler {
    /// Create a scheduler owning a fresh gate
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        let name = name.into();
        debug!(%name, ?min_interval, "DebounceScheduler::new: called");
        Self {
            name,
            inner: Arc::new(Mutex::new(DebounceInner {
                gate: CooldownGate::new(min_interval),
                pending: None,
                generation: 0,
                disposed: false,
                stats: DebounceStats::default(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request a run of `op`
    ///
    /// Runs it now if the gate is open, schedules one trailing run if the
    /// interval has not elapsed, and drops the request if a run is in flight.
    /// The gate is released whether `op` succeeds or fails; its error is
    /// returned to the caller untouched.
    pub async fn trigger<T, F, Fut>(&self, op: F) -> Trigger<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OperationResult<T>> + Send + 'static,
    {
        let now = Instant::now();
        {
            let mut inner = lock(&self.inner);
            if inner.disposed {
                debug!(name = %self.name, "DebounceScheduler::trigger: disposed");
                return Trigger::Disposed;
            }

            match inner.gate.check(now) {
                Acquire::Granted => {
                    debug!(name = %self.name, "DebounceScheduler::trigger: running immediately");
                    inner.cancel_pending(&self.name);
                    inner.stats.immediate += 1;
                }
                Acquire::InProgress => {
                    debug!(name = %self.name, "DebounceScheduler::trigger: in progress, dropping");
                    inner.stats.dropped += 1;
                    return Trigger::Dropped;
                }
                Acquire::CoolingDown { remaining } => {
                    inner.cancel_pending(&self.name);
                    inner.generation += 1;
                    let generation = inner.generation;

                    let (tx, rx) = oneshot::channel();
                    let shared = Arc::clone(&self.inner);
                    let name = self.name.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(remaining).await;
                        run_deferred(shared, name, generation, op, tx).await;
                    });

                    inner.pending = Some(PendingRun { generation, handle });
                    inner.stats.deferred += 1;
                    debug!(name = %self.name, generation, delay = ?remaining, "DebounceScheduler::trigger: deferred");
                    return Trigger::Deferred {
                        delay: remaining,
                        result: rx,
                    };
                }
            }
        }

        let permit = GatePermit {
            inner: Arc::clone(&self.inner),
        };
        let result = op().await;
        permit.record(&result);
        if let Err(e) = &result {
            warn!(name = %self.name, error = %e, "Guarded operation failed");
        }
        Trigger::Ran(result)
    }

    /// Cancel the pending trailing run, if any, and keep accepting triggers
    ///
    /// Returns true if a run was cancelled.
    pub fn cancel_pending(&self) -> bool {
        let mut inner = lock(&self.inner);
        let had_pending = inner.pending.is_some();
        inner.cancel_pending(&self.name);
        had_pending
    }

    /// Cancel any pending trailing run and refuse further triggers
    ///
    /// A run already in flight is left to finish and still releases the gate.
    pub fn cleanup(&self) {
        let mut inner = lock(&self.inner);
        if inner.disposed {
            return;
        }
        inner.cancel_pending(&self.name);
        inner.disposed = true;
        info!(name = %self.name, "DebounceScheduler cleaned up");
    }

    /// Check if a trailing run is scheduled
    pub fn has_pending(&self) -> bool {
        lock(&self.inner).pending.is_some()
    }

    /// Check if a run is in flight
    pub fn is_in_progress(&self) -> bool {
        lock(&self.inner).gate.is_in_progress()
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.inner).disposed
    }

    /// Time until the gate opens again
    pub fn remaining(&self) -> Duration {
        lock(&self.inner).gate.remaining(Instant::now())
    }

    pub fn stats(&self) -> DebounceStats {
        lock(&self.inner).stats.clone()
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Body of a trailing run once its timer has fired
async fn run_deferred<T, F, Fut>(
    shared: Arc<Mutex<DebounceInner>>,
    name: String,
    generation: u64,
    op: F,
    tx: oneshot::Sender<OperationResult<T>>,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = OperationResult<T>>,
{
    {
        let mut inner = lock(&shared);
        // The handle may have been replaced after the timer fired but before we got the lock
        if inner.pending.as_ref().map(|p| p.generation) != Some(generation) {
            debug!(%name, generation, "run_deferred: superseded");
            return;
        }
        inner.pending = None;

        match inner.gate.check(Instant::now()) {
            Acquire::Granted => {}
            other => {
                debug!(%name, generation, ?other, "run_deferred: gate refused at fire time");
                inner.stats.dropped += 1;
                return;
            }
        }
    }

    debug!(%name, generation, "run_deferred: running trailing execution");
    let permit = GatePermit { inner: shared };
    let result = op().await;
    permit.record(&result);
    drop(permit);

    if let Err(e) = &result {
        warn!(%name, error = %e, "Deferred operation failed");
    }
    // Nobody listening is fine
    let _ = tx.send(result);
}
