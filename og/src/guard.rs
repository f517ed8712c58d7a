//! One guarded operation stream
//!
//! An [`OperationGuard`] wires a [`DebounceScheduler`], a shared
//! [`LoopDetector`] and a [`RecoveryOrchestrator`] together. Each stream owns
//! its own set; nothing here is global.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detect::LoopDetector;
use crate::error::{OperationError, OperationResult};
use crate::nav::{Destination, NavigateOptions};
use crate::notify::{LOOP_ALERT_ID, NotificationStatus};
use crate::recovery::{RecoveryOrchestrator, RecoveryPlan, RecoveryServices, RunOutcome};
use crate::throttle::{DebounceScheduler, Trigger};

const LOOP_ALERT_MESSAGE: &str = "Navigation loop detected. Run recovery to return to a stable view.";

pub struct OperationGuard {
    scheduler: DebounceScheduler,
    detector: Arc<LoopDetector>,
    recovery: Arc<RecoveryOrchestrator>,
    services: RecoveryServices,
    auto_recover: bool,
}

impl OperationGuard {
    pub fn new(
        scheduler: DebounceScheduler,
        detector: Arc<LoopDetector>,
        recovery: Arc<RecoveryOrchestrator>,
        services: RecoveryServices,
    ) -> Self {
        debug!(name = %scheduler.name(), "OperationGuard::new: called");
        Self {
            scheduler,
            detector,
            recovery,
            services,
            auto_recover: false,
        }
    }

    /// Start recovery in the background as soon as a loop is flagged
    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    /// Build a guard from configuration
    ///
    /// `role` selects the cooldown interval; `target` is where recovery sends
    /// the user back to until [`OperationGuard::navigate`] records another.
    pub fn from_config(
        name: impl Into<String>,
        config: &Config,
        role: Option<&str>,
        services: RecoveryServices,
        target: Destination,
    ) -> Self {
        let scheduler = DebounceScheduler::new(name, config.cooldown.interval_for(role));
        let detector = Arc::new(LoopDetector::new(config.loop_detection.clone()));
        let recovery = Arc::new(RecoveryOrchestrator::new(
            RecoveryPlan::navigation_loop(&config.recovery),
            services.clone(),
            Arc::clone(&detector),
            target,
        ));
        Self::new(scheduler, detector, recovery, services).with_auto_recover(config.recovery.auto_recover)
    }

    /// Record an attempt, then hand `op` to the scheduler
    ///
    /// A flagged loop does not block the operation; recovery is the way out.
    /// While recovery runs, attempts are counted but dropped.
    pub async fn attempt<T, F, Fut>(&self, op: F) -> Trigger<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = OperationResult<T>> + Send + 'static,
    {
        if self.detector.record_attempt(Instant::now()) {
            self.on_loop_detected();
        }
        if self.recovery.is_running() {
            debug!(name = %self.scheduler.name(), "OperationGuard::attempt: recovery running, dropped");
            return Trigger::Dropped;
        }
        self.scheduler.trigger(op).await
    }

    fn on_loop_detected(&self) {
        warn!(name = %self.scheduler.name(), "Loop detected on guarded operation");
        self.services
            .notifier
            .show(LOOP_ALERT_ID, NotificationStatus::Alert, LOOP_ALERT_MESSAGE);

        if self.auto_recover {
            self.cancel_pending_for_recovery();
            if self.recovery.spawn_run() {
                info!("Automatic recovery started");
            } else {
                debug!("OperationGuard::on_loop_detected: recovery already running");
            }
        }
    }

    /// Navigate to `destination` through the guard
    ///
    /// The destination becomes the recovery target.
    pub async fn navigate(&self, destination: Destination) -> Trigger<()> {
        self.recovery.set_target(destination.clone());
        let navigator = Arc::clone(&self.services.navigator);
        self.attempt(move || async move {
            navigator
                .go_to(&destination, NavigateOptions::push())
                .await
                .map_err(|e| OperationError::rejected(e.to_string()))
        })
        .await
    }

    /// Run recovery now
    pub async fn recover(&self) -> RunOutcome {
        info!(name = %self.scheduler.name(), "Manual recovery requested");
        self.cancel_pending_for_recovery();
        self.recovery.run().await
    }

    // No trailing run may fire over a recovery navigation
    fn cancel_pending_for_recovery(&self) {
        if self.scheduler.cancel_pending() {
            debug!(name = %self.scheduler.name(), "OperationGuard: pending run cancelled for recovery");
        }
    }

    /// Cancel pending trailing runs and any background recovery
    pub fn cleanup(&self) {
        debug!(name = %self.scheduler.name(), "OperationGuard::cleanup: called");
        self.scheduler.cleanup();
        self.recovery.cleanup();
    }

    pub fn is_loop_detected(&self) -> bool {
        self.detector.is_loop_detected()
    }

    pub fn scheduler(&self) -> &DebounceScheduler {
        &self.scheduler
    }

    pub fn detector(&self) -> &Arc<LoopDetector> {
        &self.detector
    }

    pub fn recovery(&self) -> &Arc<RecoveryOrchestrator> {
        &self.recovery
    }
}
