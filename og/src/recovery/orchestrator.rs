//! Recovery orchestrator

use std::sync::{Arc, Mutex, MutexGuard};

use markerstore::MarkerStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::{RecoveryState, RunOutcome};
use super::steps::{RecoveryContext, RecoveryPlan};
use crate::detect::LoopDetector;
use crate::error::RecoveryError;
use crate::nav::{Destination, Navigator};
use crate::notify::{LOOP_ALERT_ID, NotificationStatus, Notifier, RECOVERY_ID};

/// Collaborators a recovery run acts through
#[derive(Clone)]
pub struct RecoveryServices {
    pub navigator: Arc<dyn Navigator>,
    pub store: Arc<dyn MarkerStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Moves an active state to `Failed` if a run ends without finishing
///
/// Covers a panicking step and a run future dropped mid-way (e.g. the
/// background task being aborted).
struct ActiveRun<'a> {
    state: &'a watch::Sender<RecoveryState>,
    finished: bool,
}

impl ActiveRun<'_> {
    fn finish(&mut self, state: RecoveryState) {
        self.state.send_replace(state);
        self.finished = true;
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if !self.finished {
            abandon(self.state);
        }
    }
}

/// Slot claimed by `spawn_run`, owned by the background task
///
/// Dropped with the task, so an abort that lands before the task is first
/// polled still releases the slot.
struct BackgroundRun(Arc<RecoveryOrchestrator>);

impl Drop for BackgroundRun {
    fn drop(&mut self) {
        abandon(&self.0.state);
    }
}

/// Move an active state to `Failed` (cancelled); no-op otherwise
fn abandon(state: &watch::Sender<RecoveryState>) {
    state.send_if_modified(|state| {
        let step = match state {
            RecoveryState::StepRunning { step } | RecoveryState::Waiting { step } => *step,
            _ => return false,
        };
        warn!(step, "Recovery run abandoned");
        *state = RecoveryState::Failed {
            step,
            error: RecoveryError::Cancelled.to_string(),
        };
        true
    });
}

/// Drives a fixed sequence of corrective steps with explicit waits
///
/// Only one run is active at a time; `run` while a run is underway returns
/// [`RunOutcome::AlreadyRunning`] without doing anything. A failed step ends
/// the run in `Failed` and is never retried automatically.
pub struct RecoveryOrchestrator {
    plan: RecoveryPlan,
    services: RecoveryServices,
    detector: Arc<LoopDetector>,
    target: Mutex<Destination>,
    state: watch::Sender<RecoveryState>,
    background: Mutex<Option<JoinHandle<RunOutcome>>>,
}

impl RecoveryOrchestrator {
    pub fn new(
        plan: RecoveryPlan,
        services: RecoveryServices,
        detector: Arc<LoopDetector>,
        target: Destination,
    ) -> Self {
        debug!(steps = plan.len(), %target, "RecoveryOrchestrator::new: called");
        let (state, _) = watch::channel(RecoveryState::Idle);
        Self {
            plan,
            services,
            detector,
            target: Mutex::new(target),
            state,
            background: Mutex::new(None),
        }
    }

    fn target_lock(&self) -> MutexGuard<'_, Destination> {
        self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn background_lock(&self) -> MutexGuard<'_, Option<JoinHandle<RunOutcome>>> {
        self.background.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Destination retried by the next run
    pub fn target(&self) -> Destination {
        self.target_lock().clone()
    }

    /// Change the destination retried by the next run
    pub fn set_target(&self, target: Destination) {
        debug!(%target, "RecoveryOrchestrator::set_target");
        *self.target_lock() = target;
    }

    /// Current state
    pub fn state(&self) -> RecoveryState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<RecoveryState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().is_active()
    }

    pub fn plan(&self) -> &RecoveryPlan {
        &self.plan
    }

    /// Check if the observed detector currently flags a loop
    pub fn loop_detected(&self) -> bool {
        self.detector.is_loop_detected()
    }

    /// Claim the single run slot; false if a run is already active
    fn begin(&self) -> bool {
        let first = if self.plan.is_empty() {
            RecoveryState::Complete
        } else {
            RecoveryState::StepRunning { step: 0 }
        };
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if state.is_active() {
                return false;
            }
            *state = first;
            claimed = true;
            true
        });
        claimed
    }

    /// Run the full step sequence
    pub async fn run(&self) -> RunOutcome {
        if !self.begin() {
            debug!("RecoveryOrchestrator::run: already running, ignoring");
            return RunOutcome::AlreadyRunning;
        }
        self.run_claimed().await
    }

    /// Body of a run whose slot `begin` has already claimed
    async fn run_claimed(&self) -> RunOutcome {
        let mut active = ActiveRun {
            state: &self.state,
            finished: false,
        };
        let notifier = &self.services.notifier;
        let total = self.plan.len();
        let ctx = RecoveryContext {
            navigator: Arc::clone(&self.services.navigator),
            store: Arc::clone(&self.services.store),
            target: self.target(),
        };

        info!(steps = total, target = %ctx.target, "Recovery started");
        notifier.show(RECOVERY_ID, NotificationStatus::Pending, "Starting recovery...");

        for (step, recovery_step) in self.plan.steps.iter().enumerate() {
            self.state.send_replace(RecoveryState::StepRunning { step });
            let name = recovery_step.name();
            debug!(step, %name, "RecoveryOrchestrator::run: step started");
            notifier.update(
                RECOVERY_ID,
                NotificationStatus::Loading,
                &format!("Step {}/{}: {}", step + 1, total, name),
            );

            if let Err(e) = recovery_step.action.execute(&ctx).await {
                let message = e.to_string();
                error!(step, %name, error = %message, "Recovery step failed");
                active.finish(RecoveryState::Failed {
                    step,
                    error: message.clone(),
                });
                notifier.update(
                    RECOVERY_ID,
                    NotificationStatus::Error,
                    &format!("Recovery failed at '{}': {}", name, message),
                );
                return RunOutcome::Failed { step, error: message };
            }

            self.state.send_replace(RecoveryState::Waiting { step });
            tokio::time::sleep(recovery_step.post_delay).await;
        }

        self.complete(&mut active);
        RunOutcome::Completed
    }

    fn complete(&self, active: &mut ActiveRun<'_>) {
        let was_looping = self.detector.is_loop_detected();
        self.detector.reset();

        if let Some(key) = &self.plan.completion_marker {
            if let Err(e) = self.services.store.clear(key) {
                warn!(%key, error = %e, "Failed to clear recovery marker");
            }
        }

        active.finish(RecoveryState::Complete);
        info!("Recovery complete");

        let notifier = &self.services.notifier;
        notifier.update(RECOVERY_ID, NotificationStatus::Success, "Recovery complete");
        if was_looping {
            notifier.update(LOOP_ALERT_ID, NotificationStatus::Success, "Navigation loop resolved");
        }
    }

    /// Start a run in the background
    ///
    /// The slot is claimed before returning, so a second call (or a `run`)
    /// made right after sees the run as active. Returns false without
    /// spawning if a run is already active.
    pub fn spawn_run(self: &Arc<Self>) -> bool {
        if !self.begin() {
            debug!("RecoveryOrchestrator::spawn_run: already running");
            return false;
        }
        let claim = BackgroundRun(Arc::clone(self));
        let handle = tokio::spawn(async move { claim.0.run_claimed().await });
        // Any previous handle belongs to a finished run
        *self.background_lock() = Some(handle);
        true
    }

    /// Wait for the background run started by `spawn_run`, if any
    pub async fn join_background(&self) -> Option<RunOutcome> {
        let handle = self.background_lock().take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Background recovery did not finish");
                None
            }
        }
    }

    /// Abort any background run
    pub fn cleanup(&self) {
        if let Some(handle) = self.background_lock().take() {
            debug!("RecoveryOrchestrator::cleanup: aborting background run");
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::LoopDetectorConfig;
    use crate::nav::HistoryNavigator;
    use crate::notify::NotificationBoard;
    use crate::recovery::{RecoveryAction, RecoveryConfig, RecoveryStep};
    use async_trait::async_trait;
    use markerstore::MemoryMarkerStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        navigator: Arc<HistoryNavigator>,
        store: Arc<MemoryMarkerStore>,
        board: Arc<NotificationBoard>,
        detector: Arc<LoopDetector>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                navigator: Arc::new(HistoryNavigator::starting_at(Destination::new("/messages"))),
                store: Arc::new(MemoryMarkerStore::new()),
                board: Arc::new(NotificationBoard::new()),
                detector: Arc::new(LoopDetector::new(LoopDetectorConfig::default())),
            }
        }

        fn services(&self) -> RecoveryServices {
            RecoveryServices {
                navigator: self.navigator.clone(),
                store: self.store.clone(),
                notifier: self.board.clone(),
            }
        }

        fn orchestrator(&self, plan: RecoveryPlan) -> Arc<RecoveryOrchestrator> {
            Arc::new(RecoveryOrchestrator::new(
                plan,
                self.services(),
                self.detector.clone(),
                Destination::new("/messages"),
            ))
        }

        fn flag_loop(&self) {
            let t0 = Instant::now();
            for ms in [0, 400, 800] {
                self.detector.record_attempt(t0 + Duration::from_millis(ms));
            }
            assert!(self.detector.is_loop_detected());
        }
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RecoveryAction for Counting {
        fn describe(&self) -> String {
            "count".to_string()
        }

        async fn execute(&self, _ctx: &RecoveryContext) -> Result<(), RecoveryError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl RecoveryAction for Failing {
        fn describe(&self) -> String {
            "fail".to_string()
        }

        async fn execute(&self, _ctx: &RecoveryContext) -> Result<(), RecoveryError> {
            Err(RecoveryError::Step {
                step: "fail".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_canonical_run_completes_and_resets_detector() {
        let fx = Fixture::new();
        fx.flag_loop();
        fx.store.set("nav.loop.detected", "1").unwrap();
        let config = RecoveryConfig::default();
        let orchestrator = fx.orchestrator(RecoveryPlan::navigation_loop(&config));

        let started = Instant::now();
        assert_eq!(orchestrator.run().await, RunOutcome::Completed);

        assert!(started.elapsed() >= Duration::from_millis(1_800));
        assert_eq!(orchestrator.state(), RecoveryState::Complete);
        assert!(!fx.detector.is_loop_detected());
        assert!(fx.store.keys().unwrap().is_empty());

        let visits = fx.navigator.visits();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].destination.path, "/");
        assert!(visits[0].options.replace_history);
        assert_eq!(visits[1].destination.path, "/messages");

        let statuses = fx.board.statuses(RECOVERY_ID);
        assert_eq!(statuses.first(), Some(&NotificationStatus::Pending));
        assert_eq!(statuses.last(), Some(&NotificationStatus::Success));
        // Pending, one Loading per step, Success
        assert_eq!(statuses.len(), 6);
        assert_eq!(
            fx.board.get(LOOP_ALERT_ID).map(|n| n.status),
            Some(NotificationStatus::Success)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_walks_steps_in_order() {
        let fx = Fixture::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let plan = RecoveryPlan::new(vec![
            RecoveryStep::new(Counting { runs: runs.clone() }, Duration::from_millis(100)),
            RecoveryStep::new(Counting { runs: runs.clone() }, Duration::from_millis(200)),
        ]);
        let orchestrator = fx.orchestrator(plan);
        let mut rx = orchestrator.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let done = !state.is_active();
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        assert_eq!(orchestrator.run().await, RunOutcome::Completed);
        let seen = observer.await.unwrap();
        assert_eq!(seen.last(), Some(&RecoveryState::Complete));
        assert!(seen.contains(&RecoveryState::Waiting { step: 0 }));
        assert!(seen.contains(&RecoveryState::Waiting { step: 1 }));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_while_active_is_ignored() {
        let fx = Fixture::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let plan = RecoveryPlan::new(vec![RecoveryStep::new(
            Counting { runs: runs.clone() },
            Duration::from_millis(500),
        )]);
        let orchestrator = fx.orchestrator(plan);

        let (first, second) = tokio::join!(orchestrator.run(), orchestrator.run());
        assert_eq!(first, RunOutcome::Completed);
        assert_eq!(second, RunOutcome::AlreadyRunning);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Complete accepts a new run
        assert_eq!(orchestrator.run().await, RunOutcome::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_stops_sequence() {
        let fx = Fixture::new();
        fx.flag_loop();
        let runs = Arc::new(AtomicUsize::new(0));
        let plan = RecoveryPlan::new(vec![
            RecoveryStep::immediate(Counting { runs: runs.clone() }),
            RecoveryStep::immediate(Failing),
            RecoveryStep::immediate(Counting { runs: runs.clone() }),
        ]);
        let orchestrator = fx.orchestrator(plan);

        match orchestrator.run().await {
            RunOutcome::Failed { step, error } => {
                assert_eq!(step, 1);
                assert!(error.contains("boom"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(orchestrator.state(), RecoveryState::Failed { step: 1, .. }));
        // Loop stays flagged; the operator must re-trigger
        assert!(fx.detector.is_loop_detected());
        assert_eq!(
            fx.board.get(RECOVERY_ID).map(|n| n.status),
            Some(NotificationStatus::Error)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_fails_run() {
        let fx = Fixture::new();
        fx.navigator.fail_on_path("/");
        let orchestrator = fx.orchestrator(RecoveryPlan::navigation_loop(&RecoveryConfig::default()));

        assert!(matches!(orchestrator.run().await, RunOutcome::Failed { step: 2, .. }));
        // Marker stays set so a reload can see recovery was interrupted
        assert!(fx.store.get("nav.recovery.in-progress").unwrap().is_some());

        fx.navigator.clear_failure();
        assert_eq!(orchestrator.run().await, RunOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_run_and_cleanup_marks_cancelled() {
        let fx = Fixture::new();
        let plan = RecoveryPlan::new(vec![RecoveryStep::new(
            Counting {
                runs: Arc::new(AtomicUsize::new(0)),
            },
            Duration::from_secs(10),
        )]);
        let orchestrator = fx.orchestrator(plan);

        assert!(orchestrator.spawn_run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orchestrator.state(), RecoveryState::Waiting { step: 0 });
        assert!(!orchestrator.spawn_run());

        orchestrator.cleanup();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            orchestrator.state(),
            RecoveryState::Failed {
                step: 0,
                error: RecoveryError::Cancelled.to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_run_claims_slot_before_returning() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(RecoveryPlan::navigation_loop(&RecoveryConfig::default()));

        assert!(orchestrator.spawn_run());
        assert!(orchestrator.is_running());
        assert!(!orchestrator.spawn_run());
        assert_eq!(orchestrator.run().await, RunOutcome::AlreadyRunning);

        assert_eq!(orchestrator.join_background().await, Some(RunOutcome::Completed));
        assert_eq!(fx.navigator.visits().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_before_first_poll_releases_slot() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(RecoveryPlan::navigation_loop(&RecoveryConfig::default()));

        assert!(orchestrator.spawn_run());
        assert!(!orchestrator.spawn_run());
        orchestrator.cleanup();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            orchestrator.state(),
            RecoveryState::Failed {
                step: 0,
                error: RecoveryError::Cancelled.to_string()
            }
        );
        // Nothing kept running after cleanup
        assert!(fx.navigator.visits().is_empty());
        assert!(fx.store.keys().unwrap().is_empty());

        // Failed accepts a new run
        assert_eq!(orchestrator.run().await, RunOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_background() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator(RecoveryPlan::navigation_loop(&RecoveryConfig::default()));

        assert!(orchestrator.spawn_run());
        assert_eq!(orchestrator.join_background().await, Some(RunOutcome::Completed));
        assert_eq!(orchestrator.join_background().await, None);
    }

    #[tokio::test]
    async fn test_empty_plan_completes_immediately() {
        let fx = Fixture::new();
        fx.flag_loop();
        let orchestrator = fx.orchestrator(RecoveryPlan::default());

        assert_eq!(orchestrator.run().await, RunOutcome::Completed);
        assert!(!fx.detector.is_loop_detected());
    }
}
