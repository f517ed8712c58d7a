//! Scripted scenarios run by `og simulate`
//!
//! Each scenario drives an [`OperationGuard`] against in-process
//! collaborators (history navigator, marker store, notification board) on
//! the real clock and returns a [`SimulationReport`].

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use colored::*;
use eyre::{Context, Result};
use futures::future::join_all;
use markerstore::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cli::Scenario;
use crate::config::Config;
use crate::detect::LoopSnapshot;
use crate::error::OperationError;
use crate::guard::OperationGuard;
use crate::nav::{Destination, HistoryNavigator};
use crate::notify::{FanoutNotifier, Notification, NotificationBoard, Notifier, TracingNotifier};
use crate::recovery::{RecoveryServices, RecoveryState, RunOutcome};
use crate::throttle::{DebounceStats, Trigger};

/// Tabs toggled in the navigation-loop scenario
const TABS: [&str; 2] = ["/messages", "/settings"];

/// Triggers fired in the refresh-burst scenario
const BURST_SIZE: usize = 5;

/// Knobs for one simulation run
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub scenario: Scenario,
    pub role: Option<String>,
    /// Marker store directory; `store.dir` from config when unset
    pub store_dir: Option<PathBuf>,
    /// Keep markers in memory instead of on disk
    pub memory_store: bool,
    pub interval_ms: Option<u64>,
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One line of the scenario timeline
#[derive(Debug, Clone, Serialize)]
pub struct SimulationEvent {
    pub at_ms: u64,
    pub message: String,
}

/// What a scenario observed
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub interval_ms: u64,
    pub events: Vec<SimulationEvent>,
    pub runs: usize,
    pub stats: DebounceStats,
    pub detector: LoopSnapshot,
    pub recovery: RecoveryState,
    pub location: Option<String>,
    pub markers: Vec<String>,
    pub notifications: Vec<Notification>,
}

impl SimulationReport {
    /// Render the report for a terminal
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} (interval {}ms)\n",
            "Scenario:".bold(),
            self.scenario.cyan(),
            self.interval_ms
        ));
        for event in &self.events {
            out.push_str(&format!("  {:>6}ms  {}\n", event.at_ms.to_string().dimmed(), event.message));
        }

        out.push_str(&format!("{}\n", "Notifications:".bold()));
        if self.notifications.is_empty() {
            out.push_str("  (none)\n");
        }
        for n in &self.notifications {
            out.push_str(&format!("  [{}] {} {}\n", n.id.yellow(), n.status, n.message));
        }

        out.push_str(&format!("{}\n", "Summary:".bold()));
        out.push_str(&format!("  operation runs: {}\n", self.runs));
        out.push_str(&format!(
            "  immediate={} deferred={} superseded={} dropped={} completed={} failed={}\n",
            self.stats.immediate,
            self.stats.deferred,
            self.stats.superseded,
            self.stats.dropped,
            self.stats.completed,
            self.stats.failed
        ));
        let loop_flag = if self.detector.loop_detected {
            "yes".red()
        } else {
            "no".green()
        };
        out.push_str(&format!(
            "  loop detected: {} (loops flagged: {})\n",
            loop_flag, self.detector.loops_detected
        ));
        out.push_str(&format!("  recovery: {}\n", self.recovery));
        if let Some(location) = &self.location {
            out.push_str(&format!("  location: {}\n", location));
        }
        let markers = if self.markers.is_empty() {
            "(none)".to_string()
        } else {
            self.markers.join(", ")
        };
        out.push_str(&format!("  markers: {}\n", markers));
        out
    }
}

/// Collaborators and timeline shared by every scenario
struct World {
    guard: OperationGuard,
    navigator: Arc<HistoryNavigator>,
    store: Arc<dyn MarkerStore>,
    board: Arc<NotificationBoard>,
    started: Instant,
    events: Vec<SimulationEvent>,
    runs: Arc<AtomicUsize>,
    interval: Duration,
}

impl World {
    fn build(config: &Config, options: &SimulationOptions) -> Result<Self> {
        let store: Arc<dyn MarkerStore> = if options.memory_store {
            Arc::new(MemoryMarkerStore::new())
        } else {
            let dir = options.store_dir.as_ref().unwrap_or(&config.store.dir);
            debug!(dir = %dir.display(), "World::build: opening marker store");
            Arc::new(FileMarkerStore::open(dir).context(format!("Failed to open marker store at {}", dir.display()))?)
        };
        let navigator = Arc::new(HistoryNavigator::starting_at(Destination::new("/")));
        let board = Arc::new(NotificationBoard::new());
        let sinks: Vec<Arc<dyn Notifier>> = vec![board.clone(), Arc::new(TracingNotifier)];
        let services = RecoveryServices {
            navigator: navigator.clone(),
            store: Arc::clone(&store),
            notifier: Arc::new(FanoutNotifier::new(sinks)),
        };

        let mut config = config.clone();
        if let Some(ms) = options.interval_ms {
            config.cooldown.interval_ms = ms;
            if let Some(role) = &options.role {
                config.cooldown.role_intervals.insert(role.clone(), ms);
            }
        }
        let role = options.role.as_deref();
        let interval = config.cooldown.interval_for(role);
        let guard = OperationGuard::from_config(
            options.scenario.to_string(),
            &config,
            role,
            services,
            Destination::new("/"),
        );

        Ok(Self {
            guard,
            navigator,
            store,
            board,
            started: Instant::now(),
            events: Vec::new(),
            runs: Arc::new(AtomicUsize::new(0)),
            interval,
        })
    }

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "simulate: event");
        self.events.push(SimulationEvent {
            at_ms: millis_u64(self.started.elapsed()),
            message,
        });
    }

    fn describe<T>(trigger: &Trigger<T>) -> String {
        match trigger {
            Trigger::Ran(Ok(_)) => "ran immediately".to_string(),
            Trigger::Ran(Err(e)) => format!("ran immediately and failed: {}", e),
            Trigger::Deferred { delay, .. } => format!("deferred by {}ms", delay.as_millis()),
            Trigger::Dropped => "dropped (in progress)".to_string(),
            Trigger::Disposed => "refused (disposed)".to_string(),
        }
    }

    fn report(self, scenario: Scenario) -> Result<SimulationReport> {
        self.guard.cleanup();
        Ok(SimulationReport {
            scenario: scenario.to_string(),
            interval_ms: millis_u64(self.interval),
            events: self.events,
            runs: self.runs.load(Ordering::SeqCst),
            stats: self.guard.scheduler().stats(),
            detector: self.guard.detector().snapshot(),
            recovery: self.guard.recovery().state(),
            location: self.navigator.current().map(|d| d.to_string()),
            markers: self.store.keys().context("Failed to list markers")?,
            notifications: self.board.history(),
        })
    }
}

/// Run one scenario to completion
pub async fn run(config: &Config, options: &SimulationOptions) -> Result<SimulationReport> {
    info!(scenario = %options.scenario, role = ?options.role, "Simulation started");
    let world = World::build(config, options)?;
    let report = match options.scenario {
        Scenario::NavigationLoop => navigation_loop(world, config).await?,
        Scenario::RefreshBurst => refresh_burst(world).await?,
        Scenario::FailingOp => failing_op(world).await?,
    };
    info!(scenario = %options.scenario, "Simulation finished");
    Ok(report)
}

/// Toggle between two tabs faster than the loop window allows, then recover
async fn navigation_loop(mut world: World, config: &Config) -> Result<SimulationReport> {
    let attempts = config.loop_detection.threshold.max(1) as usize;
    let gap = config.loop_detection.window() / 4;

    for i in 0..attempts {
        let destination = Destination::new(TABS[i % TABS.len()]);
        let trigger = world.guard.navigate(destination.clone()).await;
        let message = format!("navigate {}: {}", destination, World::describe(&trigger));
        world.log(message);
        if world.guard.is_loop_detected() {
            world.log("loop detected");
            break;
        }
        tokio::time::sleep(gap).await;
    }

    if world.guard.is_loop_detected() {
        let outcome = if config.recovery.auto_recover {
            world.log("waiting for automatic recovery");
            world.guard.recovery().join_background().await
        } else {
            world.log("starting recovery");
            Some(world.guard.recover().await)
        };
        match outcome {
            Some(RunOutcome::Completed) => world.log("recovery complete"),
            Some(RunOutcome::Failed { step, error }) => {
                world.log(format!("recovery failed at step {}: {}", step + 1, error))
            }
            Some(RunOutcome::AlreadyRunning) => world.log("recovery already running"),
            None => world.log("recovery did not finish"),
        }
    }

    world.report(Scenario::NavigationLoop)
}

/// Fire a burst of refreshes; only the first and the last one run
async fn refresh_burst(mut world: World) -> Result<SimulationReport> {
    let gap = (world.interval / 10).min(Duration::from_millis(100));
    let mut pending = Vec::new();

    for i in 0..BURST_SIZE {
        let runs = Arc::clone(&world.runs);
        let trigger = world
            .guard
            .scheduler()
            .trigger(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
            .await;
        let message = format!("refresh #{}: {}", i + 1, World::describe(&trigger));
        world.log(message);
        if let Trigger::Deferred { result, .. } = trigger {
            pending.push((i, result));
        }
        tokio::time::sleep(gap).await;
    }

    let (labels, receivers): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
    for (i, result) in labels.into_iter().zip(join_all(receivers).await) {
        match result {
            Ok(Ok(_)) => world.log(format!("refresh #{}: trailing run completed", i + 1)),
            Ok(Err(e)) => world.log(format!("refresh #{}: trailing run failed: {}", i + 1, e)),
            Err(_) => world.log(format!("refresh #{}: superseded", i + 1)),
        }
    }

    world.report(Scenario::RefreshBurst)
}

/// A rejected operation still releases the gate for the next one
async fn failing_op(mut world: World) -> Result<SimulationReport> {
    let runs = Arc::clone(&world.runs);
    let trigger: Trigger<()> = world
        .guard
        .scheduler()
        .trigger(move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Err(OperationError::unavailable("backend returned 503"))
        })
        .await;
    let message = format!("save: {}", World::describe(&trigger));
    world.log(message);

    let released = !world.guard.scheduler().is_in_progress();
    world.log(format!("gate released: {}", released));

    let runs = Arc::clone(&world.runs);
    let retry = world
        .guard
        .scheduler()
        .trigger(move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    let message = format!("retry: {}", World::describe(&retry));
    world.log(message);
    if let Trigger::Deferred { result, .. } = retry {
        match result.await {
            Ok(Ok(())) => world.log("retry: trailing run completed"),
            Ok(Err(e)) => world.log(format!("retry: trailing run failed: {}", e)),
            Err(_) => world.log("retry: superseded"),
        }
    }

    world.report(Scenario::FailingOp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{LOOP_ALERT_ID, NotificationStatus, RECOVERY_ID};
    use tempfile::TempDir;

    fn options(scenario: Scenario) -> SimulationOptions {
        SimulationOptions {
            scenario,
            role: None,
            store_dir: None,
            memory_store: true,
            interval_ms: Some(1_000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_loop_recovers() {
        let report = run(&Config::default(), &options(Scenario::NavigationLoop)).await.unwrap();

        assert!(!report.detector.loop_detected);
        assert_eq!(report.detector.loops_detected, 1);
        assert_eq!(report.recovery, RecoveryState::Complete);
        assert!(report.markers.is_empty());
        let location = report.location.unwrap();
        assert!(location.starts_with("/messages?recovery=1&t="));
        assert!(
            report
                .notifications
                .iter()
                .any(|n| n.id == LOOP_ALERT_ID && n.status == NotificationStatus::Alert)
        );
        assert_eq!(
            report.notifications.last().map(|n| n.id.as_str()),
            Some(LOOP_ALERT_ID)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_loop_with_file_store() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(Scenario::NavigationLoop);
        opts.store_dir = Some(dir.path().to_path_buf());
        opts.memory_store = false;

        let report = run(&Config::default(), &opts).await.unwrap();
        assert_eq!(report.recovery, RecoveryState::Complete);
        assert!(FileMarkerStore::open(dir.path()).unwrap().keys().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_store_dir_is_default() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.dir = dir.path().join("markers");
        let mut opts = options(Scenario::NavigationLoop);
        opts.memory_store = false;

        let report = run(&config, &opts).await.unwrap();
        assert_eq!(report.recovery, RecoveryState::Complete);
        assert!(config.store.dir.join(markerstore::MARKERS_FILE).exists());
    }

    #[test]
    fn test_millis_u64_saturates() {
        assert_eq!(millis_u64(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis_u64(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_burst_runs_twice() {
        let report = run(&Config::default(), &options(Scenario::RefreshBurst)).await.unwrap();

        assert_eq!(report.runs, 2);
        assert_eq!(report.stats.immediate, 1);
        assert_eq!(report.stats.deferred, (BURST_SIZE - 1) as u64);
        assert_eq!(report.stats.superseded, (BURST_SIZE - 2) as u64);
        assert!(report.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_op_releases_gate() {
        let report = run(&Config::default(), &options(Scenario::FailingOp)).await.unwrap();

        assert_eq!(report.runs, 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.completed, 1);
        assert!(report.events.iter().any(|e| e.message == "gate released: true"));
        assert!(report.notifications.iter().all(|n| n.id != RECOVERY_ID));
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_interval_without_override() {
        let mut opts = options(Scenario::FailingOp);
        opts.interval_ms = None;
        opts.role = Some("admin".to_string());

        let report = run(&Config::default(), &opts).await.unwrap();
        assert_eq!(report.interval_ms, 10_000);
    }

    #[test]
    fn test_render_text_mentions_summary() {
        colored::control::set_override(false);
        let report = SimulationReport {
            scenario: "refresh-burst".to_string(),
            interval_ms: 1_000,
            events: vec![SimulationEvent {
                at_ms: 0,
                message: "refresh #1: ran immediately".to_string(),
            }],
            runs: 1,
            stats: DebounceStats::default(),
            detector: LoopSnapshot {
                attempts_in_window: 0,
                loop_detected: false,
                total_attempts: 0,
                loops_detected: 0,
            },
            recovery: RecoveryState::Idle,
            location: None,
            markers: Vec::new(),
            notifications: Vec::new(),
        };

        let text = report.render_text();
        assert!(text.contains("Scenario: refresh-burst (interval 1000ms)"));
        assert!(text.contains("refresh #1: ran immediately"));
        assert!(text.contains("loop detected: no"));
        assert!(text.contains("recovery: idle"));
    }
}
