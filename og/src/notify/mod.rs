//! Notification sink
//!
//! Loop alerts and recovery progress are always visible; throttled calls
//! never notify. Sinks:
//!
//! - [`NotificationBus`] broadcasts events to any number of subscribers
//! - [`NotificationBoard`] keeps the latest notification per id
//! - [`TracingNotifier`] writes notifications to the log
//! - [`FanoutNotifier`] forwards to several sinks

mod board;
mod bus;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};

pub use board::{DEFAULT_HISTORY_LIMIT, NotificationBoard};
pub use bus::{DEFAULT_CHANNEL_CAPACITY, NotificationBus};
pub use types::{Notification, NotificationKind, NotificationStatus};

/// Id of the persistent loop alert
pub const LOOP_ALERT_ID: &str = "loop-detected";

/// Id of the recovery progress notification
pub const RECOVERY_ID: &str = "recovery";

/// Receives user-visible notifications addressed by a stable id
pub trait Notifier: Send + Sync {
    /// Show a notification under `id`
    fn show(&self, id: &str, status: NotificationStatus, message: &str);

    /// Replace the notification shown under `id`
    fn update(&self, id: &str, status: NotificationStatus, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    fn log(&self, id: &str, status: NotificationStatus, message: &str) {
        match status {
            NotificationStatus::Error => error!(%id, %status, "{}", message),
            NotificationStatus::Alert => warn!(%id, %status, "{}", message),
            _ => info!(%id, %status, "{}", message),
        }
    }
}

impl Notifier for TracingNotifier {
    fn show(&self, id: &str, status: NotificationStatus, message: &str) {
        self.log(id, status, message);
    }

    fn update(&self, id: &str, status: NotificationStatus, message: &str) {
        self.log(id, status, message);
    }
}

/// Forwards every notification to each inner sink in order
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn Notifier>) {
        self.sinks.push(sink);
    }
}

impl Notifier for FanoutNotifier {
    fn show(&self, id: &str, status: NotificationStatus, message: &str) {
        for sink in &self.sinks {
            sink.show(id, status, message);
        }
    }

    fn update(&self, id: &str, status: NotificationStatus, message: &str) {
        for sink in &self.sinks {
            sink.update(id, status, message);
        }
    }
}
