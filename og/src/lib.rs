//! OpGuard - throttling, loop detection and recovery for fallible operations
//!
//! Protects an application from hammering its backend and from getting stuck
//! bouncing between views.
//!
//! # Core Concepts
//!
//! - **Cooldown**: an operation runs at most once per interval and never
//!   overlaps itself
//! - **Trailing debounce**: a request that arrives too soon is not lost; the
//!   latest one runs when the interval elapses
//! - **Loop detection**: too many attempts close together flag a loop
//! - **Scripted recovery**: a fixed sequence of steps with explicit waits
//!   returns the user to a stable view and retries the target once
//!
//! # Modules
//!
//! - [`throttle`] - Cooldown gate and debounce scheduler
//! - [`detect`] - Loop detector
//! - [`recovery`] - Recovery orchestrator and its step table
//! - [`guard`] - One guarded operation stream wiring the above together
//! - [`notify`] - Notification sinks
//! - [`nav`] - Navigation primitive
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`simulate`] - Scripted scenarios for the CLI

pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod guard;
pub mod nav;
pub mod notify;
pub mod recovery;
pub mod simulate;
pub mod throttle;

// Re-export commonly used types
pub use config::Config;
pub use detect::{LoopDetector, LoopDetectorConfig, LoopSnapshot};
pub use error::{ErrorKind, NavigationError, OperationError, OperationResult, RecoveryError};
pub use guard::OperationGuard;
pub use nav::{Destination, HistoryNavigator, NavigateOptions, Navigator};
pub use notify::{NotificationBoard, NotificationBus, NotificationStatus, Notifier, TracingNotifier};
pub use recovery::{RecoveryOrchestrator, RecoveryPlan, RecoveryServices, RecoveryState, RunOutcome};
pub use throttle::{Acquire, CooldownGate, DebounceScheduler, Trigger};
