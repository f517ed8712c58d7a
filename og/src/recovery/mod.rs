//! Navigation-loop recovery
//!
//! A [`RecoveryOrchestrator`] runs a [`RecoveryPlan`]: an ordered table of
//! [`RecoveryStep`]s, each an action followed by a fixed wait. Progress is
//! published through a watch channel and a [`Notifier`](crate::notify::Notifier)
//! under a single notification id.

mod config;
mod orchestrator;
mod state;
mod steps;

pub use config::{DEFAULT_IN_PROGRESS_KEY, RecoveryConfig};
pub use orchestrator::{RecoveryOrchestrator, RecoveryServices};
pub use state::{RecoveryState, RunOutcome};
pub use steps::{
    CACHE_BUST_PARAM, ClearMarkers, NavigateStable, NavigateTarget, RECOVERY_PARAM, RecoveryAction,
    RecoveryContext, RecoveryPlan, RecoveryStep, SetMarker,
};
