//! Recovery step table and built-in actions

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use markerstore::MarkerStore;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::RecoveryConfig;
use crate::error::RecoveryError;
use crate::nav::{Destination, NavigateOptions, Navigator};

/// Query parameter marking a navigation as part of recovery
pub const RECOVERY_PARAM: &str = "recovery";

/// Query parameter carrying the cache-busting token
pub const CACHE_BUST_PARAM: &str = "t";

/// Everything a step can touch during one run
pub struct RecoveryContext {
    pub navigator: Arc<dyn Navigator>,
    pub store: Arc<dyn MarkerStore>,
    /// Where the user was trying to go when the loop started
    pub target: Destination,
}

/// One corrective action
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    /// Short label shown in progress notifications
    fn describe(&self) -> String;

    async fn execute(&self, ctx: &RecoveryContext) -> Result<(), RecoveryError>;
}

/// An action plus the fixed wait that follows it
#[derive(Clone)]
pub struct RecoveryStep {
    pub action: Arc<dyn RecoveryAction>,
    pub post_delay: Duration,
}

impl RecoveryStep {
    pub fn new(action: impl RecoveryAction + 'static, post_delay: Duration) -> Self {
        Self {
            action: Arc::new(action),
            post_delay,
        }
    }

    /// Step with no wait afterwards
    pub fn immediate(action: impl RecoveryAction + 'static) -> Self {
        Self::new(action, Duration::ZERO)
    }

    pub fn name(&self) -> String {
        self.action.describe()
    }
}

impl fmt::Debug for RecoveryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryStep")
            .field("action", &self.action.describe())
            .field("post_delay", &self.post_delay)
            .finish()
    }
}

/// Ordered step table for a recovery run
#[derive(Debug, Clone, Default)]
pub struct RecoveryPlan {
    pub steps: Vec<RecoveryStep>,
    /// Marker cleared once every step has succeeded
    pub completion_marker: Option<String>,
}

impl RecoveryPlan {
    pub fn new(steps: Vec<RecoveryStep>) -> Self {
        Self {
            steps,
            completion_marker: None,
        }
    }

    /// Clear `key` after a successful run
    pub fn clearing_on_success(mut self, key: impl Into<String>) -> Self {
        self.completion_marker = Some(key.into());
        self
    }

    /// Canonical sequence for breaking a navigation loop
    ///
    /// 1. clear persisted recovery flags
    /// 2. set a fresh "recovery in progress" marker
    /// 3. replace history with the stable view, then wait to settle
    /// 4. navigate to the target with a recovery marker and a fresh
    ///    cache-busting token, then wait to confirm
    pub fn navigation_loop(config: &RecoveryConfig) -> Self {
        let steps = vec![
            RecoveryStep::immediate(ClearMarkers::new(config.marker_keys.clone())),
            RecoveryStep::immediate(SetMarker::new(config.in_progress_key.clone())),
            RecoveryStep::new(
                NavigateStable::new(Destination::new(config.stable_path.clone())),
                config.settle_delay(),
            ),
            RecoveryStep::new(NavigateTarget, config.confirm_delay()),
        ];
        Self::new(steps).clearing_on_success(config.in_progress_key.clone())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Remove persisted recovery flags
#[derive(Debug, Clone)]
pub struct ClearMarkers {
    keys: Vec<String>,
}

impl ClearMarkers {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl RecoveryAction for ClearMarkers {
    fn describe(&self) -> String {
        "Clearing recovery flags".to_string()
    }

    async fn execute(&self, ctx: &RecoveryContext) -> Result<(), RecoveryError> {
        for key in &self.keys {
            let removed = ctx.store.clear(key)?;
            debug!(%key, removed, "ClearMarkers::execute");
        }
        Ok(())
    }
}

/// Set a marker to the current UTC time
#[derive(Debug, Clone)]
pub struct SetMarker {
    key: String,
}

impl SetMarker {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl RecoveryAction for SetMarker {
    fn describe(&self) -> String {
        "Marking recovery in progress".to_string()
    }

    async fn execute(&self, ctx: &RecoveryContext) -> Result<(), RecoveryError> {
        ctx.store.set(&self.key, &Utc::now().to_rfc3339())?;
        Ok(())
    }
}

/// Replace the current view with a known-stable one
#[derive(Debug, Clone)]
pub struct NavigateStable {
    destination: Destination,
}

impl NavigateStable {
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }
}

#[async_trait]
impl RecoveryAction for NavigateStable {
    fn describe(&self) -> String {
        format!("Returning to {}", self.destination)
    }

    async fn execute(&self, ctx: &RecoveryContext) -> Result<(), RecoveryError> {
        ctx.navigator
            .go_to(&self.destination, NavigateOptions::replace())
            .await?;
        Ok(())
    }
}

/// Retry the original target with a recovery marker and cache-busting token
#[derive(Debug, Clone, Copy)]
pub struct NavigateTarget;

impl NavigateTarget {
    /// Target as it is requested during recovery
    pub fn recovery_destination(target: &Destination) -> Destination {
        target
            .clone()
            .with_param(RECOVERY_PARAM, "1")
            .with_param(CACHE_BUST_PARAM, Uuid::now_v7().to_string())
    }
}

#[async_trait]
impl RecoveryAction for NavigateTarget {
    fn describe(&self) -> String {
        "Reopening requested view".to_string()
    }

    async fn execute(&self, ctx: &RecoveryContext) -> Result<(), RecoveryError> {
        let destination = Self::recovery_destination(&ctx.target);
        info!(%destination, "Navigating to recovery target");
        ctx.navigator.go_to(&destination, NavigateOptions::replace()).await?;
        Ok(())
    }
}
