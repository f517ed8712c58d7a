//! Recovery configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker set while a recovery run is underway
pub const DEFAULT_IN_PROGRESS_KEY: &str = "nav.recovery.in-progress";

/// Recovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Known-stable view to fall back to before retrying the target
    #[serde(rename = "stable-path")]
    pub stable_path: String,

    /// Wait after landing on the stable view
    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    /// Wait after navigating to the target
    #[serde(rename = "confirm-delay-ms")]
    pub confirm_delay_ms: u64,

    /// Persisted flags cleared at the start of every run
    #[serde(rename = "marker-keys")]
    pub marker_keys: Vec<String>,

    /// Marker set for the duration of a run
    #[serde(rename = "in-progress-key")]
    pub in_progress_key: String,

    /// Start recovery automatically when a loop is detected
    #[serde(rename = "auto-recover")]
    pub auto_recover: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stable_path: "/".to_string(),
            settle_delay_ms: 1_500,
            confirm_delay_ms: 300,
            marker_keys: vec![
                DEFAULT_IN_PROGRESS_KEY.to_string(),
                "nav.recovery.attempted".to_string(),
                "nav.loop.detected".to_string(),
            ],
            in_progress_key: DEFAULT_IN_PROGRESS_KEY.to_string(),
            auto_recover: false,
        }
    }
}

impl RecoveryConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}
