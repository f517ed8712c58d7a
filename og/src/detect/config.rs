//! Loop detector configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loop detector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDetectorConfig {
    /// Attempts further apart than this start a new window
    #[serde(rename = "window-ms", default = "default_window_ms")]
    pub window_ms: u64,

    /// Attempts within one window that count as a loop
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_window_ms() -> u64 {
    1_500
}

fn default_threshold() -> u32 {
    3
}

impl Default for LoopDetectorConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            threshold: default_threshold(),
        }
    }
}

impl LoopDetectorConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoopDetectorConfig::default();
        assert_eq!(config.window_ms, 1_500);
        assert_eq!(config.threshold, 3);
        assert_eq!(config.window(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: LoopDetectorConfig = serde_yaml::from_str("window-ms: 800\nthreshold: 5\n").unwrap();
        assert_eq!(config.window(), Duration::from_millis(800));
        assert_eq!(config.threshold, 5);
    }
}
