//! Cooldown configuration

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum interval between runs of a guarded operation
///
/// Callers in different roles may be throttled differently (privileged users
/// typically refresh more often), so the interval is looked up per role with
/// a fallback for everyone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Interval for callers without a role-specific entry
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Per-role overrides, keyed by role name
    #[serde(rename = "role-intervals")]
    pub role_intervals: BTreeMap<String, u64>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        let mut role_intervals = BTreeMap::new();
        role_intervals.insert("admin".to_string(), 10_000);
        Self {
            interval_ms: 15_000,
            role_intervals,
        }
    }
}

impl CooldownConfig {
    /// Interval in effect for the given caller role
    pub fn interval_for(&self, role: Option<&str>) -> Duration {
        let ms = role
            .and_then(|r| self.role_intervals.get(r).copied())
            .unwrap_or(self.interval_ms);
        debug!(?role, ms, "CooldownConfig::interval_for");
        Duration::from_millis(ms)
    }

    /// Interval for callers without a role
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CooldownConfig::default();
        assert_eq!(config.interval_ms, 15_000);
        assert_eq!(config.role_intervals.get("admin"), Some(&10_000));
    }

    #[test]
    fn test_interval_for_role() {
        let config = CooldownConfig::default();
        assert_eq!(config.interval_for(Some("admin")), Duration::from_secs(10));
        assert_eq!(config.interval_for(Some("staff")), Duration::from_secs(15));
        assert_eq!(config.interval_for(None), Duration::from_secs(15));
    }

    #[test]
    fn test_deserialize_partial() {
        let yaml = r#"
interval-ms: 5000
"#;
        let config: CooldownConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_interval(), Duration::from_secs(5));
        // Role table falls back to the default
        assert_eq!(config.interval_for(Some("admin")), Duration::from_secs(10));
    }
}
