//! OpGuard configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::LoopDetectorConfig;
use crate::nav::Destination;
use crate::recovery::RecoveryConfig;
use crate::throttle::CooldownConfig;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".opguard.yml";

/// Main OpGuard configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Minimum interval between guarded runs
    pub cooldown: CooldownConfig,

    /// Loop detection window
    #[serde(rename = "loop-detection")]
    pub loop_detection: LoopDetectorConfig,

    /// Recovery sequence
    pub recovery: RecoveryConfig,

    /// Marker store location
    pub store: StoreConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.loop_detection.window_ms == 0 {
            return Err(eyre::eyre!("loop-detection.window-ms must be greater than zero"));
        }
        Destination::parse(&self.recovery.stable_path)
            .map_err(|e| eyre::eyre!("recovery.stable-path is invalid: {}", e))?;
        if self.recovery.in_progress_key.is_empty() {
            return Err(eyre::eyre!("recovery.in-progress-key must not be empty"));
        }
        if self.recovery.marker_keys.iter().any(|k| k.is_empty()) {
            return Err(eyre::eyre!("recovery.marker-keys must not contain empty keys"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::search_paths(),
        };
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|config| config.log_level)
    }

    /// `./.opguard.yml`, then `~/.config/opguard/opguard.yml`
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("opguard").join("opguard.yml"));
        }
        paths
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Marker store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `markers.json`
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("opguard")
                .join("markers"),
        }
    }
}
