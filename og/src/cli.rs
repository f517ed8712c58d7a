//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// OpGuard - throttling, loop detection and recovery simulator
#[derive(Parser)]
#[command(
    name = "og",
    about = "Throttle fallible operations, detect navigation loops and recover from them",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scripted scenario against the guard
    Simulate {
        /// Scenario (navigation-loop, refresh-burst, failing-op)
        #[arg(value_name = "SCENARIO")]
        scenario: Scenario,

        /// User role used to pick the cooldown interval
        #[arg(short, long)]
        role: Option<String>,

        /// Marker store directory (defaults to store.dir from config)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Keep markers in memory instead of on disk
        #[arg(long, conflicts_with = "store")]
        memory: bool,

        /// Override the cooldown interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Scripted scenarios
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Rapid tab toggling until a loop is flagged, then recovery
    NavigationLoop,
    /// Many refreshes in quick succession collapse to one trailing run
    RefreshBurst,
    /// A rejected operation still releases the gate
    FailingOp,
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "Scenario::from_str: called");
        match s.to_lowercase().as_str() {
            "navigation-loop" | "loop" => Ok(Self::NavigationLoop),
            "refresh-burst" | "burst" => Ok(Self::RefreshBurst),
            "failing-op" | "fail" => Ok(Self::FailingOp),
            _ => Err(format!(
                "Unknown scenario: {}. Use: navigation-loop, refresh-burst, or failing-op",
                s
            )),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NavigationLoop => write!(f, "navigation-loop"),
            Self::RefreshBurst => write!(f, "refresh-burst"),
            Self::FailingOp => write!(f, "failing-op"),
        }
    }
}

/// Output format for simulation reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Where the log file is written
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("opguard")
        .join("logs")
        .join("opguard.log")
}
