//! Loop detection
//!
//! Counts discrete attempts (navigations, refreshes) in a resetting window
//! and flags a loop when too many land close together.

mod config;
mod detector;

pub use config::LoopDetectorConfig;
pub use detector::{LoopDetector, LoopSnapshot};
