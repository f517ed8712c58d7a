//! MarkerStore - durable key/value markers
//!
//! Small string flags ("recovery in progress", "last recovery attempt", ...)
//! that must survive a restart of the process that set them. The store is a
//! single JSON document guarded by an advisory file lock.
//!
//! # Layout
//!
//! ```text
//! <store dir>/
//! ├── markers.json     # { "<key>": { "value": "...", "set_at": "..." } }
//! └── markers.lock     # advisory lock for read-modify-write cycles
//! ```
//!
//! # Example
//!
//! ```ignore
//! use markerstore::{FileMarkerStore, MarkerStore};
//!
//! let store = FileMarkerStore::open("/tmp/markers")?;
//! store.set("nav.recovery.in_progress", "2026-01-01T00:00:00Z")?;
//! assert!(store.get("nav.recovery.in_progress")?.is_some());
//! store.clear("nav.recovery.in_progress")?;
//! ```

pub mod cli;
pub mod config;
mod error;
mod store;

pub use error::StoreError;
pub use store::{FileMarkerStore, LOCK_FILE, MARKERS_FILE, Marker, MarkerStore, MemoryMarkerStore};
