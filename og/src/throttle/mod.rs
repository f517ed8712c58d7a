//! Throttling for guarded operations
//!
//! A [`CooldownGate`] lets an operation run at most once per minimum interval
//! and never overlap itself. A [`DebounceScheduler`] sits on top of the gate
//! and turns "too soon" into a single trailing execution instead of dropping
//! the request or queuing duplicates.

mod config;
mod debounce;
mod gate;

pub use config::CooldownConfig;
pub use debounce::{DebounceScheduler, DebounceStats, Trigger};
pub use gate::{Acquire, CooldownGate};
