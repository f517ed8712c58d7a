//! Navigation primitive
//!
//! Recovery moves the user between views through a [`Navigator`]. The host
//! application supplies the real implementation; [`HistoryNavigator`] keeps an
//! in-memory history stack for simulations and tests.

mod destination;
mod history;

use async_trait::async_trait;

pub use destination::Destination;
pub use history::{HistoryNavigator, Visit};

use crate::error::NavigationError;

/// How a navigation affects history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one
    pub replace_history: bool,
}

impl NavigateOptions {
    pub fn push() -> Self {
        Self { replace_history: false }
    }

    pub fn replace() -> Self {
        Self { replace_history: true }
    }
}

/// Moves the application to a destination
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn go_to(&self, destination: &Destination, options: NavigateOptions) -> Result<(), NavigationError>;
}
