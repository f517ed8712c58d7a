//! In-memory history navigator

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{Destination, NavigateOptions, Navigator};
use crate::error::NavigationError;

/// One call to [`Navigator::go_to`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub destination: Destination,
    pub options: NavigateOptions,
}

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<Destination>,
    visits: Vec<Visit>,
    failing_path: Option<String>,
}

/// Navigator backed by an in-memory history stack
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    state: Mutex<HistoryState>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator whose history starts at `start`
    pub fn starting_at(start: Destination) -> Self {
        let navigator = Self::new();
        navigator.lock().entries.push(start);
        navigator
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make navigations to `path` fail until cleared
    pub fn fail_on_path(&self, path: impl Into<String>) {
        self.lock().failing_path = Some(path.into());
    }

    pub fn clear_failure(&self) {
        self.lock().failing_path = None;
    }

    /// Current location
    pub fn current(&self) -> Option<Destination> {
        self.lock().entries.last().cloned()
    }

    /// History stack, oldest first
    pub fn entries(&self) -> Vec<Destination> {
        self.lock().entries.clone()
    }

    /// Every successful navigation in order
    pub fn visits(&self) -> Vec<Visit> {
        self.lock().visits.clone()
    }
}

#[async_trait]
impl Navigator for HistoryNavigator {
    async fn go_to(&self, destination: &Destination, options: NavigateOptions) -> Result<(), NavigationError> {
        let mut state = self.lock();

        if state.failing_path.as_deref() == Some(destination.path.as_str()) {
            return Err(NavigationError::Failed {
                destination: destination.to_string(),
                reason: "navigation refused".to_string(),
            });
        }

        debug!(%destination, replace = options.replace_history, "HistoryNavigator::go_to");
        if options.replace_history && !state.entries.is_empty() {
            state.entries.pop();
        }
        state.entries.push(destination.clone());
        state.visits.push(Visit {
            destination: destination.clone(),
            options,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_and_replace() {
        let nav = HistoryNavigator::starting_at(Destination::new("/"));

        nav.go_to(&Destination::new("/schedule"), NavigateOptions::push()).await.unwrap();
        assert_eq!(nav.entries().len(), 2);

        nav.go_to(&Destination::new("/messages"), NavigateOptions::replace())
            .await
            .unwrap();
        assert_eq!(nav.entries().len(), 2);
        assert_eq!(nav.current().unwrap().path, "/messages");
        assert_eq!(nav.visits().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let nav = HistoryNavigator::new();
        nav.fail_on_path("/broken");

        let err = nav
            .go_to(&Destination::new("/broken"), NavigateOptions::push())
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Failed { .. }));
        assert!(nav.visits().is_empty());

        nav.clear_failure();
        assert!(nav.go_to(&Destination::new("/broken"), NavigateOptions::push()).await.is_ok());
    }
}
