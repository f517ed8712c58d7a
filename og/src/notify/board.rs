//! Addressable notification board

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::Notifier;
use super::types::{Notification, NotificationKind, NotificationStatus};

/// History entries kept before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 1_000;

#[derive(Debug, Default)]
struct BoardState {
    current: BTreeMap<String, Notification>,
    history: VecDeque<Notification>,
}

/// Keeps the latest notification per id
///
/// `update` replaces whatever is shown under the id, so repeated progress
/// reports never stack. The most recent events are kept for inspection, up to
/// the history limit.
#[derive(Debug)]
pub struct NotificationBoard {
    state: Mutex<BoardState>,
    history_limit: usize,
}

impl Default for NotificationBoard {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(BoardState::default()),
            history_limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, notification: Notification) {
        let mut state = self.lock();
        if self.history_limit > 0 {
            while state.history.len() >= self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(notification.clone());
        }
        state.current.insert(notification.id.clone(), notification);
    }

    /// Notification currently shown under `id`
    pub fn get(&self, id: &str) -> Option<Notification> {
        self.lock().current.get(id).cloned()
    }

    /// Number of distinct notifications on the board
    pub fn len(&self) -> usize {
        self.lock().current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().current.is_empty()
    }

    /// Recent shows and updates in the order received
    pub fn history(&self) -> Vec<Notification> {
        self.lock().history.iter().cloned().collect()
    }

    /// Statuses reported under `id`, in order
    pub fn statuses(&self, id: &str) -> Vec<NotificationStatus> {
        self.lock()
            .history
            .iter()
            .filter(|n| n.id == id)
            .map(|n| n.status)
            .collect()
    }

    /// Remove a notification from the board
    pub fn dismiss(&self, id: &str) -> bool {
        self.lock().current.remove(id).is_some()
    }
}

impl Notifier for NotificationBoard {
    fn show(&self, id: &str, status: NotificationStatus, message: &str) {
        self.record(Notification::new(id, NotificationKind::Show, status, message));
    }

    fn update(&self, id: &str, status: NotificationStatus, message: &str) {
        self.record(Notification::new(id, NotificationKind::Update, status, message));
    }
}
