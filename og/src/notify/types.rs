//! Notification types
//!
//! Notifications are addressed by a stable id so a later step can replace an
//! earlier message (pending -> loading -> success) instead of stacking new
//! ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status rendered alongside a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationStatus {
    /// Queued, nothing started yet
    Pending,
    /// Work in progress
    Loading,
    Success,
    Error,
    /// Persistent condition that needs an operator action
    Alert,
}

impl NotificationStatus {
    /// Check if the status ends the notification's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Success | NotificationStatus::Error)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Loading => "loading",
            NotificationStatus::Success => "success",
            NotificationStatus::Error => "error",
            NotificationStatus::Alert => "alert",
        };
        f.write_str(s)
    }
}

/// Whether a notification was newly shown or updated in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Show,
    Update,
}

/// A single notification event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(id: &str, kind: NotificationKind, status: NotificationStatus, message: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            status,
            message: message.to_string(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(NotificationStatus::Success.is_terminal());
        assert!(NotificationStatus::Error.is_terminal());
        assert!(!NotificationStatus::Loading.is_terminal());
        assert!(!NotificationStatus::Alert.is_terminal());
    }

    #[test]
    fn test_serialize_kebab_case() {
        let n = Notification::new("recovery", NotificationKind::Update, NotificationStatus::Loading, "step 1");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["kind"], "update");
        assert_eq!(json["id"], "recovery");
    }
}
