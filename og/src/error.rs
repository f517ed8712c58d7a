//! Error types
//!
//! Throttling decisions are never errors; they come back as plain enums
//! (`Acquire`, `Trigger`, `RunOutcome`). Only genuine failures of a guarded
//! operation, a navigation, or a recovery step end up here.

use std::fmt;

use markerstore::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a guarded operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Transport-level failure talking to the backend
    Network,
    /// The operation did not finish in time
    Timeout,
    /// The backend refused the request
    Rejected,
    /// The backend or a dependency is temporarily unavailable
    Unavailable,
    /// Anything else
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Failure of a guarded operation
///
/// A tagged value instead of free-form error shapes, so callers match on
/// `kind` rather than probing a message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {detail}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub detail: String,
}

/// Result of a guarded operation
pub type OperationResult<T> = Result<T, OperationError>;

impl OperationError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, detail)
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }

    /// Check if a later attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Unavailable
        )
    }
}

/// Errors from the navigation primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Navigation to {destination} failed: {reason}")]
    Failed { destination: String, reason: String },
}

/// Errors raised by a recovery step
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Marker store error: {0}")]
    Store(#[from] StoreError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("Recovery cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::network("connection reset");
        assert_eq!(err.to_string(), "network error: connection reset");
    }

    #[test]
    fn test_is_retryable() {
        assert!(OperationError::network("x").is_retryable());
        assert!(OperationError::timeout("x").is_retryable());
        assert!(OperationError::unavailable("x").is_retryable());
        assert!(!OperationError::rejected("x").is_retryable());
        assert!(!OperationError::internal("x").is_retryable());
    }

    #[test]
    fn test_operation_error_serializes_tagged() {
        let err = OperationError::rejected("forbidden");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "rejected");
        assert_eq!(json["detail"], "forbidden");
    }

    #[test]
    fn test_recovery_error_from_navigation() {
        let err: RecoveryError = NavigationError::InvalidDestination("".to_string()).into();
        assert!(matches!(err, RecoveryError::Navigation(_)));
        assert!(err.to_string().contains("Invalid destination"));
    }
}
