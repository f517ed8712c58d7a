//! Recovery state machine types

use std::fmt;

use serde::Serialize;

/// Where a recovery run is
///
/// `Idle -> StepRunning(0) -> Waiting(0) -> StepRunning(1) -> ... -> Complete`,
/// or `Failed` from any step. Only `Idle`, `Complete` and `Failed` accept a
/// new run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RecoveryState {
    Idle,
    StepRunning { step: usize },
    Waiting { step: usize },
    Complete,
    Failed { step: usize, error: String },
}

impl RecoveryState {
    /// Check if a run is underway
    pub fn is_active(&self) -> bool {
        matches!(self, RecoveryState::StepRunning { .. } | RecoveryState::Waiting { .. })
    }

    /// Index of the step being run or waited on
    pub fn step(&self) -> Option<usize> {
        match self {
            RecoveryState::StepRunning { step }
            | RecoveryState::Waiting { step }
            | RecoveryState::Failed { step, .. } => Some(*step),
            RecoveryState::Idle | RecoveryState::Complete => None,
        }
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryState::Idle => write!(f, "idle"),
            RecoveryState::StepRunning { step } => write!(f, "running step {}", step + 1),
            RecoveryState::Waiting { step } => write!(f, "waiting after step {}", step + 1),
            RecoveryState::Complete => write!(f, "complete"),
            RecoveryState::Failed { step, error } => write!(f, "failed at step {}: {}", step + 1, error),
        }
    }
}

/// Result of a call to `run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every step ran; the loop detector has been reset
    Completed,
    /// A step failed; nothing is retried
    Failed { step: usize, error: String },
    /// Another run was active, so this call did nothing
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        assert!(!RecoveryState::Idle.is_active());
        assert!(RecoveryState::StepRunning { step: 0 }.is_active());
        assert!(RecoveryState::Waiting { step: 2 }.is_active());
        assert!(!RecoveryState::Complete.is_active());
        assert!(
            !RecoveryState::Failed {
                step: 1,
                error: "x".to_string()
            }
            .is_active()
        );
    }

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(RecoveryState::StepRunning { step: 0 }.to_string(), "running step 1");
        assert_eq!(RecoveryState::Waiting { step: 2 }.step(), Some(2));
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(RecoveryState::Waiting { step: 1 }).unwrap();
        assert_eq!(json["state"], "waiting");
        assert_eq!(json["step"], 1);
    }
}
