use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::machine::Phase;
use super::validation::ValidationError;

/// Remote call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AnalyzeImage,
    RecommendExercise,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AnalyzeImage => f.write_str("analyze-image"),
            Operation::RecommendExercise => f.write_str("get_exercise_recommendations"),
        }
    }
}

/// Failures that move the workflow into `Error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation} transport error: {detail}")]
    Transport { operation: Operation, detail: String },

    #[error("{operation} malformed response: {detail}")]
    MalformedResponse { operation: Operation, detail: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },
}

impl WorkflowError {
    pub fn transport(operation: Operation, detail: impl fmt::Display) -> Self {
        Self::Transport {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn malformed(operation: Operation, detail: impl fmt::Display) -> Self {
        Self::MalformedResponse {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Transport { .. } => "transport",
            WorkflowError::MalformedResponse { .. } => "malformed_response",
            WorkflowError::Timeout { .. } => "timeout",
        }
    }

    /// Message shown to the user. Remote failures collapse into one text per call.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Validation(v) => v.to_string(),
            WorkflowError::Transport { operation, .. }
            | WorkflowError::MalformedResponse { operation, .. }
            | WorkflowError::Timeout { operation, .. } => match operation {
                Operation::AnalyzeImage => "Failed to analyze image".into(),
                Operation::RecommendExercise => "Failed to get exercise recommendations".into(),
            },
        }
    }
}

/// Action not valid for the current phase. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejected {
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("no food items to base recommendations on")]
    NoFoodItems,

    #[error("a request is already in flight")]
    RequestInFlight,
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn remote_failures_share_one_user_message_per_call() {
        let t = WorkflowError::transport(Operation::AnalyzeImage, "connection refused");
        let m = WorkflowError::malformed(Operation::AnalyzeImage, "missing field `food_items`");
        let to = WorkflowError::Timeout {
            operation: Operation::AnalyzeImage,
            after: Duration::from_secs(30),
        };
        for e in [&t, &m, &to] {
            assert_eq!(e.user_message(), "Failed to analyze image");
        }
        assert_eq!(t.kind(), "transport");
        assert_eq!(m.kind(), "malformed_response");
        assert_eq!(to.kind(), "timeout");
        assert!(t.to_string().contains("connection refused"));
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let e = WorkflowError::from(ValidationError::Empty);
        assert_eq!(e.kind(), "validation");
        assert_eq!(e.user_message(), "image is empty");
    }
}
