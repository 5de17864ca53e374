use thiserror::Error;

use crate::domain::job::JobState;

/// Failure taxonomy for every engine operation.
///
/// `NotFound` deliberately covers both "no such record" and "record exists in
/// another tenant" so callers cannot distinguish the two. Customer-facing
/// approval failures also collapse to `NotFound` to avoid leaking whether a
/// token was ever valid.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
    #[error("reason required for transition from {from:?} to {to:?}")]
    ReasonRequired { from: JobState, to: JobState },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Safe message for end users; never echoes internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::NotFound => "The requested record is not available.",
            EngineError::Forbidden => "You are not allowed to perform this action.",
            EngineError::InvalidTransition { .. } => {
                "This job cannot move to the requested state."
            }
            EngineError::ReasonRequired { .. } => {
                "Moving a job backwards requires a justification."
            }
            EngineError::Validation(_) => "The request could not be processed. Check inputs.",
            EngineError::Conflict(_) => "The operation conflicted with another change. Retry.",
            EngineError::Persistence(_) => "The service is temporarily unavailable.",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
