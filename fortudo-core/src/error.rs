use thiserror::Error;

/// Failures the engine reports. None of them are fatal: the planner turns each
/// one into a rejected `OperationResult` and leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Malformed clock string or number.
    #[error("{0}")]
    Format(String),
    /// Well-formed input that breaks a task rule (empty description, zero duration, ...).
    #[error("{0}")]
    Validation(String),
    /// Operation on a task id that is not in the store.
    #[error("task not found: {0}")]
    InvalidReference(String),
}

impl PlannerError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
