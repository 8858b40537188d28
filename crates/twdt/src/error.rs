//! Error types for the task watchdog.
//!
//! Every fallible operation reports one of four kinds, mirroring the status
//! codes callers of a task watchdog expect. Timer backend errors are folded
//! into the same kinds.

use thiserror::Error;
use twdt_timer::TimerError;

/// Errors returned by task watchdog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TwdtError {
    /// An argument was rejected: duplicate subscription, unknown entity on
    /// removal, or an invalid configuration field.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The watchdog is not in a state that permits the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The entity is not subscribed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resources for the watchdog could not be obtained.
    #[error("Out of memory: {0}")]
    NoMemory(String),
}

impl TwdtError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create an invalid state error.
    #[must_use]
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an out of memory error.
    #[must_use]
    pub fn no_memory(reason: impl Into<String>) -> Self {
        Self::NoMemory(reason.into())
    }

    pub(crate) fn uninitialized() -> Self {
        Self::invalid_state("task watchdog is not initialized")
    }
}

impl From<TimerError> for TwdtError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::InvalidState(_) | TimerError::Freed => Self::InvalidState(err.to_string()),
            TimerError::NoMemory(_) => Self::NoMemory(err.to_string()),
            TimerError::InvalidPeriod => Self::InvalidArgument(err.to_string()),
        }
    }
}

/// A specialized `Result` type for task watchdog operations.
pub type TwdtResult<T> = std::result::Result<T, TwdtError>;
