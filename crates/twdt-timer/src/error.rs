//! Error types for watchdog timer operations.

/// Errors that can occur while driving a watchdog timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer is in a state that does not permit the operation.
    InvalidState(&'static str),
    /// Resources for the timer could not be obtained.
    NoMemory(String),
    /// The requested period is not usable.
    InvalidPeriod,
    /// The timer has already been freed.
    Freed,
}

impl TimerError {
    /// Create an invalid state error.
    #[must_use]
    pub fn invalid_state(reason: &'static str) -> Self {
        Self::InvalidState(reason)
    }

    /// Create a resource exhaustion error.
    #[must_use]
    pub fn no_memory(msg: impl Into<String>) -> Self {
        Self::NoMemory(msg.into())
    }
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidState(reason) => write!(f, "Invalid timer state: {reason}"),
            Self::NoMemory(msg) => write!(f, "Timer resources unavailable: {msg}"),
            Self::InvalidPeriod => write!(f, "Timer period must be greater than zero"),
            Self::Freed => write!(f, "Timer has been freed"),
        }
    }
}

impl std::error::Error for TimerError {}

/// A specialized `Result` type for timer operations.
pub type TimerResult<T> = core::result::Result<T, TimerError>;
