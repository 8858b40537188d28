//! Error types for twdt-sim

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("Watchdog error: {0}")]
    Watchdog(#[from] twdt::TwdtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfiguration(_) | Self::Json(_) => 2,
            Self::Watchdog(_) | Self::WorkerPanicked(_) => 3,
            Self::Io(_) => 4,
        }
    }
}
