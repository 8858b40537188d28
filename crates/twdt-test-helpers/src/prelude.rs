//! Convenience re-exports for common test utilities.

pub use crate::must::{must, must_some, must_with};
pub use crate::recording::{AbortRecorder, LineRecorder};
pub use crate::wait::{wait_until, wait_until_default};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
