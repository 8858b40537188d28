//! Shared test utilities for the task watchdog crates.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`recording`] - Recorders for report lines and abort requests
//! - [`wait`] - Polling helpers for timing-dependent tests
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! twdt-test-helpers = { path = "crates/twdt-test-helpers" }
//! ```
//!
//! ```rust,ignore
//! use twdt_test_helpers::prelude::*;
//! ```

#![allow(clippy::panic)]

pub mod must;
pub mod prelude;
pub mod recording;
pub mod wait;

pub use must::*;
