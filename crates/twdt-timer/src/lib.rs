//! # twdt-timer
//!
//! Periodic countdown timers backing the task watchdog.
//!
//! The watchdog controller owns exactly one timer. It re-arms the timer
//! ("feeds" it) whenever every monitored entity has checked in, and the timer
//! calls back into the controller when a full period passes without a feed.
//!
//! This crate provides:
//! - [`WatchdogTimer`] and [`TimerBackend`] traits
//! - [`ThreadTimerBackend`], running each timer on a named service thread
//! - [`ManualTimerBackend`], driven by an explicit simulated clock for tests
//! - [`TimerState`], an atomic status word with lifetime counters
//!
//! ## Callback Contract
//!
//! Backends deliver expiries without holding any internal lock, so the
//! callback may restart, stop, or query the timer. Each expiry carries a
//! [`TimerTick`]; [`WatchdogTimer::is_current`] tells whether the tick raced
//! with a restart and should be ignored.
//!
//! ## State Machine
//!
//! ```text
//! Stopped ──restart()──► Running
//!    ▲                      │
//!    └───────stop()─────────┘
//!
//! (any) ──free()──► Freed
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use twdt_timer::prelude::*;
//!
//! let backend = ManualTimerBackend::new();
//! let mut timer = backend
//!     .allocate(Duration::from_millis(100), Arc::new(|_tick: TimerTick| {}))
//!     .expect("allocate");
//!
//! timer.restart().expect("restart");
//! assert!(timer.is_running());
//! assert!(timer.reconfigure(Duration::from_millis(10)).is_err());
//!
//! timer.stop().expect("stop");
//! timer.reconfigure(Duration::from_millis(10)).expect("reconfigure");
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod manual_impl;
pub mod prelude;
pub mod state;
pub mod thread_impl;
pub mod timer;

pub use error::{TimerError, TimerResult};
pub use manual_impl::{ManualTimer, ManualTimerBackend};
pub use state::{TimerState, TimerStats, TimerStatus};
pub use thread_impl::{ThreadTimer, ThreadTimerBackend};
pub use timer::{TimeoutCallback, TimerBackend, TimerTick, WatchdogTimer};
