//! # twdt
//!
//! Task watchdog: detects tasks and named users that stop making progress.
//!
//! Every subscribed entity must check in at least once per timeout period.
//! A single countdown timer is re-armed only after *all* of them have done
//! so. If the period runs out first, the watchdog reports the silent entities
//! and, if configured, aborts the process.
//!
//! ## Overview
//!
//! - [`TaskWatchdog`]: the controller (`init`, `add`, `reset`, `delete`, ...)
//! - [`Registry`]: the ordered set of watched entities and their flags
//! - [`Platform`] and [`HostPlatform`]: the scheduler services the
//!   watchdog consumes
//! - idle hooks: one per core, checking in for the core's idle task so a
//!   core starved of idle time trips the watchdog
//! - [`ReportSink`]: where timeout reports go
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──init()──► Stopped ◄──last delete── Running
//!       ▲                      │                     ▲   │
//!       │                      └─────first add───────┘   │ stop()
//!       │                                                ▼
//!       └──deinit() (from Stopped or Suspended)      Suspended
//!                                                  restart() ──► Running
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use twdt::prelude::*;
//! use twdt_timer::ManualTimerBackend;
//!
//! let platform = Arc::new(HostPlatform::with_cores(2));
//! let clock = ManualTimerBackend::new();
//! let watchdog = TaskWatchdog::new(platform, Arc::new(clock.clone()));
//!
//! let lines = Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let recorder = Arc::clone(&lines);
//! watchdog.set_report_sink(Arc::new(move |line: &str| recorder.lock().push(line.to_owned())));
//!
//! watchdog.init(WdtConfig::new(100)?)?;
//! let fast = watchdog.add_user("fast")?;
//! let _slow = watchdog.add_user("slow")?;
//!
//! // The first check-in completes the period both users joined in.
//! watchdog.reset_user(fast)?;
//! watchdog.reset_user(fast)?;
//! clock.advance(Duration::from_millis(100));
//!
//! assert!(lines.lock().iter().any(|line| line == " - slow"));
//! assert!(!lines.lock().iter().any(|line| line == " - fast"));
//! # Ok::<(), TwdtError>(())
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

pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod idle;
pub mod metrics;
pub mod platform;
pub mod prelude;
pub mod registry;
pub mod report;
pub mod subscription;

pub use config::{DEFAULT_TIMEOUT_MS, WdtConfig, WdtConfigBuilder};
pub use controller::{RunState, SubscriptionStatus, TaskWatchdog};
pub use entity::{CoreMask, Identity, TaskId, UserHandle};
pub use error::{TwdtError, TwdtResult};
pub use idle::{IdleHook, IdleHookTable};
pub use metrics::TwdtMetrics;
pub use platform::{AbortHandler, HostPlatform, IdleLoop, Platform};
pub use registry::{Entry, Registry};
pub use report::{ABORT_LINE, REPORT_LINE_CAPACITY, ReportLine, ReportSink, TRIGGER_HEADER};
pub use subscription::{TaskSubscription, UserSubscription};
