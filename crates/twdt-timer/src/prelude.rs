//! Prelude for twdt-timer.
//!
//! ```rust
//! use twdt_timer::prelude::*;
//!
//! let backend = ThreadTimerBackend::new();
//! assert!(!backend.has_live_timer());
//! ```

pub use crate::error::{TimerError, TimerResult};
pub use crate::manual_impl::{ManualTimer, ManualTimerBackend};
pub use crate::state::{TimerState, TimerStats, TimerStatus};
pub use crate::thread_impl::{ThreadTimer, ThreadTimerBackend};
pub use crate::timer::{TimeoutCallback, TimerBackend, TimerTick, WatchdogTimer};
