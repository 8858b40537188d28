//! Timer status state machine and counters.
//!
//! Every backend keeps one [`TimerState`] so the status word can be read
//! lock-free from any context, including the expiry callback.

use crate::error::{TimerError, TimerResult};
use portable_atomic::{AtomicU32, AtomicU64, Ordering};

/// Operational status of a watchdog timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum TimerStatus {
    /// Allocated but not counting down.
    #[default]
    Stopped = 0,
    /// Counting down; fires periodically.
    Running = 1,
    /// Released; terminal.
    Freed = 2,
}

impl TimerStatus {
    /// Convert from the raw status word.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Running),
            2 => Some(Self::Freed),
            _ => None,
        }
    }

    /// Convert to the raw status word.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
            Self::Freed => "Freed",
        }
    }
}

impl core::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic status word plus lifetime counters for one timer.
///
/// ```text
/// Stopped ──restart()──► Running ──restart()──► Running
///    ▲                      │
///    └──────stop()──────────┘
///
/// (any) ──free()──► Freed
/// ```
#[derive(Debug)]
pub struct TimerState {
    status: AtomicU32,
    restart_count: AtomicU64,
    stop_count: AtomicU64,
    fire_count: AtomicU64,
}

impl TimerState {
    /// Create a state in the `Stopped` status.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: AtomicU32::new(TimerStatus::Stopped.to_raw()),
            restart_count: AtomicU64::new(0),
            stop_count: AtomicU64::new(0),
            fire_count: AtomicU64::new(0),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TimerStatus {
        let raw = self.status.load(Ordering::Acquire);
        TimerStatus::from_raw(raw).unwrap_or(TimerStatus::Freed)
    }

    /// Record a (re)start.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Freed`] if the timer was already released.
    pub fn restart(&self) -> TimerResult<()> {
        self.transition(TimerStatus::Running)?;
        self.restart_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Record a stop. Stopping a stopped timer is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Freed`] if the timer was already released.
    pub fn stop(&self) -> TimerResult<()> {
        let previous = self.transition(TimerStatus::Stopped)?;
        if previous == TimerStatus::Running {
            self.stop_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Move to the terminal `Freed` status. Returns `false` if already freed.
    pub fn free(&self) -> bool {
        self.status.swap(TimerStatus::Freed.to_raw(), Ordering::AcqRel)
            != TimerStatus::Freed.to_raw()
    }

    /// Record an expiry.
    pub fn record_fire(&self) {
        self.fire_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> TimerStats {
        TimerStats {
            status: self.status(),
            restarts: self.restart_count.load(Ordering::Acquire),
            stops: self.stop_count.load(Ordering::Acquire),
            fires: self.fire_count.load(Ordering::Acquire),
        }
    }

    fn transition(&self, to: TimerStatus) -> TimerResult<TimerStatus> {
        let result = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                if raw == TimerStatus::Freed.to_raw() {
                    None
                } else {
                    Some(to.to_raw())
                }
            });
        match result {
            Ok(previous) => Ok(TimerStatus::from_raw(previous).unwrap_or(TimerStatus::Stopped)),
            Err(_) => Err(TimerError::Freed),
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a timer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerStats {
    /// Status at the time of the snapshot.
    pub status: TimerStatus,
    /// Number of `restart` calls.
    pub restarts: u64,
    /// Number of running-to-stopped transitions.
    pub stops: u64,
    /// Number of expiries delivered to the callback.
    pub fires: u64,
}
