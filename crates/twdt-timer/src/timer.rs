//! Watchdog timer traits.
//!
//! A [`TimerBackend`] hands out at most one [`WatchdogTimer`] at a time. The
//! timer is a periodic countdown: once restarted it invokes its
//! [`TimeoutCallback`] every period until stopped, restarted, or freed.

use crate::error::{TimerError, TimerResult};
use crate::state::{TimerStats, TimerStatus};
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on every expiry.
///
/// Runs on the backend's own context. Backends never hold their internal
/// lock while calling it, so the callback may call back into the timer.
pub type TimeoutCallback = Arc<dyn Fn(TimerTick) + Send + Sync>;

/// Identifies one expiry of a timer.
///
/// `generation` changes on every `restart`, `stop` and `reconfigure`, so a
/// consumer can ask [`WatchdogTimer::is_current`] whether an expiry raced with
/// a concurrent re-arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTick {
    /// Arm generation the expiry belongs to.
    pub generation: u64,
    /// Expiry sequence number since allocation, starting at 1.
    pub sequence: u64,
}

/// A periodic, restartable countdown owned by a single consumer.
pub trait WatchdogTimer: Send {
    /// Change the period. The timer must be stopped; it is not restarted.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidState`] if the timer is running
    /// - [`TimerError::InvalidPeriod`] for a zero period
    /// - [`TimerError::Freed`] after `free`
    fn reconfigure(&mut self, period: Duration) -> TimerResult<()>;

    /// Start, or restart, periodic firing with elapsed time reset to zero.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Freed`] after `free`.
    fn restart(&mut self) -> TimerResult<()>;

    /// Halt firing without releasing the timer.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Freed`] after `free`.
    fn stop(&mut self) -> TimerResult<()>;

    /// Stop the timer and release its resources. Freeing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Backends report resource teardown failures here.
    fn free(&mut self) -> TimerResult<()>;

    /// Currently configured period.
    fn period(&self) -> Duration;

    /// Current status.
    fn status(&self) -> TimerStatus;

    /// Counter snapshot.
    fn stats(&self) -> TimerStats;

    /// Whether `tick` belongs to the current arm cycle of a running timer.
    fn is_current(&self, tick: TimerTick) -> bool;

    /// Whether the timer is counting down.
    fn is_running(&self) -> bool {
        self.status() == TimerStatus::Running
    }
}

/// Factory for watchdog timers.
pub trait TimerBackend: Send + Sync {
    /// Create a periodic timer in the stopped state.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidState`] if this backend already has a live timer
    /// - [`TimerError::NoMemory`] if the timer's resources cannot be obtained
    /// - [`TimerError::InvalidPeriod`] for a zero period
    fn allocate(
        &self,
        period: Duration,
        callback: TimeoutCallback,
    ) -> TimerResult<Box<dyn WatchdogTimer>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// One-timer-per-backend bookkeeping shared by the backends in this crate.
#[derive(Debug, Clone, Default)]
pub(crate) struct AllocationSlot(Arc<AtomicBool>);

impl AllocationSlot {
    pub(crate) fn claim(&self) -> TimerResult<SlotGuard> {
        if self
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TimerError::invalid_state(
                "a timer is already allocated for this backend",
            ));
        }
        Ok(SlotGuard(Arc::clone(&self.0)))
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the backend slot when the timer is freed or dropped.
#[derive(Debug)]
pub(crate) struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) fn validate_period(period: Duration) -> TimerResult<()> {
    if period.is_zero() {
        return Err(TimerError::InvalidPeriod);
    }
    Ok(())
}
