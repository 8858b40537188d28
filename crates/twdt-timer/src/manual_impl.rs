//! Manually clocked timer backend.
//!
//! Time only moves when [`ManualTimerBackend::advance`] is called, which makes
//! expiry ordering fully deterministic in tests. Expiry callbacks run on the
//! thread calling `advance` or `fire`.

use crate::error::{TimerError, TimerResult};
use crate::state::{TimerState, TimerStats, TimerStatus};
use crate::timer::{
    AllocationSlot, SlotGuard, TimeoutCallback, TimerBackend, TimerTick, WatchdogTimer,
    validate_period,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Backend driven by an explicit simulated clock.
///
/// The backend keeps a handle on its live timer so tests can inspect and
/// drive it after handing the timer itself to the code under test.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use twdt_timer::prelude::*;
///
/// let backend = ManualTimerBackend::new();
/// let fired = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&fired);
/// let mut timer = backend
///     .allocate(Duration::from_millis(100), Arc::new(move |_tick: TimerTick| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .expect("allocate");
///
/// timer.restart().expect("restart");
/// assert_eq!(backend.advance(Duration::from_millis(250)), 2);
/// assert_eq!(fired.load(Ordering::SeqCst), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualTimerBackend {
    slot: AllocationSlot,
    live: Arc<Mutex<Option<Arc<Core>>>>,
}

struct Core {
    control: Mutex<Control>,
    state: TimerState,
    callback: TimeoutCallback,
}

impl core::fmt::Debug for Core {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Core")
            .field("control", &self.control)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Control {
    period: Duration,
    elapsed: Duration,
    generation: u64,
    sequence: u64,
}

impl ManualTimerBackend {
    /// Create a backend with no live timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> Option<Arc<Core>> {
        self.live.lock().clone()
    }

    /// Advance the simulated clock, delivering every expiry that falls inside
    /// the interval. Returns the number of expiries delivered.
    pub fn advance(&self, by: Duration) -> usize {
        let Some(core) = self.live() else {
            return 0;
        };

        let mut budget = by;
        let mut fired = 0usize;
        loop {
            let tick = {
                let mut control = core.control.lock();
                if core.state.status() != TimerStatus::Running {
                    break;
                }
                let remaining = control.period.saturating_sub(control.elapsed);
                if budget < remaining {
                    control.elapsed = control.elapsed.saturating_add(budget);
                    break;
                }
                budget = budget.saturating_sub(remaining);
                control.elapsed = Duration::ZERO;
                control.sequence = control.sequence.wrapping_add(1);
                TimerTick {
                    generation: control.generation,
                    sequence: control.sequence,
                }
            };

            core.state.record_fire();
            (core.callback)(tick);
            fired = fired.saturating_add(1);
        }
        fired
    }

    /// Force an immediate expiry of a running timer, as if its full period
    /// had elapsed. Returns `false` if no timer is running.
    pub fn fire(&self) -> bool {
        let Some(core) = self.live() else {
            return false;
        };
        let tick = {
            let mut control = core.control.lock();
            if core.state.status() != TimerStatus::Running {
                return false;
            }
            control.elapsed = Duration::ZERO;
            control.sequence = control.sequence.wrapping_add(1);
            TimerTick {
                generation: control.generation,
                sequence: control.sequence,
            }
        };
        core.state.record_fire();
        (core.callback)(tick);
        true
    }

    /// Whether a timer is allocated from this backend.
    #[must_use]
    pub fn has_live_timer(&self) -> bool {
        self.slot.is_claimed()
    }

    /// Whether the live timer is counting down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.live()
            .is_some_and(|core| core.state.status() == TimerStatus::Running)
    }

    /// Period of the live timer.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.live().map(|core| core.control.lock().period)
    }

    /// Simulated time since the live timer was last restarted or expired.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.live().map(|core| core.control.lock().elapsed)
    }

    /// Counter snapshot of the live timer.
    #[must_use]
    pub fn stats(&self) -> Option<TimerStats> {
        self.live().map(|core| core.state.stats())
    }
}

impl TimerBackend for ManualTimerBackend {
    fn allocate(
        &self,
        period: Duration,
        callback: TimeoutCallback,
    ) -> TimerResult<Box<dyn WatchdogTimer>> {
        validate_period(period)?;
        let slot = self.slot.claim()?;

        let core = Arc::new(Core {
            control: Mutex::new(Control {
                period,
                elapsed: Duration::ZERO,
                generation: 0,
                sequence: 0,
            }),
            state: TimerState::new(),
            callback,
        });
        *self.live.lock() = Some(Arc::clone(&core));

        Ok(Box::new(ManualTimer {
            core,
            live: Arc::clone(&self.live),
            slot: Some(slot),
        }))
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Timer handle returned by [`ManualTimerBackend`].
#[derive(Debug)]
pub struct ManualTimer {
    core: Arc<Core>,
    live: Arc<Mutex<Option<Arc<Core>>>>,
    slot: Option<SlotGuard>,
}

impl WatchdogTimer for ManualTimer {
    fn reconfigure(&mut self, period: Duration) -> TimerResult<()> {
        match self.core.state.status() {
            TimerStatus::Freed => return Err(TimerError::Freed),
            TimerStatus::Running => {
                return Err(TimerError::invalid_state(
                    "timer must be stopped before it can be reconfigured",
                ));
            }
            TimerStatus::Stopped => {}
        }
        validate_period(period)?;
        let mut control = self.core.control.lock();
        control.period = period;
        control.generation = control.generation.wrapping_add(1);
        Ok(())
    }

    fn restart(&mut self) -> TimerResult<()> {
        self.core.state.restart()?;
        let mut control = self.core.control.lock();
        control.elapsed = Duration::ZERO;
        control.generation = control.generation.wrapping_add(1);
        Ok(())
    }

    fn stop(&mut self) -> TimerResult<()> {
        self.core.state.stop()?;
        let mut control = self.core.control.lock();
        control.elapsed = Duration::ZERO;
        control.generation = control.generation.wrapping_add(1);
        Ok(())
    }

    fn free(&mut self) -> TimerResult<()> {
        if !self.core.state.free() {
            return Ok(());
        }
        let mut live = self.live.lock();
        if live
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.core))
        {
            *live = None;
        }
        drop(live);
        self.slot = None;
        Ok(())
    }

    fn period(&self) -> Duration {
        self.core.control.lock().period
    }

    fn status(&self) -> TimerStatus {
        self.core.state.status()
    }

    fn stats(&self) -> TimerStats {
        self.core.state.stats()
    }

    fn is_current(&self, tick: TimerTick) -> bool {
        self.status() == TimerStatus::Running
            && self.core.control.lock().generation == tick.generation
    }
}

impl Drop for ManualTimer {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            tracing::error!(error = %e, "Failed to free manual watchdog timer on drop");
        }
    }
}
