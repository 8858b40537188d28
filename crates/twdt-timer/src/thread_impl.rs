//! Thread-driven timer backend.
//!
//! Each allocated timer owns one named service thread that sleeps on a
//! condition variable until the next deadline, then invokes the callback
//! with the control lock released.

use crate::error::{TimerError, TimerResult};
use crate::state::{TimerState, TimerStats, TimerStatus};
use crate::timer::{
    AllocationSlot, SlotGuard, TimeoutCallback, TimerBackend, TimerTick, WatchdogTimer,
    validate_period,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_THREAD_NAME: &str = "twdt-timer";

/// Backend that runs each timer on a dedicated service thread.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use twdt_timer::prelude::*;
///
/// let backend = ThreadTimerBackend::new();
/// let mut timer = backend
///     .allocate(Duration::from_millis(50), Arc::new(|_tick: TimerTick| {}))
///     .expect("allocate");
/// timer.restart().expect("restart");
/// assert!(timer.is_running());
/// timer.free().expect("free");
/// ```
#[derive(Debug, Clone)]
pub struct ThreadTimerBackend {
    slot: AllocationSlot,
    thread_name: String,
}

impl ThreadTimerBackend {
    /// Create a backend whose service threads are named `twdt-timer`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_thread_name(DEFAULT_THREAD_NAME)
    }

    /// Create a backend with a custom service thread name.
    #[must_use]
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        Self {
            slot: AllocationSlot::default(),
            thread_name: name.into(),
        }
    }

    /// Whether a timer from this backend is currently alive.
    #[must_use]
    pub fn has_live_timer(&self) -> bool {
        self.slot.is_claimed()
    }
}

impl Default for ThreadTimerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBackend for ThreadTimerBackend {
    fn allocate(
        &self,
        period: Duration,
        callback: TimeoutCallback,
    ) -> TimerResult<Box<dyn WatchdogTimer>> {
        validate_period(period)?;
        let slot = self.slot.claim()?;

        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                period,
                deadline: None,
                generation: 0,
                sequence: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            state: TimerState::new(),
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || service_loop(&worker, &callback))
            .map_err(|e| TimerError::no_memory(format!("failed to spawn timer thread: {e}")))?;

        tracing::debug!(
            period = ?period,
            thread = %self.thread_name,
            "Watchdog timer allocated"
        );

        Ok(Box::new(ThreadTimer {
            shared,
            thread: Some(thread),
            slot: Some(slot),
        }))
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

/// Timer handle returned by [`ThreadTimerBackend`].
#[derive(Debug)]
pub struct ThreadTimer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    slot: Option<SlotGuard>,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    state: TimerState,
}

#[derive(Debug)]
struct Control {
    period: Duration,
    deadline: Option<Instant>,
    generation: u64,
    sequence: u64,
    shutdown: bool,
}

impl Control {
    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

fn service_loop(shared: &Shared, callback: &TimeoutCallback) {
    let mut control = shared.control.lock();
    loop {
        if control.shutdown {
            break;
        }

        let Some(deadline) = control.deadline else {
            shared.wake.wait(&mut control);
            continue;
        };

        let now = Instant::now();
        if now < deadline {
            let _woken = shared.wake.wait_until(&mut control, deadline);
            continue;
        }

        control.sequence = control.sequence.wrapping_add(1);
        let tick = TimerTick {
            generation: control.generation,
            sequence: control.sequence,
        };
        // Periodic: keep the original phase unless the callback fell behind.
        control.deadline = deadline
            .checked_add(control.period)
            .filter(|next| *next > now)
            .or_else(|| now.checked_add(control.period));
        shared.state.record_fire();

        MutexGuard::unlocked(&mut control, || callback(tick));
    }
    tracing::trace!("Watchdog timer service thread exiting");
}

impl ThreadTimer {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.shared.control.lock()
    }
}

impl WatchdogTimer for ThreadTimer {
    fn reconfigure(&mut self, period: Duration) -> TimerResult<()> {
        match self.shared.state.status() {
            TimerStatus::Freed => return Err(TimerError::Freed),
            TimerStatus::Running => {
                return Err(TimerError::invalid_state(
                    "timer must be stopped before it can be reconfigured",
                ));
            }
            TimerStatus::Stopped => {}
        }
        validate_period(period)?;

        let mut control = self.control();
        control.period = period;
        control.bump_generation();
        Ok(())
    }

    fn restart(&mut self) -> TimerResult<()> {
        self.shared.state.restart()?;
        let mut control = self.control();
        control.bump_generation();
        control.deadline = Instant::now().checked_add(control.period);
        self.shared.wake.notify_one();
        Ok(())
    }

    fn stop(&mut self) -> TimerResult<()> {
        self.shared.state.stop()?;
        let mut control = self.control();
        control.bump_generation();
        control.deadline = None;
        self.shared.wake.notify_one();
        Ok(())
    }

    fn free(&mut self) -> TimerResult<()> {
        if !self.shared.state.free() {
            return Ok(());
        }

        {
            let mut control = self.control();
            control.shutdown = true;
            control.deadline = None;
            control.bump_generation();
        }
        self.shared.wake.notify_all();

        if let Some(handle) = self.thread.take() {
            // Freed from inside our own callback: the loop exits on its own.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("Watchdog timer service thread panicked");
            }
        }
        self.slot = None;
        tracing::debug!("Watchdog timer freed");
        Ok(())
    }

    fn period(&self) -> Duration {
        self.control().period
    }

    fn status(&self) -> TimerStatus {
        self.shared.state.status()
    }

    fn stats(&self) -> TimerStats {
        self.shared.state.stats()
    }

    fn is_current(&self, tick: TimerTick) -> bool {
        self.status() == TimerStatus::Running && self.control().generation == tick.generation
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            tracing::error!(error = %e, "Failed to free watchdog timer on drop");
        }
    }
}
