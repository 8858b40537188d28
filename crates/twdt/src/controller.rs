//! The task watchdog controller.
//!
//! [`TaskWatchdog`] owns the registry of watched entities and the single
//! countdown timer. The timer is re-armed only when every entity has checked
//! in since the previous arm; if a full period passes first, the timer fires
//! and the controller reports the entities that stayed silent.
//!
//! # Locking
//!
//! One mutex guards the registry, configuration and timer handle. Every
//! operation, idle hook and timer expiry takes it for a short, bounded
//! section. Timer backends invoke the expiry callback without holding their
//! own lock, so the order is always controller lock then timer lock.

use crate::config::WdtConfig;
use crate::entity::{CoreMask, Identity, TaskId, UserHandle};
use crate::error::{TwdtError, TwdtResult};
use crate::idle::{self, IdleCheckIn};
use crate::metrics::{MetricsCounters, TwdtMetrics};
use crate::platform::{HostPlatform, Platform};
use crate::registry::Registry;
use crate::report::{self, ABORT_LINE, Output, ReportSink};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use twdt_timer::{ThreadTimerBackend, TimeoutCallback, TimerBackend, TimerTick, WatchdogTimer};

/// Whether the watchdog timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    /// Nothing to watch yet, or a timeout ended in an abort.
    Stopped,
    /// Counting down; check-ins re-arm the timer.
    Running,
    /// Stopped by [`TaskWatchdog::stop`]; check-ins are recorded but do not
    /// re-arm until [`TaskWatchdog::restart`].
    Suspended,
}

impl RunState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of [`TaskWatchdog::status`] and [`TaskWatchdog::status_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// The entity is watched.
    Subscribed,
    /// The entity is not watched.
    NotSubscribed,
}

impl SubscriptionStatus {
    /// Whether the entity is watched.
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Controller state that exists between `init` and `deinit`.
struct State {
    config: WdtConfig,
    registry: Registry,
    timer: Box<dyn WatchdogTimer>,
    run: RunState,
    idle_cores: CoreMask,
}

impl State {
    fn feed(&mut self, metrics: &MetricsCounters) -> TwdtResult<()> {
        self.timer.restart()?;
        self.registry.clear_reset_flags();
        self.run = RunState::Running;
        metrics.record_feed();
        Ok(())
    }

    fn feed_if_all_reset(&mut self, metrics: &MetricsCounters) -> TwdtResult<()> {
        if self.run != RunState::Suspended
            && !self.registry.is_empty()
            && self.registry.all_reset()
        {
            self.feed(metrics)?;
        }
        Ok(())
    }

    fn halt(&mut self, next: RunState) -> TwdtResult<()> {
        if self.timer.is_running() {
            self.timer.stop()?;
        }
        self.run = next;
        Ok(())
    }

    fn subscribe(
        &mut self,
        id: Identity,
        name: Arc<str>,
        metrics: &MetricsCounters,
    ) -> TwdtResult<()> {
        self.registry.insert(id, name)?;
        if let Err(err) = self.feed_if_all_reset(metrics) {
            self.registry.remove(id)?;
            return Err(err);
        }
        Ok(())
    }

    fn check_in(&mut self, id: Identity, metrics: &MetricsCounters) -> TwdtResult<()> {
        self.registry.mark_reset(id)?;
        metrics.record_check_in();
        self.feed_if_all_reset(metrics)
    }

    fn unsubscribe(
        &mut self,
        id: Identity,
        platform: &dyn Platform,
        metrics: &MetricsCounters,
    ) -> TwdtResult<()> {
        self.registry.remove(id)?;
        if let Identity::Task(task) = id {
            if let Some(core) = self.idle_core_of(task, platform) {
                idle::uninstall(platform, core);
                self.idle_cores.remove(core);
            }
        }
        if self.registry.is_empty() {
            if self.run == RunState::Running {
                self.halt(RunState::Stopped)?;
            }
            Ok(())
        } else {
            self.feed_if_all_reset(metrics)
        }
    }

    fn idle_core_of(&self, task: TaskId, platform: &dyn Platform) -> Option<u32> {
        self.idle_cores
            .iter()
            .find(|core| platform.idle_task(*core) == Some(task))
    }

    fn is_idle_subscription(&self, id: Identity, platform: &dyn Platform) -> bool {
        match id {
            Identity::Task(task) => self.idle_core_of(task, platform).is_some(),
            Identity::User(_) => false,
        }
    }

    /// Remove the idle hooks and hand back the timer for freeing outside the
    /// lock.
    fn release(self, platform: &dyn Platform) -> Box<dyn WatchdogTimer> {
        for core in self.idle_cores.iter() {
            idle::uninstall(platform, core);
        }
        self.timer
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("timer", &self.timer.status())
            .field("run", &self.run)
            .field("idle_cores", &self.idle_cores)
            .finish()
    }
}

struct Shared {
    me: Weak<Shared>,
    platform: Arc<dyn Platform>,
    backend: Arc<dyn TimerBackend>,
    state: Mutex<Option<State>>,
    sink: RwLock<Option<Arc<dyn ReportSink>>>,
    metrics: MetricsCounters,
    next_user: AtomicU64,
}

impl Shared {
    fn lock_initialized(&self) -> TwdtResult<MutexGuard<'_, Option<State>>> {
        let guard = self.state.lock();
        if guard.is_none() {
            return Err(TwdtError::uninitialized());
        }
        Ok(guard)
    }

    fn with_state<R>(&self, op: impl FnOnce(&mut State) -> TwdtResult<R>) -> TwdtResult<R> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or_else(TwdtError::uninitialized)?;
        op(state)
    }

    fn timeout_callback(&self) -> TimeoutCallback {
        let shared = self.me.clone();
        Arc::new(move |tick: TimerTick| {
            if let Some(shared) = shared.upgrade() {
                shared.on_timeout(tick);
            }
        })
    }

    /// Bring the idle subscriptions in line with `wanted`.
    ///
    /// New cores are watched before any core is released, and a failure
    /// releases only the cores this call added, so on error the idle
    /// subscriptions are exactly what they were.
    fn sync_idle(&self, state: &mut State, wanted: CoreMask) -> TwdtResult<()> {
        let mut added = CoreMask::EMPTY;
        for core in wanted.difference(state.idle_cores).iter() {
            if let Err(err) = self.watch_idle_core(state, core) {
                for core in added.iter() {
                    self.unwatch_idle_core(state, core);
                }
                return Err(err);
            }
            added.insert(core);
        }

        for core in state.idle_cores.difference(wanted).iter() {
            self.unwatch_idle_core(state, core);
        }
        Ok(())
    }

    fn watch_idle_core(&self, state: &mut State, core: u32) -> TwdtResult<()> {
        let platform = self.platform.as_ref();
        let task = platform.idle_task(core).ok_or_else(|| {
            TwdtError::invalid_argument(format!("CPU {core} has no idle task"))
        })?;
        let id = Identity::Task(task);
        state.registry.insert(id, platform.task_name(task))?;

        let target: Weak<dyn IdleCheckIn> = self.me.clone();
        if let Err(err) = idle::install(platform, target, core, task) {
            if state.registry.remove(id).is_err() {
                tracing::warn!(core, "Idle task vanished while rolling back");
            }
            return Err(err);
        }
        state.idle_cores.insert(core);
        Ok(())
    }

    fn unwatch_idle_core(&self, state: &mut State, core: u32) {
        let platform = self.platform.as_ref();
        if let Some(task) = platform.idle_task(core) {
            let id = Identity::Task(task);
            if state.registry.contains(id) && state.registry.remove(id).is_err() {
                tracing::warn!(core, "Idle task vanished while unsubscribing");
            }
        }
        idle::uninstall(platform, core);
        state.idle_cores.remove(core);
    }

    fn on_timeout(&self, tick: TimerTick) {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if state.run != RunState::Running || !state.timer.is_current(tick) {
            self.metrics.record_stale_tick();
            return;
        }

        let sink = self.sink.read().clone();
        let out = Output::new(sink.as_deref(), self.platform.as_ref());

        if state.registry.all_reset() {
            if state.feed(&self.metrics).is_err() {
                out.emit(format_args!("Task watchdog failed to re-arm its timer"));
            }
            return;
        }

        let failed = report::write_delinquents(out, &state.registry, self.platform.as_ref());
        self.metrics.record_timeout(failed);

        if state.config.trigger_panic {
            out.emit(format_args!("{ABORT_LINE}"));
            self.metrics.record_abort();
            if state.halt(RunState::Stopped).is_err() {
                out.emit(format_args!("Task watchdog failed to stop its timer"));
            }
            self.platform.abort("task watchdog timeout");
            return;
        }

        // Report-only: start a new period so later stalls are still caught.
        state.registry.clear_reset_flags();
        if state.timer.restart().is_err() {
            out.emit(format_args!("Task watchdog failed to re-arm its timer"));
        }
        drop(guard);
        tracing::warn!(failed_cores = %failed, "Task watchdog timeout reported");
    }
}

impl IdleCheckIn for Shared {
    fn idle_check_in(&self, task: TaskId) -> bool {
        self.with_state(|state| state.check_in(Identity::Task(task), &self.metrics))
            .is_ok()
    }
}

/// Task watchdog controller.
///
/// Create one per watched system, call [`init`](Self::init), then have each
/// task (or named user) subscribe and check in at least once per timeout
/// period. Share it between threads with an `Arc`.
///
/// ```rust
/// use std::sync::Arc;
/// use twdt::prelude::*;
/// use twdt_timer::ManualTimerBackend;
///
/// let clock = ManualTimerBackend::new();
/// let watchdog = TaskWatchdog::new(
///     Arc::new(HostPlatform::with_cores(2)),
///     Arc::new(clock.clone()),
/// );
/// watchdog.init(WdtConfig::new(100)?)?;
///
/// let user = watchdog.add_user("telemetry")?;
/// assert!(watchdog.is_running());
/// watchdog.reset_user(user)?;
///
/// watchdog.delete_user(user)?;
/// watchdog.deinit()?;
/// # Ok::<(), TwdtError>(())
/// ```
pub struct TaskWatchdog {
    shared: Arc<Shared>,
}

impl TaskWatchdog {
    /// Controller for `platform`, drawing its timer from `backend`.
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, backend: Arc<dyn TimerBackend>) -> Self {
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            platform,
            backend,
            state: Mutex::new(None),
            sink: RwLock::new(None),
            metrics: MetricsCounters::default(),
            next_user: AtomicU64::new(0),
        });
        Self { shared }
    }

    /// Controller on the host OS with a thread-driven timer.
    #[must_use]
    pub fn host() -> Self {
        Self::new(
            Arc::new(HostPlatform::new()),
            Arc::new(ThreadTimerBackend::new()),
        )
    }

    /// Platform the controller runs on.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.shared.platform
    }

    /// Initialize with `config`.
    ///
    /// Allocates the timer and subscribes the idle task of every core in
    /// `config.idle_core_mask`. The timer starts as soon as something is
    /// subscribed.
    ///
    /// # Errors
    ///
    /// `InvalidState` if already initialized, `InvalidArgument` for an
    /// invalid configuration, `NoMemory` if the timer cannot be allocated.
    pub fn init(&self, config: WdtConfig) -> TwdtResult<()> {
        let shared = &self.shared;
        config.validate_for_cores(shared.platform.core_count())?;

        let mut guard = shared.state.lock();
        if guard.is_some() {
            return Err(TwdtError::invalid_state(
                "task watchdog is already initialized",
            ));
        }

        let timer = shared
            .backend
            .allocate(config.timeout(), shared.timeout_callback())?;
        let mut state = State {
            config,
            registry: Registry::new(),
            timer,
            run: RunState::Stopped,
            idle_cores: CoreMask::EMPTY,
        };
        let armed = shared
            .sync_idle(&mut state, config.idle_cores())
            .and_then(|()| state.feed_if_all_reset(&shared.metrics));
        if let Err(err) = armed {
            drop(state.release(shared.platform.as_ref()));
            return Err(err);
        }
        *guard = Some(state);
        drop(guard);

        tracing::info!(
            timeout_ms = config.timeout_ms,
            idle_cores = %config.idle_cores(),
            trigger_panic = config.trigger_panic,
            backend = shared.backend.name(),
            "Task watchdog initialized"
        );
        Ok(())
    }

    /// Replace the configuration.
    ///
    /// Only allowed while the timer is not running. Idle subscriptions are
    /// added or removed to match the new mask; the new timeout applies from
    /// the next time the timer is armed. On error nothing changes.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized or running, `InvalidArgument` for an
    /// invalid configuration.
    pub fn reconfigure(&self, config: WdtConfig) -> TwdtResult<()> {
        let shared = &self.shared;
        config.validate_for_cores(shared.platform.core_count())?;

        shared.with_state(|state| {
            if state.run == RunState::Running {
                return Err(TwdtError::invalid_state(
                    "task watchdog must be stopped to reconfigure",
                ));
            }
            state.timer.reconfigure(config.timeout())?;
            if let Err(err) = shared.sync_idle(state, config.idle_cores()) {
                if state.timer.reconfigure(state.config.timeout()).is_err() {
                    tracing::warn!("Failed to restore the watchdog timer period");
                }
                return Err(err);
            }
            state.config = config;
            Ok(())
        })?;

        tracing::info!(
            timeout_ms = config.timeout_ms,
            idle_cores = %config.idle_cores(),
            trigger_panic = config.trigger_panic,
            "Task watchdog reconfigured"
        );
        Ok(())
    }

    /// Tear down the watchdog.
    ///
    /// Idle tasks subscribed through `idle_core_mask` are unsubscribed
    /// automatically. Every other task and user must have been deleted first.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized or if tasks or users other than idle
    /// tasks are still subscribed; the watchdog is left untouched.
    pub fn deinit(&self) -> TwdtResult<()> {
        let platform = self.shared.platform.as_ref();
        let mut timer = {
            let mut guard = self.shared.lock_initialized()?;
            let Some(state) = guard.take() else {
                return Err(TwdtError::uninitialized());
            };
            let remaining = state
                .registry
                .iter()
                .filter(|(id, _)| !state.is_idle_subscription(*id, platform))
                .count();
            if remaining > 0 {
                *guard = Some(state);
                return Err(TwdtError::invalid_state(format!(
                    "{remaining} tasks/users are still subscribed"
                )));
            }
            state.release(platform)
        };

        timer.free()?;
        tracing::info!("Task watchdog deinitialized");
        Ok(())
    }

    /// Subscribe a task; `None` subscribes the calling task.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `InvalidArgument` if the task is
    /// already subscribed.
    pub fn add(&self, task: Option<TaskId>) -> TwdtResult<()> {
        let task = self.resolve(task);
        let name = self.shared.platform.task_name(task);
        self.shared
            .with_state(|state| state.subscribe(Identity::Task(task), name, &self.shared.metrics))?;
        tracing::debug!(task = %task, "Task subscribed to watchdog");
        Ok(())
    }

    /// Subscribe a named user.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `InvalidArgument` for a blank name.
    pub fn add_user(&self, name: &str) -> TwdtResult<UserHandle> {
        if name.trim().is_empty() {
            return Err(TwdtError::invalid_argument("user name must not be empty"));
        }
        let handle = UserHandle::new(self.shared.next_user.fetch_add(1, Ordering::Relaxed));
        let name: Arc<str> = Arc::from(name);
        self.shared.with_state(|state| {
            state.subscribe(Identity::User(handle), Arc::clone(&name), &self.shared.metrics)
        })?;
        tracing::debug!(user = %handle, name = %name, "User subscribed to watchdog");
        Ok(handle)
    }

    /// Check in for the calling task.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `NotFound` if the calling task is not
    /// subscribed.
    pub fn reset(&self) -> TwdtResult<()> {
        self.reset_task(self.shared.platform.current_task())
    }

    /// Check in for a named user.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `NotFound` if the user is not
    /// subscribed.
    pub fn reset_user(&self, user: UserHandle) -> TwdtResult<()> {
        self.shared
            .with_state(|state| state.check_in(Identity::User(user), &self.shared.metrics))
    }

    /// Check in for the calling task, subscribing it first if needed.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn feed(&self) -> TwdtResult<()> {
        let task = self.shared.platform.current_task();
        let id = Identity::Task(task);
        let metrics = &self.shared.metrics;
        let subscribed = self.shared.with_state(|state| {
            if state.registry.contains(id) {
                state.check_in(id, metrics)?;
                Ok(false)
            } else {
                state.subscribe(id, self.shared.platform.task_name(task), metrics)?;
                metrics.record_check_in();
                Ok(true)
            }
        })?;
        if subscribed {
            tracing::debug!(task = %task, "Task subscribed to watchdog by feed");
        }
        Ok(())
    }

    /// Unsubscribe a task; `None` unsubscribes the calling task.
    ///
    /// Deleting a core's idle task also removes that core's idle hook.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `InvalidArgument` if the task is not
    /// subscribed.
    pub fn delete(&self, task: Option<TaskId>) -> TwdtResult<()> {
        let task = self.resolve(task);
        let shared = &self.shared;
        shared.with_state(|state| {
            state.unsubscribe(Identity::Task(task), shared.platform.as_ref(), &shared.metrics)
        })?;
        tracing::debug!(task = %task, "Task unsubscribed from watchdog");
        Ok(())
    }

    /// Unsubscribe a named user.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized, `InvalidArgument` if the user is not
    /// subscribed.
    pub fn delete_user(&self, user: UserHandle) -> TwdtResult<()> {
        let shared = &self.shared;
        shared.with_state(|state| {
            state.unsubscribe(Identity::User(user), shared.platform.as_ref(), &shared.metrics)
        })?;
        tracing::debug!(user = %user, "User unsubscribed from watchdog");
        Ok(())
    }

    /// Whether a task is subscribed; `None` asks about the calling task.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn status(&self, task: Option<TaskId>) -> TwdtResult<SubscriptionStatus> {
        let task = self.resolve(task);
        self.subscription_status(Identity::Task(task))
    }

    /// Whether a named user is subscribed.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn status_user(&self, user: UserHandle) -> TwdtResult<SubscriptionStatus> {
        self.subscription_status(Identity::User(user))
    }

    /// Suspend the watchdog. Check-ins are still recorded but nothing times
    /// out until [`restart`](Self::restart).
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn stop(&self) -> TwdtResult<()> {
        self.shared
            .with_state(|state| state.halt(RunState::Suspended))?;
        tracing::info!("Task watchdog suspended");
        Ok(())
    }

    /// Start a fresh period: every entity owes a check-in, and the timer runs
    /// if anything is subscribed.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn restart(&self) -> TwdtResult<()> {
        let metrics = &self.shared.metrics;
        let run = self.shared.with_state(|state| {
            if state.registry.is_empty() {
                state.halt(RunState::Stopped)?;
            } else {
                state.feed(metrics)?;
            }
            Ok(state.run)
        })?;
        tracing::info!(state = %run, "Task watchdog restarted");
        Ok(())
    }

    /// Write the entities that have not checked in during the current
    /// period to `sink` and return the cores they are associated with.
    ///
    /// # Errors
    ///
    /// `InvalidState` if uninitialized.
    pub fn print_triggered(&self, sink: &dyn ReportSink) -> TwdtResult<CoreMask> {
        let platform = self.shared.platform.as_ref();
        self.shared.with_state(|state| {
            Ok(report::write_delinquents(
                Output::Sink(sink),
                &state.registry,
                platform,
            ))
        })
    }

    /// Send timeout reports to `sink` instead of the platform console.
    pub fn set_report_sink(&self, sink: Arc<dyn ReportSink>) {
        *self.shared.sink.write() = Some(sink);
    }

    /// Send timeout reports to the platform console again.
    pub fn clear_report_sink(&self) {
        *self.shared.sink.write() = None;
    }

    /// Whether `init` has run without a matching `deinit`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().is_some()
    }

    /// Whether the timer is counting down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_state() == Some(RunState::Running)
    }

    /// Run state, or `None` if uninitialized.
    #[must_use]
    pub fn run_state(&self) -> Option<RunState> {
        self.shared.state.lock().as_ref().map(|state| state.run)
    }

    /// Active configuration, or `None` if uninitialized.
    #[must_use]
    pub fn config(&self) -> Option<WdtConfig> {
        self.shared.state.lock().as_ref().map(|state| state.config)
    }

    /// Number of subscribed tasks and users.
    #[must_use]
    pub fn subscribed_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .as_ref()
            .map_or(0, |state| state.registry.len())
    }

    /// Activity counters.
    #[must_use]
    pub fn metrics(&self) -> TwdtMetrics {
        self.shared.metrics.snapshot()
    }

    pub(crate) fn reset_task(&self, task: TaskId) -> TwdtResult<()> {
        self.shared
            .with_state(|state| state.check_in(Identity::Task(task), &self.shared.metrics))
    }

    fn subscription_status(&self, id: Identity) -> TwdtResult<SubscriptionStatus> {
        self.shared.with_state(|state| {
            Ok(if state.registry.contains(id) {
                SubscriptionStatus::Subscribed
            } else {
                SubscriptionStatus::NotSubscribed
            })
        })
    }

    fn resolve(&self, task: Option<TaskId>) -> TaskId {
        task.unwrap_or_else(|| self.shared.platform.current_task())
    }
}

impl Drop for TaskWatchdog {
    fn drop(&mut self) {
        let state = self.shared.state.lock().take();
        if let Some(state) = state {
            let remaining = state.registry.len();
            let mut timer = state.release(self.shared.platform.as_ref());
            if let Err(err) = timer.free() {
                tracing::warn!(error = %err, "Failed to free watchdog timer");
            }
            tracing::debug!(remaining, "Task watchdog dropped while initialized");
        }
    }
}

impl std::fmt::Debug for TaskWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWatchdog")
            .field("platform", &self.shared.platform)
            .field("backend", &self.shared.backend.name())
            .field("state", &*self.shared.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twdt_timer::ManualTimerBackend;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn manual(cores: u32) -> (TaskWatchdog, ManualTimerBackend, Arc<HostPlatform>) {
        let platform = Arc::new(HostPlatform::with_cores(cores));
        let clock = ManualTimerBackend::new();
        let watchdog = TaskWatchdog::new(
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::new(clock.clone()),
        );
        (watchdog, clock, platform)
    }

    #[test]
    fn test_operations_require_init() {
        let (watchdog, _clock, _platform) = manual(1);
        assert!(!watchdog.is_initialized());
        assert!(matches!(watchdog.add(None), Err(TwdtError::InvalidState(_))));
        assert!(matches!(watchdog.reset(), Err(TwdtError::InvalidState(_))));
        assert!(matches!(watchdog.feed(), Err(TwdtError::InvalidState(_))));
        assert!(matches!(watchdog.deinit(), Err(TwdtError::InvalidState(_))));
        assert!(matches!(
            watchdog.add_user("net"),
            Err(TwdtError::InvalidState(_))
        ));
        assert!(matches!(watchdog.stop(), Err(TwdtError::InvalidState(_))));
        assert_eq!(watchdog.run_state(), None);
        assert_eq!(watchdog.subscribed_count(), 0);
    }

    #[test]
    fn test_double_init_rejected() -> TestResult {
        let (watchdog, _clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        assert!(matches!(
            watchdog.init(WdtConfig::new(100)?),
            Err(TwdtError::InvalidState(_))
        ));
        Ok(())
    }

    #[test]
    fn test_first_subscription_starts_timer() -> TestResult {
        let (watchdog, clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        assert_eq!(watchdog.run_state(), Some(RunState::Stopped));
        assert!(!clock.is_running());

        watchdog.add(None)?;
        assert!(watchdog.is_running());
        assert!(clock.is_running());

        watchdog.delete(None)?;
        assert_eq!(watchdog.run_state(), Some(RunState::Stopped));
        assert!(!clock.is_running());
        Ok(())
    }

    #[test]
    fn test_feed_waits_for_every_entity() -> TestResult {
        let (watchdog, clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        let a = watchdog.add_user("a")?;
        // `b` joins counted as checked in; `a` owes one since the feed on add.
        let b = watchdog.add_user("b")?;
        let feeds = watchdog.metrics().feeds;

        watchdog.reset_user(b)?;
        assert_eq!(watchdog.metrics().feeds, feeds);
        watchdog.reset_user(a)?;
        assert_eq!(watchdog.metrics().feeds, feeds + 1);

        // The next round again needs both.
        watchdog.reset_user(a)?;
        assert_eq!(watchdog.metrics().feeds, feeds + 1);
        watchdog.reset_user(b)?;
        assert_eq!(watchdog.metrics().feeds, feeds + 2);
        assert_eq!(clock.elapsed(), Some(std::time::Duration::ZERO));
        Ok(())
    }

    #[test]
    fn test_feed_auto_subscribes() -> TestResult {
        let (watchdog, _clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        assert_eq!(watchdog.status(None)?, SubscriptionStatus::NotSubscribed);

        watchdog.feed()?;
        assert!(watchdog.status(None)?.is_subscribed());
        watchdog.feed()?;
        assert_eq!(watchdog.subscribed_count(), 1);
        Ok(())
    }

    #[test]
    fn test_blank_user_name_rejected() -> TestResult {
        let (watchdog, _clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        assert!(matches!(
            watchdog.add_user("  "),
            Err(TwdtError::InvalidArgument(_))
        ));
        assert_eq!(watchdog.subscribed_count(), 0);
        Ok(())
    }

    #[test]
    fn test_idle_mask_out_of_range() -> TestResult {
        let (watchdog, _clock, _platform) = manual(2);
        let config = WdtConfig::builder().timeout_ms(100).idle_core(2).build()?;
        assert!(matches!(
            watchdog.init(config),
            Err(TwdtError::InvalidArgument(_))
        ));
        assert!(!watchdog.is_initialized());
        Ok(())
    }

    #[test]
    fn test_drop_releases_timer_and_hooks() -> TestResult {
        let (watchdog, clock, platform) = manual(2);
        let config = WdtConfig::builder().timeout_ms(100).idle_core(0).build()?;
        watchdog.init(config)?;
        watchdog.add_user("left behind")?;
        assert!(clock.has_live_timer());

        drop(watchdog);
        assert!(!clock.has_live_timer());
        assert!(!platform.idle_tick(0));
        Ok(())
    }

    #[test]
    fn test_debug_output() -> TestResult {
        let (watchdog, _clock, _platform) = manual(1);
        watchdog.init(WdtConfig::new(100)?)?;
        let debug = format!("{watchdog:?}");
        assert!(debug.contains("TaskWatchdog"));
        assert!(debug.contains("manual"));
        Ok(())
    }
}
