//! Operating-system services the watchdog depends on.
//!
//! [`Platform`] is the seam between the watchdog and the scheduler it runs
//! on. [`HostPlatform`] implements it on std threads so the watchdog can run
//! (and be tested) on a desktop OS.

use crate::entity::TaskId;
use crate::error::{TwdtError, TwdtResult};
use crate::idle::{IdleHook, IdleHookTable};
use parking_lot::RwLock;
use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Scheduler services consumed by the watchdog.
///
/// `task_affinity`, `console_write` and `abort` are called from the timeout
/// path while the controller lock is held; they must not block on anything
/// the watchdog could be holding.
pub trait Platform: Send + Sync + std::fmt::Debug {
    /// Number of CPU cores, at most [`CoreMask::MAX_CORES`](crate::CoreMask::MAX_CORES).
    fn core_count(&self) -> u32;

    /// Identity of the calling task.
    fn current_task(&self) -> TaskId;

    /// Idle task of `core`, if the core exists.
    fn idle_task(&self, core: u32) -> Option<TaskId>;

    /// Human-readable task name.
    fn task_name(&self, task: TaskId) -> Arc<str>;

    /// Core the task is pinned to, or `None` if it may run on any core.
    fn task_affinity(&self, task: TaskId) -> Option<u32>;

    /// Install the idle hook of `core`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown core, `InvalidState` if a hook is
    /// already installed there.
    fn register_idle_hook(&self, core: u32, hook: IdleHook) -> TwdtResult<()>;

    /// Remove the idle hook of `core`. Returns whether one was installed.
    fn deregister_idle_hook(&self, core: u32) -> bool;

    /// Write one line to the lowest-level synchronous console.
    fn console_write(&self, line: &str);

    /// Terminate the process. Test platforms may return instead.
    fn abort(&self, reason: &str);
}

/// Replacement for process abort, for tests and simulations.
pub type AbortHandler = Arc<dyn Fn(&str) + Send + Sync>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

fn allocate_task_id() -> TaskId {
    TaskId::from_raw(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Task id of the calling thread, assigned on first use.
fn thread_task_id() -> TaskId {
    CURRENT_TASK.with(|slot| {
        if let Some(id) = slot.get() {
            return id;
        }
        let id = allocate_task_id();
        slot.set(Some(id));
        id
    })
}

/// [`Platform`] backed by std threads.
///
/// Every thread is a task. Idle tasks are synthetic, one per core, named
/// `IDLE<n>`; [`idle_tick`](Self::idle_tick) or an [`IdleLoop`] stands in for
/// the scheduler's idle loop.
pub struct HostPlatform {
    cores: u32,
    idle_tasks: Vec<TaskId>,
    hooks: IdleHookTable,
    names: RwLock<HashMap<TaskId, Arc<str>>>,
    pinned: RwLock<HashMap<TaskId, u32>>,
    abort_handler: Option<AbortHandler>,
}

impl HostPlatform {
    /// Platform with one core per logical CPU, capped at 32.
    #[must_use]
    pub fn new() -> Self {
        let cpus = u32::try_from(num_cpus::get()).unwrap_or(u32::MAX);
        Self::with_cores(cpus)
    }

    /// Platform with `cores` cores, clamped to `1..=32`.
    #[must_use]
    pub fn with_cores(cores: u32) -> Self {
        let cores = cores.clamp(1, crate::CoreMask::MAX_CORES);
        let idle_tasks: Vec<TaskId> = (0..cores).map(|_| allocate_task_id()).collect();
        let names: HashMap<TaskId, Arc<str>> = idle_tasks
            .iter()
            .zip(0u32..)
            .map(|(task, core)| (*task, Arc::<str>::from(format!("IDLE{core}"))))
            .collect();
        Self {
            cores,
            idle_tasks,
            hooks: IdleHookTable::new(),
            names: RwLock::new(names),
            pinned: RwLock::new(HashMap::new()),
            abort_handler: None,
        }
    }

    /// Call `handler` instead of aborting the process.
    #[must_use]
    pub fn with_abort_handler(mut self, handler: AbortHandler) -> Self {
        self.abort_handler = Some(handler);
        self
    }

    /// Pin the calling task to `core`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `core` does not exist.
    pub fn pin_current_task(&self, core: u32) -> TwdtResult<()> {
        self.check_core(core)?;
        self.pinned.write().insert(thread_task_id(), core);
        Ok(())
    }

    /// Run one idle-loop iteration on `core`. Returns whether a hook handled
    /// it.
    pub fn idle_tick(&self, core: u32) -> bool {
        self.hooks.run(core)
    }

    /// Spawn a thread that acts as the idle task of `core`, ticking its idle
    /// hook every `interval` until the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unknown core, `NoMemory` if the thread cannot
    /// be spawned.
    pub fn spawn_idle_loop(self: &Arc<Self>, core: u32, interval: Duration) -> TwdtResult<IdleLoop> {
        let idle = self
            .idle_task(core)
            .ok_or_else(|| TwdtError::invalid_argument(format!("CPU {core} does not exist")))?;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let platform = Arc::clone(self);

        let handle = thread::Builder::new()
            .name(format!("IDLE{core}"))
            .spawn(move || {
                CURRENT_TASK.with(|slot| slot.set(Some(idle)));
                while flag.load(Ordering::Acquire) {
                    platform.idle_tick(core);
                    thread::sleep(interval);
                }
            })
            .map_err(|e| TwdtError::no_memory(format!("failed to spawn idle loop: {e}")))?;

        Ok(IdleLoop {
            core,
            running,
            handle: Some(handle),
        })
    }

    fn check_core(&self, core: u32) -> TwdtResult<()> {
        if core >= self.cores {
            return Err(TwdtError::invalid_argument(format!(
                "CPU {core} does not exist (platform has {} cores)",
                self.cores
            )));
        }
        Ok(())
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPlatform")
            .field("cores", &self.cores)
            .field("hooks", &self.hooks)
            .field("abort_handler", &self.abort_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl Platform for HostPlatform {
    fn core_count(&self) -> u32 {
        self.cores
    }

    fn current_task(&self) -> TaskId {
        let id = thread_task_id();
        if !self.names.read().contains_key(&id) {
            let name: Arc<str> = match thread::current().name() {
                Some(name) => name.into(),
                None => format!("task-{}", id.as_raw()).into(),
            };
            self.names.write().entry(id).or_insert(name);
        }
        id
    }

    fn idle_task(&self, core: u32) -> Option<TaskId> {
        usize::try_from(core)
            .ok()
            .and_then(|index| self.idle_tasks.get(index))
            .copied()
    }

    fn task_name(&self, task: TaskId) -> Arc<str> {
        self.names
            .read()
            .get(&task)
            .cloned()
            .unwrap_or_else(|| format!("task-{}", task.as_raw()).into())
    }

    fn task_affinity(&self, task: TaskId) -> Option<u32> {
        if let Some(core) = self.idle_tasks.iter().position(|idle| *idle == task) {
            return u32::try_from(core).ok();
        }
        // Unknown under contention; reporting "any core" is acceptable.
        self.pinned
            .try_read()
            .and_then(|pinned| pinned.get(&task).copied())
    }

    fn register_idle_hook(&self, core: u32, hook: IdleHook) -> TwdtResult<()> {
        self.check_core(core)?;
        self.hooks.register(core, hook)
    }

    fn deregister_idle_hook(&self, core: u32) -> bool {
        self.hooks.deregister(core)
    }

    fn console_write(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        if writeln!(stderr, "{line}").is_err() {
            // Nowhere left to report to.
        }
    }

    fn abort(&self, reason: &str) {
        match &self.abort_handler {
            Some(handler) => handler(reason),
            None => {
                self.console_write(reason);
                std::process::abort();
            }
        }
    }
}

/// Handle to an idle-loop thread started by [`HostPlatform::spawn_idle_loop`].
/// Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct IdleLoop {
    core: u32,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IdleLoop {
    /// Core this loop idles on.
    #[must_use]
    pub const fn core(&self) -> u32 {
        self.core
    }
}

impl Drop for IdleLoop {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(core = self.core, "Idle loop thread panicked");
            }
        }
    }
}
