//! Idle-hook adapter.
//!
//! A platform runs the hook registered for a core on every iteration of that
//! core's idle loop. The watchdog installs one hook per core named in
//! `idle_core_mask`; the hook checks in on behalf of the core's idle task, so
//! a core that never gets to idle (because some task hogs it) starves the
//! watchdog.

use crate::entity::{CoreMask, TaskId};
use crate::error::{TwdtError, TwdtResult};
use crate::platform::Platform;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Callback run from a core's idle loop. Returns `true` if it handled the
/// iteration.
pub type IdleHook = Arc<dyn Fn() -> bool + Send + Sync>;

/// Per-core idle hook storage for [`Platform`] implementations.
///
/// Hooks are cloned out of the table before they run, so a hook may
/// register or deregister hooks without deadlocking.
#[derive(Default)]
pub struct IdleHookTable {
    hooks: RwLock<BTreeMap<u32, IdleHook>>,
}

impl IdleHookTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `hook` on `core`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `core` already has a hook.
    pub fn register(&self, core: u32, hook: IdleHook) -> TwdtResult<()> {
        let mut hooks = self.hooks.write();
        if hooks.contains_key(&core) {
            return Err(TwdtError::invalid_state(format!(
                "an idle hook is already registered on CPU {core}"
            )));
        }
        hooks.insert(core, hook);
        Ok(())
    }

    /// Remove the hook on `core`. Returns whether one was installed.
    pub fn deregister(&self, core: u32) -> bool {
        self.hooks.write().remove(&core).is_some()
    }

    /// Run the hook on `core`, if any. Returns the hook's verdict.
    pub fn run(&self, core: u32) -> bool {
        let hook = self.hooks.read().get(&core).cloned();
        hook.is_some_and(|hook| hook())
    }

    /// Cores that currently have a hook.
    #[must_use]
    pub fn installed(&self) -> CoreMask {
        let mut mask = CoreMask::EMPTY;
        for core in self.hooks.read().keys() {
            mask.insert(*core);
        }
        mask
    }
}

impl std::fmt::Debug for IdleHookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleHookTable")
            .field("installed", &self.installed())
            .finish()
    }
}

/// Receiver of idle check-ins.
pub(crate) trait IdleCheckIn: Send + Sync {
    /// Check in on behalf of `task`. Returns `false` if the watchdog no
    /// longer watches it.
    fn idle_check_in(&self, task: TaskId) -> bool;
}

/// Install the idle hook for `core`, checking in as `task`.
///
/// The hook holds only a weak reference, so a platform that outlives the
/// watchdog keeps a harmless hook that reports "not handled".
pub(crate) fn install(
    platform: &dyn Platform,
    target: Weak<dyn IdleCheckIn>,
    core: u32,
    task: TaskId,
) -> TwdtResult<()> {
    let hook: IdleHook =
        Arc::new(move || target.upgrade().is_some_and(|t| t.idle_check_in(task)));
    platform.register_idle_hook(core, hook)?;
    tracing::debug!(core, task = %task, "Idle hook installed");
    Ok(())
}

/// Remove the idle hook for `core`.
pub(crate) fn uninstall(platform: &dyn Platform, core: u32) {
    if platform.deregister_idle_hook(core) {
        tracing::debug!(core, "Idle hook removed");
    } else {
        tracing::debug!(core, "No idle hook to remove");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_run_without_hook() {
        let table = IdleHookTable::new();
        assert!(!table.run(0));
        assert!(table.installed().is_empty());
    }

    #[test]
    fn test_register_run_deregister() -> TestResult {
        let table = IdleHookTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        table.register(
            1,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        )?;

        assert!(table.run(1));
        assert!(table.run(1));
        assert!(!table.run(0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(table.installed(), CoreMask::single(1));

        assert!(table.deregister(1));
        assert!(!table.deregister(1));
        assert!(!table.run(1));
        Ok(())
    }

    #[test]
    fn test_second_hook_on_core_rejected() -> TestResult {
        let table = IdleHookTable::new();
        table.register(0, Arc::new(|| true))?;
        assert!(matches!(
            table.register(0, Arc::new(|| false)),
            Err(TwdtError::InvalidState(_))
        ));
        assert!(table.run(0), "original hook must stay installed");
        Ok(())
    }

    #[test]
    fn test_hook_may_deregister_itself() -> TestResult {
        let table = Arc::new(IdleHookTable::new());
        let weak = Arc::downgrade(&table);
        table.register(
            0,
            Arc::new(move || weak.upgrade().is_some_and(|t| t.deregister(0))),
        )?;

        assert!(table.run(0));
        assert!(table.installed().is_empty());
        Ok(())
    }
}
