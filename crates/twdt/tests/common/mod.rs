//! Shared fixture for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use twdt::prelude::*;
use twdt_test_helpers::prelude::*;
use twdt_timer::ManualTimerBackend;

/// A watchdog on a simulated clock, with recorded reports and aborts.
pub struct Rig {
    pub watchdog: TaskWatchdog,
    pub clock: ManualTimerBackend,
    pub platform: Arc<HostPlatform>,
    pub lines: LineRecorder,
    pub aborts: AbortRecorder,
}

impl Rig {
    pub fn new(cores: u32) -> Self {
        let aborts = AbortRecorder::new();
        let platform =
            Arc::new(HostPlatform::with_cores(cores).with_abort_handler(aborts.handler()));
        let clock = ManualTimerBackend::new();
        let watchdog = TaskWatchdog::new(
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::new(clock.clone()),
        );
        let lines = LineRecorder::new();
        watchdog.set_report_sink(Arc::new(lines.sink()));
        Self {
            watchdog,
            clock,
            platform,
            lines,
            aborts,
        }
    }

    /// Rig initialized with a report-only watchdog of `timeout_ms`.
    pub fn started(cores: u32, timeout_ms: u32) -> Result<Self, TwdtError> {
        let rig = Self::new(cores);
        rig.watchdog.init(WdtConfig::new(timeout_ms)?)?;
        Ok(rig)
    }

    /// Name the platform gives the calling thread.
    pub fn current_task_name(&self) -> String {
        let task = self.platform.current_task();
        self.platform.task_name(task).to_string()
    }
}
