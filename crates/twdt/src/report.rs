//! Timeout diagnostics.
//!
//! The timeout path runs with the controller lock held and may be the last
//! thing the process does, so report lines are formatted into fixed-capacity
//! stack buffers and written straight to a [`ReportSink`] or the platform
//! console. Nothing here allocates or goes through `tracing`.

use crate::entity::{CoreMask, Identity};
use crate::platform::Platform;
use crate::registry::Registry;
use std::fmt::{self, Write};

/// First line of every timeout report.
pub const TRIGGER_HEADER: &str =
    "Task watchdog got triggered. The following tasks/users did not reset the watchdog in time:";

/// Last line of a report that ends in an abort.
pub const ABORT_LINE: &str = "Aborting.";

/// Maximum length of a report line in bytes. Longer lines are truncated.
pub const REPORT_LINE_CAPACITY: usize = 128;

/// Destination for timeout report lines.
///
/// Called with the controller lock held: implementations must not call back
/// into the watchdog and should not block.
pub trait ReportSink: Send + Sync {
    /// Receive one report line, without trailing newline.
    fn report(&self, line: &str);
}

impl<F> ReportSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, line: &str) {
        self(line);
    }
}

/// A report line in a fixed-capacity buffer.
#[derive(Debug, Default)]
pub struct ReportLine {
    buf: heapless::String<REPORT_LINE_CAPACITY>,
    truncated: bool,
}

impl ReportLine {
    /// Empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Format `args` into a new line, truncating at capacity.
    #[must_use]
    pub fn format(args: fmt::Arguments<'_>) -> Self {
        let mut line = Self::new();
        if line.write_fmt(args).is_err() {
            // Only reachable if a Display impl fails; keep what was written.
            line.truncated = true;
        }
        line
    }

    /// Line contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }

    /// Whether text was dropped at capacity.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Write for ReportLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }
        for ch in s.chars() {
            if self.buf.push(ch).is_err() {
                self.truncated = true;
                break;
            }
        }
        Ok(())
    }
}

/// Where the timeout path writes its lines.
#[derive(Clone, Copy)]
pub(crate) enum Output<'a> {
    Sink(&'a dyn ReportSink),
    Console(&'a dyn Platform),
}

impl<'a> Output<'a> {
    pub(crate) fn new(sink: Option<&'a dyn ReportSink>, platform: &'a dyn Platform) -> Self {
        match sink {
            Some(sink) => Self::Sink(sink),
            None => Self::Console(platform),
        }
    }

    pub(crate) fn emit(self, args: fmt::Arguments<'_>) {
        let line = ReportLine::format(args);
        match self {
            Self::Sink(sink) => sink.report(line.as_str()),
            Self::Console(platform) => platform.console_write(line.as_str()),
        }
    }
}

/// Write the delinquent entities of `registry` and return the cores they
/// are associated with. Writes nothing if every entity checked in.
pub(crate) fn write_delinquents(
    out: Output<'_>,
    registry: &Registry,
    platform: &dyn Platform,
) -> CoreMask {
    let all_cores = CoreMask::all(platform.core_count());
    let mut failed = CoreMask::EMPTY;
    let mut header_written = false;

    for (id, entry) in registry.delinquent() {
        if !header_written {
            out.emit(format_args!("{TRIGGER_HEADER}"));
            header_written = true;
        }
        match id {
            Identity::Task(task) => {
                let cores = platform
                    .task_affinity(task)
                    .map_or(all_cores, CoreMask::single);
                failed = failed.union(cores);
                out.emit(format_args!(" - {} (CPU {cores})", entry.name()));
            }
            Identity::User(_) => out.emit(format_args!(" - {}", entry.name())),
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TaskId;
    use crate::platform::HostPlatform;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_short_line_fits() {
        let line = ReportLine::format(format_args!(" - {} (CPU {})", "worker", 0));
        assert_eq!(line.as_str(), " - worker (CPU 0)");
        assert!(!line.is_truncated());
    }

    #[test]
    fn test_long_line_truncated() {
        let long = "x".repeat(300);
        let line = ReportLine::format(format_args!(" - {long}"));
        assert_eq!(line.as_str().len(), REPORT_LINE_CAPACITY);
        assert!(line.is_truncated());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let wide = "é".repeat(100);
        let line = ReportLine::format(format_args!("{wide}"));
        assert!(line.as_str().len() <= REPORT_LINE_CAPACITY);
        assert!(line.as_str().chars().all(|c| c == 'é'));
        assert!(line.is_truncated());
    }

    #[test]
    fn test_closure_is_a_sink() {
        let lines = Mutex::new(Vec::new());
        let sink = |line: &str| lines.lock().push(line.to_owned());
        let platform = HostPlatform::with_cores(1);
        Output::new(Some(&sink as &dyn ReportSink), &platform).emit(format_args!("hello"));
        assert_eq!(*lines.lock(), vec!["hello".to_owned()]);
    }

    #[test]
    fn test_write_delinquents() -> TestResult {
        let platform = HostPlatform::with_cores(2);
        let idle1 = platform.idle_task(1).ok_or("no idle task")?;
        let unpinned = TaskId::from_raw(u64::MAX);

        let mut registry = Registry::new();
        registry.insert(Identity::Task(idle1), "IDLE1")?;
        registry.insert(Identity::Task(unpinned), "free-runner")?;
        registry.clear_reset_flags();
        registry.mark_reset(Identity::Task(unpinned))?;

        let lines = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&lines);
        let sink = move |line: &str| recorder.lock().push(line.to_owned());

        let out = Output::new(Some(&sink as &dyn ReportSink), &platform);
        let failed = write_delinquents(out, &registry, &platform);
        assert_eq!(failed, CoreMask::single(1));
        assert_eq!(
            *lines.lock(),
            vec![TRIGGER_HEADER.to_owned(), " - IDLE1 (CPU 1)".to_owned()]
        );

        lines.lock().clear();
        registry.clear_reset_flags();
        let out = Output::new(Some(&sink as &dyn ReportSink), &platform);
        let failed = write_delinquents(out, &registry, &platform);
        assert_eq!(failed, CoreMask::all(2));
        assert_eq!(
            lines.lock().get(2).map(String::as_str),
            Some(" - free-runner (CPU 0/1)")
        );
        Ok(())
    }

    #[test]
    fn test_nothing_written_when_all_reset() -> TestResult {
        let platform = HostPlatform::with_cores(1);
        let mut registry = Registry::new();
        registry.insert(Identity::Task(TaskId::from_raw(u64::MAX)), "ok")?;

        let lines = Mutex::new(Vec::<String>::new());
        let sink = |line: &str| lines.lock().push(line.to_owned());
        let out = Output::new(Some(&sink as &dyn ReportSink), &platform);
        let failed = write_delinquents(out, &registry, &platform);
        assert!(failed.is_empty());
        assert!(lines.lock().is_empty());
        Ok(())
    }
}
