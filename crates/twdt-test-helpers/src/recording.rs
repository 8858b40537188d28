//! Recorders for report lines and abort requests.
//!
//! Both hand out `Fn(&str) + Send + Sync` closures, which is the shape the
//! watchdog accepts for report sinks and abort handlers.

use parking_lot::Mutex;
use std::sync::Arc;

/// Collects report lines in order.
#[derive(Debug, Clone, Default)]
pub struct LineRecorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure that appends each line it receives to this recorder.
    pub fn sink(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let lines = Arc::clone(&self.lines);
        move |line: &str| lines.lock().push(line.to_owned())
    }

    /// Snapshot of the recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Whether some line equals `line`.
    #[must_use]
    pub fn contains_line(&self, line: &str) -> bool {
        self.lines.lock().iter().any(|l| l == line)
    }

    /// Whether some line contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }

    /// Number of lines equal to `line`.
    #[must_use]
    pub fn count_line(&self, line: &str) -> usize {
        self.lines.lock().iter().filter(|l| *l == line).count()
    }

    /// Number of recorded lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

/// Records abort requests instead of terminating the process.
#[derive(Debug, Clone, Default)]
pub struct AbortRecorder {
    reasons: Arc<Mutex<Vec<String>>>,
}

impl AbortRecorder {
    /// Recorder with no aborts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort handler that records the reason and returns.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn Fn(&str) + Send + Sync> {
        let reasons = Arc::clone(&self.reasons);
        Arc::new(move |reason: &str| reasons.lock().push(reason.to_owned()))
    }

    /// Number of aborts requested.
    #[must_use]
    pub fn count(&self) -> usize {
        self.reasons.lock().len()
    }

    /// Reasons given, in order.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_recorder() {
        let recorder = LineRecorder::new();
        let sink = recorder.sink();
        sink("header");
        sink(" - worker (CPU 0)");
        sink(" - worker (CPU 0)");

        assert_eq!(recorder.len(), 3);
        assert!(recorder.contains_line("header"));
        assert!(recorder.mentions("worker"));
        assert_eq!(recorder.count_line(" - worker (CPU 0)"), 2);

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_abort_recorder() {
        let recorder = AbortRecorder::new();
        let handler = recorder.handler();
        handler("stuck");
        assert_eq!(recorder.count(), 1);
        assert_eq!(recorder.reasons(), vec!["stuck".to_owned()]);
    }
}
