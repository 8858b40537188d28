//! Polling helpers for tests that depend on real timers.

use std::thread;
use std::time::{Duration, Instant};

/// Upper bound used by [`wait_until_default`].
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `condition` until it holds or `timeout` passes. Returns whether it
/// held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// [`wait_until`] with [`DEFAULT_WAIT`].
pub fn wait_until_default(condition: impl FnMut() -> bool) -> bool {
    wait_until(DEFAULT_WAIT, condition)
}
