//! Watchdog counters.

use crate::entity::CoreMask;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Snapshot of watchdog activity since the controller was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TwdtMetrics {
    /// Times the timer was re-armed because every entity checked in.
    pub feeds: u64,
    /// Check-ins from tasks, users and idle hooks.
    pub check_ins: u64,
    /// Expiries that found a delinquent entity.
    pub timeouts: u64,
    /// Timeouts that ended in an abort.
    pub aborts: u64,
    /// Expiries discarded because a feed raced them.
    pub stale_ticks: u64,
    /// Cores associated with the delinquents of the latest timeout.
    pub last_failed_cores: CoreMask,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsCounters {
    feeds: AtomicU64,
    check_ins: AtomicU64,
    timeouts: AtomicU64,
    aborts: AtomicU64,
    stale_ticks: AtomicU64,
    last_failed_cores: AtomicU32,
}

impl MetricsCounters {
    pub(crate) fn record_feed(&self) {
        self.feeds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_check_in(&self) {
        self.check_ins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self, failed: CoreMask) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        self.last_failed_cores.store(failed.bits(), Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_tick(&self) {
        self.stale_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TwdtMetrics {
        TwdtMetrics {
            feeds: self.feeds.load(Ordering::Relaxed),
            check_ins: self.check_ins.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            stale_ticks: self.stale_ticks.load(Ordering::Relaxed),
            last_failed_cores: CoreMask::from_bits(self.last_failed_cores.load(Ordering::Relaxed)),
        }
    }
}
