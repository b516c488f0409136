//! Subsystem counters, exported for `sysctl`-style introspection.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub(crate) fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub(crate) struct InvalStats {
    pub(crate) store_ops: Counter,
    pub(crate) compare_set_ops: Counter,
    pub(crate) fast_path_ops: Counter,
    pub(crate) bulk_flushes: Counter,
    pub(crate) signals_sent: Counter,
    pub(crate) watchdog_retries: Counter,
    pub(crate) full_flushes: Counter,
}

impl InvalStats {
    pub(crate) const fn new() -> Self {
        Self {
            store_ops: Counter::new(),
            compare_set_ops: Counter::new(),
            fast_path_ops: Counter::new(),
            bulk_flushes: Counter::new(),
            signals_sent: Counter::new(),
            watchdog_retries: Counter::new(),
            full_flushes: Counter::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> InvalStatsSnapshot {
        InvalStatsSnapshot {
            store_ops: self.store_ops.get(),
            compare_set_ops: self.compare_set_ops.get(),
            fast_path_ops: self.fast_path_ops.get(),
            bulk_flushes: self.bulk_flushes.get(),
            signals_sent: self.signals_sent.get(),
            watchdog_retries: self.watchdog_retries.get(),
            full_flushes: self.full_flushes.get(),
        }
    }
}

/// Point-in-time copy of the coordinator's counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvalStatsSnapshot {
    /// Completed store broadcasts (including bulk flush broadcasts)
    pub store_ops: u64,
    /// Completed compare-and-set broadcasts
    pub compare_set_ops: u64,
    /// Requests satisfied locally with no cross-core signal
    pub fast_path_ops: u64,
    /// Bulk contexts that issued a broadcast
    pub bulk_flushes: u64,
    /// Cores actually signaled (coalesced signals are not counted)
    pub signals_sent: u64,
    /// Watchdog recoveries (re-issued signals after a suspected loss)
    pub watchdog_retries: u64,
    /// Local flushes that degraded to a full translation-cache wipe
    pub full_flushes: u64,
}
