//! The collaborator seam.
//!
//! Everything the coordinator needs from the rest of the kernel (core
//! identity, the online-core mask, cross-core signal delivery, the local
//! translation-cache flush primitives and a monotonic clock) comes through
//! this trait. The production x86_64 wiring lives in [`crate::arch`]; tests
//! substitute a mock.

use crate::cpumask::{CpuId, CpuSet};

pub trait Platform: Send + Sync {
    /// Id of the core executing the caller
    fn current_cpu(&self) -> CpuId;

    /// Conservative superset of the cores currently able to run kernel code.
    /// False positives cost one wasted signal; false negatives lose
    /// acknowledgements and are not tolerated.
    fn online_cores(&self) -> CpuSet;

    /// Best-effort cross-core notification. Delivery may be lost; the
    /// coordinator's watchdog re-issues signals that go unanswered.
    fn send_signal(&self, targets: CpuSet);

    /// Drop any cached translation for one page on the calling core
    fn local_flush_page(&self, va: u64);

    /// Drop cached translations for `pages` consecutive pages
    fn local_flush_range(&self, va: u64, pages: usize);

    /// Drop every cached translation on the calling core
    fn local_flush_all(&self);

    /// Monotonic tick counter, comparable against
    /// [`crate::config::InvalTunables`] intervals
    fn monotonic_now(&self) -> u64;

    /// Spin-wait hint issued between dispatch passes
    fn relax(&self) {
        core::hint::spin_loop();
    }
}
