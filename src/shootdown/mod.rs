//! Cross-Core Invalidation Coordinator
//!
//! One core rewrites a shared mapping entry while every other core that may
//! hold a cached translation flushes it, and the call does not return until
//! the change is globally effective. The moving parts:
//!
//! - `record`: the per-core request records responders read
//! - `originator`: the store and compare-and-set broadcast protocols
//! - `responder`: the dispatch pass every core runs, from the signal handler
//!   and from inside every spin-wait
//! - `bulk`: the kernel-space batch coalescer
//! - `watchdog`: lost-signal detection and re-delivery
//! - `stats`: subsystem counters
//!
//! # Handshake shape
//!
//! The originator samples the participant set, arms its record, and signals
//! every other participant. Each participant clears its own bit in the
//! record's `pending` mask once it has flushed; the originator performs the
//! entry write itself, flushes, clears its own bit, and spins, still
//! servicing other cores' requests, until `pending` drains. Signals may be
//! lost in transit (hardware and virtualization both do this in practice);
//! the watchdog re-issues them until the handshake drains. Abandoning a
//! handshake is never an option because a participant may already be
//! mid-flush.

mod bulk;
mod originator;
pub(crate) mod record;
mod responder;
mod stats;
mod watchdog;

use core::sync::atomic::Ordering;

pub use bulk::BulkInval;
pub use record::{InvalMode, PageEntry, ALL_ADDRESSES, PAGE_SHIFT, PAGE_SIZE};
pub use stats::InvalStatsSnapshot;

use crate::config::InvalTunables;
use crate::console::RateLimit;
use crate::cpumask::{AtomicCpuSet, CpuId, CpuSet, MAX_CPUS};
use crate::platform::Platform;
use record::InvalRecord;
use stats::InvalStats;

/// The invalidation coordinator. One instance per machine.
pub struct Shootdown<P: Platform> {
    platform: P,
    tunables: InvalTunables,
    /// Arena of per-core records, indexed by core id
    records: [InvalRecord; MAX_CPUS],
    /// Cores with an armed record; the scan set for every dispatch pass
    originators: AtomicCpuSet,
    /// Cores with a signal posted but not yet consumed. Lets overlapping
    /// broadcasts coalesce onto one delivery, and gives the watchdog a mark
    /// to clear when it suspects that delivery never happened.
    posted: AtomicCpuSet,
    stats: InvalStats,
    warn_limit: RateLimit,
}

impl<P: Platform> Shootdown<P> {
    pub fn new(platform: P, tunables: InvalTunables) -> Self {
        Self {
            platform,
            tunables,
            records: [const { InvalRecord::new() }; MAX_CPUS],
            originators: AtomicCpuSet::new(CpuSet::empty()),
            posted: AtomicCpuSet::new(CpuSet::empty()),
            stats: InvalStats::new(),
            warn_limit: RateLimit::new(tunables.warn_interval_ticks),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn tunables(&self) -> &InvalTunables {
        &self.tunables
    }

    pub fn stats(&self) -> InvalStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record(&self, cpu: CpuId) -> &InvalRecord {
        &self.records[cpu]
    }

    /// Cores whose records are currently armed
    pub(crate) fn armed_originators(&self) -> CpuSet {
        self.originators.load(Ordering::Acquire)
    }
}
