//! Originator side of the store and compare-and-set broadcasts.

use core::sync::atomic::{fence, Ordering};

use crate::cpumask::{CpuId, CpuSet};
use crate::kpanic;
use crate::platform::Platform;
use crate::space::AddressSpace;

use super::record::{InvalMode, PageEntry};
use super::Shootdown;

impl<P: Platform> Shootdown<P> {
    /// Overwrite `slot` with `new_value` and make the change globally
    /// effective: on return, no core holds a cached translation for
    /// `address..address+page_count` that predates the write. Returns the
    /// value the slot held.
    pub fn invalidate_store(
        &self,
        space: &AddressSpace,
        slot: &PageEntry,
        address: u64,
        page_count: usize,
        new_value: u64,
    ) -> u64 {
        let cpu = self.platform.current_cpu();
        let (old, _) = self.invalidate(
            cpu,
            space,
            Some(slot),
            address,
            page_count,
            0,
            new_value,
            InvalMode::Store,
        );
        self.stats.store_ops.incr();
        old
    }

    /// Conditionally swing `slot` from `old_value` to `new_value`. Whether
    /// the compare succeeds or not, every participant flushes: a failed
    /// compare means some other agent already changed the entry, and cached
    /// translations must match whatever is now true.
    pub fn invalidate_compare_set(
        &self,
        space: &AddressSpace,
        slot: &PageEntry,
        address: u64,
        old_value: u64,
        new_value: u64,
    ) -> bool {
        let cpu = self.platform.current_cpu();
        let (_, success) = self.invalidate(
            cpu,
            space,
            Some(slot),
            address,
            1,
            old_value,
            new_value,
            InvalMode::CompareSet,
        );
        self.stats.compare_set_ops.incr();
        success
    }

    /// Pure-flush broadcast with no entry write; the bulk coalescer's
    /// synchronization step.
    pub(crate) fn broadcast_flush(&self, space: &AddressSpace, address: u64, page_count: usize) {
        let cpu = self.platform.current_cpu();
        self.invalidate(
            cpu,
            space,
            None,
            address,
            page_count,
            0,
            0,
            InvalMode::Store,
        );
        self.stats.store_ops.incr();
    }

    #[allow(clippy::too_many_arguments)]
    fn invalidate(
        &self,
        cpu: CpuId,
        space: &AddressSpace,
        slot: Option<&PageEntry>,
        address: u64,
        page_count: usize,
        old_value: u64,
        new_value: u64,
        mode: InvalMode,
    ) -> (u64, bool) {
        // Serialize originators on this space. Participant cores are not
        // affected until they are actually signaled.
        while !space.try_begin() {
            if !self.service_one_pass(cpu) {
                self.platform.relax();
            }
        }

        // Participant set is sampled after the gate is held so no concurrent
        // originator can retire cores out from under us mid-arm.
        let mut participants = space.active_cores().intersection(self.platform.online_cores());
        participants.insert(cpu);

        let result = if participants == CpuSet::single(cpu) {
            // Nobody else can hold a translation: update in place. Signaling
            // here would hang the handshake on cores with nothing to
            // acknowledge, so this path is required, not an optimization.
            self.stats.fast_path_ops.incr();
            self.local_update(slot, address, page_count, old_value, new_value, mode)
        } else {
            self.smp_invalidate(
                cpu,
                participants,
                slot,
                address,
                page_count,
                old_value,
                new_value,
                mode,
            )
        };

        space.end_invalidation();
        result
    }

    fn local_update(
        &self,
        slot: Option<&PageEntry>,
        address: u64,
        page_count: usize,
        old_value: u64,
        new_value: u64,
        mode: InvalMode,
    ) -> (u64, bool) {
        let mut old = 0;
        let mut success = true;
        match mode {
            InvalMode::Store => {
                if let Some(slot) = slot {
                    old = slot.swap(new_value);
                }
            }
            InvalMode::CompareSet => match slot {
                Some(slot) => success = slot.compare_set(old_value, new_value),
                None => kpanic!("shootdown: compare-set without an entry slot"),
            },
            InvalMode::Idle => kpanic!("shootdown: local update with no operation armed"),
        }
        self.flush_span(address, page_count);
        (old, success)
    }

    /// The full broadcast handshake.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn smp_invalidate(
        &self,
        cpu: CpuId,
        participants: CpuSet,
        slot: Option<&PageEntry>,
        address: u64,
        page_count: usize,
        old_value: u64,
        new_value: u64,
        mode: InvalMode,
    ) -> (u64, bool) {
        if !participants.contains(cpu) {
            kpanic!(
                "shootdown: core {} missing from its own participant set {}",
                cpu,
                participants
            );
        }

        let rec = self.record(cpu);
        if rec.mode() != InvalMode::Idle {
            kpanic!(
                "shootdown: core {} arming a record that is not idle (mode {:?})",
                cpu,
                rec.mode()
            );
        }

        // Expose the record to dispatch passes before any signal can arrive.
        self.originators.insert(cpu, Ordering::SeqCst);

        rec.arm(address, page_count, slot, old_value, new_value, mode, participants);
        rec.set_deadline(
            self.platform
                .monotonic_now()
                .wrapping_add(self.tunables.watchdog_timeout_ticks),
        );

        // A stale signal-in-flight mark on this core belongs to an older
        // handshake. It must be gone before we broadcast, or the watchdog's
        // later re-delivery bookkeeping could mistake it for ours.
        self.posted.remove(cpu, Ordering::SeqCst);

        // Publish: every field store above must be visible before any
        // participant finds its bit set in `pending`.
        fence(Ordering::Release);
        rec.pending.store(participants, Ordering::Release);

        self.signal(cpu, participants);

        // Spin until every participant, ourselves included, has acknowledged
        // (the dispatch pass performs our entry write). The loop is a
        // dispatcher, not a dumb spin: it services foreign requests so two
        // cores waiting on each other always drain.
        let mut retries: u32 = 0;
        while !rec.pending.load(Ordering::Acquire).is_empty() {
            if !self.service_one_pass(cpu) {
                self.platform.relax();
            }
            self.watchdog_poll(cpu, rec, &mut retries);
        }
        fence(Ordering::Acquire);

        let old = rec.old_value();
        let success = rec.success();

        // Only the originator retires its record.
        rec.set_mode(InvalMode::Idle);
        self.originators.remove(cpu, Ordering::SeqCst);

        (old, success)
    }

    /// Signal every participant except the originator, coalescing onto
    /// deliveries already in flight.
    pub(crate) fn signal(&self, cpu: CpuId, participants: CpuSet) {
        let targets = participants.without(CpuSet::single(cpu));
        if targets.is_empty() {
            return;
        }
        let prior = self.posted.fetch_union(targets, Ordering::SeqCst);
        let fresh = targets.without(prior);
        if !fresh.is_empty() {
            self.stats.signals_sent.add(fresh.count() as u64);
            self.platform.send_signal(fresh);
        }
    }
}
