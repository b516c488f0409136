//! The dispatch pass every core runs.
//!
//! Reached from two places: the cross-core signal handler, and every
//! spin-wait inside the coordinator itself (a core waiting out its own
//! broadcast must keep servicing everyone else's, or two concurrent
//! originators would deadlock). The pass is idempotent under arbitrary
//! re-delivery; the watchdog depends on that to make re-signaling safe.

use core::sync::atomic::{fence, Ordering};

use crate::cpumask::CpuId;
use crate::kpanic;
use crate::platform::Platform;

use super::record::{InvalMode, InvalRecord, ALL_ADDRESSES};
use super::Shootdown;

impl<P: Platform> Shootdown<P> {
    /// Signal-handler entry point. The embedding kernel wires its shootdown
    /// interrupt vector here, passing the interrupted core's id.
    ///
    /// Must not nest on a single core: the vector stays masked while the
    /// handler runs (ordinary interrupt-gate behavior), and kernel code
    /// calling into the coordinator holds that vector off. A nested entry
    /// could repeat the originator's entry write.
    pub fn service_interrupt(&self, cpu: CpuId) {
        // Consume the in-flight mark first: any signal posted after this
        // point must produce another delivery rather than coalesce into the
        // one we are already handling.
        self.posted.remove(cpu, Ordering::SeqCst);
        while self.service_one_pass(cpu) {
            self.platform.relax();
        }
    }

    /// One scan over every armed record. Returns whether work remains that
    /// only a later pass can finish (an originator we are waiting on has not
    /// performed its entry write yet).
    pub(crate) fn service_one_pass(&self, cpu: CpuId) -> bool {
        let mut again = false;
        for origin in self.armed_originators().iter() {
            let rec = self.record(origin);
            if !rec.pending.load(Ordering::Acquire).contains(cpu) {
                // Already acknowledged, or not a participant: re-delivery
                // lands here and does nothing.
                continue;
            }
            fence(Ordering::Acquire);
            #[cfg(feature = "inval_debug")]
            self.check_masks(cpu, origin, rec);
            if origin == cpu {
                self.service_own(cpu, rec);
            } else {
                again |= self.service_foreign(cpu, origin, rec);
            }
        }
        again
    }

    /// Participant work for a foreign record. Returns true if the record is
    /// not yet actionable.
    fn service_foreign(&self, cpu: CpuId, origin: CpuId, rec: &InvalRecord) -> bool {
        // The new value is durable only once the originator has cleared its
        // own bit. Flushing before that could let the hardware re-cache the
        // dying translation and defeat the whole exercise.
        if rec.pending.load(Ordering::Acquire).contains(origin) {
            return true;
        }
        fence(Ordering::Acquire);
        self.flush_span(rec.address(), rec.page_count());
        // Flush before acknowledging: an empty pending mask is the
        // originator's proof that the change is globally effective.
        fence(Ordering::Release);
        rec.pending.remove(cpu, Ordering::Release);
        false
    }

    /// Originator work for our own record: the committed entry write, then
    /// the local flush, then the acknowledgement.
    fn service_own(&self, cpu: CpuId, rec: &InvalRecord) {
        match rec.mode() {
            InvalMode::Idle => {
                kpanic!("shootdown: core {} pending on an idle record", cpu);
            }
            InvalMode::Store => {
                let slot = rec.slot();
                if !slot.is_null() {
                    // Only the originating core dereferences the borrowed
                    // slot, and only while the lending call frame is live.
                    let old = unsafe { (*slot).swap(rec.new_value()) };
                    rec.set_old_value(old);
                }
            }
            InvalMode::CompareSet => {
                let slot = rec.slot();
                if slot.is_null() {
                    kpanic!("shootdown: compare-set without an entry slot");
                }
                let success = unsafe { (*slot).compare_set(rec.old_value(), rec.new_value()) };
                rec.set_success(success);
            }
        }
        self.flush_span(rec.address(), rec.page_count());
        // No participant may observe our cleared bit before the new value is
        // globally visible.
        fence(Ordering::Release);
        rec.pending.remove(cpu, Ordering::Release);
    }

    /// Local flush for one request's span, degrading to a full wipe for the
    /// everything-sentinel and for spans too wide to walk page-by-page.
    pub(crate) fn flush_span(&self, address: u64, pages: usize) {
        if address == ALL_ADDRESSES || pages > self.tunables.max_page_loop {
            self.stats.full_flushes.incr();
            self.platform.local_flush_all();
        } else if pages == 1 {
            self.platform.local_flush_page(address);
        } else {
            self.platform.local_flush_range(address, pages);
        }
    }

    #[cfg(feature = "inval_debug")]
    fn check_masks(&self, cpu: CpuId, origin: CpuId, rec: &InvalRecord) {
        let participants = rec.participants();
        if !participants.contains(origin) {
            kpanic!(
                "shootdown: record {} participants {} exclude the originator",
                origin,
                participants
            );
        }
        let pending = rec.pending.load(Ordering::Acquire);
        if !pending.without(participants).is_empty() {
            kpanic!(
                "shootdown: record {} pending {} outside participants {} (seen from core {})",
                origin,
                pending,
                participants,
                cpu
            );
        }
    }
}
