//! Lost-signal detection and recovery.
//!
//! The cross-core signal is best-effort: real interrupt controllers and
//! hypervisors both drop deliveries under documented errata. A lost signal
//! would park the originator on a pending mask that can never drain, so the
//! originator's spin loop polls a deadline and, on expiry, re-issues the
//! signal to exactly the cores that have not answered. Record contents are
//! untouched (only delivery failed), which is what makes re-signaling safe,
//! together with the responder pass being idempotent.
//!
//! There is no retry bound and no abandonment path: once participants are
//! committed a request must complete, because any of them may already be
//! mid-flush.

use core::sync::atomic::Ordering;

use crate::cpumask::{CpuId, CpuSet};
use crate::platform::Platform;
use crate::{kerror, kwarn};

use super::record::InvalRecord;
use super::Shootdown;

impl<P: Platform> Shootdown<P> {
    /// Called from the originator's spin loop between dispatch passes.
    pub(crate) fn watchdog_poll(&self, cpu: CpuId, rec: &InvalRecord, retries: &mut u32) {
        let now = self.platform.monotonic_now();
        if now < rec.deadline() {
            return;
        }

        let pending = rec.pending.load(Ordering::Acquire);
        let laggards = pending.without(CpuSet::single(cpu));
        rec.set_deadline(now.wrapping_add(self.tunables.watchdog_timeout_ticks));
        if laggards.is_empty() {
            // Only our own work is left; the next dispatch pass finishes it.
            return;
        }

        rec.mark_expired();
        *retries += 1;
        self.stats.watchdog_retries.incr();

        if *retries <= self.tunables.watchdog_verbose_after {
            if self.warn_limit.allow(now) {
                kwarn!(
                    "shootdown: core {} handshake stalled, re-signaling {}",
                    cpu,
                    laggards
                );
            }
        } else {
            kerror!(
                "shootdown: core {} still stalled after {} retries \
                 (mode {:?}, address {:#x}, participants {}, pending {})",
                cpu,
                *retries,
                rec.mode(),
                rec.address(),
                rec.participants(),
                pending
            );
        }

        // The delivery may have died with the in-flight marks still set,
        // which would make any further signal coalesce into nothing. Drop
        // the marks for the silent cores only, then re-issue.
        self.posted.fetch_subtract(laggards, Ordering::SeqCst);
        self.signal(cpu, laggards);
    }
}
