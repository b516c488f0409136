//! Batch coalescer for kernel-space invalidation.
//!
//! Unmapping a large kernel region one broadcast per page would serialize on
//! the cross-core handshake N times. Against the kernel address space, where
//! the participant set is simply every online core, the entry writes carry
//! no per-call ordering requirement, so they are performed immediately and
//! the cross-core synchronization is deferred to a single broadcast over the
//! merged range.

use crate::kpanic;
use crate::platform::Platform;
use crate::space::AddressSpace;

use super::record::{PageEntry, ALL_ADDRESSES, PAGE_SHIFT, PAGE_SIZE};
use super::Shootdown;

/// In-progress batch. Obtain with [`Shootdown::bulk_begin`]; add entries,
/// then [`flush`](BulkInval::flush). Dropping a dirty context flushes it.
pub struct BulkInval<'a, P: Platform> {
    dom: &'a Shootdown<P>,
    space: &'a AddressSpace,
    /// Merged touched range `[begin, end)`. Both zero: empty. `begin` equal
    /// to the everything-sentinel: degraded to a full flush.
    begin: u64,
    end: u64,
    count: usize,
}

impl<P: Platform> Shootdown<P> {
    /// Start a batch against the globally shared kernel space. Fatal on any
    /// other space: per-space participant tracking makes deferred entry
    /// writes unsound there, and callers doing so are broken.
    pub fn bulk_begin<'a>(&'a self, space: &'a AddressSpace) -> BulkInval<'a, P> {
        if !space.is_kernel() {
            kpanic!("shootdown: bulk invalidation outside the kernel address space");
        }
        BulkInval {
            dom: self,
            space,
            begin: 0,
            end: 0,
            count: 0,
        }
    }
}

impl<P: Platform> BulkInval<'_, P> {
    /// Overwrite `slot` immediately and record `address`'s page for the
    /// deferred broadcast. Returns the old entry value.
    pub fn add(&mut self, slot: &PageEntry, address: u64, new_value: u64) -> u64 {
        let old = slot.swap(new_value);
        self.count += 1;

        if address == ALL_ADDRESSES || self.begin == ALL_ADDRESSES {
            // An everything-request poisons the whole batch conservatively.
            self.begin = ALL_ADDRESSES;
            self.end = 0;
        } else if self.begin == self.end {
            self.begin = address;
            self.end = address + PAGE_SIZE;
        } else if address == self.end {
            self.end += PAGE_SIZE;
        } else {
            // Non-adjacent page: one wide flush beats tracking holes.
            self.begin = ALL_ADDRESSES;
            self.end = 0;
        }
        old
    }

    /// Issue the single broadcast covering everything added since the last
    /// flush. No-op on a clean context.
    pub fn flush(&mut self) {
        if self.begin != self.end {
            if self.begin == ALL_ADDRESSES {
                self.dom.broadcast_flush(self.space, ALL_ADDRESSES, 1);
            } else {
                let pages = ((self.end - self.begin) >> PAGE_SHIFT) as usize;
                self.dom.broadcast_flush(self.space, self.begin, pages);
            }
            self.dom.stats.bulk_flushes.incr();
        }
        self.begin = 0;
        self.end = 0;
        self.count = 0;
    }

    /// Pages recorded since the last flush
    pub fn pending_pages(&self) -> usize {
        self.count
    }
}

impl<P: Platform> Drop for BulkInval<'_, P> {
    fn drop(&mut self) {
        self.flush();
    }
}
