//! Per-Core Invalidation Records
//!
//! Each core owns exactly one record describing the request it originated.
//! A record is reused for the core's entire lifetime: armed when the core
//! starts a broadcast, retired to `Idle` once every participant has
//! acknowledged. Responder cores read foreign records, so every field is an
//! atomic; but apart from the single-bit clears on `pending`, only the owning
//! core ever writes its record. That asymmetry is what makes the whole
//! protocol data-race free and must be preserved.

use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::cpumask::{AtomicCpuSet, CpuSet};

/// Address sentinel: flush every translation, not a range
pub const ALL_ADDRESSES: u64 = u64::MAX;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// One page-table entry slot, owned by the memory manager.
///
/// The coordinator borrows these for the duration of a call and performs the
/// committed write (or compare-exchange) itself, so that the ordering between
/// the entry store and the acknowledgement traffic stays under its control.
#[repr(transparent)]
pub struct PageEntry(AtomicU64);

impl PageEntry {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn store(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn swap(&self, value: u64) -> u64 {
        self.0.swap(value, Ordering::SeqCst)
    }

    /// Install `new` only if the entry still holds `old`
    pub fn compare_set(&self, old: u64, new: u64) -> bool {
        self.0
            .compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvalMode {
    Idle = 0,
    Store = 1,
    CompareSet = 2,
}

impl InvalMode {
    fn from_raw(value: u8) -> Self {
        match value {
            1 => InvalMode::Store,
            2 => InvalMode::CompareSet,
            _ => InvalMode::Idle,
        }
    }
}

/// Cache-line aligned so neighbouring cores' acknowledgement traffic does not
/// false-share with this core's record.
#[repr(C, align(64))]
pub struct InvalRecord {
    address: AtomicU64,
    page_count: AtomicUsize,
    entry_slot: AtomicPtr<PageEntry>,
    old_value: AtomicU64,
    new_value: AtomicU64,
    mode: AtomicU8,
    success: AtomicBool,
    participants: AtomicCpuSet,
    /// Participants that have not yet acknowledged. Shrinks monotonically;
    /// the only field of a record that foreign cores write.
    pub(crate) pending: AtomicCpuSet,
    deadline: AtomicU64,
    expired: AtomicBool,
}

impl InvalRecord {
    pub(crate) const fn new() -> Self {
        Self {
            address: AtomicU64::new(0),
            page_count: AtomicUsize::new(0),
            entry_slot: AtomicPtr::new(core::ptr::null_mut()),
            old_value: AtomicU64::new(0),
            new_value: AtomicU64::new(0),
            mode: AtomicU8::new(InvalMode::Idle as u8),
            success: AtomicBool::new(false),
            participants: AtomicCpuSet::new(CpuSet::empty()),
            pending: AtomicCpuSet::new(CpuSet::empty()),
            deadline: AtomicU64::new(0),
            expired: AtomicBool::new(false),
        }
    }

    /// Fill in a request. Field stores are relaxed; the caller publishes the
    /// record with a release copy into `pending` afterwards.
    pub(crate) fn arm(
        &self,
        address: u64,
        page_count: usize,
        slot: Option<&PageEntry>,
        old_value: u64,
        new_value: u64,
        mode: InvalMode,
        participants: CpuSet,
    ) {
        self.address.store(address, Ordering::Relaxed);
        self.page_count.store(page_count, Ordering::Relaxed);
        let ptr = slot.map_or(core::ptr::null_mut(), |s| {
            s as *const PageEntry as *mut PageEntry
        });
        self.entry_slot.store(ptr, Ordering::Relaxed);
        self.old_value.store(old_value, Ordering::Relaxed);
        self.new_value.store(new_value, Ordering::Relaxed);
        self.success.store(false, Ordering::Relaxed);
        self.expired.store(false, Ordering::Relaxed);
        self.participants.store(participants, Ordering::Relaxed);
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    pub(crate) fn mode(&self) -> InvalMode {
        InvalMode::from_raw(self.mode.load(Ordering::Acquire))
    }

    pub(crate) fn set_mode(&self, mode: InvalMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    pub(crate) fn address(&self) -> u64 {
        self.address.load(Ordering::Relaxed)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_count.load(Ordering::Relaxed)
    }

    /// Borrowed entry slot; null for pure-flush broadcasts. Only the
    /// originating core may dereference it, and only while the originating
    /// call frame that lent it is still live.
    pub(crate) fn slot(&self) -> *mut PageEntry {
        self.entry_slot.load(Ordering::Relaxed)
    }

    pub(crate) fn old_value(&self) -> u64 {
        self.old_value.load(Ordering::Relaxed)
    }

    pub(crate) fn set_old_value(&self, value: u64) {
        self.old_value.store(value, Ordering::Relaxed);
    }

    pub(crate) fn new_value(&self) -> u64 {
        self.new_value.load(Ordering::Relaxed)
    }

    pub(crate) fn success(&self) -> bool {
        self.success.load(Ordering::Relaxed)
    }

    pub(crate) fn set_success(&self, value: bool) {
        self.success.store(value, Ordering::Relaxed);
    }

    pub(crate) fn participants(&self) -> CpuSet {
        self.participants.load(Ordering::Relaxed)
    }

    pub(crate) fn deadline(&self) -> u64 {
        self.deadline.load(Ordering::Relaxed)
    }

    pub(crate) fn set_deadline(&self, ticks: u64) {
        self.deadline.store(ticks, Ordering::Relaxed);
    }

    /// Latched on the first watchdog expiry of the current request
    pub(crate) fn mark_expired(&self) {
        self.expired.store(true, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed)
    }
}
