//! Minimal local-APIC driver: just enough to deliver the shootdown vector
//! and acknowledge it. The embedding kernel tells us where the LAPIC lives;
//! everything else (timers, spurious handling, AP bring-up) stays its
//! responsibility.

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use x86_64::registers::model_specific::Msr;

const IA32_APIC_BASE: u32 = 0x1B;
const APIC_ENABLE: u64 = 1 << 11;
const APIC_BASE_MASK: u64 = 0xFFFF_F000;

const REG_ID: u32 = 0x20;
const REG_EOI: u32 = 0x0B0;
const REG_ICR_LOW: u32 = 0x300;
const REG_ICR_HIGH: u32 = 0x310;

/// ICR delivery-status bit: a previous IPI is still being sent
const ICR_PENDING: u32 = 1 << 12;

static LAPIC_BASE: AtomicU64 = AtomicU64::new(0);
static LAPIC_READY: AtomicBool = AtomicBool::new(false);

/// Record the (already enabled) LAPIC MMIO window.
pub fn init(lapic_base: u64) {
    LAPIC_BASE.store(lapic_base & APIC_BASE_MASK, Ordering::SeqCst);
    LAPIC_READY.store(true, Ordering::SeqCst);
    crate::kinfo!(
        "lapic: using local APIC at {:#x} (ID {:#x})",
        lapic_base,
        local_apic_id()
    );
}

pub fn is_ready() -> bool {
    LAPIC_READY.load(Ordering::SeqCst)
}

/// APIC id of the calling core, from the LAPIC's own ID register
pub fn local_apic_id() -> u32 {
    unsafe { read_register(REG_ID) >> 24 }
}

/// Whether the APIC-enable bit is set in `IA32_APIC_BASE`
pub fn hardware_enabled() -> bool {
    unsafe { Msr::new(IA32_APIC_BASE).read() & APIC_ENABLE != 0 }
}

pub fn send_eoi() {
    unsafe {
        write_register(REG_EOI, 0);
    }
}

/// Fixed-delivery IPI to one core
pub fn send_fixed_ipi(apic_id: u32, vector: u8) {
    unsafe {
        wait_for_icr();
        write_register(REG_ICR_HIGH, apic_id << 24);
        write_register(REG_ICR_LOW, vector as u32);
        wait_for_icr();
    }
}

unsafe fn wait_for_icr() {
    while (read_register(REG_ICR_LOW) & ICR_PENDING) != 0 {}
}

unsafe fn read_register(offset: u32) -> u32 {
    let base = LAPIC_BASE.load(Ordering::SeqCst);
    let ptr = (base + offset as u64) as *const u32;
    read_volatile(ptr)
}

unsafe fn write_register(offset: u32, value: u32) {
    let base = LAPIC_BASE.load(Ordering::SeqCst);
    let ptr = (base + offset as u64) as *mut u32;
    write_volatile(ptr, value);
}
