//! x86_64 wiring: LAPIC signal delivery, `invlpg`/CR3 flushes, TSC clock.
//!
//! The embedding kernel registers each core as it comes online, points its
//! shootdown IDT vector at [`shootdown_interrupt`], and then uses
//! [`coordinator`] for every shared-mapping change.

pub mod lapic;

use core::sync::atomic::{AtomicU32, Ordering};

use lazy_static::lazy_static;
use x86_64::instructions::tlb;
use x86_64::VirtAddr;

use crate::config::InvalTunables;
use crate::cpumask::{AtomicCpuSet, CpuId, CpuSet, MAX_CPUS};
use crate::kpanic;
use crate::platform::Platform;
use crate::shootdown::{Shootdown, PAGE_SIZE};

/// IDT vector the embedding kernel must route to [`shootdown_interrupt`]
pub const SHOOTDOWN_VECTOR: u8 = 0xF1;

const APIC_ID_NONE: u32 = u32::MAX;

/// Core id -> APIC id, filled in as cores come online
static APIC_IDS: [AtomicU32; MAX_CPUS] = [const { AtomicU32::new(APIC_ID_NONE) }; MAX_CPUS];

static ONLINE: AtomicCpuSet = AtomicCpuSet::new(CpuSet::empty());

pub struct X86Platform;

impl Platform for X86Platform {
    fn current_cpu(&self) -> CpuId {
        let apic_id = lapic::local_apic_id();
        // Linear scan of a 64-entry table; acceptable next to the cost of an
        // IPI handshake.
        // TODO: switch to a GS-based per-core lookup once the embedding
        // kernel exposes its per-CPU data segment to this crate.
        for cpu in 0..MAX_CPUS {
            if APIC_IDS[cpu].load(Ordering::Relaxed) == apic_id {
                return cpu;
            }
        }
        kpanic!("shootdown: core with APIC id {:#x} never registered", apic_id);
    }

    fn online_cores(&self) -> CpuSet {
        ONLINE.load(Ordering::Acquire)
    }

    fn send_signal(&self, targets: CpuSet) {
        for cpu in targets.iter() {
            let apic_id = APIC_IDS[cpu].load(Ordering::Relaxed);
            if apic_id != APIC_ID_NONE {
                lapic::send_fixed_ipi(apic_id, SHOOTDOWN_VECTOR);
            }
        }
    }

    fn local_flush_page(&self, va: u64) {
        tlb::flush(VirtAddr::new_truncate(va));
    }

    fn local_flush_range(&self, va: u64, pages: usize) {
        let mut va = va;
        for _ in 0..pages {
            tlb::flush(VirtAddr::new_truncate(va));
            va = va.wrapping_add(PAGE_SIZE);
        }
    }

    fn local_flush_all(&self) {
        tlb::flush_all();
    }

    fn monotonic_now(&self) -> u64 {
        unsafe { core::arch::x86_64::_rdtsc() }
    }
}

lazy_static! {
    static ref COORDINATOR: Shootdown<X86Platform> =
        Shootdown::new(X86Platform, InvalTunables::default());
}

/// The machine-wide coordinator instance
pub fn coordinator() -> &'static Shootdown<X86Platform> {
    &COORDINATOR
}

/// Register a core as online and signalable. Called by the embedding
/// kernel's SMP bring-up once the core's LAPIC is operational.
pub fn core_online(cpu: CpuId, apic_id: u32) {
    APIC_IDS[cpu].store(apic_id, Ordering::Relaxed);
    ONLINE.insert(cpu, Ordering::AcqRel);
    crate::kinfo!("shootdown: core {} online (APIC id {:#x})", cpu, apic_id);
}

/// Withdraw a core from the signalable set (offlining path)
pub fn core_offline(cpu: CpuId) {
    ONLINE.remove(cpu, Ordering::AcqRel);
    APIC_IDS[cpu].store(APIC_ID_NONE, Ordering::Relaxed);
    crate::kinfo!("shootdown: core {} offline", cpu);
}

/// Body of the shootdown interrupt. The embedding kernel's IDT stub for
/// [`SHOOTDOWN_VECTOR`] calls this and nothing else.
pub fn shootdown_interrupt() {
    let dom = coordinator();
    let cpu = dom.platform().current_cpu();
    dom.service_interrupt(cpu);
    lapic::send_eoi();
}
