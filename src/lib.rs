#![no_std]

//! Cross-core page-table invalidation coordinator.
//!
//! When one core rewrites a shared page-table entry, every other core that
//! may hold a cached translation for that mapping must flush it before the
//! change can be reported complete. This crate implements the coordination
//! protocol: per-core invalidation records, a synchronous store broadcast, a
//! compare-and-set variant, a bulk coalescer for the kernel address space,
//! and a watchdog that recovers from lost inter-core signals.
//!
//! The crate owns no hardware. The embedding kernel supplies the collaborator
//! surface through [`platform::Platform`] (core identity, signal delivery,
//! local translation-cache flushes, a monotonic clock) and wires its shootdown
//! interrupt vector to [`shootdown::Shootdown::service_interrupt`]. A
//! production x86_64 backing lives in [`arch`].

pub mod arch;
pub mod config;
pub mod console;
pub mod cpumask;
pub mod platform;
pub mod shootdown;
pub mod space;

pub use config::InvalTunables;
pub use console::LogLevel;
pub use cpumask::{CpuId, CpuSet, MAX_CPUS};
pub use platform::Platform;
pub use shootdown::{BulkInval, InvalStatsSnapshot, PageEntry, Shootdown, ALL_ADDRESSES};
pub use space::AddressSpace;
