//! Address-Space Handle Tests

#[cfg(test)]
mod tests {
    use crate::cpumask::CpuSet;
    use crate::space::AddressSpace;

    #[test]
    fn test_active_mask_tracks_retain_release() {
        let space = AddressSpace::new();
        assert!(space.active_cores().is_empty());
        space.retain(1);
        space.retain(3);
        assert_eq!(space.active_cores(), CpuSet::from_bits(0b1010));
        space.release(1);
        assert_eq!(space.active_cores(), CpuSet::single(3));
    }

    #[test]
    fn test_kernel_flag() {
        assert!(AddressSpace::new_kernel().is_kernel());
        assert!(!AddressSpace::new().is_kernel());
    }

    #[test]
    fn test_gate_is_exclusive() {
        let space = AddressSpace::new();
        assert!(space.try_begin());
        // Second originator must not get in until the first is done
        assert!(!space.try_begin());
        assert!(!space.try_begin());
        space.end_invalidation();
        assert!(space.try_begin());
        space.end_invalidation();
    }

    #[test]
    fn test_generation_counts_both_edges() {
        let space = AddressSpace::new();
        assert_eq!(space.generation(), 0);
        assert!(space.try_begin());
        assert_eq!(space.generation(), 1); // odd while held
        space.end_invalidation();
        assert_eq!(space.generation(), 2); // even when free
        assert!(space.try_begin());
        space.end_invalidation();
        assert_eq!(space.generation(), 4);
    }

    #[test]
    fn test_gate_does_not_disturb_active_mask() {
        let space = AddressSpace::new();
        space.retain(2);
        assert!(space.try_begin());
        space.retain(4);
        assert_eq!(space.active_cores(), CpuSet::from_bits(0b10100));
        space.end_invalidation();
        assert_eq!(space.active_cores(), CpuSet::from_bits(0b10100));
    }
}
