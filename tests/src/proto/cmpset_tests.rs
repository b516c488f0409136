//! Compare-And-Set Broadcast Tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::mock::{Cluster, FlushKind};
    use crate::shootdown::PageEntry;

    const VA: u64 = 0x8000;

    #[test]
    fn test_compare_set_success() {
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(5));

        let ok = {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_compare_set(&space, &slot, VA, 5, 7)
            })
        };

        assert!(ok);
        assert_eq!(slot.load(), 7);
    }

    #[test]
    fn test_compare_set_failure_leaves_slot() {
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(5));

        // Some other agent beats the compare to the entry
        slot.store(9);

        let ok = {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_compare_set(&space, &slot, VA, 5, 7)
            })
        };

        assert!(!ok);
        assert_eq!(slot.load(), 9);
    }

    #[test]
    fn test_participants_flush_even_on_failure() {
        // Core A (participants {A,B,C}) runs a compare-set expecting 5 while
        // the slot already holds 9: the compare fails, the slot stays 9, and
        // B and C still flush their caches for that address.
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(9));

        let ok = {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_compare_set(&space, &slot, VA, 5, 7)
            })
        };

        assert!(!ok);
        assert_eq!(slot.load(), 9);
        let flushes = cluster.dom().platform().flush_trace();
        for cpu in [1, 2] {
            assert!(
                flushes
                    .iter()
                    .any(|f| f.cpu == cpu && f.kind == FlushKind::Page(VA)),
                "core {cpu} skipped the flush after a failed compare"
            );
        }
    }

    #[test]
    fn test_compare_set_increment_is_atomic_across_cores() {
        let cores = 4;
        let rounds = 16u64;
        let cluster = Cluster::new(cores);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(0));

        let receivers: Vec<_> = (0..cores)
            .map(|cpu| {
                let space = Arc::clone(&space);
                let slot = Arc::clone(&slot);
                cluster.call_async(cpu, move |dom| {
                    for _ in 0..rounds {
                        loop {
                            let cur = slot.load();
                            if dom.invalidate_compare_set(&space, &slot, VA, cur, cur + 1) {
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        for rx in receivers {
            rx.recv_timeout(std::time::Duration::from_secs(120))
                .expect("compare-set stress timed out");
        }

        assert_eq!(slot.load(), cores as u64 * rounds);
    }
}
