//! Responder Dispatch Tests

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::mock::Cluster;
    use crate::shootdown::{InvalMode, PageEntry};

    const VA: u64 = 0xE000;

    #[test]
    fn test_redelivery_after_completion_is_noop() {
        let cluster = Cluster::new(2);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(0));

        {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_store(&space, &slot, VA, 1, 3)
            });
        }
        cluster.dom().platform().clear_traces();

        // the same signal arrives again, late
        for _ in 0..4 {
            cluster.call(1, |dom| dom.service_interrupt(1));
        }

        assert!(cluster.dom().platform().flush_trace().is_empty());
        assert_eq!(slot.load(), 3);
        assert_eq!(cluster.dom().record(0).mode(), InvalMode::Idle);
    }

    #[test]
    fn test_redelivery_on_nonparticipant_is_noop() {
        let cluster = Cluster::new(3);
        // spurious interrupt with no armed records anywhere
        cluster.call(2, |dom| dom.service_interrupt(2));
        assert!(cluster.dom().platform().flush_trace().is_empty());
    }

    #[test]
    fn test_participant_flush_observes_final_value() {
        // No participant may flush before the new value is durably visible.
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(0));

        let observed: Arc<Mutex<Vec<(usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let slot = Arc::clone(&slot);
            let observed = Arc::clone(&observed);
            cluster.dom().platform().set_on_flush(Box::new(move |cpu, _| {
                observed.lock().unwrap().push((cpu, slot.load()));
            }));
        }

        {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_store(&space, &slot, VA, 1, 7)
            });
        }

        let observed = observed.lock().unwrap();
        assert!(!observed.is_empty());
        for (cpu, value) in observed.iter() {
            assert_eq!(
                *value, 7,
                "core {cpu} flushed while the entry still held the old value"
            );
        }
    }

    #[test]
    fn test_participant_flushes_follow_originator_write() {
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot = Arc::new(PageEntry::new(0));

        {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot);
            cluster.call(0, move |dom| {
                dom.invalidate_store(&space, &slot, VA, 1, 1)
            });
        }

        let flushes = cluster.dom().platform().flush_trace();
        let origin_seq = flushes
            .iter()
            .find(|f| f.cpu == 0)
            .expect("originator never flushed")
            .seq;
        for f in flushes.iter().filter(|f| f.cpu != 0) {
            assert!(
                f.seq > origin_seq,
                "participant {0} flushed before the originator's write was durable",
                f.cpu
            );
        }
    }

    #[test]
    fn test_one_delivery_services_overlapping_requests() {
        // Two originators, one participant: the participant's dispatch pass
        // must drain both records no matter how deliveries coalesced.
        let cluster = Cluster::new(3);
        let space = cluster.kernel_space();
        let slot_a = Arc::new(PageEntry::new(0));
        let slot_b = Arc::new(PageEntry::new(0));

        let ra = {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot_a);
            cluster.call_async(0, move |dom| {
                dom.invalidate_store(&space, &slot, VA, 1, 10)
            })
        };
        let rb = {
            let space = Arc::clone(&space);
            let slot = Arc::clone(&slot_b);
            cluster.call_async(1, move |dom| {
                dom.invalidate_store(&space, &slot, VA + 0x1000, 1, 20)
            })
        };
        ra.recv_timeout(std::time::Duration::from_secs(30)).unwrap();
        rb.recv_timeout(std::time::Duration::from_secs(30)).unwrap();

        assert_eq!(slot_a.load(), 10);
        assert_eq!(slot_b.load(), 20);
        assert_eq!(cluster.dom().record(0).mode(), InvalMode::Idle);
        assert_eq!(cluster.dom().record(1).mode(), InvalMode::Idle);
        assert!(cluster.dom().armed_originators().is_empty());
    }
}
