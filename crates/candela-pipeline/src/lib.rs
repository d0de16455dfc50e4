//! `candela-pipeline`: the in-process event queue between producer threads
//! (market data feeds) and the aggregation engine (component C7).
//!
//! Built on the same seqlock ring primitives the workspace uses for its
//! shared-memory broadcast channel, but scoped to a single process and a
//! fixed, known set of consumer partitions so it can offer exact
//! backpressure instead of overwrite-on-overrun semantics.

mod pipeline;
mod ring;
mod seqlock;
mod wait_strategy;

pub use pipeline::{EventPipeline, PipelineHandle};
pub use ring::RingConfig;
pub use wait_strategy::WaitStrategy;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn publish_then_read_roundtrips() {
        let p = EventPipeline::<u64>::new(8);
        assert!(p.try_publish(42));
        assert_eq!(p.try_read(), Some(42));
        assert_eq!(p.try_read(), None);
    }

    #[test]
    fn try_publish_fails_when_full() {
        let p = EventPipeline::<u64>::new(4);
        for i in 0..4 {
            assert!(p.try_publish(i));
        }
        assert!(!p.try_publish(99));
        assert_eq!(p.remaining_capacity(), 0);

        assert_eq!(p.try_read(), Some(0));
        assert!(p.try_publish(99));
    }

    #[test]
    fn try_publish_or_drop_counts_rejections() {
        let p = EventPipeline::<u64>::new(2);
        assert!(p.try_publish_or_drop(1));
        assert!(p.try_publish_or_drop(2));
        assert!(!p.try_publish_or_drop(3));
        assert_eq!(p.dropped_count(), 1);
    }

    #[test]
    fn remaining_capacity_tracks_publish_and_read() {
        let p = EventPipeline::<u64>::new(4);
        assert_eq!(p.remaining_capacity(), 4);
        p.try_publish(1);
        p.try_publish(2);
        assert_eq!(p.remaining_capacity(), 2);
        p.try_read();
        assert_eq!(p.remaining_capacity(), 3);
    }

    #[test]
    fn fifo_order_is_preserved_single_producer() {
        let p = EventPipeline::<u64>::new(16);
        for i in 0..16 {
            assert!(p.try_publish(i));
        }
        for i in 0..16 {
            assert_eq!(p.try_read(), Some(i));
        }
    }

    #[test]
    fn concurrent_producers_deliver_every_item_exactly_once() {
        let p = EventPipeline::<u64>::new(1024);
        let producers = 4;
        let per_producer = 2000u64;

        let handles: Vec<_> = (0..producers)
            .map(|t| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    for i in 0..per_producer {
                        let value = t * per_producer + i;
                        p.publish(value, WaitStrategy::Spin);
                    }
                })
            })
            .collect();

        let received = Arc::new(AtomicU64::new(0));
        let seen = {
            let received = Arc::clone(&received);
            let p2 = Arc::clone(&p);
            std::thread::spawn(move || {
                let mut total = 0u64;
                while total < producers * per_producer {
                    if let Some(_v) = p2.try_read() {
                        total += 1;
                        received.fetch_add(1, Ordering::Relaxed);
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        for h in handles {
            h.join().unwrap();
        }
        seen.join().unwrap();

        assert_eq!(received.load(Ordering::Relaxed), producers * per_producer);
    }

    #[test]
    fn start_invokes_callback_and_shutdown_stops_cleanly() {
        let p = EventPipeline::<u64>::new(16);
        let count = Arc::new(AtomicU64::new(0));
        let count2 = Arc::clone(&count);

        let handle = p.start(
            1,
            WaitStrategy::Sleep(Duration::from_millis(1)),
            move |v| {
                count2.fetch_add(v, Ordering::Relaxed);
            },
            None,
        );

        for i in 1..=5u64 {
            p.publish(i, WaitStrategy::Spin);
        }
        std::thread::sleep(Duration::from_millis(50));
        p.shutdown(handle);

        assert_eq!(count.load(Ordering::Relaxed), 15);
    }

    #[test]
    fn consumer_panic_is_caught_and_counted() {
        let p = EventPipeline::<u64>::new(16);
        let hook_calls = Arc::new(AtomicU64::new(0));
        let hook_calls2 = Arc::clone(&hook_calls);
        let handle = p.start(
            1,
            WaitStrategy::Spin,
            |v| {
                if v == 2 {
                    panic!("boom");
                }
            },
            Some(Arc::new(move || {
                hook_calls2.fetch_add(1, Ordering::Relaxed);
            })),
        );

        p.publish(1, WaitStrategy::Spin);
        p.publish(2, WaitStrategy::Spin);
        p.publish(3, WaitStrategy::Spin);
        std::thread::sleep(Duration::from_millis(50));
        p.shutdown(handle);

        assert_eq!(p.consumer_panic_count(), 1);
        assert_eq!(hook_calls.load(Ordering::Relaxed), 1, "on_panic hook must fire too");
    }

    #[test]
    fn multiple_consumers_partition_by_sequence_and_see_every_item_once() {
        let p = EventPipeline::<u64>::new(256);
        let seen_by = Arc::new((0..4).map(|_| AtomicU64::new(0)).collect::<Vec<_>>());
        let total = Arc::new(AtomicU64::new(0));

        let seen_by2 = Arc::clone(&seen_by);
        let total2 = Arc::clone(&total);
        let handle = p.start(
            4,
            WaitStrategy::Spin,
            move |v| {
                // Each consumer only ever reads items matching its own
                // partition, so bucketing by v % 4 here must land every
                // count in exactly one slot.
                seen_by2[(v % 4) as usize].fetch_add(1, Ordering::Relaxed);
                total2.fetch_add(1, Ordering::Relaxed);
            },
            None,
        );

        for i in 0..400u64 {
            p.publish(i, WaitStrategy::Spin);
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while total.load(Ordering::Relaxed) < 400 && std::time::Instant::now() < deadline {
            std::thread::yield_now();
        }
        p.shutdown(handle);

        assert_eq!(total.load(Ordering::Relaxed), 400);
        for count in seen_by.iter() {
            assert_eq!(count.load(Ordering::Relaxed), 100);
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Single producer, single consumer: whatever order values are
        /// published in is the order `try_read` returns them.
        #[test]
        fn publish_then_read_preserves_fifo_order(values in proptest::collection::vec(any::<u64>(), 0..64)) {
            let p = EventPipeline::<u64>::new(128);
            for v in &values {
                prop_assert!(p.try_publish(*v));
            }
            for v in &values {
                prop_assert_eq!(p.try_read(), Some(*v));
            }
            prop_assert_eq!(p.try_read(), None);
        }

        /// Whatever the consumer count, every published item is delivered
        /// to exactly one consumer thread and none are lost or duplicated.
        #[test]
        fn concurrent_consumers_deliver_every_item_exactly_once(
            consumers in 1usize..=4,
            count in 1usize..300,
        ) {
            let p = EventPipeline::<u64>::new(512);
            let total = Arc::new(AtomicU64::new(0));
            let total2 = Arc::clone(&total);
            let handle = p.start(
                consumers,
                WaitStrategy::Spin,
                move |_v| {
                    total2.fetch_add(1, Ordering::Relaxed);
                },
                None,
            );

            for i in 0..count as u64 {
                p.publish(i, WaitStrategy::Spin);
            }

            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while (total.load(Ordering::Relaxed) as usize) < count && std::time::Instant::now() < deadline {
                std::thread::yield_now();
            }
            p.shutdown(handle);

            prop_assert_eq!(total.load(Ordering::Relaxed) as usize, count);
        }
    }
}
