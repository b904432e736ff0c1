//! Behavioral conformance of every queue variant against the shared contract.
//!
//! Each property is written once over [`BoundedQueue`] and instantiated for
//! `FixedRing`, `SpscQueue` and `BlockingQueue`, so the three realizations
//! stay interchangeable for single-threaded use.

use tachyon_ring::{BlockingQueue, BoundedQueue, FixedRing, QueueError, SpscQueue};

/// Capacities covering power-of-two and non-power-of-two physical lengths.
const CAPACITIES: [usize; 8] = [1, 2, 3, 4, 7, 8, 15, 1024];

fn capacity_invariant<Q: BoundedQueue<usize>>() {
    for cap in CAPACITIES {
        let mut q = Q::with_capacity(cap).unwrap();
        assert_eq!(q.capacity(), cap);
        for i in 0..cap {
            assert!(q.try_push(i).is_ok(), "cap={cap} push {i}");
            assert_eq!(q.size(), i + 1);
        }
        assert!(q.is_full());
        assert_eq!(q.try_push(usize::MAX), Err(usize::MAX));
        assert_eq!(q.try_pop(), Some(0));
        assert!(q.try_push(cap).is_ok());
        assert!(q.is_full());
    }
}

fn fifo_across_wrap<Q: BoundedQueue<usize>>() {
    for cap in CAPACITIES {
        let mut q = Q::with_capacity(cap).unwrap();
        for i in 0..cap {
            q.try_push(i).unwrap();
        }

        let half = cap / 2;
        for i in 0..half {
            assert_eq!(q.try_pop(), Some(i));
        }
        for i in 0..half {
            q.try_push(1000 + i).unwrap();
        }

        let drained: Vec<usize> = std::iter::from_fn(|| q.try_pop()).collect();
        let expected: Vec<usize> = (half..cap).chain(1000..1000 + half).collect();
        assert_eq!(drained, expected, "cap={cap}");
        assert_eq!(q.size(), 0);
        assert_eq!(q.try_pop(), None);
    }
}

fn empty_full_exclusive<Q: BoundedQueue<usize>>() {
    let cap = 5;
    let mut q = Q::with_capacity(cap).unwrap();
    // Deterministic push/pop mix that visits every occupancy several times.
    for step in 0..200usize {
        if (step * 7) % 5 < 3 {
            let _ = q.try_push(step);
        } else {
            q.try_pop();
        }
        assert!(!(q.is_empty() && q.is_full()), "step {step}");
        assert_eq!(q.is_full(), q.size() == cap);
        assert_eq!(q.is_empty(), q.size() == 0);
        assert!(q.size() <= cap);
    }
}

fn strings_round_trip<Q: BoundedQueue<String>>() {
    let mut q = Q::with_capacity(4).unwrap();
    assert!(q.is_empty());
    q.try_push("a".to_string()).unwrap();
    q.try_push("b".to_string()).unwrap();
    assert_eq!(q.try_pop().as_deref(), Some("a"));
    assert_eq!(q.try_pop().as_deref(), Some("b"));
    assert!(q.is_empty());
}

fn zero_capacity_rejected<Q: BoundedQueue<u8>>() {
    assert!(matches!(Q::with_capacity(0), Err(QueueError::ZeroCapacity)));
}

macro_rules! conformance {
    ($module:ident, $queue:ident) => {
        mod $module {
            use super::*;

            #[test]
            fn capacity_invariant() {
                super::capacity_invariant::<$queue<usize>>();
            }

            #[test]
            fn fifo_across_wrap() {
                super::fifo_across_wrap::<$queue<usize>>();
            }

            #[test]
            fn empty_full_exclusive() {
                super::empty_full_exclusive::<$queue<usize>>();
            }

            #[test]
            fn strings_round_trip() {
                super::strings_round_trip::<$queue<String>>();
            }

            #[test]
            fn zero_capacity_rejected() {
                super::zero_capacity_rejected::<$queue<u8>>();
            }
        }
    };
}

conformance!(fixed_ring, FixedRing);
conformance!(spsc_queue, SpscQueue);
conformance!(blocking_queue, BlockingQueue);

#[test]
fn clear_resets_after_any_history() {
    let mut ring = FixedRing::with_capacity(6).unwrap();
    let blocking = BlockingQueue::with_capacity(6).unwrap();
    for round in 0..20usize {
        for i in 0..(round % 7) {
            let _ = ring.try_push(i);
            let _ = blocking.try_push(i);
        }
        for _ in 0..(round % 3) {
            ring.try_pop();
            blocking.try_pop();
        }
        if round % 4 == 3 {
            ring.clear();
            blocking.clear();
            assert!(ring.is_empty());
            assert_eq!(ring.size(), 0);
            assert!(blocking.is_empty());
            assert_eq!(blocking.size(), 0);
        }
        assert_eq!(ring.size(), blocking.size());
    }
}
