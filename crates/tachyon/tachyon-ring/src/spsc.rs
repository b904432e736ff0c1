//! Lock-free single-producer, single-consumer (SPSC) bounded queue.
//!
//! The queue keeps the sentinel-slot layout of [`FixedRing`](crate::FixedRing)
//! but publishes its two indices through atomics, so one producer thread and
//! one consumer thread can run concurrently without a lock.
//!
//! # Protocol
//!
//! **Producer (`try_push`):**
//! 1. Load `head` Relaxed (only the producer writes it)
//! 2. Load `tail` Acquire (observe the consumer's latest progress)
//! 3. If `next(head) == tail`, the queue is full: return the value
//! 4. Write the value into `slots[head]`
//! 5. Store `next(head)` into `head` with Release (publish the slot)
//!
//! **Consumer (`try_pop`):**
//! 1. Load `tail` Relaxed (only the consumer writes it)
//! 2. Load `head` Acquire (observe the producer's latest publish)
//! 3. If `tail == head`, the queue is empty: return `None`
//! 4. Move the value out of `slots[tail]`
//! 5. Store `next(tail)` into `tail` with Release (hand the slot back)
//!
//! ```text
//! producer: write slot ──▶ head.store(Release) ─┐
//!                                               │ synchronizes-with
//! consumer:                head.load(Acquire) ◀─┘ ──▶ read slot
//!
//! consumer: read slot  ──▶ tail.store(Release) ─┐
//!                                               │ synchronizes-with
//! producer:                tail.load(Acquire) ◀─┘ ──▶ overwrite slot
//! ```
//!
//! These two edges are the only cross-thread synchronization. No operation
//! uses `SeqCst`, and none blocks: on `Err`/`None` the caller spins, backs off
//! or gives up.
//!
//! # Single Producer, Single Consumer
//!
//! [`SpscQueue::split`] hands out one [`Producer`] and one [`Consumer`]. Neither
//! is `Clone`, and every mutating operation takes `&mut self`, so a second
//! concurrent producer or consumer cannot be written in safe code.
//! `SpscQueue` itself also offers `try_push`/`try_pop` through `&mut self` for
//! single-thread use before (or instead of) splitting.
//!
//! All three handles are `Send` but not `Sync`. A handle can move to another
//! thread, but `&Consumer` cannot be shared: two threads peeking the same
//! slot would alias a `&T` that may not be `Sync`.
//!
//! ```compile_fail
//! use std::cell::Cell;
//! use tachyon_ring::SpscQueue;
//!
//! fn assert_sync<S: Sync>(_: &S) {}
//!
//! let (_tx, rx) = SpscQueue::<Cell<u64>>::with_capacity(4).unwrap().split();
//! assert_sync(&rx);
//! ```
//!
//! ```compile_fail
//! use tachyon_ring::SpscQueue;
//!
//! fn assert_sync<S: Sync>(_: &S) {}
//!
//! let q = SpscQueue::<u64>::with_capacity(4).unwrap();
//! assert_sync(&q);
//! ```
//!
//! ```compile_fail
//! use tachyon_ring::SpscQueue;
//!
//! fn assert_sync<S: Sync>(_: &S) {}
//!
//! let (tx, _rx) = SpscQueue::<u64>::with_capacity(4).unwrap().split();
//! assert_sync(&tx);
//! ```

use crate::error::QueueError;
use crate::index::RingConfig;
use crate::queue::BoundedQueue;
use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Keeps a handle `Send` (given `T: Send`) while opting it out of `Sync`.
type NotSync = PhantomData<Cell<()>>;

/// State shared by the two halves.
///
/// # Invariants
///
/// - `head` is written only by the producer side, `tail` only by the consumer.
/// - Slots in `[tail, head)` (walking forward with wrap) are initialized and
///   owned by the consumer; all other slots are uninitialized and owned by the
///   producer, except the sentinel which nobody touches.
struct Shared<T> {
    /// Next slot to write. Producer-owned, read by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next slot to read. Consumer-owned, read by the producer.
    tail: CachePadded<AtomicUsize>,
    cfg: RingConfig,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: the protocol above guarantees a slot is touched by at most one side
// at a time, and ownership of a slot moves across threads only through the
// Release/Acquire pair on head or tail. `T: Send` is required because values
// are written on one thread and dropped or returned on another.
unsafe impl<T: Send> Sync for Shared<T> {}
unsafe impl<T: Send> Send for Shared<T> {}

impl<T> Shared<T> {
    fn new(cfg: RingConfig) -> Self {
        let slots = (0..cfg.physical_len())
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            cfg,
            slots,
        }
    }

    /// Returns `(head, next_head)` if there is room for one more element.
    ///
    /// # Safety
    /// Caller must be the only producer.
    #[inline(always)]
    unsafe fn reserve(&self) -> Option<(usize, usize)> {
        // Own index: no other thread stores to head.
        let head = self.head.load(Ordering::Relaxed);
        let next = self.cfg.next(head);
        if next == self.tail.load(Ordering::Acquire) {
            return None;
        }
        Some((head, next))
    }

    /// Writes `value` into the reserved slot and publishes it.
    ///
    /// # Safety
    /// `head`/`next` must come from `reserve` on the same (sole) producer with
    /// no publish in between.
    #[inline(always)]
    unsafe fn publish(&self, head: usize, next: usize, value: T) {
        // SAFETY: `reserve` proved head is outside [tail, head), so the
        // consumer will not read it until the Release store below.
        unsafe { (*self.slots[head].get()).write(value) };
        self.head.store(next, Ordering::Release);
    }

    /// # Safety
    /// Caller must be the only producer.
    #[inline(always)]
    unsafe fn try_push(&self, value: T) -> Result<(), T> {
        // SAFETY: forwarded from the caller.
        match unsafe { self.reserve() } {
            Some((head, next)) => {
                unsafe { self.publish(head, next, value) };
                Ok(())
            }
            None => Err(value),
        }
    }

    /// # Safety
    /// Caller must be the only producer.
    #[inline(always)]
    unsafe fn emplace_with<F: FnOnce() -> T>(&self, make: F) -> bool {
        // SAFETY: forwarded from the caller.
        match unsafe { self.reserve() } {
            Some((head, next)) => {
                unsafe { self.publish(head, next, make()) };
                true
            }
            None => false,
        }
    }

    /// # Safety
    /// Caller must be the only consumer.
    #[inline(always)]
    unsafe fn try_pop(&self) -> Option<T> {
        // Own index: no other thread stores to tail.
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the Acquire load above observed a head past `tail`, so the
        // producer's write of this slot happens-before this read.
        let value = unsafe { (*self.slots[tail].get()).assume_init_read() };
        self.tail.store(self.cfg.next(tail), Ordering::Release);
        Some(value)
    }

    /// # Safety
    /// Caller must be the only consumer, and must not advance `tail` while the
    /// returned reference is alive.
    #[inline(always)]
    unsafe fn peek(&self) -> Option<&T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: as in `try_pop`; the producer cannot reuse this slot until
        // tail moves past it.
        Some(unsafe { (*self.slots[tail].get()).assume_init_ref() })
    }

    /// Snapshot of both indices. Exact when called with exclusive access,
    /// a hint otherwise.
    #[inline]
    fn snapshot(&self) -> (usize, usize) {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (head, tail)
    }

    #[inline]
    fn size(&self) -> usize {
        let (head, tail) = self.snapshot();
        self.cfg.distance(head, tail)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        let (head, tail) = self.snapshot();
        head == tail
    }

    #[inline]
    fn is_full(&self) -> bool {
        let (head, tail) = self.snapshot();
        self.cfg.next(head) == tail
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Both halves are gone, so plain reads of the indices are exact.
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            // SAFETY: [tail, head) is the initialized range.
            unsafe { self.slots[tail].get_mut().assume_init_drop() };
            tail = self.cfg.next(tail);
        }
    }
}

/// A bounded lock-free queue for one producer and one consumer.
///
/// # Example
/// ```
/// use tachyon_ring::SpscQueue;
///
/// let queue = SpscQueue::<u64>::with_capacity(1024).unwrap();
/// let (mut tx, mut rx) = queue.split();
///
/// let producer = std::thread::spawn(move || {
///     for i in 0..10_000 {
///         while tx.try_push(i).is_err() {
///             std::hint::spin_loop();
///         }
///     }
/// });
///
/// let mut expected = 0;
/// while expected < 10_000 {
///     if let Some(v) = rx.try_pop() {
///         assert_eq!(v, expected);
///         expected += 1;
///     }
/// }
/// producer.join().unwrap();
/// ```
pub struct SpscQueue<T> {
    shared: Arc<Shared<T>>,
    _not_sync: NotSync,
}

impl<T> SpscQueue<T> {
    /// Allocates a queue holding up to `capacity` elements.
    ///
    /// # Errors
    /// Returns [`QueueError::ZeroCapacity`] for `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let cfg = RingConfig::new(capacity)?;
        debug!(
            capacity,
            physical_len = cfg.physical_len(),
            pow2 = cfg.is_pow2(),
            "spsc queue allocated"
        );
        Ok(Self {
            shared: Arc::new(Shared::new(cfg)),
            _not_sync: PhantomData,
        })
    }

    /// Splits the queue into its producer and consumer halves.
    ///
    /// Elements already pushed through `&mut self` stay in the queue and are
    /// seen first by the consumer.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let producer = Producer {
            shared: Arc::clone(&self.shared),
            _not_sync: PhantomData,
        };
        let consumer = Consumer {
            shared: self.shared,
            _not_sync: PhantomData,
        };
        (producer, consumer)
    }

    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // SAFETY: `&mut self` on an unsplit queue means we are the only
        // producer and the only consumer.
        unsafe { self.shared.try_push(value) }
    }

    #[inline]
    pub fn emplace_with<F: FnOnce() -> T>(&mut self, make: F) -> bool {
        // SAFETY: as in `try_push`.
        unsafe { self.shared.emplace_with(make) }
    }

    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        // SAFETY: as in `try_push`.
        unsafe { self.shared.try_pop() }
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        // SAFETY: the queue is unsplit, so nothing can pop while `&self` is
        // borrowed.
        unsafe { self.shared.peek() }
    }

    pub fn size(&self) -> usize {
        self.shared.size()
    }

    pub fn capacity(&self) -> usize {
        self.shared.cfg.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }
}

impl<T> BoundedQueue<T> for SpscQueue<T> {
    fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        SpscQueue::with_capacity(capacity)
    }

    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), T> {
        SpscQueue::try_push(self, value)
    }

    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        SpscQueue::try_pop(self)
    }

    fn size(&self) -> usize {
        SpscQueue::size(self)
    }

    fn capacity(&self) -> usize {
        SpscQueue::capacity(self)
    }

    fn is_empty(&self) -> bool {
        SpscQueue::is_empty(self)
    }

    fn is_full(&self) -> bool {
        SpscQueue::is_full(self)
    }
}

impl<T> fmt::Debug for SpscQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpscQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// The pushing half of a split [`SpscQueue`].
///
/// `Send` so it can move to the producer thread; neither `Clone` nor `Sync`,
/// so there is only ever one and only one thread drives it.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    _not_sync: NotSync,
}

impl<T> Producer<T> {
    /// Appends `value`, or returns it back if the queue is full.
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // SAFETY: this is the only Producer for `shared`, and `&mut self`
        // serializes its calls.
        unsafe { self.shared.try_push(value) }
    }

    /// Builds the element only if a slot is free.
    #[inline]
    pub fn emplace_with<F: FnOnce() -> T>(&mut self, make: F) -> bool {
        // SAFETY: as in `try_push`.
        unsafe { self.shared.emplace_with(make) }
    }

    /// Occupancy snapshot. May be stale by the time it is read.
    pub fn size(&self) -> usize {
        self.shared.size()
    }

    pub fn capacity(&self) -> usize {
        self.shared.cfg.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// Whether the queue looked full at the instant of the check.
    ///
    /// Only the consumer can make a full queue non-full, so `false` here is
    /// reliable for this producer's next push; `true` is a hint.
    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// The popping half of a split [`SpscQueue`].
///
/// `Send` but not `Sync`: [`peek`](Consumer::peek) hands out `&T`, which must
/// stay on the thread that owns the consumer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    _not_sync: NotSync,
}

impl<T> Consumer<T> {
    /// Removes the oldest element, or `None` if the queue is empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        // SAFETY: this is the only Consumer for `shared`, and `&mut self`
        // serializes its calls.
        unsafe { self.shared.try_pop() }
    }

    /// Borrows the element the next `try_pop` would return.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        // SAFETY: popping needs `&mut self`, which this borrow excludes.
        unsafe { self.shared.peek() }
    }

    /// Occupancy snapshot. May be stale by the time it is read.
    pub fn size(&self) -> usize {
        self.shared.size()
    }

    pub fn capacity(&self) -> usize {
        self.shared.cfg.capacity()
    }

    /// Whether the queue looked empty at the instant of the check.
    ///
    /// Only the producer can make an empty queue non-empty, so `false` here is
    /// reliable for this consumer's next pop; `true` is a hint.
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn assert_send<S: Send>() {}

    #[test]
    fn handles_are_send_for_non_sync_elements() {
        assert_send::<SpscQueue<Cell<u64>>>();
        assert_send::<Producer<Cell<u64>>>();
        assert_send::<Consumer<Cell<u64>>>();
    }

    #[test]
    fn consumer_peeks_non_sync_element_on_its_own_thread() {
        let (mut tx, mut rx) = SpscQueue::with_capacity(2).unwrap().split();
        tx.try_push(Cell::new(1u64)).unwrap();

        let total = thread::spawn(move || {
            for _ in 0..1_000 {
                let c = rx.peek().unwrap();
                c.set(c.get() + 1);
            }
            rx.try_pop().unwrap().get()
        })
        .join()
        .unwrap();
        assert_eq!(total, 1_001);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            SpscQueue::<u8>::with_capacity(0),
            Err(QueueError::ZeroCapacity)
        ));
    }

    #[test]
    fn capacity_invariant_unsplit() {
        let mut q = SpscQueue::with_capacity(3).unwrap();
        for i in 0..3 {
            assert!(q.try_push(i).is_ok());
        }
        assert!(q.is_full());
        assert_eq!(q.try_push(99), Err(99));
        assert_eq!(q.try_pop(), Some(0));
        assert!(q.try_push(3).is_ok());
        assert_eq!(q.size(), 3);
    }

    #[test]
    fn split_keeps_prefilled_elements() {
        let mut q = SpscQueue::with_capacity(4).unwrap();
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();
        let (mut tx, mut rx) = q.split();
        tx.try_push(3).unwrap();
        assert_eq!(rx.peek(), Some(&1));
        assert_eq!(rx.try_pop(), Some(1));
        assert_eq!(rx.try_pop(), Some(2));
        assert_eq!(rx.try_pop(), Some(3));
        assert_eq!(rx.try_pop(), None);
        assert!(rx.is_empty());
        assert!(tx.is_empty());
    }

    #[test]
    fn emplace_respects_full() {
        let (mut tx, mut rx) = SpscQueue::with_capacity(1).unwrap().split();
        assert!(tx.emplace_with(|| vec![1, 2]));
        assert!(!tx.emplace_with(|| unreachable!("queue is full")));
        assert_eq!(rx.try_pop(), Some(vec![1, 2]));
    }

    #[test]
    fn halves_report_same_size() {
        let (mut tx, rx) = SpscQueue::with_capacity(8).unwrap().split();
        for i in 0..5 {
            tx.try_push(i).unwrap();
        }
        assert_eq!(tx.size(), 5);
        assert_eq!(rx.size(), 5);
        assert_eq!(tx.capacity(), 8);
        assert_eq!(rx.capacity(), 8);
        assert!(!rx.is_full());
    }

    #[test]
    fn resident_elements_dropped_with_last_half() {
        let tracker = Arc::new(());
        let (mut tx, rx) = SpscQueue::with_capacity(4).unwrap().split();
        for _ in 0..3 {
            tx.try_push(Arc::clone(&tracker)).unwrap();
        }
        assert_eq!(Arc::strong_count(&tracker), 4);
        drop(tx);
        assert_eq!(Arc::strong_count(&tracker), 4);
        drop(rx);
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[test]
    fn drop_after_wrap_releases_exact_range() {
        let tracker = Arc::new(());
        let mut q = SpscQueue::with_capacity(3).unwrap();
        for _ in 0..3 {
            q.try_push(Arc::clone(&tracker)).unwrap();
        }
        drop(q.try_pop());
        drop(q.try_pop());
        q.try_push(Arc::clone(&tracker)).unwrap();
        q.try_push(Arc::clone(&tracker)).unwrap();
        assert_eq!(Arc::strong_count(&tracker), 4);
        drop(q);
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[test]
    fn concurrent_fifo_small_capacity() {
        const N: u32 = 50_000;
        let (mut tx, mut rx) = SpscQueue::with_capacity(2).unwrap().split();
        let start = Arc::new(AtomicBool::new(false));

        let producer = {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                while !start.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                for i in 0..N {
                    let mut v = i;
                    while let Err(back) = tx.try_push(v) {
                        v = back;
                        std::hint::spin_loop();
                    }
                }
            })
        };

        start.store(true, Ordering::Release);
        for expected in 0..N {
            let v = loop {
                if let Some(v) = rx.try_pop() {
                    break v;
                }
                std::hint::spin_loop();
            };
            assert_eq!(v, expected);
        }
        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
