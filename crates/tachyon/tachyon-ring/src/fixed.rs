//! Single-threaded bounded ring buffer.
//!
//! `FixedRing` is the plain realization of the sentinel-slot layout: one boxed
//! slice of `capacity + 1` slots allocated up front, a head the producer
//! writes and a tail the consumer reads. There is no synchronization; mutation
//! requires `&mut self`, so the borrow checker rules out concurrent access.
//!
//! # Slot Initialization
//!
//! Slots are `MaybeUninit<T>`. The half-open range `[tail, head)` (walking
//! forward with wrap) is always initialized; every other slot is not. `push`
//! initializes the slot at `head` before advancing it, `pop` moves out of the
//! slot at `tail` before advancing it, so the range stays exact.

use crate::error::QueueError;
use crate::index::RingConfig;
use crate::queue::BoundedQueue;
use std::fmt;
use std::iter::FusedIterator;
use std::mem::MaybeUninit;
use tracing::debug;

/// A bounded FIFO over a fixed, pre-allocated store.
///
/// # Example
/// ```
/// use tachyon_ring::FixedRing;
///
/// let mut ring = FixedRing::with_capacity(2).unwrap();
/// assert!(ring.try_push("a").is_ok());
/// assert!(ring.try_push("b").is_ok());
/// assert_eq!(ring.try_push("c"), Err("c")); // full
///
/// assert_eq!(ring.try_pop(), Some("a"));
/// assert_eq!(ring.peek(), Some(&"b"));
/// ```
pub struct FixedRing<T> {
    cfg: RingConfig,
    buf: Box<[MaybeUninit<T>]>,
    /// Next slot to write.
    head: usize,
    /// Next slot to read.
    tail: usize,
}

impl<T> FixedRing<T> {
    /// Allocates a ring holding up to `capacity` elements.
    ///
    /// # Errors
    /// Returns [`QueueError::ZeroCapacity`] for `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let cfg = RingConfig::new(capacity)?;
        let buf = Box::new_uninit_slice(cfg.physical_len());
        debug!(
            capacity,
            physical_len = cfg.physical_len(),
            pow2 = cfg.is_pow2(),
            "fixed ring allocated"
        );
        Ok(Self {
            cfg,
            buf,
            head: 0,
            tail: 0,
        })
    }

    /// Appends `value` at the head.
    ///
    /// Returns `Err(value)` if the ring is full so the caller keeps ownership.
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        let next = self.cfg.next(self.head);
        if next == self.tail {
            return Err(value);
        }
        self.buf[self.head].write(value);
        self.head = next;
        Ok(())
    }

    /// Builds the element in place only if a slot is free.
    ///
    /// `make` is not called when the ring is full. Returns whether the element
    /// was stored.
    #[inline]
    pub fn emplace_with<F: FnOnce() -> T>(&mut self, make: F) -> bool {
        let next = self.cfg.next(self.head);
        if next == self.tail {
            return false;
        }
        self.buf[self.head].write(make());
        self.head = next;
        true
    }

    /// Removes and returns the element at the tail.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        if self.head == self.tail {
            return None;
        }
        // SAFETY: tail != head, so the slot at tail is inside the initialized
        // range. Advancing tail right after makes it uninitialized again.
        let value = unsafe { self.buf[self.tail].assume_init_read() };
        self.tail = self.cfg.next(self.tail);
        Some(value)
    }

    /// The element the next `try_pop` would return.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        if self.head == self.tail {
            return None;
        }
        // SAFETY: slot at tail is initialized when the ring is non-empty.
        Some(unsafe { self.buf[self.tail].assume_init_ref() })
    }

    #[inline]
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        if self.head == self.tail {
            return None;
        }
        // SAFETY: as in `peek`; `&mut self` gives exclusive access.
        Some(unsafe { self.buf[self.tail].assume_init_mut() })
    }

    /// Drops every resident element and resets both indices to 0.
    pub fn clear(&mut self) {
        while self.try_pop().is_some() {}
        self.head = 0;
        self.tail = 0;
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.cfg.distance(self.head, self.tail)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cfg.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.cfg.next(self.head) == self.tail
    }

    /// Iterates resident elements from oldest to newest without consuming them.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            pos: self.tail,
            remaining: self.size(),
        }
    }
}

impl<T> Drop for FixedRing<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

impl<T> BoundedQueue<T> for FixedRing<T> {
    fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        FixedRing::with_capacity(capacity)
    }

    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), T> {
        FixedRing::try_push(self, value)
    }

    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        FixedRing::try_pop(self)
    }

    fn size(&self) -> usize {
        FixedRing::size(self)
    }

    fn capacity(&self) -> usize {
        FixedRing::capacity(self)
    }

    fn is_empty(&self) -> bool {
        FixedRing::is_empty(self)
    }

    fn is_full(&self) -> bool {
        FixedRing::is_full(self)
    }
}

impl<T: fmt::Debug> fmt::Debug for FixedRing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedRing")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("items", &DebugItems(self))
            .finish()
    }
}

struct DebugItems<'a, T>(&'a FixedRing<T>);

impl<T: fmt::Debug> fmt::Debug for DebugItems<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Borrowing FIFO iterator returned by [`FixedRing::iter`].
pub struct Iter<'a, T> {
    ring: &'a FixedRing<T>,
    pos: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: pos walks [tail, head) and `remaining` stops it at head.
        let item = unsafe { self.ring.buf[self.pos].assume_init_ref() };
        self.pos = self.ring.cfg.next(self.pos);
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a FixedRing<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            FixedRing::<u32>::with_capacity(0),
            Err(QueueError::ZeroCapacity)
        ));
    }

    #[test]
    fn starts_empty() {
        let ring = FixedRing::<u32>::with_capacity(4).unwrap();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.size(), 0);
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.peek(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut ring = FixedRing::with_capacity(3).unwrap();
        ring.try_push(10).unwrap();
        ring.try_push(20).unwrap();
        assert_eq!(ring.peek(), Some(&10));
        assert_eq!(ring.size(), 2);
        *ring.peek_mut().unwrap() += 1;
        assert_eq!(ring.try_pop(), Some(11));
        assert_eq!(ring.peek(), Some(&20));
    }

    #[test]
    fn emplace_skips_constructor_when_full() {
        let mut ring = FixedRing::with_capacity(1).unwrap();
        assert!(ring.emplace_with(|| String::from("x")));
        let mut called = false;
        assert!(!ring.emplace_with(|| {
            called = true;
            String::from("y")
        }));
        assert!(!called);
        assert_eq!(ring.try_pop().as_deref(), Some("x"));
    }

    #[test]
    fn iter_walks_across_wrap() {
        let mut ring = FixedRing::with_capacity(4).unwrap();
        for i in 0..4 {
            ring.try_push(i).unwrap();
        }
        ring.try_pop();
        ring.try_pop();
        ring.try_push(4).unwrap();
        ring.try_push(5).unwrap();
        let seen: Vec<i32> = ring.iter().copied().collect();
        assert_eq!(seen, vec![2, 3, 4, 5]);
        assert_eq!(ring.iter().len(), 4);
    }

    #[test]
    fn size_tracks_formula_through_wraps() {
        let mut ring = FixedRing::with_capacity(5).unwrap();
        let len = ring.capacity() + 1;
        for step in 0..50 {
            if step % 3 == 2 {
                ring.try_pop();
            } else {
                let _ = ring.try_push(step);
            }
            assert_eq!(ring.size(), (ring.head + len - ring.tail) % len);
            assert!(ring.size() <= ring.capacity());
            assert!(!(ring.is_empty() && ring.is_full()));
            assert_eq!(ring.is_full(), ring.size() == ring.capacity());
        }
    }

    #[test]
    fn clear_drops_resident_elements() {
        let tracker = Rc::new(());
        let mut ring = FixedRing::with_capacity(4).unwrap();
        for _ in 0..3 {
            ring.try_push(Rc::clone(&tracker)).unwrap();
        }
        assert_eq!(Rc::strong_count(&tracker), 4);

        ring.clear();
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert!(ring.is_empty());
        assert_eq!(ring.size(), 0);
        assert_eq!((ring.head, ring.tail), (0, 0));

        ring.try_push(Rc::clone(&tracker)).unwrap();
        assert_eq!(ring.size(), 1);
    }

    #[test]
    fn drop_releases_resident_elements() {
        let tracker = Rc::new(());
        {
            let mut ring = FixedRing::with_capacity(2).unwrap();
            ring.try_push(Rc::clone(&tracker)).unwrap();
            ring.try_push(Rc::clone(&tracker)).unwrap();
            let popped = ring.try_pop();
            assert!(popped.is_some());
            assert_eq!(Rc::strong_count(&tracker), 3);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn debug_lists_items_in_order() {
        let mut ring = FixedRing::with_capacity(3).unwrap();
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        let out = format!("{ring:?}");
        assert!(out.contains("items: [1, 2]"), "{out}");
    }
}
