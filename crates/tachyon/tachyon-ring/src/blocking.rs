//! Mutex-and-condvar bounded queue for any number of producers and consumers.
//!
//! `BlockingQueue` wraps a [`FixedRing`] in a `Mutex` and adds two condition
//! variables: producers wait on `not_full`, consumers on `not_empty`. Each
//! successful push wakes one consumer and each successful pop wakes one
//! producer. It is the easy-to-reason-about baseline the lock-free queue is
//! checked against, and the drop-in choice when waiting threads should sleep
//! instead of spin.
//!
//! Wake order among several waiters is whatever the OS condvar does; there is
//! no fairness guarantee.
//!
//! # Poisoning
//!
//! A panic while the lock is held can only come from outside the ring's index
//! updates (e.g. a `Drop` impl during `clear`), and the ring only advances an
//! index after the element move completed. The inner state is therefore always
//! consistent and a poisoned lock is simply re-entered.

use crate::error::QueueError;
use crate::fixed::FixedRing;
use crate::queue::BoundedQueue;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// A bounded FIFO shared by reference between any number of threads.
///
/// `push`/`pop` sleep until they can complete; `try_*` return at once and
/// `*_timeout` give up after a deadline.
///
/// # Example
/// ```
/// use std::thread;
/// use tachyon_ring::BlockingQueue;
///
/// let q = BlockingQueue::with_capacity(2).unwrap();
/// thread::scope(|s| {
///     s.spawn(|| {
///         for i in 0..100 {
///             q.push(i);
///         }
///     });
///     for i in 0..100 {
///         assert_eq!(q.pop(), i);
///     }
/// });
/// assert!(q.is_empty());
/// ```
pub struct BlockingQueue<T> {
    ring: Mutex<FixedRing<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Allocates a queue holding up to `capacity` elements.
    ///
    /// # Errors
    /// Returns [`QueueError::ZeroCapacity`] for `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let ring = FixedRing::with_capacity(capacity)?;
        debug!(capacity, "blocking queue allocated");
        Ok(Self {
            ring: Mutex::new(ring),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, FixedRing<T>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `value`, sleeping until a slot is free.
    pub fn push(&self, value: T) {
        let mut ring = self.lock();
        let mut value = value;
        loop {
            match ring.try_push(value) {
                Ok(()) => break,
                Err(back) => {
                    value = back;
                    ring = self
                        .not_full
                        .wait(ring)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Removes the oldest element, sleeping until one is available.
    pub fn pop(&self) -> T {
        let mut ring = self.lock();
        let value = loop {
            if let Some(value) = ring.try_pop() {
                break value;
            }
            ring = self
                .not_empty
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        };
        drop(ring);
        self.not_full.notify_one();
        value
    }

    /// Like [`push`](Self::push) but gives the value back after `timeout`.
    pub fn push_timeout(&self, value: T, timeout: Duration) -> Result<(), T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.push(value);
            return Ok(());
        };
        let mut ring = self.lock();
        let mut value = value;
        loop {
            match ring.try_push(value) {
                Ok(()) => break,
                Err(back) => value = back,
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(value);
            }
            ring = self
                .not_full
                .wait_timeout(ring, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Like [`pop`](Self::pop) but returns `None` after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.pop());
        };
        let mut ring = self.lock();
        let value = loop {
            if let Some(value) = ring.try_pop() {
                break value;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            ring = self
                .not_empty
                .wait_timeout(ring, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        };
        drop(ring);
        self.not_full.notify_one();
        Some(value)
    }

    /// Non-blocking push: returns the value back if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut ring = self.lock();
        ring.try_push(value)?;
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        let mut ring = self.lock();
        let value = ring.try_pop()?;
        drop(ring);
        self.not_full.notify_one();
        Some(value)
    }

    /// Drops every resident element and wakes all blocked producers.
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.clear();
        drop(ring);
        self.not_full.notify_all();
    }

    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Exclusive access skips the lock entirely.
    #[inline]
    fn ring_mut(&mut self) -> &mut FixedRing<T> {
        self.ring.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> BoundedQueue<T> for BlockingQueue<T> {
    fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        BlockingQueue::with_capacity(capacity)
    }

    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), T> {
        self.ring_mut().try_push(value)
    }

    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        self.ring_mut().try_pop()
    }

    fn size(&self) -> usize {
        BlockingQueue::size(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn is_empty(&self) -> bool {
        BlockingQueue::is_empty(self)
    }

    fn is_full(&self) -> bool {
        BlockingQueue::is_full(self)
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
