use crate::error::QueueError;

/// The contract shared by every bounded queue in this crate.
///
/// A queue built with `with_capacity(c)` accepts exactly `c` elements before
/// `try_push` starts handing values back, and yields them in push order.
/// Failed operations never block and never panic; the caller decides whether
/// to retry, back off, or drop.
///
/// Taking `&mut self` keeps the trait usable for the single-threaded ring and
/// for an un-split SPSC queue. Cross-thread use goes through each type's own
/// API (`SpscQueue::split`, `BlockingQueue`'s `&self` methods).
pub trait BoundedQueue<T>: Sized {
    /// Allocates storage for `capacity` usable slots (plus the sentinel).
    fn with_capacity(capacity: usize) -> Result<Self, QueueError>;

    /// Appends `value`, or returns it back if the queue is full.
    fn try_push(&mut self, value: T) -> Result<(), T>;

    /// Removes the oldest element, or `None` if the queue is empty.
    fn try_pop(&mut self) -> Option<T>;

    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }
}
