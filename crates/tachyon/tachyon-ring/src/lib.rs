//! Bounded, fixed-capacity queues built on one sentinel-slot ring layout.
//!
//! | type            | threads                      | on full / empty        |
//! |-----------------|------------------------------|------------------------|
//! | [`FixedRing`]   | one                          | returns immediately    |
//! | [`SpscQueue`]   | one producer + one consumer  | returns immediately    |
//! | [`BlockingQueue`] | any number                 | sleeps (or times out)  |
//!
//! All three implement [`BoundedQueue`] and behave identically for the same
//! sequence of single-threaded operations: a queue built for `n` elements
//! holds exactly `n`, allocates once, and never grows.

mod blocking;
mod error;
mod fixed;
mod index;
mod queue;
mod spsc;

pub use blocking::BlockingQueue;
pub use error::QueueError;
pub use fixed::{FixedRing, Iter};
pub use index::{RingConfig, next_index};
pub use queue::BoundedQueue;
pub use spsc::{Consumer, Producer, SpscQueue};
