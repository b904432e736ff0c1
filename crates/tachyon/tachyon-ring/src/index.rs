//! Ring configuration and index arithmetic shared by every queue variant.
//!
//! All queues in this crate use the sentinel-slot layout: the backing store
//! holds `capacity + 1` slots and one of them is always left unused, so that
//! `head == tail` means empty and `next(head) == tail` means full.
//!
//! This module provides:
//! - Capacity validation and the derived physical length
//! - The "next index" step, with a bitmask fast path for power-of-two lengths
//! - The occupancy formula used by every `size()` query

use crate::error::QueueError;

/// Geometry of a sentinel-slot ring.
///
/// Built once at construction and never changed; every queue copies it into
/// its own state so the hot path touches no shared metadata.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of physical slots, always `capacity + 1`.
    physical_len: usize,
    /// `physical_len - 1` when `physical_len` is a power of 2, otherwise 0.
    mask: usize,
    /// Whether the masked fast path applies.
    is_pow2: bool,
}

impl RingConfig {
    /// Creates a ring geometry able to hold `capacity` elements.
    ///
    /// # Errors
    /// - [`QueueError::ZeroCapacity`] if `capacity == 0`
    /// - [`QueueError::CapacityOverflow`] if `capacity + 1` does not fit in `usize`
    ///
    /// # Example
    /// ```
    /// use tachyon_ring::RingConfig;
    /// let cfg = RingConfig::new(7).unwrap();
    /// assert_eq!(cfg.physical_len(), 8);
    /// assert!(cfg.is_pow2());
    /// assert!(RingConfig::new(0).is_err());
    /// ```
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let physical_len = capacity
            .checked_add(1)
            .ok_or(QueueError::CapacityOverflow {
                requested: capacity,
            })?;
        let is_pow2 = physical_len.is_power_of_two();
        Ok(Self {
            physical_len,
            mask: if is_pow2 { physical_len - 1 } else { 0 },
            is_pow2,
        })
    }

    /// Usable capacity: one less than the physical length.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.physical_len - 1
    }

    /// Number of slots actually allocated.
    #[inline(always)]
    pub fn physical_len(&self) -> usize {
        self.physical_len
    }

    #[inline(always)]
    pub fn is_pow2(&self) -> bool {
        self.is_pow2
    }

    /// Bitmask for the fast path. Only meaningful when [`is_pow2`](Self::is_pow2).
    ///
    /// ```
    /// use tachyon_ring::RingConfig;
    /// let cfg = RingConfig::new(15).unwrap();
    /// assert_eq!(cfg.mask(), 0b1111);
    /// ```
    #[inline(always)]
    pub fn mask(&self) -> usize {
        self.mask
    }

    /// Returns the index after `i`, wrapping at the physical length.
    #[inline(always)]
    pub fn next(&self, i: usize) -> usize {
        next_index(i, self.physical_len, self.mask, self.is_pow2)
    }

    /// Number of occupied slots between `tail` (inclusive) and `head` (exclusive).
    ///
    /// Computes `(head - tail + physical_len) mod physical_len` without
    /// overflowing, given both indices are in `[0, physical_len)`.
    #[inline(always)]
    pub fn distance(&self, head: usize, tail: usize) -> usize {
        if head >= tail {
            head - tail
        } else {
            self.physical_len - (tail - head)
        }
    }
}

/// Advances a ring index by one position.
///
/// # How It Works
///
/// When `len` is a power of 2 (e.g., 8), `mask` is `len - 1` = `0b111` and the
/// AND keeps only the lower bits, which wraps `8` back to `0` without a
/// division. Any other length falls back to a compare-and-reset, which is
/// still division-free because the step is always exactly one.
///
/// ```text
/// len = 8 (mask = 7)       len = 6 (no mask)
/// i = 0 → 1                i = 0 → 1
/// i = 6 → 7                i = 4 → 5
/// i = 7 → 8 & 7 = 0        i = 5 → 6 == len → 0
/// ```
///
/// # Arguments
/// - `i`: current index, in `[0, len)`
/// - `len`: physical ring length
/// - `mask`: `len - 1`, only read when `is_pow2`
/// - `is_pow2`: whether `len` is a power of 2
#[inline(always)]
pub fn next_index(i: usize, len: usize, mask: usize, is_pow2: bool) -> usize {
    let j = i + 1;
    if is_pow2 {
        j & mask
    } else if j == len {
        0
    } else {
        j
    }
}
