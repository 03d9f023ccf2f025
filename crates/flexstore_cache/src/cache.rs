//! Bump-allocating arena cache.

use crate::buffer::CacheBuffer;
use crate::error::{CacheError, CacheResult};
use bytes::BytesMut;
use std::fmt;
use tracing::{debug, trace};

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of successful grants.
    pub grants: u64,
    /// Number of requests refused for lack of capacity.
    pub refusals: u64,
    /// Total bytes granted since creation.
    pub bytes_granted: u64,
    /// Number of buffers explicitly released.
    pub releases: u64,
    /// Number of clears.
    pub clears: u64,
}

/// A fixed-capacity arena for staging I/O data.
///
/// # Invariants
///
/// - The sum of the lengths of all buffers granted since the last
///   [`clear`](Self::clear) never exceeds [`size`](Self::size)
/// - A refused request leaves [`remaining`](Self::remaining) unchanged
/// - After `clear`, `remaining() == size()`
///
/// # Thread Safety
///
/// All mutating operations take `&mut self`. Use
/// [`SharedCache`](crate::SharedCache) to stage from several threads.
pub struct Cache {
    /// Total budget in bytes.
    size: usize,
    /// Budget left until the next clear.
    remaining: usize,
    /// Unconsumed tail of the backing region; empty until the first grant.
    arena: BytesMut,
    /// Whether the backing region has been allocated.
    allocated: bool,
    /// Incremented by every clear.
    generation: u64,
    stats: CacheStats,
}

impl Cache {
    /// Creates a cache with a total budget of `size` bytes.
    ///
    /// The backing region is allocated on the first grant.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ZeroCapacity`] if `size` is zero.
    pub fn new(size: usize) -> CacheResult<Self> {
        if size == 0 {
            return Err(CacheError::ZeroCapacity);
        }

        Ok(Self {
            size,
            remaining: size,
            arena: BytesMut::new(),
            allocated: false,
            generation: 0,
            stats: CacheStats::default(),
        })
    }

    /// Returns the total budget.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the budget left until the next clear.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns usage counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns true if `buffer` was granted after the last clear.
    #[must_use]
    pub fn is_current(&self, buffer: &CacheBuffer) -> bool {
        buffer.generation() == self.generation
    }

    /// Grants a writable buffer of exactly `length` bytes.
    ///
    /// A zero-length request always succeeds and consumes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InsufficientCapacity`] if `length` exceeds the
    /// remaining budget. The cache is not modified in that case.
    pub fn get(&mut self, length: usize) -> CacheResult<CacheBuffer> {
        if length > self.remaining {
            self.stats.refusals += 1;
            debug!(
                requested = length,
                remaining = self.remaining,
                "cache request refused"
            );
            return Err(CacheError::InsufficientCapacity {
                requested: length,
                remaining: self.remaining,
            });
        }

        if length == 0 {
            return Ok(CacheBuffer::new(BytesMut::new(), self.generation));
        }

        if !self.allocated {
            self.arena = BytesMut::zeroed(self.size);
            self.allocated = true;
        }

        let data = self.arena.split_to(length);
        self.remaining -= length;
        self.stats.grants += 1;
        self.stats.bytes_granted += length as u64;
        trace!(length, remaining = self.remaining, "cache grant");

        Ok(CacheBuffer::new(data, self.generation))
    }

    /// Grants a buffer and copies `source` into it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InsufficientCapacity`] if `source` does not fit.
    pub fn put(&mut self, source: &[u8]) -> CacheResult<CacheBuffer> {
        let mut buffer = self.get(source.len())?;
        buffer.copy_from_slice(source);
        Ok(buffer)
    }

    /// Gives a buffer back to the cache.
    ///
    /// The arena does not reclaim individual grants: the buffer is dropped
    /// but its bytes stay consumed until the next [`clear`](Self::clear).
    pub fn release(&mut self, buffer: CacheBuffer) {
        self.stats.releases += 1;
        trace!(
            length = buffer.len(),
            stale = !self.is_current(&buffer),
            "cache release"
        );
        drop(buffer);
    }

    /// Restores the full budget and invalidates every buffer granted so far.
    ///
    /// The backing region is reused when none of its buffers are still alive;
    /// otherwise a fresh region is allocated for the next generation.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.remaining = self.size;
        self.stats.clears += 1;

        if self.allocated {
            self.arena.clear();
            self.arena.reserve(self.size);
            self.arena.resize(self.size, 0);
        }

        debug!(generation = self.generation, size = self.size, "cache cleared");
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("size", &self.size)
            .field("remaining", &self.remaining)
            .field("allocated", &self.allocated)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cache_zero_capacity_rejected() {
        assert_eq!(Cache::new(0).unwrap_err(), CacheError::ZeroCapacity);
    }

    #[test]
    fn cache_new_has_full_budget() {
        let cache = Cache::new(512).unwrap();
        assert_eq!(cache.size(), 512);
        assert_eq!(cache.remaining(), 512);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn cache_get_exact_length() {
        let mut cache = Cache::new(64).unwrap();
        let buffer = cache.get(10).unwrap();
        assert_eq!(buffer.len(), 10);
        assert_eq!(cache.remaining(), 54);
    }

    #[test]
    fn cache_refusal_keeps_remaining() {
        let mut cache = Cache::new(1024).unwrap();
        let _first = cache.get(600).unwrap();

        let err = cache.get(500).unwrap_err();
        assert_eq!(
            err,
            CacheError::InsufficientCapacity {
                requested: 500,
                remaining: 424
            }
        );
        assert!(err.is_recoverable());
        assert_eq!(cache.remaining(), 424);

        cache.clear();
        assert_eq!(cache.remaining(), 1024);
    }

    #[test]
    fn cache_grants_whole_budget() {
        let mut cache = Cache::new(8).unwrap();
        let _a = cache.get(5).unwrap();
        let _b = cache.get(3).unwrap();
        assert_eq!(cache.remaining(), 0);
        assert!(cache.get(1).is_err());
        assert!(cache.get(0).is_ok());
    }

    #[test]
    fn cache_put_copies_source() {
        let mut cache = Cache::new(32).unwrap();
        let a = cache.put(b"hello").unwrap();
        let b = cache.put(b"world").unwrap();
        assert_eq!(&a[..], b"hello");
        assert_eq!(&b[..], b"world");
        assert_eq!(cache.remaining(), 22);
    }

    #[test]
    fn cache_put_too_large_fails() {
        let mut cache = Cache::new(4).unwrap();
        assert!(cache.put(b"too long").is_err());
        assert_eq!(cache.remaining(), 4);
        assert_eq!(cache.stats().refusals, 1);
    }

    #[test]
    fn cache_buffers_do_not_overlap() {
        let mut cache = Cache::new(16).unwrap();
        let mut a = cache.get(8).unwrap();
        let mut b = cache.get(8).unwrap();
        a.fill(0xAA);
        b.fill(0xBB);
        assert!(a.iter().all(|&x| x == 0xAA));
        assert!(b.iter().all(|&x| x == 0xBB));
    }

    #[test]
    fn cache_release_does_not_restore_capacity() {
        let mut cache = Cache::new(100).unwrap();
        let buffer = cache.get(40).unwrap();
        cache.release(buffer);
        assert_eq!(cache.remaining(), 60);
        assert_eq!(cache.stats().releases, 1);
    }

    #[test]
    fn cache_clear_invalidates_old_buffers() {
        let mut cache = Cache::new(100).unwrap();
        let old = cache.get(40).unwrap();
        assert!(cache.is_current(&old));

        cache.clear();
        assert!(!cache.is_current(&old));

        let fresh = cache.get(100).unwrap();
        assert!(cache.is_current(&fresh));
        assert_eq!(fresh.generation(), 1);
    }

    #[test]
    fn cache_clear_before_first_grant() {
        let mut cache = Cache::new(10).unwrap();
        cache.clear();
        assert_eq!(cache.remaining(), 10);
        assert_eq!(cache.get(10).unwrap().len(), 10);
    }

    #[test]
    fn cache_reuses_region_after_buffers_dropped() {
        let mut cache = Cache::new(64).unwrap();
        for _ in 0..3 {
            let buffer = cache.put(&[1u8; 64]).unwrap();
            drop(buffer);
            cache.clear();
        }
        let buffer = cache.get(64).unwrap();
        assert_eq!(buffer.len(), 64);
        assert_eq!(cache.stats().clears, 3);
        assert_eq!(cache.stats().bytes_granted, 256);
    }

    proptest! {
        #[test]
        fn granted_bytes_never_exceed_capacity(
            size in 1usize..4096,
            requests in prop::collection::vec(0usize..1024, 0..64),
        ) {
            let mut cache = Cache::new(size).unwrap();
            let mut granted = 0usize;
            let mut live = Vec::new();

            for length in requests {
                let before = cache.remaining();
                match cache.get(length) {
                    Ok(buffer) => {
                        prop_assert_eq!(buffer.len(), length);
                        granted += length;
                        live.push(buffer);
                    }
                    Err(_) => {
                        prop_assert!(length > before);
                        prop_assert_eq!(cache.remaining(), before);
                    }
                }
                prop_assert!(granted <= size);
                prop_assert_eq!(cache.remaining(), size - granted);
            }

            cache.clear();
            prop_assert_eq!(cache.remaining(), size);
        }
    }
}
