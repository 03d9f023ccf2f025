//! A cache handle that can be shared across threads.

use crate::buffer::CacheBuffer;
use crate::cache::{Cache, CacheStats};
use crate::error::CacheResult;
use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe, cloneable handle to a [`Cache`].
///
/// Every operation takes the cache lock for its duration, which provides the
/// external serialization a plain `Cache` leaves to the caller.
#[derive(Debug, Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<Cache>>,
}

impl SharedCache {
    /// Creates a shared cache with a total budget of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero.
    pub fn new(size: usize) -> CacheResult<Self> {
        Ok(Self::from_cache(Cache::new(size)?))
    }

    /// Wraps an existing cache.
    #[must_use]
    pub fn from_cache(cache: Cache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// See [`Cache::get`].
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining budget is too small.
    pub fn get(&self, length: usize) -> CacheResult<CacheBuffer> {
        self.inner.lock().get(length)
    }

    /// See [`Cache::put`].
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining budget is too small.
    pub fn put(&self, source: &[u8]) -> CacheResult<CacheBuffer> {
        self.inner.lock().put(source)
    }

    /// See [`Cache::release`].
    pub fn release(&self, buffer: CacheBuffer) {
        self.inner.lock().release(buffer);
    }

    /// See [`Cache::clear`].
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// See [`Cache::size`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().size()
    }

    /// See [`Cache::remaining`].
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inner.lock().remaining()
    }

    /// See [`Cache::is_current`].
    #[must_use]
    pub fn is_current(&self, buffer: &CacheBuffer) -> bool {
        self.inner.lock().is_current(buffer)
    }

    /// See [`Cache::stats`].
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the cache.
    ///
    /// Use this to make several grants without another thread
    /// interleaving.
    pub fn with<R>(&self, f: impl FnOnce(&mut Cache) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn shared_grants_are_bounded_across_threads() {
        let cache = SharedCache::new(1000).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut granted = Vec::new();
                    for _ in 0..50 {
                        if let Ok(buffer) = cache.get(7) {
                            granted.push(buffer);
                        }
                    }
                    granted.iter().map(CacheBuffer::len).sum::<usize>()
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total <= 1000);
        assert_eq!(cache.remaining(), 1000 - total);
        assert_eq!(total, 1000 / 7 * 7);
    }

    #[test]
    fn shared_with_groups_grants() {
        let cache = SharedCache::new(10).unwrap();
        let pair = cache.with(|c| (c.get(4), c.get(4)));
        assert!(pair.0.is_ok() && pair.1.is_ok());
        assert_eq!(cache.remaining(), 2);

        cache.clear();
        assert_eq!(cache.remaining(), cache.size());
        assert_eq!(cache.stats().clears, 1);
    }
}
