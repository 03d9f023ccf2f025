//! Buffers handed out by the cache.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A writable region granted by a [`Cache`](crate::Cache).
///
/// The buffer is exactly as long as requested. It remembers the cache
/// generation it was granted in, so a caller can check with
/// [`Cache::is_current`](crate::Cache::is_current) whether a clear
/// has happened since. A stale buffer is still memory-safe to access, but
/// its contents no longer count against the cache budget and must not be
/// relied on.
pub struct CacheBuffer {
    data: BytesMut,
    generation: u64,
}

impl CacheBuffer {
    pub(crate) fn new(data: BytesMut, generation: u64) -> Self {
        Self { data, generation }
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the cache generation this buffer was granted in.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Converts the buffer into immutable bytes without copying.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}

impl Deref for CacheBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for CacheBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl AsRef<[u8]> for CacheBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for CacheBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl fmt::Debug for CacheBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuffer")
            .field("len", &self.data.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_writable() {
        let mut buffer = CacheBuffer::new(BytesMut::zeroed(4), 0);
        buffer.copy_from_slice(b"abcd");
        assert_eq!(&buffer[..], b"abcd");
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn buffer_freeze_keeps_contents() {
        let mut buffer = CacheBuffer::new(BytesMut::zeroed(3), 2);
        buffer[0] = 7;
        assert_eq!(buffer.generation(), 2);
        let bytes = buffer.freeze();
        assert_eq!(&bytes[..], &[7, 0, 0]);
    }
}
