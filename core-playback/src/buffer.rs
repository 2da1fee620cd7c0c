//! # Music Buffer
//!
//! The bounded chunk allocator shared by decoder and player. Chunks move by
//! value: the decoder allocates and fills them, the pipe transports them,
//! and whoever holds a chunk last hands it back here.

use crate::chunk::MusicChunk;
use parking_lot::Mutex;

/// A pool of reusable [`MusicChunk`]s with a fixed capacity.
pub struct MusicBuffer {
    free: Mutex<Vec<MusicChunk>>,
    capacity: usize,
}

impl MusicBuffer {
    /// Create a pool holding `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            free: Mutex::new((0..capacity).map(|_| MusicChunk::new()).collect()),
            capacity,
        }
    }

    /// Take a chunk out of the pool. Returns `None` when all chunks are in
    /// flight; the caller decides whether to wait.
    pub fn allocate(&self) -> Option<MusicChunk> {
        self.free.lock().pop()
    }

    /// Hand a chunk back to the pool, resetting it.
    pub fn return_chunk(&self, mut chunk: MusicChunk) {
        chunk.clear();
        let mut free = self.free.lock();
        debug_assert!(free.len() < self.capacity);
        free.push(chunk);
    }

    /// Number of chunks currently in the pool.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total number of chunks managed by this pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_return() {
        let buffer = MusicBuffer::new(2);
        assert_eq!(buffer.available(), 2);

        let a = buffer.allocate().unwrap();
        let b = buffer.allocate().unwrap();
        assert!(buffer.allocate().is_none());
        assert_eq!(buffer.available(), 0);

        buffer.return_chunk(a);
        buffer.return_chunk(b);
        assert_eq!(buffer.available(), 2);
    }

    #[test]
    fn test_returned_chunk_is_reset() {
        let buffer = MusicBuffer::new(1);
        let mut chunk = buffer.allocate().unwrap();
        chunk.replay_gain_serial = 42;
        buffer.return_chunk(chunk);

        let chunk = buffer.allocate().unwrap();
        assert!(chunk.is_empty());
        assert_eq!(chunk.replay_gain_serial, 0);
    }
}
