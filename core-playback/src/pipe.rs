//! # Music Pipe
//!
//! The FIFO of filled [`MusicChunk`]s between the decoder thread (producer)
//! and the player thread (consumer).

use crate::buffer::MusicBuffer;
use crate::chunk::MusicChunk;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded-by-allocator FIFO of music chunks.
///
/// The pipe itself never blocks; backpressure comes from the
/// [`MusicBuffer`] running out of chunks.
pub struct MusicPipe {
    chunks: Mutex<VecDeque<MusicChunk>>,
}

impl MusicPipe {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a filled chunk.
    pub fn push(&self, chunk: MusicChunk) {
        self.chunks.lock().push_back(chunk);
    }

    /// Remove and return the oldest chunk.
    pub fn shift(&self) -> Option<MusicChunk> {
        self.chunks.lock().pop_front()
    }

    /// Drop all queued chunks, returning them to the allocator.
    pub fn clear(&self, buffer: &MusicBuffer) {
        let mut chunks = self.chunks.lock();
        for chunk in chunks.drain(..) {
            buffer.return_chunk(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}

impl Default for MusicPipe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let buffer = MusicBuffer::new(2);
        let pipe = MusicPipe::new();

        let mut first = buffer.allocate().unwrap();
        first.replay_gain_serial = 1;
        let mut second = buffer.allocate().unwrap();
        second.replay_gain_serial = 2;

        pipe.push(first);
        pipe.push(second);
        assert_eq!(pipe.len(), 2);

        assert_eq!(pipe.shift().unwrap().replay_gain_serial, 1);
        assert_eq!(pipe.shift().unwrap().replay_gain_serial, 2);
        assert!(pipe.shift().is_none());
    }

    #[test]
    fn test_clear_returns_chunks() {
        let buffer = MusicBuffer::new(3);
        let pipe = MusicPipe::new();

        pipe.push(buffer.allocate().unwrap());
        pipe.push(buffer.allocate().unwrap());
        assert_eq!(buffer.available(), 1);

        pipe.clear(&buffer);
        assert!(pipe.is_empty());
        assert_eq!(buffer.available(), 3);
    }
}
