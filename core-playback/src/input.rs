//! # Input Streams
//!
//! The stream abstraction the decoder bridge reads compressed audio from.
//! Concrete network/file backends live outside this crate; here is the
//! contract they implement, the handle that pairs a backend with its lock,
//! and an in-memory backend used by tests and local payloads.

use core_audio::Tag;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::io;
use std::sync::Arc;

// ============================================================================
// Source Contract
// ============================================================================

/// A source of compressed audio bytes.
///
/// All methods are called with the stream lock held; none of them may
/// block. Backends running their own I/O thread mutate their state through
/// [`InputStreamHandle::update_source`], which also wakes a blocked reader.
pub trait InputStreamSource: Send {
    /// Refresh internal state (poll a background transfer, etc.).
    fn update(&mut self) {}

    /// Returns `true` once headers are parsed and reading may begin.
    fn is_ready(&self) -> bool;

    /// Returns `true` if `read` would make progress right now (data
    /// buffered, or end of stream reached).
    fn is_available(&self) -> bool;

    /// Returns `true` when the end of the stream has been reached.
    fn is_eof(&self) -> bool;

    /// Read up to `buf.len()` bytes. Returning `Ok(0)` means end of
    /// stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Take the pending mid-stream tag, if one arrived since the last
    /// call.
    fn read_tag(&mut self) -> Option<Tag> {
        None
    }
}

/// Creates [`InputStreamSource`]s from URIs; injected into the decoder
/// bridge so `open_uri` stays backend-agnostic.
pub trait InputStreamOpener: Send + Sync {
    fn open(&self, uri: &str) -> io::Result<Box<dyn InputStreamSource>>;
}

// ============================================================================
// Handle
// ============================================================================

/// An open input stream: the source paired with its mutex and the decoder
/// condvar.
///
/// The condvar is the one shared with `DecoderControl`. Only the decoder
/// thread ever waits on it, so it is associated with at most one mutex at
/// any time even though both this handle and the control use it.
pub struct InputStreamHandle {
    source: Mutex<Box<dyn InputStreamSource>>,
    cond: Arc<Condvar>,
}

impl InputStreamHandle {
    pub fn new(source: Box<dyn InputStreamSource>, cond: Arc<Condvar>) -> Arc<Self> {
        Arc::new(Self {
            source: Mutex::new(source),
            cond,
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn InputStreamSource>> {
        self.source.lock()
    }

    /// Wait for a producer signal. Command words are written under the
    /// control mutex, not this one, so the wait is bounded: the cancel
    /// predicate is re-checked at least every 50 ms.
    pub(crate) fn cond_wait(&self, guard: &mut MutexGuard<'_, Box<dyn InputStreamSource>>) {
        let _ = self
            .cond
            .wait_for(guard, std::time::Duration::from_millis(50));
    }

    /// Run `f` with the locked source.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut dyn InputStreamSource) -> R) -> R {
        let mut source = self.source.lock();
        f(source.as_mut())
    }

    /// Mutate the source from a producer (I/O thread, test driver) and wake
    /// a decoder blocked on this stream.
    pub fn update_source<R>(&self, f: impl FnOnce(&mut dyn InputStreamSource) -> R) -> R {
        let result = self.with_source(f);
        self.cond.notify_all();
        result
    }

    /// Take the pending mid-stream tag under the lock.
    pub fn lock_read_tag(&self) -> Option<Tag> {
        self.source.lock().read_tag()
    }

    /// Returns `true` when the end of the stream has been reached.
    pub fn is_eof(&self) -> bool {
        self.source.lock().is_eof()
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// A fully buffered input stream over a [`Bytes`] payload.
///
/// Always ready and always available; end of stream is reached when the
/// payload is exhausted.
pub struct MemoryInputStream {
    data: Bytes,
    position: usize,
    pending_tag: Option<Tag>,
}

impl MemoryInputStream {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            position: 0,
            pending_tag: None,
        }
    }

    /// Queue a tag to be reported by the next `read_tag` call.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.pending_tag = Some(tag);
        self
    }
}

impl InputStreamSource for MemoryInputStream {
    fn is_ready(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }

    fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        let nbytes = remaining.len().min(buf.len());
        buf[..nbytes].copy_from_slice(&remaining[..nbytes]);
        self.position += nbytes;
        Ok(nbytes)
    }

    fn read_tag(&mut self) -> Option<Tag> {
        self.pending_tag.take()
    }
}

/// Opener serving one preloaded payload for every URI.
pub struct MemoryStreamOpener {
    data: Bytes,
}

impl MemoryStreamOpener {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl InputStreamOpener for MemoryStreamOpener {
    fn open(&self, _uri: &str) -> io::Result<Box<dyn InputStreamSource>> {
        Ok(Box::new(MemoryInputStream::new(self.data.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_read() {
        let mut stream = MemoryInputStream::new(Bytes::from_static(b"abcdef"));
        assert!(stream.is_ready());
        assert!(!stream.is_eof());

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");

        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert!(stream.is_eof());
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_tag_is_one_shot() {
        use core_audio::TagKind;

        let tag = Tag::new().with_item(TagKind::Title, "Stream");
        let mut stream = MemoryInputStream::new(Bytes::new()).with_tag(tag.clone());
        assert_eq!(stream.read_tag(), Some(tag));
        assert_eq!(stream.read_tag(), None);
    }
}
