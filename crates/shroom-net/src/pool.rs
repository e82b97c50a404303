//! Process-wide byte pool.
//!
//! Frame reads rent a buffer sized exactly to the decoded payload length;
//! the buffer returns to the pool when its owner drops it. Single-dispose is
//! enforced by ownership: a [`PooledBuf`] is not `Clone`, and moving it into
//! a [`crate::Packet`] moves the return obligation with it.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bytes::BytesMut;

/// Buffers above this capacity are dropped instead of pooled.
const MAX_POOLED_CAPACITY: usize = 64 * 1024;

static GLOBAL: OnceLock<BufferPool> = OnceLock::new();

/// A pool of reusable byte buffers.
///
/// Cloning shares the pool. Rent is O(1); returned buffers above the idle
/// limit or capacity limit are dropped rather than retained.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool retaining at most `max_idle` free buffers.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self { inner: Arc::new(PoolInner { free: Mutex::new(Vec::new()), max_idle }) }
    }

    /// The shared process-wide pool.
    #[must_use]
    pub fn global() -> &'static BufferPool {
        GLOBAL.get_or_init(|| BufferPool::new(256))
    }

    /// Rent a zeroed buffer of exactly `len` logical bytes.
    #[must_use]
    pub fn rent(&self, len: usize) -> PooledBuf {
        let mut buf = self.pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        PooledBuf { buf, pool: Arc::clone(&self.inner) }
    }

    /// Rent an empty buffer with at least `capacity` bytes reserved, for
    /// incremental writing.
    #[must_use]
    pub fn rent_empty(&self, capacity: usize) -> PooledBuf {
        let mut buf = self.pop().unwrap_or_default();
        buf.clear();
        buf.reserve(capacity);
        PooledBuf { buf, pool: Arc::clone(&self.inner) }
    }

    /// Number of idle buffers currently held.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.lock_free().len()
    }

    fn pop(&self) -> Option<BytesMut> {
        self.inner.lock_free().pop()
    }
}

impl PoolInner {
    fn lock_free(&self) -> std::sync::MutexGuard<'_, Vec<BytesMut>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put_back(&self, buf: BytesMut) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        let mut free = self.lock_free();
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

/// An owned, pool-backed byte buffer.
///
/// Dereferences to its logical byte range. Returns to its pool exactly once,
/// on drop.
pub struct PooledBuf {
    buf: BytesMut,
    pool: Arc<PoolInner>,
}

impl PooledBuf {
    /// Logical length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the logical range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append bytes, growing the logical range.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
}

impl std::ops::Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl std::ops::DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.put_back(buf);
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf").field("len", &self.len()).finish()
    }
}
