//! `BufferPool` — a free-list of scratch `Vec<u8>` buffers, rented out to
//! avoid re-allocating for every cstring read or scratch document build.

use parking_lot::Mutex;

/// Pool of reusable byte buffers.
///
/// Buffers come back via `Drop` on `PooledBuffer`, not an explicit return
/// call, so a rental can't be leaked by an early return or a `?`.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Rent a buffer with at least `capacity` bytes of headroom, cleared
    /// and ready to use.
    pub fn rent(&self, capacity: usize) -> Vec<u8> {
        let mut free = self.free.lock();
        if let Some(pos) = free.iter().position(|b| b.capacity() >= capacity) {
            let mut buf = free.swap_remove(pos);
            buf.clear();
            buf
        } else {
            Vec::with_capacity(capacity)
        }
    }

    /// Rent a buffer as an RAII guard that returns it to the pool on drop.
    pub fn rent_guarded(&self, capacity: usize) -> PooledBuffer<'_> {
        PooledBuffer {
            pool: self,
            buf: Some(self.rent(capacity)),
            sensitive: false,
        }
    }

    /// Same as `rent_guarded`, but the buffer is zeroed before it is
    /// returned to the free list (password/encryption-key scratch space).
    pub fn rent_sensitive(&self, capacity: usize) -> PooledBuffer<'_> {
        PooledBuffer {
            pool: self,
            buf: Some(self.rent(capacity)),
            sensitive: true,
        }
    }

    fn give_back(&self, buf: Vec<u8>) {
        const MAX_POOLED: usize = 64;
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An RAII rental from a `BufferPool`. Derefs to `Vec<u8>`; returns the
/// buffer to its pool (zeroed first, if `sensitive`) on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
    sensitive: bool,
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().unwrap()
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            if self.sensitive {
                buf.iter_mut().for_each(|b| *b = 0);
            }
            self.pool.give_back(buf);
        }
    }
}
