//! Reusable growable text buffers.
//!
//! The parser assembles decoded text runs, attribute values, and lexemes in
//! scratch buffers that are recycled instead of reallocated. A buffer is
//! acquired from the pool, filled, consumed, and returned automatically
//! when its guard goes out of scope — on every exit path, including
//! unwinding. Releasing clears the length but keeps the capacity.

use std::cell::RefCell;
use std::mem;
use std::ops::{Deref, DerefMut};

/// Upper bound on retained free buffers.
const MAX_FREE: usize = 16;

/// A pool of recycled `String` buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: RefCell<Vec<String>>,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a buffer, reusing a free one when available.
    #[must_use]
    pub fn acquire(&self) -> PooledBuf<'_> {
        let buf = self.free.borrow_mut().pop().unwrap_or_default();
        PooledBuf { pool: self, buf }
    }

    /// Returns the number of free buffers currently retained.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.borrow().len()
    }

    fn release(&self, mut buf: String) {
        buf.clear();
        let mut free = self.free.borrow_mut();
        if free.len() < MAX_FREE {
            free.push(buf);
        }
    }
}

/// A pooled buffer; returns itself to the pool on drop.
///
/// Dereferences to `String`, so the full string API is available while the
/// guard is held.
#[derive(Debug)]
pub struct PooledBuf<'p> {
    pool: &'p BufferPool,
    buf: String,
}

impl PooledBuf<'_> {
    /// The accumulated contents.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.buf
    }

    /// Removes the last `k` bytes.
    pub fn drop_back(&mut self, k: usize) {
        let new_len = self.buf.len().saturating_sub(k);
        self.buf.truncate(new_len);
    }

    /// Takes the accumulated contents, leaving the buffer empty.
    ///
    /// The capacity travels with the returned `String`; the guard returns
    /// an empty buffer to the pool on drop.
    #[must_use]
    pub fn take_value(&mut self) -> String {
        mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuf<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.push_str("hello");
            assert_eq!(buf.value(), "hello");
        }
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_released_buffer_is_cleared_but_keeps_capacity() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.push_str("some longer content to force an allocation");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= "some longer content to force an allocation".len());
    }

    #[test]
    fn test_drop_back() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.push_str("abcdef");
        buf.drop_back(2);
        assert_eq!(buf.value(), "abcd");
        buf.drop_back(100);
        assert_eq!(buf.value(), "");
    }

    #[test]
    fn test_take_value() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.push_str("content");
        let value = buf.take_value();
        assert_eq!(value, "content");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bounded_retention() {
        let pool = BufferPool::new();
        let guards: Vec<_> = (0..MAX_FREE + 8).map(|_| pool.acquire()).collect();
        drop(guards);
        assert_eq!(pool.free_count(), MAX_FREE);
    }

    #[test]
    fn test_release_on_unwind() {
        let pool = BufferPool::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut buf = pool.acquire();
            buf.push_str("partial");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.free_count(), 1);
    }
}
