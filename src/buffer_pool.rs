//! Process-wide recycled scratch buffers
//!
//! [`BufferPool<T>`] hands out cleared, capacity-preserving `Vec<T>` buffers and takes them
//! back, so that algorithms needing a scratch dart or slot buffer (a traversal stack, a
//! sort-and-dedup workspace) do not pay for a fresh allocation on every call. Unlike
//! [`crate::markers`] (single-writer-thread, plain [`std::cell::RefCell`]), this pool is the
//! one genuinely concurrent resource named in the crate's concurrency model: acquire/release
//! are mutex-protected so buffers can be shared across threads doing read-only traversal.
//!
//! The crate names two concrete instantiations, [`u32_pool`] and [`dart_pool`], matching the
//! two payload types the wider crate actually needs scratch buffers for, rather than a fully
//! generic process-wide registry keyed by `TypeId` — Rust's `static` items cannot be generic
//! over a type parameter, so "one pool per payload type" is expressed as one lazily-initialized
//! static per named type instead.
//!
//! Note: unlike the data model this crate is adapted from, [`crate::Cell`] here is *not* a
//! bare transparent newtype over [`crate::Dart`] — it additionally carries the dart a cell was
//! resolved from for diagnostics (see `DESIGN.md`) — so a [`Dart`] buffer cannot be
//! reinterpreted in place as a `Cell` buffer; callers needing cell scratch space collect
//! [`crate::Key`] slot indices instead, which is what [`u32_pool`] is for.

// ------ IMPORTS

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        use loom::sync::Mutex;
    } else {
        use std::sync::{Mutex, OnceLock};
    }
}

use crate::dart::Dart;

// ------ CONTENT

/// A mutex-protected free list of recycled `Vec<T>` buffers.
#[derive(Debug)]
pub struct BufferPool<T> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BufferPool<T> {
    /// Build an empty pool.
    #[must_use = "constructed object is not used, consider removing this call"]
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    /// Hand out a buffer, recycled from the pool if one is available, otherwise freshly
    /// allocated. Always empty (`len() == 0`); a recycled buffer keeps its prior capacity.
    #[must_use = "unused buffer"]
    pub fn get_buffer(&self) -> Vec<T> {
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        free.pop().unwrap_or_default()
    }

    /// Return `buffer` to the pool for later reuse by [`get_buffer`](BufferPool::get_buffer).
    /// The buffer is cleared (its capacity is preserved) before being stored.
    pub fn release_buffer(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        free.push(buffer);
    }

    /// Number of buffers currently sitting idle in the pool. Exposed for tests and diagnostics.
    #[must_use = "unused count"]
    pub fn idle_count(&self) -> usize {
        self.free.lock().expect("buffer pool mutex poisoned").len()
    }
}

#[cfg(not(loom))]
static U32_POOL: OnceLock<BufferPool<u32>> = OnceLock::new();

#[cfg(not(loom))]
static DART_POOL: OnceLock<BufferPool<Dart>> = OnceLock::new();

/// The process-wide scratch pool for `u32` buffers (raw dart/cell slot indices).
#[cfg(not(loom))]
#[must_use = "unused pool reference"]
pub fn u32_pool() -> &'static BufferPool<u32> {
    U32_POOL.get_or_init(BufferPool::new)
}

/// The process-wide scratch pool for [`Dart`] buffers.
#[cfg(not(loom))]
#[must_use = "unused pool reference"]
pub fn dart_pool() -> &'static BufferPool<Dart> {
    DART_POOL.get_or_init(BufferPool::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_buffer_is_always_empty() {
        let pool: BufferPool<u32> = BufferPool::new();
        let buf = pool.get_buffer();
        assert!(buf.is_empty());
    }

    #[test]
    fn release_then_get_recycles_capacity() {
        let pool: BufferPool<u32> = BufferPool::new();
        let mut buf = pool.get_buffer();
        buf.reserve(64);
        let cap = buf.capacity();
        buf.extend_from_slice(&[1, 2, 3]);
        pool.release_buffer(buf);
        assert_eq!(pool.idle_count(), 1);

        let recycled = pool.get_buffer();
        assert!(recycled.is_empty());
        assert!(recycled.capacity() >= cap);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn named_pools_are_process_wide_singletons() {
        let a = u32_pool();
        let b = u32_pool();
        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(dart_pool(), dart_pool()));
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;

    #[test]
    fn concurrent_get_and_release_never_lose_or_duplicate_buffers() {
        loom::model(|| {
            let pool = Arc::new(BufferPool::<u32>::new());
            pool.release_buffer(Vec::new());

            let p1 = Arc::clone(&pool);
            let t1 = loom::thread::spawn(move || {
                let b = p1.get_buffer();
                p1.release_buffer(b);
            });

            let b = pool.get_buffer();
            pool.release_buffer(b);

            t1.join().unwrap();
            assert_eq!(pool.idle_count(), 1);
        });
    }
}
