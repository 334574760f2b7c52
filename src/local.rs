use crate::slots::SlotArray;
use std::{
    cell::RefCell,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

/// Type-erased view of a slot array, enough to hand cached slots back when a
/// thread exits.
pub(crate) trait SlotRelease: Send + Sync {
    fn unmark(&self, index: usize) -> bool;
}

impl<T: Send> SlotRelease for SlotArray<T> {
    fn unmark(&self, index: usize) -> bool {
        SlotArray::unmark(self, index)
    }
}

/// Ring of slot indices the current thread has claimed and not handed out.
///
/// Fetch and release never interleave within one thread, so the two walkers
/// need no synchronization. `release_walker - fetch_walker == len` always
/// holds (modulo wrapping).
#[derive(Debug)]
pub(crate) struct LocalCache {
    ring: Box<[usize]>,
    mask: usize,
    len: usize,
    fetch_walker: usize,
    release_walker: usize,
}

impl LocalCache {
    /// `capacity` must be a power of two.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        LocalCache {
            ring: vec![0; capacity].into_boxed_slice(),
            mask: capacity - 1,
            len: 0,
            fetch_walker: 0,
            release_walker: 0,
        }
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let index = self.ring[self.fetch_walker & self.mask];
        self.fetch_walker = self.fetch_walker.wrapping_add(1);
        self.len -= 1;
        Some(index)
    }

    /// Returns false if the ring is full; the caller keeps the slot.
    #[inline]
    pub(crate) fn push(&mut self, index: usize) -> bool {
        if self.len == self.ring.len() {
            return false;
        }
        self.ring[self.release_walker & self.mask] = index;
        self.release_walker = self.release_walker.wrapping_add(1);
        self.len += 1;
        true
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = usize> + '_ {
        core::iter::from_fn(move || self.pop())
    }
}

struct Entry {
    pool_id: u64,
    home: Weak<dyn SlotRelease>,
    cache: LocalCache,
}

impl Drop for Entry {
    // Runs on thread exit: cached slots go back to the pool if it still
    // exists.
    fn drop(&mut self) {
        if self.cache.is_empty() {
            return;
        }
        if let Some(home) = self.home.upgrade() {
            let flushed = self.cache.len();
            for index in self.cache.drain() {
                home.unmark(index);
            }
            tracing::debug!(pool_id = self.pool_id, flushed, "per-thread cache flushed on drop");
        }
    }
}

thread_local! {
    static CACHES: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
}

fn next_pool_id() -> u64 {
    static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// A pool's key into the per-thread cache registry.
pub(crate) struct LocalHandle {
    pool_id: u64,
    home: Weak<dyn SlotRelease>,
    capacity: usize,
}

impl LocalHandle {
    pub(crate) fn new<T: Send + 'static>(slots: &Arc<SlotArray<T>>, capacity: usize) -> Self {
        let home: Arc<dyn SlotRelease> = slots.clone();
        LocalHandle {
            pool_id: next_pool_id(),
            home: Arc::downgrade(&home),
            capacity,
        }
    }

    /// Runs `f` on this thread's cache for the pool, creating it on first
    /// use.
    ///
    /// Returns `None` when the cache cannot be reached: the thread is
    /// tearing down its locals, or `f` is already running further up the
    /// stack (a `reset` that uses the pool). Callers then take the shared
    /// path.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut LocalCache) -> R) -> Option<R> {
        CACHES
            .try_with(|caches| {
                let mut caches = caches.try_borrow_mut().ok()?;
                let position = match caches.iter().position(|e| e.pool_id == self.pool_id) {
                    Some(position) => position,
                    None => {
                        caches.retain(|e| e.home.strong_count() > 0);
                        caches.push(Entry {
                            pool_id: self.pool_id,
                            home: self.home.clone(),
                            cache: LocalCache::new(self.capacity),
                        });
                        caches.len() - 1
                    }
                };
                Some(f(&mut caches[position].cache))
            })
            .ok()
            .flatten()
    }

    /// Removes this thread's cache for the pool, unmarking its slots.
    /// Returns how many slots were handed back.
    pub(crate) fn flush(&self) -> usize {
        let entry = CACHES
            .try_with(|caches| {
                let mut caches = caches.try_borrow_mut().ok()?;
                let position = caches.iter().position(|e| e.pool_id == self.pool_id)?;
                Some(caches.swap_remove(position))
            })
            .ok()
            .flatten();
        // Dropped outside the borrow; Entry::drop does the unmarking.
        entry.map_or(0, |entry| entry.cache.len())
    }

    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

impl core::fmt::Debug for LocalHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalHandle")
            .field("pool_id", &self.pool_id)
            .field("capacity", &self.capacity)
            .finish()
    }
}
