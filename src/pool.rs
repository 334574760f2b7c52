use crate::{
    guard::Lease, local::LocalHandle, slots::SlotArray, Capacity, ClaimPolicy, FetchFailStrategy,
    ObjectCreator, OwnedPooled, PoolConfig, PoolMode, PoolStrategy, Pooled, Reusable, Result,
};
use std::{fmt, ptr::NonNull, sync::Arc};

type Fetcher<C, T> = fn(&Pool<C, T>) -> Result<Option<Lease<T>>>;
type Releaser<C, T> = fn(&Pool<C, T>, Lease<T>);

/// A fixed-capacity pool of reusable objects shared between threads.
///
/// Every object is built when the pool is created and lives in its own
/// slot. Fetching claims a slot with a compare-and-swap on its in-use flag;
/// releasing resets the object and clears the flag. No locks are taken.
///
/// Unless the pool runs in [`PoolMode::MustFetchInPool`], each thread keeps a
/// small cache of slots it has released, so a thread that fetches and
/// releases in a loop never touches the shared flags. Cached slots are handed
/// back when the thread exits or calls [`Self::flush_local`].
///
/// # Examples
///
/// ```
/// use slotpool::{Pool, Reusable};
///
/// #[derive(Default)]
/// struct Buffer {
///     bytes: Vec<u8>,
///     id: Option<usize>,
/// }
///
/// impl Reusable for Buffer {
///     fn reset(&mut self) {
///         self.bytes.clear();
///     }
///     fn allocated_id(&self) -> Option<usize> {
///         self.id
///     }
///     fn set_allocated_id(&mut self, id: Option<usize>) {
///         self.id = id;
///     }
/// }
///
/// let pool = Pool::new(Buffer::default, 16).unwrap();
/// let mut buffer = pool.fetch().unwrap().unwrap();
/// buffer.bytes.extend_from_slice(b"hello");
/// pool.release(buffer);
///
/// assert!(pool.fetch().unwrap().unwrap().bytes.is_empty());
/// ```
pub struct Pool<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    creator: C,
    slots: Arc<SlotArray<T>>,
    local: Option<LocalHandle>,
    config: PoolConfig,
    strategy: PoolStrategy,
    on_exhausted: FetchFailStrategy,
    refill: usize,
    fetcher: Fetcher<C, T>,
    releaser: Releaser<C, T>,
}

impl<C, T> Pool<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    /// Creates a pool of at least `size` objects with the default strategy,
    /// [`PoolStrategy::FETCH_FAIL_AS_NEW`], and the default configuration.
    pub fn new(creator: C, size: usize) -> Result<Self> {
        Self::builder(creator, size).build()
    }

    /// Creates a pool of at least `size` objects with the given strategy and
    /// the default configuration.
    pub fn with_strategy(creator: C, size: usize, strategy: PoolStrategy) -> Result<Self> {
        Self::builder(creator, size).strategy(strategy).build()
    }

    /// Starts configuring a pool of at least `size` objects.
    pub fn builder(creator: C, size: usize) -> PoolBuilder<C, T> {
        PoolBuilder {
            creator,
            size,
            strategy: PoolStrategy::default(),
            config: PoolConfig::default(),
            _item: std::marker::PhantomData,
        }
    }

    fn from_builder(builder: PoolBuilder<C, T>) -> Result<Self> {
        let PoolBuilder {
            creator,
            size,
            strategy,
            config,
            ..
        } = builder;
        config.validate()?;
        let capacity = Capacity::for_request(size, config.get_max_capacity())?;
        let slots = Arc::new(SlotArray::new(capacity, &creator));

        let mode = strategy.mode();
        let fetcher: Fetcher<C, T> = match mode {
            PoolMode::Cached => Self::fetch_cached,
            PoolMode::Prefetch => Self::fetch_prefetch,
            PoolMode::MustFetchInPool => Self::fetch_in_pool,
        };
        let releaser: Releaser<C, T> = match mode {
            PoolMode::Cached => Self::release_cached,
            PoolMode::Prefetch | PoolMode::MustFetchInPool => Self::release_direct,
        };
        let local = match mode {
            PoolMode::MustFetchInPool => None,
            PoolMode::Cached | PoolMode::Prefetch => {
                Some(LocalHandle::new(&slots, config.get_cache_capacity()))
            }
        };
        let on_exhausted = match strategy.claim() {
            ClaimPolicy::Bounded(fail) => fail,
            ClaimPolicy::Unbounded => FetchFailStrategy::NotAvailable,
        };
        // Leave at least one slot for the claim that triggers the refill.
        let refill = config.get_cache_capacity().min(capacity.len() - 1);

        tracing::debug!(
            pool_id = local.as_ref().map(LocalHandle::pool_id),
            requested = size,
            capacity = capacity.len(),
            ?mode,
            "object pool created"
        );
        Ok(Pool {
            creator,
            slots,
            local,
            config,
            strategy,
            on_exhausted,
            refill,
            fetcher,
            releaser,
        })
    }

    /// Wraps the pool in an [`Arc`], enabling [`Self::fetch_owned`].
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Gets an object from the pool.
    ///
    /// The thread's cache is tried first, then the shared slots. What
    /// happens when no slot can be claimed depends on the strategy:
    /// [`FetchFailStrategy::NotAvailable`] returns
    /// [`PoolError::Unavailable`](crate::PoolError::Unavailable),
    /// [`FetchFailStrategy::Nullable`] returns `Ok(None)` and
    /// [`FetchFailStrategy::CallCreator`] returns an object built outside the
    /// pool. Pools with [`ClaimPolicy::Unbounded`] spin until a slot is free.
    pub fn fetch(&self) -> Result<Option<Pooled<'_, C, T>>> {
        Ok((self.fetcher)(self)?.map(|lease| Pooled::new(lease, self)))
    }

    /// Gets an object that holds an `Arc` to the pool instead of a borrow.
    ///
    /// Behaves like [`Self::fetch`] otherwise.
    pub fn fetch_owned(self: Arc<Self>) -> Result<Option<OwnedPooled<C, T>>> {
        let lease = (self.fetcher)(self.as_ref())?;
        Ok(lease.map(|lease| OwnedPooled::new(lease, &self)))
    }

    /// Releases an object back to the pool it was fetched from.
    ///
    /// Equivalent to dropping the guard. The object is reset; objects built
    /// outside the pool are reset and dropped.
    pub fn release(&self, obj: Pooled<'_, C, T>) {
        drop(obj);
    }

    /// Hands this thread's cached slots back to the shared array and returns
    /// how many there were.
    pub fn flush_local(&self) -> usize {
        self.local.as_ref().map_or(0, LocalHandle::flush)
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of claimed slots, counting those parked in per-thread caches.
    /// Only a snapshot while other threads use the pool.
    pub fn in_use(&self) -> usize {
        self.slots.in_use()
    }

    /// The mode chosen at construction.
    pub fn mode(&self) -> PoolMode {
        self.strategy.mode()
    }

    /// The strategy the pool was built with.
    pub fn strategy(&self) -> PoolStrategy {
        self.strategy
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn release_lease(&self, lease: Lease<T>) {
        (self.releaser)(self, lease)
    }

    #[inline]
    fn slot_lease(&self, index: usize) -> Lease<T> {
        Lease::Slot {
            index,
            ptr: self.slots.object(index),
        }
    }

    #[inline]
    fn pop_local(&self) -> Option<Lease<T>> {
        let local = self.local.as_ref()?;
        local.with(|cache| cache.pop()).flatten().map(|index| self.slot_lease(index))
    }

    /// Bounded claim on the shared slots, falling back to the fail strategy.
    fn claim_or_failover(&self) -> Result<Option<Lease<T>>> {
        let attempts = self.config.get_fetch_times();
        match self.slots.claim_bounded(attempts) {
            Some(index) => Ok(Some(self.slot_lease(index))),
            None => Ok(self
                .on_exhausted
                .failover(&self.creator, attempts)?
                .map(Lease::Detached)),
        }
    }

    fn fetch_cached(&self) -> Result<Option<Lease<T>>> {
        if let Some(lease) = self.pop_local() {
            return Ok(Some(lease));
        }
        self.claim_or_failover()
    }

    fn fetch_prefetch(&self) -> Result<Option<Lease<T>>> {
        if let Some(lease) = self.pop_local() {
            return Ok(Some(lease));
        }
        let lease = match self.strategy.claim() {
            ClaimPolicy::Bounded(_) => self.claim_or_failover()?,
            ClaimPolicy::Unbounded => Some(self.slot_lease(self.slots.claim_unbounded())),
        };
        if let Some(Lease::Slot { .. }) = lease {
            self.refill_local();
        }
        Ok(lease)
    }

    fn fetch_in_pool(&self) -> Result<Option<Lease<T>>> {
        Ok(Some(self.slot_lease(self.slots.claim_unbounded())))
    }

    /// Tops up an empty cache with up to `refill` slots, stopping at the
    /// first bounded claim that finds nothing. This thread may hold most of
    /// the pool already.
    fn refill_local(&self) {
        let Some(local) = &self.local else {
            return;
        };
        let attempts = self.config.get_fetch_times();
        local.with(|cache| {
            if !cache.is_empty() {
                return;
            }
            for _ in 0..self.refill {
                let Some(index) = self.slots.claim_bounded(attempts) else {
                    break;
                };
                let cached = cache.push(index);
                debug_assert!(cached);
            }
        });
    }

    /// Resets the object in a slot the caller still holds. An invalid object
    /// is replaced with a fresh one.
    fn restore(&self, index: usize, mut ptr: NonNull<T>) {
        // Safety: the lease being released still owns the slot.
        let obj = unsafe { ptr.as_mut() };
        if obj.is_invalid() {
            *obj = SlotArray::stamped(&self.creator, index);
            tracing::debug!(index, "invalid pooled object replaced");
        } else {
            obj.reset();
        }
    }

    fn release_detached(mut obj: T) {
        obj.reset();
    }

    fn release_cached(&self, lease: Lease<T>) {
        match lease {
            Lease::Slot { index, ptr } => {
                self.restore(index, ptr);
                let cached = self
                    .local
                    .as_ref()
                    .and_then(|local| local.with(|cache| cache.push(index)))
                    .unwrap_or(false);
                if !cached {
                    self.slots.unmark(index);
                }
            }
            Lease::Detached(obj) => Self::release_detached(obj),
        }
    }

    fn release_direct(&self, lease: Lease<T>) {
        match lease {
            Lease::Slot { index, ptr } => {
                self.restore(index, ptr);
                self.slots.unmark(index);
            }
            Lease::Detached(obj) => Self::release_detached(obj),
        }
    }
}

impl<C, T> Drop for Pool<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    fn drop(&mut self) {
        // Other threads prune their entries lazily or on exit.
        self.flush_local();
    }
}

impl<C, T> fmt::Debug for Pool<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("item_type", &std::any::type_name::<T>())
            .field("slots", &self.slots)
            .field("local", &self.local)
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Builder for creating an instance of [`Pool`].
///
/// # Examples
///
/// ```
/// use slotpool::{Pool, PoolConfig, PoolMode, PoolStrategy, Reusable};
///
/// #[derive(Default)]
/// struct Counter {
///     hits: u64,
///     id: Option<usize>,
/// }
///
/// impl Reusable for Counter {
///     fn reset(&mut self) {
///         self.hits = 0;
///     }
///     fn allocated_id(&self) -> Option<usize> {
///         self.id
///     }
///     fn set_allocated_id(&mut self, id: Option<usize>) {
///         self.id = id;
///     }
/// }
///
/// let pool = Pool::builder(Counter::default, 100)
///     .strategy(PoolStrategy::FETCH_FAIL_AS_ERROR.with_prefetch(true))
///     .config(PoolConfig::default().cache_capacity(4))
///     .build()
///     .unwrap();
/// assert_eq!(pool.capacity(), 128);
/// assert_eq!(pool.mode(), PoolMode::Prefetch);
/// ```
#[must_use]
pub struct PoolBuilder<C, T> {
    creator: C,
    size: usize,
    strategy: PoolStrategy,
    config: PoolConfig,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<C, T> fmt::Debug for PoolBuilder<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("item_type", &std::any::type_name::<T>())
            .field("size", &self.size)
            .field("strategy", &self.strategy)
            .field("config", &self.config)
            .finish()
    }
}

impl<C, T> PoolBuilder<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    /// Sets the claim policy and prefetch behaviour.
    pub fn strategy(mut self, strategy: PoolStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the tunable knobs, e.g. from [`PoolConfig::from_env`].
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds every object and returns the pool.
    ///
    /// Fails if the requested size is zero or the configuration is invalid.
    pub fn build(self) -> Result<Pool<C, T>> {
        Pool::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Item {
        id: Option<usize>,
    }

    impl Reusable for Item {
        fn reset(&mut self) {}
        fn allocated_id(&self) -> Option<usize> {
            self.id
        }
        fn set_allocated_id(&mut self, id: Option<usize>) {
            self.id = id;
        }
    }

    static_assertions::assert_impl_all!(Pool<fn() -> Item, Item>: Send, Sync);
    static_assertions::assert_impl_all!(Pooled<'static, fn() -> Item, Item>: Send, Sync);
    static_assertions::assert_impl_all!(OwnedPooled<fn() -> Item, Item>: Send, Sync);

    #[test]
    fn refill_never_exceeds_the_pool() {
        let pool = Pool::builder(Item::default as fn() -> Item, 1)
            .strategy(PoolStrategy::MUST_FETCH_IN_POOL.with_prefetch(true))
            .build()
            .unwrap();
        assert_eq!(pool.refill, 0);

        let pool = Pool::builder(Item::default as fn() -> Item, 64)
            .strategy(PoolStrategy::FETCH_FAIL_AS_NEW.with_prefetch(true))
            .build()
            .unwrap();
        assert_eq!(pool.refill, 8);
    }

    #[test]
    fn must_fetch_in_pool_has_no_local_cache() {
        let pool = Pool::with_strategy(Item::default, 4, PoolStrategy::MUST_FETCH_IN_POOL).unwrap();
        assert!(pool.local.is_none());
        let item = pool.fetch().unwrap().unwrap();
        drop(item);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.flush_local(), 0);
    }
}
