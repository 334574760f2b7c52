use crate::{slots::SlotArray, ObjectCreator, PoolError, Reusable, Result};

/// What a bounded claim does once it has probed `fetch_times` slots without
/// finding a free one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailStrategy {
    /// Report [`PoolError::Unavailable`].
    NotAvailable,
    /// Return `None`; the caller must check before use.
    Nullable,
    /// Build a throwaway object with the pool's creator. Its allocated id is
    /// cleared, and releasing it leaves the slot array untouched.
    CallCreator,
}

impl FetchFailStrategy {
    pub(crate) fn failover<C, T>(self, creator: &C, attempts: usize) -> Result<Option<T>>
    where
        C: ObjectCreator<T>,
        T: Reusable,
    {
        tracing::trace!(attempts, strategy = ?self, "bounded claim exhausted");
        match self {
            FetchFailStrategy::NotAvailable => Err(PoolError::Unavailable { attempts }),
            FetchFailStrategy::Nullable => Ok(None),
            FetchFailStrategy::CallCreator => Ok(Some(SlotArray::detached(creator))),
        }
    }
}

/// How the pool claims slots from the shared array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimPolicy {
    /// Probe at most `fetch_times` slots, then apply the fail strategy.
    Bounded(FetchFailStrategy),
    /// Spin until a slot is claimed. Only safe when the pool is sized for
    /// its peak concurrent demand.
    Unbounded,
}

/// Construction-time choice of claim policy and prefetch behaviour.
///
/// # Examples
///
/// ```
/// use slotpool::{ClaimPolicy, FetchFailStrategy, PoolStrategy};
///
/// let strategy = PoolStrategy::FETCH_FAIL_AS_ERROR.with_prefetch(false);
/// assert_eq!(strategy.claim(), ClaimPolicy::Bounded(FetchFailStrategy::NotAvailable));
/// assert_eq!(PoolStrategy::default(), PoolStrategy::FETCH_FAIL_AS_NEW);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolStrategy {
    claim: ClaimPolicy,
    prefetch: bool,
}

impl PoolStrategy {
    /// Spin until a slot is free, no per-thread cache.
    pub const MUST_FETCH_IN_POOL: PoolStrategy = PoolStrategy::new(ClaimPolicy::Unbounded, false);
    /// Bounded claim that fails with [`PoolError::Unavailable`].
    pub const FETCH_FAIL_AS_ERROR: PoolStrategy =
        PoolStrategy::new(ClaimPolicy::Bounded(FetchFailStrategy::NotAvailable), false);
    /// Bounded claim that yields `None`.
    pub const FETCH_FAIL_AS_NONE: PoolStrategy =
        PoolStrategy::new(ClaimPolicy::Bounded(FetchFailStrategy::Nullable), false);
    /// Bounded claim that falls back to a freshly created object.
    pub const FETCH_FAIL_AS_NEW: PoolStrategy =
        PoolStrategy::new(ClaimPolicy::Bounded(FetchFailStrategy::CallCreator), false);

    /// Creates a strategy from its parts.
    pub const fn new(claim: ClaimPolicy, prefetch: bool) -> Self {
        PoolStrategy { claim, prefetch }
    }

    /// Returns a copy with bulk prefetch switched on or off.
    ///
    /// With prefetch on, a cache miss claims a slot under the claim policy
    /// and then refills the empty per-thread cache with whatever free slots
    /// a few bounded probes find.
    #[must_use]
    pub const fn with_prefetch(self, prefetch: bool) -> Self {
        PoolStrategy {
            claim: self.claim,
            prefetch,
        }
    }

    /// The claim policy.
    pub const fn claim(&self) -> ClaimPolicy {
        self.claim
    }

    /// Whether bulk prefetch is on.
    pub const fn is_prefetch(&self) -> bool {
        self.prefetch
    }

    /// The operating mode this strategy selects.
    pub const fn mode(&self) -> PoolMode {
        match (self.prefetch, self.claim) {
            (true, _) => PoolMode::Prefetch,
            (false, ClaimPolicy::Bounded(_)) => PoolMode::Cached,
            (false, ClaimPolicy::Unbounded) => PoolMode::MustFetchInPool,
        }
    }
}

impl Default for PoolStrategy {
    fn default() -> Self {
        PoolStrategy::FETCH_FAIL_AS_NEW
    }
}

/// The fetch/release behaviour a pool is locked into at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolMode {
    /// Per-thread cache first, bounded claim on a miss, releases go to the
    /// cache while it has room.
    Cached,
    /// Per-thread cache first; a miss claims under the claim policy and
    /// refills the empty cache in bulk on a best-effort basis. Releases go
    /// straight to the slot array.
    Prefetch,
    /// No per-thread cache; unbounded claim and direct release.
    MustFetchInPool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_select_modes() {
        assert_eq!(PoolStrategy::MUST_FETCH_IN_POOL.mode(), PoolMode::MustFetchInPool);
        assert_eq!(PoolStrategy::FETCH_FAIL_AS_ERROR.mode(), PoolMode::Cached);
        assert_eq!(PoolStrategy::FETCH_FAIL_AS_NONE.mode(), PoolMode::Cached);
        assert_eq!(PoolStrategy::FETCH_FAIL_AS_NEW.mode(), PoolMode::Cached);
        assert_eq!(
            PoolStrategy::FETCH_FAIL_AS_NEW.with_prefetch(true).mode(),
            PoolMode::Prefetch
        );
        assert_eq!(
            PoolStrategy::MUST_FETCH_IN_POOL.with_prefetch(true).mode(),
            PoolMode::Prefetch
        );
    }

    #[derive(Debug, PartialEq)]
    struct Token {
        value: u32,
        id: Option<usize>,
    }

    impl Reusable for Token {
        fn reset(&mut self) {}
        fn allocated_id(&self) -> Option<usize> {
            self.id
        }
        fn set_allocated_id(&mut self, id: Option<usize>) {
            self.id = id;
        }
    }

    #[test]
    fn failover_variants() {
        // A creator that copies a slot-owned template.
        let creator = || Token {
            value: 7,
            id: Some(3),
        };
        assert_eq!(
            FetchFailStrategy::NotAvailable.failover::<_, Token>(&creator, 3),
            Err(PoolError::Unavailable { attempts: 3 })
        );
        assert_eq!(FetchFailStrategy::Nullable.failover::<_, Token>(&creator, 3), Ok(None));
        assert_eq!(
            FetchFailStrategy::CallCreator.failover::<_, Token>(&creator, 3),
            Ok(Some(Token { value: 7, id: None }))
        );
    }
}
