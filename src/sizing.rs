use crate::{PoolError, Result};

/// Slot array dimensions derived from a requested size.
///
/// The length is always a power of two so that `index & mask` can stand in
/// for `index % len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capacity {
    len: usize,
    mask: usize,
}

impl Capacity {
    /// Rounds `requested` up to the next power of two, capped at `max`.
    ///
    /// `max` must be a non-zero power of two, which [`PoolConfig`] enforces.
    /// A zero request is rejected with [`PoolError::InvalidCapacity`].
    ///
    /// [`PoolConfig`]: crate::PoolConfig
    pub fn for_request(requested: usize, max: usize) -> Result<Self> {
        if requested == 0 {
            return Err(PoolError::InvalidCapacity { requested });
        }
        if max == 0 || !max.is_power_of_two() {
            return Err(PoolError::InvalidConfig {
                reason: "max_capacity must be a non-zero power of two",
            });
        }
        let len = requested
            .checked_next_power_of_two()
            .map_or(max, |pow| pow.min(max));
        if len < requested {
            tracing::warn!(requested, capacity = len, "requested pool capacity clamped to maximum");
        }
        Ok(Capacity {
            len,
            mask: len - 1,
        })
    }

    /// Number of slots.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a capacity holds at least one slot.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `len - 1`, used to wrap cursor positions onto slot indices.
    #[inline(always)]
    pub fn mask(&self) -> usize {
        self.mask
    }
}
