use crate::{PoolError, Result};

/// Default number of slots probed by a bounded claim.
pub const DEFAULT_FETCH_TIMES: usize = 10;
/// Default upper bound on the number of slots in a pool.
pub const DEFAULT_MAX_CAPACITY: usize = 1 << 20;
/// Default number of entries in each per-thread cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;
/// Per-thread caches never hold more entries than this.
pub const MAX_CACHE_CAPACITY: usize = 64;

const FETCH_TIMES_VAR: &str = "SLOTPOOL_FETCH_TIMES";
const MAX_CAPACITY_VAR: &str = "SLOTPOOL_MAX_CAPACITY";
const CACHE_CAPACITY_VAR: &str = "SLOTPOOL_CACHE_CAPACITY";

/// Tunable knobs shared by every pool built with them.
///
/// A pool copies its configuration at construction and never consults the
/// environment itself; use [`Self::from_env`] once at startup to pick up
/// overrides.
///
/// # Examples
///
/// ```
/// use slotpool::PoolConfig;
///
/// let config = PoolConfig::default().fetch_times(4).cache_capacity(5);
/// assert_eq!(config.get_fetch_times(), 4);
/// assert_eq!(config.get_cache_capacity(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    fetch_times: usize,
    max_capacity: usize,
    cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            fetch_times: DEFAULT_FETCH_TIMES,
            max_capacity: DEFAULT_MAX_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Reads `SLOTPOOL_FETCH_TIMES`, `SLOTPOOL_MAX_CAPACITY` and
    /// `SLOTPOOL_CACHE_CAPACITY`, falling back to the defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |var: &'static str, default: usize| -> Result<usize> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| PoolError::InvalidEnv { var, value }),
            }
        };
        let config = PoolConfig {
            fetch_times: parse(FETCH_TIMES_VAR, DEFAULT_FETCH_TIMES)?,
            max_capacity: parse(MAX_CAPACITY_VAR, DEFAULT_MAX_CAPACITY)?,
            cache_capacity: parse(CACHE_CAPACITY_VAR, DEFAULT_CACHE_CAPACITY)?,
        };
        config.validate()?;
        tracing::debug!(?config, "pool configuration loaded from environment");
        Ok(config)
    }

    /// Sets how many slots a bounded claim probes before giving up.
    #[must_use]
    pub fn fetch_times(mut self, fetch_times: usize) -> Self {
        self.fetch_times = fetch_times;
        self
    }

    /// Sets the largest slot array a pool may allocate. Must be a power of
    /// two.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the per-thread cache size. Rounded up to a power of two and
    /// capped at [`MAX_CACHE_CAPACITY`] when read.
    #[must_use]
    pub fn cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Slots probed per bounded claim.
    pub fn get_fetch_times(&self) -> usize {
        self.fetch_times
    }

    /// Upper bound on pool capacity.
    pub fn get_max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Effective per-thread cache size.
    pub fn get_cache_capacity(&self) -> usize {
        self.cache_capacity
            .checked_next_power_of_two()
            .map_or(MAX_CACHE_CAPACITY, |pow| pow.min(MAX_CACHE_CAPACITY))
    }

    /// Checks that every knob is usable.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_times == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "fetch_times must be positive",
            });
        }
        if self.max_capacity == 0 || !self.max_capacity.is_power_of_two() {
            return Err(PoolError::InvalidConfig {
                reason: "max_capacity must be a non-zero power of two",
            });
        }
        if self.cache_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "cache_capacity must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.get_fetch_times(), 10);
        assert_eq!(config.get_max_capacity(), 1_048_576);
        assert_eq!(config.get_cache_capacity(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cache_capacity_is_rounded_and_capped() {
        assert_eq!(PoolConfig::default().cache_capacity(3).get_cache_capacity(), 4);
        assert_eq!(PoolConfig::default().cache_capacity(64).get_cache_capacity(), 64);
        assert_eq!(PoolConfig::default().cache_capacity(65).get_cache_capacity(), 64);
        assert_eq!(
            PoolConfig::default().cache_capacity(usize::MAX).get_cache_capacity(),
            64
        );
    }

    #[test]
    fn validation_rejects_zero_knobs() {
        assert!(PoolConfig::default().fetch_times(0).validate().is_err());
        assert!(PoolConfig::default().cache_capacity(0).validate().is_err());
        assert!(PoolConfig::default().max_capacity(0).validate().is_err());
        assert!(PoolConfig::default().max_capacity(1000).validate().is_err());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("SLOTPOOL_FETCH_TIMES", "3"),
            ("SLOTPOOL_CACHE_CAPACITY", " 16 "),
        ]))
        .unwrap();
        assert_eq!(config.get_fetch_times(), 3);
        assert_eq!(config.get_max_capacity(), DEFAULT_MAX_CAPACITY);
        assert_eq!(config.get_cache_capacity(), 16);
    }

    #[test]
    fn lookup_reports_bad_values() {
        let err = PoolConfig::from_lookup(lookup_from(&[("SLOTPOOL_MAX_CAPACITY", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InvalidEnv {
                var: "SLOTPOOL_MAX_CAPACITY",
                value: "lots".to_string(),
            }
        );
    }

    #[test]
    fn lookup_validates() {
        let err = PoolConfig::from_lookup(lookup_from(&[("SLOTPOOL_FETCH_TIMES", "0")]))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { .. }));
    }
}
