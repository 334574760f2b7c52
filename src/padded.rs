use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use crossbeam_utils::CachePadded;

/// An in-use flag that owns its cache line so that CAS traffic on one slot
/// does not invalidate its neighbours.
#[derive(Debug, Default)]
pub(crate) struct PaddedFlag(CachePadded<AtomicBool>);

impl PaddedFlag {
    pub(crate) fn new(value: bool) -> Self {
        PaddedFlag(CachePadded::new(AtomicBool::new(value)))
    }

    /// Transitions `false -> true`. Returns true if this call won the flag.
    #[inline(always)]
    pub(crate) fn try_set(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Transitions `true -> false`. Returns false if the flag was already
    /// clear.
    #[inline(always)]
    pub(crate) fn try_clear(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared scan hint. Every claim starts probing at the slot the cursor
/// points to and advances it; two threads reading the same value is fine.
#[derive(Debug, Default)]
pub(crate) struct Cursor(CachePadded<AtomicUsize>);

impl Cursor {
    pub(crate) fn new() -> Self {
        Cursor(CachePadded::new(AtomicUsize::new(0)))
    }

    /// Returns the current position and advances it. Wraps on overflow.
    #[inline(always)]
    pub(crate) fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_transitions() {
        let flag = PaddedFlag::new(false);
        assert!(flag.try_set());
        assert!(!flag.try_set());
        assert!(flag.is_set());
        assert!(flag.try_clear());
        assert!(!flag.try_clear());
        assert!(!flag.is_set());
    }

    #[test]
    fn cursor_advances() {
        let cursor = Cursor::new();
        assert_eq!(cursor.next(), 0);
        assert_eq!(cursor.next(), 1);
        assert_eq!(cursor.next(), 2);
    }

    #[test]
    fn flag_occupies_a_cache_line() {
        assert!(core::mem::align_of::<PaddedFlag>() >= 32);
        assert!(core::mem::size_of::<PaddedFlag>() >= core::mem::align_of::<PaddedFlag>());
    }
}
