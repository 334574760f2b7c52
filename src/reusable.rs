/// A trait for objects that can live in a [`Pool`](crate::Pool) and be
/// handed out again after use.
///
/// The pool calls [`Self::reset`] every time an object is released, so the
/// next fetch always observes the canonical default state.
pub trait Reusable {
    /// Restores the object to its canonical default state.
    ///
    /// Must be idempotent: a released object may be reset more than once.
    fn reset(&mut self);

    /// Reports that the object is unfit for reuse, e.g. because it was left
    /// in a corrupted state.
    ///
    /// By default, this method always returns false. An invalid object is
    /// replaced by a freshly created one when it is released.
    #[inline(always)]
    fn is_invalid(&self) -> bool {
        false
    }

    /// Returns the index of the slot this object lives in, or `None` when the
    /// object is not owned by a pool.
    fn allocated_id(&self) -> Option<usize>;

    /// Records the slot this object lives in. Called by the pool when it
    /// populates a slot.
    fn set_allocated_id(&mut self, id: Option<usize>);
}

/// A trait for the function that builds new pooled objects.
///
/// It is used to populate every slot when the pool is built, to replace
/// invalid objects and by [`FetchFailStrategy::CallCreator`] to synthesize
/// objects outside of the pool.
///
/// Any `Fn() -> T` closure is an object creator.
///
/// [`FetchFailStrategy::CallCreator`]: crate::FetchFailStrategy::CallCreator
pub trait ObjectCreator<T> {
    /// Creates a new object of type T.
    fn create(&self) -> T;
}

impl<T, F> ObjectCreator<T> for F
where
    F: Fn() -> T,
{
    #[inline(always)]
    fn create(&self) -> T {
        self()
    }
}
