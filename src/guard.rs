use crate::{ObjectCreator, Pool, Reusable};
use std::{
    fmt,
    hash::{Hash, Hasher},
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    sync::Arc,
};

/// What a fetch handed out: a claimed slot, or an object built outside the
/// pool by [`FetchFailStrategy::CallCreator`](crate::FetchFailStrategy::CallCreator).
pub(crate) enum Lease<T> {
    Slot { index: usize, ptr: NonNull<T> },
    Detached(T),
}

impl<T> Lease<T> {
    #[inline(always)]
    fn get(&self) -> &T {
        match self {
            // Safety: the slot stays claimed for as long as the lease exists.
            Lease::Slot { ptr, .. } => unsafe { ptr.as_ref() },
            Lease::Detached(obj) => obj,
        }
    }

    #[inline(always)]
    fn get_mut(&mut self) -> &mut T {
        match self {
            // Safety: as above, and the lease is the slot's only handle.
            Lease::Slot { ptr, .. } => unsafe { ptr.as_mut() },
            Lease::Detached(obj) => obj,
        }
    }

    #[inline(always)]
    fn slot(&self) -> Option<usize> {
        match self {
            Lease::Slot { index, .. } => Some(*index),
            Lease::Detached(_) => None,
        }
    }
}

/// A struct representing a guard over an object fetched from a [`Pool`].
///
/// The object is released back to the pool when the guard is dropped or
/// passed to [`Pool::release`].
pub struct Pooled<'a, C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    lease: ManuallyDrop<Lease<T>>,
    pool: &'a Pool<C, T>,
}

impl<'a, C, T> Pooled<'a, C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    pub(crate) fn new(lease: Lease<T>, pool: &'a Pool<C, T>) -> Self {
        Pooled {
            lease: ManuallyDrop::new(lease),
            pool,
        }
    }
}

/// A struct representing a guard over an object fetched from an
/// `Arc`-wrapped [`Pool`].
///
/// Less efficient than [`Pooled`] but not tied to a borrow of the pool, so it
/// can be moved into spawned threads.
pub struct OwnedPooled<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    lease: ManuallyDrop<Lease<T>>,
    pool: Arc<Pool<C, T>>,
}

impl<C, T> OwnedPooled<C, T>
where
    C: ObjectCreator<T>,
    T: Reusable + Send + 'static,
{
    pub(crate) fn new(lease: Lease<T>, pool: &Arc<Pool<C, T>>) -> Self {
        OwnedPooled {
            lease: ManuallyDrop::new(lease),
            pool: pool.clone(),
        }
    }
}

// Safety: a guard is the only handle to its object; moving it moves that
// exclusive access, and the pool it refers to is Sync when C is.
unsafe impl<C: ObjectCreator<T> + Sync, T: Reusable + Send + 'static> Send for Pooled<'_, C, T> {}
unsafe impl<C: ObjectCreator<T> + Sync, T: Reusable + Send + Sync + 'static> Sync
    for Pooled<'_, C, T>
{
}
unsafe impl<C: ObjectCreator<T> + Send + Sync, T: Reusable + Send + 'static> Send
    for OwnedPooled<C, T>
{
}
unsafe impl<C: ObjectCreator<T> + Send + Sync, T: Reusable + Send + Sync + 'static> Sync
    for OwnedPooled<C, T>
{
}

macro_rules! impl_guard {
    ($guard:ident $(, $lt:lifetime)?) => {
        impl<$($lt,)? C, T> $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            /// Index of the slot backing this object, or `None` if it was
            /// created outside the pool after a failed claim.
            pub fn slot(&self) -> Option<usize> {
                self.lease.slot()
            }

            /// Whether the object lives in one of the pool's slots.
            pub fn is_pooled(&self) -> bool {
                self.lease.slot().is_some()
            }
        }

        impl<$($lt,)? C, T> Deref for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            type Target = T;
            #[inline(always)]
            fn deref(&self) -> &Self::Target {
                self.lease.get()
            }
        }

        impl<$($lt,)? C, T> DerefMut for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline(always)]
            fn deref_mut(&mut self) -> &mut Self::Target {
                self.lease.get_mut()
            }
        }

        /// Returns the object to the pool it came from.
        impl<$($lt,)? C, T> Drop for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            fn drop(&mut self) {
                // Safety: the lease is taken exactly once, here.
                let lease = unsafe { ManuallyDrop::take(&mut self.lease) };
                self.pool.release_lease(lease);
            }
        }

        impl<$($lt,)? C, T: Hash> Hash for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                (**self).hash(state);
            }
        }

        impl<$($lt,)? C, T: fmt::Display> fmt::Display for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&**self, f)
            }
        }

        impl<$($lt,)? C, T: fmt::Debug> fmt::Debug for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&**self, f)
            }
        }

        impl<$($lt,)? C, T> fmt::Pointer for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Pointer::fmt(&(&**self as *const T), f)
            }
        }

        impl<$($lt,)? C, T: PartialEq> PartialEq for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                (**self).eq(&**other)
            }
        }

        impl<$($lt,)? C, T: Eq> Eq for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
        }

        impl<$($lt,)? C, T: PartialOrd> PartialOrd for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
                (**self).partial_cmp(&**other)
            }
        }

        impl<$($lt,)? C, T: Ord> Ord for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline]
            fn cmp(&self, other: &Self) -> core::cmp::Ordering {
                (**self).cmp(&**other)
            }
        }

        impl<$($lt,)? C, T> core::borrow::Borrow<T> for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline(always)]
            fn borrow(&self) -> &T {
                self
            }
        }

        impl<$($lt,)? C, T> AsRef<T> for $guard<$($lt,)? C, T>
        where
            C: ObjectCreator<T>,
            T: Reusable + Send + 'static,
        {
            #[inline(always)]
            fn as_ref(&self) -> &T {
                self
            }
        }
    };
}

impl_guard!(Pooled, 'a);
impl_guard!(OwnedPooled);
