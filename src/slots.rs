use crate::{
    padded::{Cursor, PaddedFlag},
    Capacity, ObjectCreator, Reusable,
};
use core::{cell::UnsafeCell, hint, ptr::NonNull};

/// One pooled object and the flag that grants exclusive access to it.
///
/// The flag is cache-line aligned, which also pushes every slot onto its own
/// line(s) and keeps the array ends clear of unrelated data.
struct Slot<T> {
    in_use: PaddedFlag,
    value: UnsafeCell<T>,
}

/// Fixed power-of-two array of slots plus the shared scan cursor.
///
/// The only way to reach a slot's object is to win its flag with
/// [`Self::claim_bounded`] or [`Self::claim_unbounded`]; the winner holds it
/// until it calls [`Self::unmark`].
pub(crate) struct SlotArray<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    cursor: Cursor,
}

// Safety: objects move between threads only through a won flag, so sharing
// the array needs no more than `T: Send`.
unsafe impl<T: Send> Sync for SlotArray<T> {}

impl<T: Reusable> SlotArray<T> {
    /// Builds every object up front and stamps it with its slot index.
    pub(crate) fn new<C: ObjectCreator<T>>(capacity: Capacity, creator: &C) -> Self {
        let slots = (0..capacity.len())
            .map(|index| Slot {
                in_use: PaddedFlag::new(false),
                value: UnsafeCell::new(Self::stamped(creator, index)),
            })
            .collect();
        SlotArray {
            slots,
            mask: capacity.mask(),
            cursor: Cursor::new(),
        }
    }

    /// Creates an object owned by slot `index`.
    pub(crate) fn stamped<C: ObjectCreator<T>>(creator: &C, index: usize) -> T {
        let mut obj = creator.create();
        obj.set_allocated_id(Some(index));
        obj
    }

    /// Creates an object that no slot owns.
    pub(crate) fn detached<C: ObjectCreator<T>>(creator: &C) -> T {
        let mut obj = creator.create();
        obj.set_allocated_id(None);
        obj
    }
}

impl<T> SlotArray<T> {
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    fn try_claim(&self) -> Option<usize> {
        let index = self.cursor.next() & self.mask;
        self.slots[index].in_use.try_set().then_some(index)
    }

    /// Probes up to `max_attempts` slots starting at the cursor.
    pub(crate) fn claim_bounded(&self, max_attempts: usize) -> Option<usize> {
        (0..max_attempts).find_map(|_| self.try_claim())
    }

    /// Probes slots until one is won. Spins forever if none is ever freed.
    pub(crate) fn claim_unbounded(&self) -> usize {
        loop {
            if let Some(index) = self.try_claim() {
                return index;
            }
            hint::spin_loop();
        }
    }

    /// Frees slot `index`. Returns false when it was already free, which
    /// happens on a double release and is otherwise harmless.
    #[inline(always)]
    pub(crate) fn unmark(&self, index: usize) -> bool {
        self.slots[index].in_use.try_clear()
    }

    /// Pointer to the object in slot `index`.
    ///
    /// Dereferencing it is only sound while the caller holds the slot.
    #[inline(always)]
    pub(crate) fn object(&self, index: usize) -> NonNull<T> {
        // UnsafeCell::get never returns null.
        unsafe { NonNull::new_unchecked(self.slots[index].value.get()) }
    }

    /// Number of claimed slots, including those parked in per-thread caches.
    /// Only a snapshot while other threads are active.
    pub(crate) fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use.is_set()).count()
    }
}

impl<T> core::fmt::Debug for SlotArray<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotArray")
            .field("len", &self.len())
            .field("in_use", &self.in_use())
            .finish()
    }
}
