// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::policies::recycling::RecyclingPolicy;

/// A uniquely owning pointer to a pool buffer that recycles the buffer when dropped.
///
/// This is what [`add_buffer`][1] and [`get_unused`][2] hand out. It dereferences to the
/// payload; dropping it returns the buffer to its pool instead of freeing it, which makes
/// client code leak-proof and exception-safe without reference counting or allocation.
///
/// The size of the pointer depends on the pool's recycling policy: a single machine word when
/// the owner backreference lives in the buffer or its container, two words when it rides along
/// in the pointer itself.
///
/// For the rare situations where scoped ownership does not fit, [`into_parts`][3] releases the
/// raw buffer for manual management and [`from_parts`][4] reassembles a pointer so the buffer
/// can be recycled after all.
///
/// [1]: crate::BufferPool::add_buffer
/// [2]: crate::BufferPool::get_unused
/// [3]: Pooled::into_parts
/// [4]: Pooled::from_parts
#[must_use = "dropping a pooled pointer immediately recycles its buffer"]
pub struct Pooled<T, R: RecyclingPolicy<T>> {
    payload: NonNull<T>,
    state: R::HandleState,
}

impl<T, R: RecyclingPolicy<T>> Pooled<T, R> {
    pub(crate) fn new(payload: NonNull<T>, state: R::HandleState) -> Self {
        Self { payload, state }
    }

    /// The address of the payload. Stable for the whole life of the buffer, across any number
    /// of recycle/acquire round trips.
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.payload
    }

    /// Releases the buffer from automatic recycling and returns its raw parts.
    ///
    /// The buffer stays marked in use. Pass the parts to [`from_parts`][Pooled::from_parts]
    /// eventually; a buffer that is never reassembled counts as missing when its pool winds
    /// down.
    #[must_use]
    pub fn into_parts(self) -> (NonNull<T>, R::HandleState) {
        let this = ManuallyDrop::new(self);
        (this.payload, this.state)
    }

    /// Reassembles a pointer from the parts of [`into_parts`][Pooled::into_parts], resuming
    /// automatic recycling.
    ///
    /// # Safety
    ///
    /// The parts must come from `into_parts` on a pointer of this exact type, the pool the
    /// buffer belongs to must still be alive, and the buffer must not have been reassembled
    /// before.
    #[must_use]
    pub unsafe fn from_parts(payload: NonNull<T>, state: R::HandleState) -> Self {
        Self { payload, state }
    }
}

impl<T, R: RecyclingPolicy<T>> Drop for Pooled<T, R> {
    fn drop(&mut self) {
        // SAFETY: The pointer exclusively owns the buffer and carries the state the recycling
        // policy created it with.
        unsafe { R::recycle(self.payload, &self.state) };
    }
}

impl<T, R: RecyclingPolicy<T>> Deref for Pooled<T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The pointer exclusively owns a live buffer.
        unsafe { self.payload.as_ref() }
    }
}

impl<T, R: RecyclingPolicy<T>> DerefMut for Pooled<T, R> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The pointer exclusively owns a live buffer.
        unsafe { self.payload.as_mut() }
    }
}

impl<T: fmt::Debug, R: RecyclingPolicy<T>> fmt::Debug for Pooled<T, R> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&**self).finish()
    }
}

// SAFETY: The pointer owns its buffer exclusively, so sending it moves the payload (hence
// T: Send); dropping on the new thread recycles into the management object, which must
// therefore tolerate being poked from another thread (hence Sync). A single-threaded pool's
// management is !Sync, which correctly pins its pointers to one thread.
unsafe impl<T, R> Send for Pooled<T, R>
where
    T: Send,
    R: RecyclingPolicy<T>,
    R::Management: Sync,
{
}

// SAFETY: Shared references to the pointer only expose shared references to the payload.
unsafe impl<T, R> Sync for Pooled<T, R>
where
    T: Sync,
    R: RecyclingPolicy<T>,
{
}
