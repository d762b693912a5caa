// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::{Deref, DerefMut};

/// A promise that a T is thread-safe (`Send` and `Sync`), even if the type `T` is not originally
/// so. Used where ownership is tracked by custom logic the compiler cannot see: raw buffer
/// pointers travelling through the free queue, and type-erased management objects parked in the
/// garbage registry.
#[derive(Debug)]
#[repr(transparent)]
pub(crate) struct ThreadSafe<T> {
    inner: T,
}

// SAFETY: Forwarding the guarantees received in new().
unsafe impl<T> Send for ThreadSafe<T> {}

// SAFETY: Forwarding the guarantees received in new().
unsafe impl<T> Sync for ThreadSafe<T> {}

impl<T> ThreadSafe<T> {
    /// # Safety
    ///
    /// The caller must ensure that the inner value truly is thread-safe in the way it will be
    /// used, both for sending and for referencing (`Send` and `Sync`).
    pub(crate) const unsafe fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T> Deref for ThreadSafe<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for ThreadSafe<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
