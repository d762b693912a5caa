// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::ptr;

/// The single word of bookkeeping attached to every buffer registered with a pool.
///
/// The value is written by the pool's management policy when a buffer is added or acquired and
/// consumed when the buffer is recycled. Its interpretation belongs entirely to the management
/// policy that wrote it: the array-based policy stores the address of the buffer's slot, the
/// queue-based policy stores the address of the management object itself. Code outside the
/// management policies treats the token as opaque.
///
/// Where the token itself lives depends on the recycling policy: in the smart pointer
/// ([`StoreOwnerInPointer`][1]), in a wrapping [`BufferContainer`][2]
/// ([`UseBufferContainer`][3]), or embedded in the payload ([`UseOwnerStorageInBuffer`][4]).
///
/// [1]: crate::policies::recycling::StoreOwnerInPointer
/// [2]: crate::BufferContainer
/// [3]: crate::policies::recycling::UseBufferContainer
/// [4]: crate::policies::recycling::UseOwnerStorageInBuffer
#[derive(Clone, Copy)]
pub struct ManagementInfo {
    info: *mut (),
}

impl ManagementInfo {
    /// Creates an empty token. The owning pool fills it in when the buffer is registered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            info: ptr::null_mut(),
        }
    }

    pub(crate) fn set(&mut self, info: *mut ()) {
        self.info = info;
    }

    pub(crate) fn clear(&mut self) {
        self.info = ptr::null_mut();
    }

    pub(crate) const fn get(&self) -> *mut () {
        self.info
    }
}

impl Default for ManagementInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagementInfo {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagementInfo").field(&self.info).finish()
    }
}

// SAFETY: The token is a passive word. It is only ever dereferenced by the management policy
// that wrote it, under the synchronization rules of the pool's concurrency level.
unsafe impl Send for ManagementInfo {}

// SAFETY: See the Send impl above; shared references expose no operations on the pointee.
unsafe impl Sync for ManagementInfo {}

/// Implemented by payload types that carry their own [`ManagementInfo`].
///
/// This is the requirement of the [`UseOwnerStorageInBuffer`][1] recycling policy: the pool
/// writes the token into the buffer itself when the buffer is registered, so the smart pointer
/// stays the size of a single pointer. Embed a `ManagementInfo` field (initialized with
/// [`ManagementInfo::new`]) and hand out access to it; the field's content must not be modified
/// by anything other than the pool.
///
/// [1]: crate::policies::recycling::UseOwnerStorageInBuffer
pub trait HasManagementInfo {
    /// Grants the pool read access to the embedded token.
    fn management_info(&self) -> &ManagementInfo;

    /// Grants the pool write access to the embedded token.
    fn management_info_mut(&mut self) -> &mut ManagementInfo;
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn starts_empty() {
        let info = ManagementInfo::new();
        assert!(info.get().is_null());

        let info = ManagementInfo::default();
        assert!(info.get().is_null());
    }

    #[test]
    fn round_trips_a_pointer() {
        let mut word = 0_usize;
        let mut info = ManagementInfo::new();

        info.set((&raw mut word).cast());
        assert_eq!(info.get(), (&raw mut word).cast());

        info.clear();
        assert!(info.get().is_null());
    }

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(ManagementInfo: Send, Sync);
    }
}
