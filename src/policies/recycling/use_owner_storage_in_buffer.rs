// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::handle::Pooled;
use crate::info::{HasManagementInfo, ManagementInfo};
use crate::policies::management::ManagementPolicy;
use crate::policies::recycling::RecyclingPolicy;

/// Recycling policy that keeps the owner backreference inside the buffer itself.
///
/// The payload type opts in by implementing [`HasManagementInfo`], paying one word per buffer;
/// in exchange there is no wrapping container and the [`Pooled`] pointer is a single word. This
/// is the zero-overhead choice for buffer types under the application's control.
pub struct UseOwnerStorageInBuffer<M> {
    _management: PhantomData<M>,
}

impl<T, M> RecyclingPolicy<T> for UseOwnerStorageInBuffer<M>
where
    T: HasManagementInfo,
    M: ManagementPolicy<Buffer = T>,
{
    type Management = M;
    type HandleState = ();

    fn add(management: &M, mut buffer: Box<T>) -> Pooled<T, Self> {
        let mut info = ManagementInfo::new();
        management.add(NonNull::from(&mut *buffer), &mut info);
        *buffer.management_info_mut() = info;

        // SAFETY: Box pointers are never null.
        let payload = unsafe { NonNull::new_unchecked(Box::into_raw(buffer)) };
        Pooled::new(payload, ())
    }

    fn acquire(management: &M) -> Option<Pooled<T, Self>> {
        // The token the buffer carries was written when it was added; the one produced by the
        // acquisition is identical and can be discarded.
        let mut info = ManagementInfo::new();
        management
            .acquire(&mut info)
            .map(|payload| Pooled::new(payload, ()))
    }

    unsafe fn recycle(payload: NonNull<T>, _state: &()) {
        // SAFETY: Reading the token embedded when the buffer was added. Copied out so no
        // reference into the buffer outlives the handoff below.
        let info = *unsafe { payload.as_ref() }.management_info();

        // SAFETY: Token and buffer belong together; remaining obligations are forwarded from
        // our own contract.
        unsafe { M::recycle(&info, payload) };
    }
}
