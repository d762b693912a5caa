// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::container::BufferContainer;
use crate::handle::Pooled;
use crate::info::{HasManagementInfo, ManagementInfo};
use crate::policies::management::ManagementPolicy;
use crate::policies::recycling::RecyclingPolicy;

/// Recycling policy that keeps the owner backreference in a [`BufferContainer`] wrapped around
/// the payload.
///
/// Buffers must be added as `Box<BufferContainer<T>>`; the pool manages the containers while
/// the [`Pooled`] pointer exposes only the payload and stays a single word. On recycle, the
/// container is recovered from the payload address by constant-offset arithmetic.
///
/// Because [`BufferContainer`] is queueable, this is the way to use queue-based management with
/// payload types that cannot opt into queueability themselves.
pub struct UseBufferContainer<M> {
    _management: PhantomData<M>,
}

impl<T, M> RecyclingPolicy<T> for UseBufferContainer<M>
where
    M: ManagementPolicy<Buffer = BufferContainer<T>>,
{
    type Management = M;
    type HandleState = ();

    fn add(management: &M, mut buffer: Box<BufferContainer<T>>) -> Pooled<T, Self> {
        let mut info = ManagementInfo::new();
        management.add(NonNull::from(&mut *buffer), &mut info);
        *buffer.management_info_mut() = info;

        // SAFETY: Box pointers are never null.
        let container = unsafe { NonNull::new_unchecked(Box::into_raw(buffer)) };

        // SAFETY: The container was just allocated and is alive.
        let payload = unsafe { BufferContainer::payload_ptr(container) };
        Pooled::new(payload, ())
    }

    fn acquire(management: &M) -> Option<Pooled<T, Self>> {
        let mut info = ManagementInfo::new();
        management.acquire(&mut info).map(|container| {
            // SAFETY: The management policy hands out live containers.
            let payload = unsafe { BufferContainer::payload_ptr(container) };
            Pooled::new(payload, ())
        })
    }

    unsafe fn recycle(payload: NonNull<T>, _state: &()) {
        // SAFETY: Under this policy every payload sits inside a live BufferContainer.
        let container = unsafe { BufferContainer::from_payload(payload) };

        // SAFETY: Reading the token written when the buffer was added. Copied out so no
        // reference into the container outlives the handoff below.
        let info = *unsafe { container.as_ref() }.management_info();

        // SAFETY: Token and buffer belong together; remaining obligations are forwarded from
        // our own contract.
        unsafe { M::recycle(&info, container) };
    }
}
