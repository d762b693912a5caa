// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::handle::Pooled;
use crate::info::ManagementInfo;
use crate::policies::management::ManagementPolicy;
use crate::policies::recycling::RecyclingPolicy;

/// Recycling policy that carries the owner backreference inside the [`Pooled`] pointer.
///
/// The buffer type needs no preparation at all, which makes this the default and the fully
/// general choice. The cost is a two-word pointer, which rules the pointers themselves out of
/// machinery that requires single-word values.
pub struct StoreOwnerInPointer<M> {
    _management: PhantomData<M>,
}

impl<T, M> RecyclingPolicy<T> for StoreOwnerInPointer<M>
where
    M: ManagementPolicy<Buffer = T>,
{
    type Management = M;
    type HandleState = ManagementInfo;

    fn add(management: &M, mut buffer: Box<T>) -> Pooled<T, Self> {
        let mut info = ManagementInfo::new();
        management.add(NonNull::from(&mut *buffer), &mut info);

        // SAFETY: Box pointers are never null.
        let payload = unsafe { NonNull::new_unchecked(Box::into_raw(buffer)) };
        Pooled::new(payload, info)
    }

    fn acquire(management: &M) -> Option<Pooled<T, Self>> {
        let mut info = ManagementInfo::new();
        management
            .acquire(&mut info)
            .map(|payload| Pooled::new(payload, info))
    }

    unsafe fn recycle(payload: NonNull<T>, state: &ManagementInfo) {
        // SAFETY: The pointer's state is the token the management policy issued for this
        // buffer; remaining obligations are forwarded from our own contract.
        unsafe { M::recycle(state, payload) };
    }
}
