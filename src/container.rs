// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::mem::offset_of;
use std::ptr::NonNull;

use crate::info::{HasManagementInfo, ManagementInfo};
use crate::queueable::Queueable;

/// A heap record that pairs a payload with the bookkeeping a pool needs, so the payload type
/// itself does not have to carry any.
///
/// This is the buffer shape required by the [`UseBufferContainer`][1] recycling policy: buffers
/// are added as `Box<BufferContainer<T>>`, the pool manages the container, and the smart pointer
/// handed to clients exposes only the payload. When the pointer is dropped, the container is
/// recovered from the payload address by constant-offset arithmetic, which keeps the pointer the
/// size of a single machine word.
///
/// The container is [`Queueable`], so any payload type can participate in queue-based pools
/// through it.
///
/// [1]: crate::policies::recycling::UseBufferContainer
#[derive(Debug)]
pub struct BufferContainer<T> {
    info: ManagementInfo,
    payload: T,
}

impl<T> BufferContainer<T> {
    /// Wraps a payload for registration with a pool.
    #[must_use]
    pub const fn new(payload: T) -> Self {
        Self {
            info: ManagementInfo::new(),
            payload,
        }
    }

    /// The wrapped payload.
    #[must_use]
    pub const fn data(&self) -> &T {
        &self.payload
    }

    /// The wrapped payload.
    #[must_use]
    pub const fn data_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    /// Derives a payload pointer from a container pointer.
    ///
    /// # Safety
    ///
    /// `container` must point to a live `BufferContainer<T>`.
    pub(crate) unsafe fn payload_ptr(container: NonNull<Self>) -> NonNull<T> {
        // SAFETY: In-bounds field projection of a live container.
        unsafe { NonNull::new_unchecked(&raw mut (*container.as_ptr()).payload) }
    }

    /// Recovers the container pointer from a payload pointer produced by [`payload_ptr`][1].
    ///
    /// # Safety
    ///
    /// `payload` must be the payload of a live `BufferContainer<T>`.
    ///
    /// [1]: Self::payload_ptr
    pub(crate) unsafe fn from_payload(payload: NonNull<T>) -> NonNull<Self> {
        let offset = offset_of!(Self, payload);

        // SAFETY: Walking back over the container's leading fields stays inside the same
        // allocation, and the result is non-null because the allocation is.
        unsafe { NonNull::new_unchecked(payload.as_ptr().byte_sub(offset).cast::<Self>()) }
    }
}

impl<T> HasManagementInfo for BufferContainer<T> {
    fn management_info(&self) -> &ManagementInfo {
        &self.info
    }

    fn management_info_mut(&mut self) -> &mut ManagementInfo {
        &mut self.info
    }
}

impl<T> Queueable for BufferContainer<T> {}
