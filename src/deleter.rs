// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;

/// Destroys buffers for real when a pool sweeps its free buffers away.
///
/// Pools recycle buffers instead of freeing them, so actual destruction only happens when the
/// pool itself goes away. The deleter is a policy so that buffers with foreign allocation (an
/// arena, a different allocator, a foreign runtime) can be released appropriately. The default,
/// [`BoxDeleter`], undoes the `Box` allocation the buffer was added with.
pub trait BufferDeleter<B> {
    /// Destroys a buffer.
    ///
    /// # Safety
    ///
    /// `buffer` must be exclusively owned by the caller and must have been allocated in the way
    /// this deleter expects. It must not be used afterwards.
    unsafe fn delete(buffer: NonNull<B>);
}

/// Releases buffers that were allocated as a `Box`, which is how buffers normally enter a pool.
#[derive(Debug, Default)]
pub struct BoxDeleter;

impl<B> BufferDeleter<B> for BoxDeleter {
    unsafe fn delete(buffer: NonNull<B>) {
        // SAFETY: The caller guarantees exclusive ownership of a Box allocation.
        drop(unsafe { Box::from_raw(buffer.as_ptr()) });
    }
}
