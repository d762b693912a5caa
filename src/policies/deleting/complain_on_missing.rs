// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::error;

use crate::policies::deleting::DeletingPolicy;
use crate::policies::management::ManagementPolicy;

/// Deleting policy for pools whose pointers cannot outlive them.
///
/// Dropping the pool sweeps and then destroys the management object unconditionally. If the
/// sweep reports missing buffers, an error naming their number is logged first, because the
/// user's premise was violated: the missing pointers will recycle into freed memory when they
/// are eventually dropped. Pools that cannot rule this out must use
/// [`CollectGarbage`][crate::policies::deleting::CollectGarbage] instead.
pub struct ComplainOnMissingBuffers<M: ManagementPolicy> {
    /// Boxed so the address that outstanding tokens refer to survives pool moves.
    management: Box<M>,
}

impl<M: ManagementPolicy> Default for ComplainOnMissingBuffers<M> {
    fn default() -> Self {
        Self {
            management: Box::new(M::default()),
        }
    }
}

impl<M: ManagementPolicy> DeletingPolicy for ComplainOnMissingBuffers<M> {
    type Management = M;

    #[inline]
    fn management(&self) -> &M {
        &self.management
    }
}

impl<M: ManagementPolicy> Drop for ComplainOnMissingBuffers<M> {
    fn drop(&mut self) {
        let missing_buffers = self.management.sweep();
        if missing_buffers > 0 {
            error!(
                missing_buffers,
                "buffers were not returned to their pool before it was deleted; recycling them \
                 will write into freed memory. Use the CollectGarbage deleting policy if \
                 pointers can outlive the pool"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::concurrency::SingleThreaded;
    use crate::deleter::BufferDeleter;
    use crate::policies::management::ArrayAndFlagBased;
    use crate::policies::recycling::StoreOwnerInPointer;
    use crate::pool::BufferPool;

    use super::*;

    static DELETED: AtomicUsize = AtomicUsize::new(0);

    struct CountingDeleter;

    impl BufferDeleter<String> for CountingDeleter {
        unsafe fn delete(buffer: NonNull<String>) {
            DELETED.fetch_add(1, Ordering::AcqRel);
            // SAFETY: Forwarding our own contract.
            unsafe { crate::deleter::BoxDeleter::delete(buffer) };
        }
    }

    type Management = ArrayAndFlagBased<String, SingleThreaded, CountingDeleter>;
    type Pool = BufferPool<
        String,
        StoreOwnerInPointer<Management>,
        ComplainOnMissingBuffers<Management>,
    >;

    #[test]
    fn clean_teardown_deletes_all_buffers() {
        let pool = Pool::new();
        drop(pool.add_buffer(Box::new(String::from("a"))));
        drop(pool.add_buffer(Box::new(String::from("b"))));
        drop(pool.add_buffer(Box::new(String::from("c"))));

        let held = pool.get_unused().expect("buffers are free");

        // Sweeping by hand: two free buffers go away, one is still out.
        assert_eq!(pool.internal_management().sweep(), 1);
        assert_eq!(DELETED.load(Ordering::Acquire), 2);

        // Returning the last buffer and dropping the pool collects it as well.
        drop(held);
        drop(pool);
        assert_eq!(DELETED.load(Ordering::Acquire), 3);
    }
}
