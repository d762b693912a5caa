// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::garbage;
use crate::policies::deleting::DeletingPolicy;
use crate::policies::management::ManagementPolicy;

/// Deleting policy for pools whose pointers may outlive them.
///
/// Dropping the pool sweeps; if no buffers are missing, the management object is destroyed on
/// the spot. Otherwise it is detached from the pool and parked in the process-wide
/// [garbage registry][crate::garbage], where outstanding pointers keep recycling into it
/// safely. A later [`garbage::collect`] destroys it once the last buffer has come home.
///
/// Long-running processes that delete pools at runtime should call [`garbage::collect`]
/// periodically (once per control cycle is typical), or detached managements accumulate.
pub struct CollectGarbage<M: ManagementPolicy + 'static> {
    /// Boxed so the address that outstanding tokens refer to survives both pool moves and the
    /// handover to the registry. `None` only during drop.
    management: Option<Box<M>>,
}

impl<M: ManagementPolicy + 'static> Default for CollectGarbage<M> {
    fn default() -> Self {
        Self {
            management: Some(Box::new(M::default())),
        }
    }
}

impl<M: ManagementPolicy + 'static> DeletingPolicy for CollectGarbage<M> {
    type Management = M;

    #[inline]
    fn management(&self) -> &M {
        self.management
            .as_ref()
            .expect("the management object is present until the policy drops")
    }
}

impl<M: ManagementPolicy + 'static> Drop for CollectGarbage<M> {
    fn drop(&mut self) {
        let management = self
            .management
            .take()
            .expect("the management object is present until the policy drops");

        let missing_buffers = management.sweep();
        if missing_buffers > 0 {
            garbage::register(management);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::concurrency::MultipleWriters;
    use crate::policies::management::ArrayAndFlagBased;
    use crate::policies::recycling::StoreOwnerInPointer;
    use crate::pool::BufferPool;

    use super::*;

    type Management = ArrayAndFlagBased<String, MultipleWriters>;
    type Pool = BufferPool<String, StoreOwnerInPointer<Management>, CollectGarbage<Management>>;

    #[test]
    fn clean_teardown_skips_the_registry() {
        let before = garbage::orphan_count();

        let pool = Pool::new();
        drop(pool.add_buffer(Box::new(String::from("a"))));
        drop(pool.add_buffer(Box::new(String::from("b"))));

        let held = pool.get_unused().expect("buffers are free");
        drop(held);
        drop(pool);

        // Nothing was outstanding at pool drop, so nothing was parked.
        assert_eq!(garbage::orphan_count(), before);
    }
}
