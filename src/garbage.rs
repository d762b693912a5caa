// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deferred reclamation of pools that were deleted while buffers were still out.
//!
//! When a pool with the [`CollectGarbage`][1] deleting policy is dropped with buffers
//! outstanding, its management object cannot be destroyed yet: the outstanding pointers will
//! still recycle into it. Such managements are parked here, in a process-wide registry, until a
//! [`collect`] call finds that their last buffer has come home.
//!
//! Processes that delete pools at runtime should call [`collect`] periodically. The registry is
//! never torn down by the process itself (statics have no destructors), so whatever is parked at
//! exit is reclaimed by the operating system; a final [`collect`] before shutdown keeps that
//! amount at zero in a well-behaved program.
//!
//! Reclaiming a management object re-runs its sweep. For pools of the
//! [`SingleThreaded`][2] concurrency level that means [`collect`] must be called on the thread
//! that used the pool; the concurrent levels have no such restriction.
//!
//! [1]: crate::policies::deleting::CollectGarbage
//! [2]: crate::SingleThreaded

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::constants::ERR_POISONED_LOCK;
use crate::policies::management::ManagementPolicy;
use crate::thread_safe::ThreadSafe;

/// One parked management object, type-erased so managements of every configuration share the
/// registry.
trait ReclaimManagement {
    /// Re-runs the sweep; zero means everything has been reclaimed and the management can go.
    fn try_reclaim(&self) -> usize;
}

struct OrphanedManagement<M: ManagementPolicy> {
    management: Box<M>,
}

impl<M: ManagementPolicy> ReclaimManagement for OrphanedManagement<M> {
    fn try_reclaim(&self) -> usize {
        self.management.sweep()
    }
}

struct Registry {
    orphans: Mutex<Vec<ThreadSafe<Box<dyn ReclaimManagement>>>>,
}

impl Registry {
    const fn new() -> Self {
        Self {
            orphans: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, orphan: ThreadSafe<Box<dyn ReclaimManagement>>) {
        self.orphans.lock().expect(ERR_POISONED_LOCK).push(orphan);
    }

    fn collect(&self) {
        self.orphans
            .lock()
            .expect(ERR_POISONED_LOCK)
            .retain(|orphan| orphan.try_reclaim() > 0);
    }

    fn orphan_count(&self) -> usize {
        self.orphans.lock().expect(ERR_POISONED_LOCK).len()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.collect();

        let leftover = self.orphan_count();
        if leftover > 0 {
            warn!(
                leftover,
                "buffer pools were not completely deleted; their buffers never came home"
            );
        }
    }
}

static REGISTRY: Registry = Registry::new();

/// Parks a management object whose pool is gone but whose buffers are still out.
pub(crate) fn register<M: ManagementPolicy + 'static>(management: Box<M>) {
    debug!("pool deleted with buffers outstanding; keeping its management for deferred reclamation");

    let orphan: Box<dyn ReclaimManagement> = Box::new(OrphanedManagement { management });

    // SAFETY: Registry access is serialized by its mutex, and reclamation follows each parked
    // management's own concurrency level, as documented at module level.
    REGISTRY.register(unsafe { ThreadSafe::new(orphan) });
}

/// Destroys every parked management object whose last buffer has been returned.
///
/// Call this periodically when deleting [`CollectGarbage`][1]-policy pools at runtime.
/// Managements with buffers still outstanding are left in place for a later call.
///
/// [1]: crate::policies::deleting::CollectGarbage
pub fn collect() {
    REGISTRY.collect();
}

/// Number of management objects currently awaiting reclamation.
#[must_use]
pub fn orphan_count() -> usize {
    REGISTRY.orphan_count()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeManagement {
        missing: AtomicUsize,
        sweeps: &'static AtomicUsize,
    }

    impl ReclaimManagement for FakeManagement {
        fn try_reclaim(&self) -> usize {
            self.sweeps.fetch_add(1, Ordering::AcqRel);
            self.missing.load(Ordering::Acquire)
        }
    }

    fn park(registry: &Registry, missing: usize, sweeps: &'static AtomicUsize) {
        let orphan: Box<dyn ReclaimManagement> = Box::new(FakeManagement {
            missing: AtomicUsize::new(missing),
            sweeps,
        });

        // SAFETY: The fake is atomics all the way down.
        registry.register(unsafe { ThreadSafe::new(orphan) });
    }

    #[test]
    fn collect_keeps_orphans_with_missing_buffers() {
        static SWEEPS: AtomicUsize = AtomicUsize::new(0);

        let registry = Registry::new();
        park(&registry, 2, &SWEEPS);
        assert_eq!(registry.orphan_count(), 1);

        registry.collect();
        assert_eq!(registry.orphan_count(), 1);
        assert_eq!(SWEEPS.load(Ordering::Acquire), 1);
    }

    #[test]
    fn collect_destroys_reclaimed_orphans() {
        static SWEEPS: AtomicUsize = AtomicUsize::new(0);

        let registry = Registry::new();
        park(&registry, 0, &SWEEPS);
        park(&registry, 1, &SWEEPS);

        registry.collect();
        assert_eq!(registry.orphan_count(), 1);
    }

    #[test]
    fn drop_makes_a_final_pass() {
        static SWEEPS: AtomicUsize = AtomicUsize::new(0);

        let registry = Registry::new();
        park(&registry, 0, &SWEEPS);

        drop(registry);
        assert_eq!(SWEEPS.load(Ordering::Acquire), 1);
    }
}
