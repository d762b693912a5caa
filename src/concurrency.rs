// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Concurrency levels and the storage primitives they select.
//!
//! A pool is configured with one of five zero-sized level markers describing which of its
//! operations may run on different threads at the same time. The level decides, at compile time,
//! what the management policies are built from: plain [`Cell`]-based storage for a
//! single-threaded pool, atomics with store-based claiming when only one thread acquires, atomics
//! with compare-and-swap claiming plus a growth mutex when several threads acquire concurrently.
//!
//! The single-threaded primitives are deliberately `!Sync` (and, via their pointer contents,
//! `!Send`), so a [`SingleThreaded`] pool cannot be shared or moved across threads at all. The
//! concurrent levels produce `Sync` management objects, which is what lets their pools and
//! handles travel.
//!
//! "Reading" a pool means acquiring buffers from it, "writing" means returning them. A level
//! only promises what it names: running, say, two acquiring threads against a
//! [`SingleReaderSingleWriter`] pool is a contract violation even though it compiles.

use std::cell::Cell;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::constants::ERR_POISONED_LOCK;

/// A level of concurrent pool usage, chosen at compile time.
///
/// Implemented only by the five markers in this module. The associated types plug the matching
/// storage primitives into the management policies.
pub trait Concurrency: sealed::Sealed + 'static {
    /// Storage for one buffer slot of the array-based management policy.
    type Slot<B>: SlotCell<B>;

    /// Storage for the link between two chunks of the array-based management policy.
    type Link<N>: LinkCell<N>;

    /// Storage for a buffer count.
    type Count: CountCell;

    /// Mutex protecting pool growth, where the level requires one.
    type AddLock: AddMutex;
}

/// All pool operations happen on a single thread.
#[derive(Debug, Default)]
pub struct SingleThreaded;

/// One thread returns buffers while one (other) thread acquires them.
#[derive(Debug, Default)]
pub struct SingleReaderSingleWriter;

/// Any number of threads return buffers; a single thread acquires them.
#[derive(Debug, Default)]
pub struct MultipleWriters;

/// Any number of threads acquire buffers; a single thread returns them.
#[derive(Debug, Default)]
pub struct MultipleReaders;

/// Any number of threads acquire and return buffers concurrently.
#[derive(Debug, Default)]
pub struct FullyConcurrent;

impl Concurrency for SingleThreaded {
    type Slot<B> = PlainSlot<B>;
    type Link<N> = PlainLink<N>;
    type Count = PlainCount;
    type AddLock = NoMutex;
}

impl Concurrency for SingleReaderSingleWriter {
    type Slot<B> = AtomicSlot<B>;
    type Link<N> = AtomicLink<N>;
    type Count = AtomicCount;
    type AddLock = NoMutex;
}

impl Concurrency for MultipleWriters {
    type Slot<B> = AtomicSlot<B>;
    type Link<N> = AtomicLink<N>;
    type Count = AtomicCount;
    type AddLock = NoMutex;
}

impl Concurrency for MultipleReaders {
    type Slot<B> = CasSlot<B>;
    type Link<N> = AtomicLink<N>;
    type Count = AtomicCount;
    type AddLock = GrowMutex;
}

impl Concurrency for FullyConcurrent {
    type Slot<B> = CasSlot<B>;
    type Link<N> = AtomicLink<N>;
    type Count = AtomicCount;
    type AddLock = GrowMutex;
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::SingleThreaded {}
    impl Sealed for super::SingleReaderSingleWriter {}
    impl Sealed for super::MultipleWriters {}
    impl Sealed for super::MultipleReaders {}
    impl Sealed for super::FullyConcurrent {}
}

/// One buffer slot: holds the buffer pointer while the buffer is free, null while it is in use.
pub trait SlotCell<B>: Default {
    /// Current slot content.
    fn load(&self) -> *mut B;

    /// Publishes a buffer as free. Synchronizes with [`load`][SlotCell::load].
    fn store(&self, value: *mut B);

    /// Attempts to take the previously observed buffer out of the slot, marking it in use.
    ///
    /// Returns false when another claimant won the slot in the meantime, which only the
    /// compare-and-swap variant can report.
    fn try_claim(&self, observed: *mut B) -> bool;
}

/// Slot for single-threaded pools.
pub struct PlainSlot<B>(Cell<*mut B>);

impl<B> Default for PlainSlot<B> {
    fn default() -> Self {
        Self(Cell::new(ptr::null_mut()))
    }
}

impl<B> SlotCell<B> for PlainSlot<B> {
    fn load(&self) -> *mut B {
        self.0.get()
    }

    fn store(&self, value: *mut B) {
        self.0.set(value);
    }

    fn try_claim(&self, _observed: *mut B) -> bool {
        // Single thread: nobody can have raced us since the load.
        self.0.set(ptr::null_mut());
        true
    }
}

/// Slot for levels with at most one acquiring thread: claiming is a plain store.
pub struct AtomicSlot<B>(AtomicPtr<B>);

impl<B> Default for AtomicSlot<B> {
    fn default() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }
}

impl<B> SlotCell<B> for AtomicSlot<B> {
    fn load(&self) -> *mut B {
        self.0.load(Ordering::Acquire)
    }

    fn store(&self, value: *mut B) {
        self.0.store(value, Ordering::Release);
    }

    fn try_claim(&self, _observed: *mut B) -> bool {
        // Only one thread ever claims at this level, so no other claimant can have raced us.
        self.0.store(ptr::null_mut(), Ordering::Release);
        true
    }
}

/// Slot for levels with concurrent acquiring threads: claiming must win a compare-and-swap.
pub struct CasSlot<B>(AtomicPtr<B>);

impl<B> Default for CasSlot<B> {
    fn default() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }
}

impl<B> SlotCell<B> for CasSlot<B> {
    fn load(&self) -> *mut B {
        self.0.load(Ordering::Acquire)
    }

    fn store(&self, value: *mut B) {
        self.0.store(value, Ordering::Release);
    }

    fn try_claim(&self, observed: *mut B) -> bool {
        self.0
            .compare_exchange(observed, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// Link between chunks of the array-based management policy.
pub trait LinkCell<N>: Default {
    /// Current link target, null at the end of the chain.
    fn load(&self) -> *mut N;

    /// Publishes a freshly allocated chunk. Synchronizes with [`load`][LinkCell::load].
    fn store(&self, next: *mut N);
}

/// Link for single-threaded pools.
pub struct PlainLink<N>(Cell<*mut N>);

impl<N> Default for PlainLink<N> {
    fn default() -> Self {
        Self(Cell::new(ptr::null_mut()))
    }
}

impl<N> LinkCell<N> for PlainLink<N> {
    fn load(&self) -> *mut N {
        self.0.get()
    }

    fn store(&self, next: *mut N) {
        self.0.set(next);
    }
}

/// Link for concurrent pools. The release/acquire pair makes the contents of a new chunk
/// visible to scanning threads before the chunk itself is.
pub struct AtomicLink<N>(AtomicPtr<N>);

impl<N> Default for AtomicLink<N> {
    fn default() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }
}

impl<N> LinkCell<N> for AtomicLink<N> {
    fn load(&self) -> *mut N {
        self.0.load(Ordering::Acquire)
    }

    fn store(&self, next: *mut N) {
        self.0.store(next, Ordering::Release);
    }
}

/// Counter of buffers registered with a pool.
pub trait CountCell: Default {
    /// Current count.
    fn get(&self) -> usize;

    /// Counts a registered buffer.
    fn increment(&self);

    /// Counts a destroyed buffer.
    fn decrement(&self);
}

/// Counter for single-threaded pools.
///
/// The phantom pointer pins the counter (and everything built on it) to one thread; a
/// single-threaded management object must not change threads because its other storage offers
/// no synchronization either.
#[derive(Default)]
pub struct PlainCount {
    count: Cell<usize>,
    _single_thread: std::marker::PhantomData<*mut ()>,
}

impl CountCell for PlainCount {
    fn get(&self) -> usize {
        self.count.get()
    }

    fn increment(&self) {
        self.count.set(self.count.get() + 1);
    }

    fn decrement(&self) {
        self.count.set(self.count.get() - 1);
    }
}

/// Counter for concurrent pools.
#[derive(Default)]
pub struct AtomicCount(AtomicUsize);

impl CountCell for AtomicCount {
    fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Mutex guarding the grow path of the array-based management policy.
///
/// Only levels with concurrent acquiring threads need one: growth races with the claim scan
/// there. The other levels use the no-op variant and stay lock-free.
pub trait AddMutex: Default {
    /// Runs `f` under the lock, if there is one.
    fn locked<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// No locking; levels where growth cannot race with anything.
#[derive(Debug, Default)]
pub struct NoMutex;

impl AddMutex for NoMutex {
    #[inline]
    fn locked<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

/// A real mutex for levels where growth and sweeping race with concurrent claims.
#[derive(Debug, Default)]
pub struct GrowMutex(Mutex<()>);

impl AddMutex for GrowMutex {
    fn locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.0.lock().expect(ERR_POISONED_LOCK);
        f()
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    #[test]
    fn plain_slot_claims_unconditionally() {
        let slot = PlainSlot::<u64>::default();
        let mut value = 7_u64;

        assert!(slot.load().is_null());

        slot.store(&raw mut value);
        assert_eq!(slot.load(), &raw mut value);

        assert!(slot.try_claim(&raw mut value));
        assert!(slot.load().is_null());
    }

    #[test]
    fn cas_slot_detects_lost_race() {
        let slot = CasSlot::<u64>::default();
        let mut value = 7_u64;

        slot.store(&raw mut value);

        // A stale observation must lose.
        let mut other = 8_u64;
        assert!(!slot.try_claim(&raw mut other));
        assert_eq!(slot.load(), &raw mut value);

        assert!(slot.try_claim(&raw mut value));
        assert!(slot.load().is_null());

        // Claiming an already emptied slot with the old observation must also lose.
        assert!(!slot.try_claim(&raw mut value));
    }

    #[test]
    fn counters_count() {
        let count = AtomicCount::default();
        count.increment();
        count.increment();
        count.decrement();
        assert_eq!(count.get(), 1);

        let count = PlainCount::default();
        count.increment();
        assert_eq!(count.get(), 1);
        count.decrement();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn grow_mutex_runs_closure() {
        let lock = GrowMutex::default();
        assert_eq!(lock.locked(|| 42), 42);
        assert_eq!(NoMutex.locked(|| 43), 43);
    }

    #[test]
    fn single_threaded_storage_stays_put() {
        assert_not_impl_any!(PlainCount: Send, Sync);
        assert_not_impl_any!(PlainSlot<u64>: Send, Sync);
    }

    #[test]
    fn concurrent_storage_travels() {
        assert_impl_all!(AtomicCount: Send, Sync);
        assert_impl_all!(AtomicSlot<u64>: Send, Sync);
        assert_impl_all!(CasSlot<u64>: Send, Sync);
        assert_impl_all!(GrowMutex: Send, Sync);
    }
}
