// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::marker::PhantomData;

use crate::handle::Pooled;
use crate::policies::deleting::{ComplainOnMissingBuffers, DeletingPolicy};
use crate::policies::management::{ArrayAndFlagBased, ManagementPolicy, QueueBased};
use crate::policies::recycling::{RecyclingPolicy, StoreOwnerInPointer};

/// The buffer type actually registered with a pool of the given configuration.
///
/// This is the payload type itself with most recycling policies, and
/// [`BufferContainer<T>`][crate::BufferContainer] with
/// [`UseBufferContainer`][crate::policies::recycling::UseBufferContainer].
pub type Managed<T, R> = <<R as RecyclingPolicy<T>>::Management as ManagementPolicy>::Buffer;

/// A pool of reusable buffers.
///
/// The pool owns a set of heap-allocated buffers of a single type and lends them out through
/// [`Pooled`] pointers. Dropping a pointer returns its buffer to the pool instead of freeing
/// it, so steady-state operation allocates nothing: buffers are allocated once, added
/// explicitly, and circulate until the pool is destroyed. That is the property that makes these
/// pools fit for real-time pipelines, where a heap allocation per message is not acceptable.
///
/// The pool never grows by itself. When [`get_unused`][Self::get_unused] comes back empty,
/// callers decide whether to wait, drop data, or grow the pool with
/// [`add_buffer`][Self::add_buffer].
///
/// # Configuration
///
/// Everything about a pool is decided at compile time by its type parameters: the payload type,
/// the [recycling policy][crate::policies::recycling] (which also names the [management
/// policy][crate::policies::management] and the [concurrency level][crate::concurrency]), and
/// the [deleting policy][crate::policies::deleting]. The [`QueuePool`] and [`ArrayPool`]
/// aliases cover the common configurations.
///
/// ```
/// use bufpool::{ArrayPool, SingleThreaded};
///
/// let pool: ArrayPool<String, SingleThreaded> = ArrayPool::new();
///
/// // Grow the pool by one buffer; the returned pointer already refers to it.
/// drop(pool.add_buffer(Box::new(String::from("hello"))));
///
/// let buffer = pool.get_unused().expect("one buffer is free");
/// assert_eq!(*buffer, "hello");
/// assert!(pool.get_unused().is_none());
/// ```
///
/// # Threading
///
/// A pool is as shareable as its concurrency level: levels whose management storage is `Sync`
/// yield `Sync` pools (payload permitting), the [`SingleThreaded`][crate::SingleThreaded]
/// level pins pool and pointers to one thread by construction. What a level permits is part of
/// its contract; the type system only enforces the single-threaded/concurrent boundary.
pub struct BufferPool<T, R, D>
where
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management>,
{
    deleting: D,
    _marker: PhantomData<(fn() -> T, R)>,
}

impl<T, R, D> BufferPool<T, R, D>
where
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management>,
{
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deleting: D::default(),
            _marker: PhantomData,
        }
    }

    /// Registers a new buffer with the pool and returns a pointer to it.
    ///
    /// The buffer counts as in use from the moment it is added; it becomes available to
    /// [`get_unused`][Self::get_unused] once the returned pointer is dropped. Returning the
    /// buffer immediately saves the acquisition that would otherwise follow, since the typical
    /// caller is one that just found the pool empty.
    ///
    /// A buffer belongs to exactly one pool for its entire life.
    pub fn add_buffer(&self, buffer: Box<Managed<T, R>>) -> Pooled<T, R> {
        R::add(self.deleting.management(), buffer)
    }

    /// Takes an unused buffer from the pool, or `None` if every buffer is in use.
    ///
    /// The buffer is marked in use for as long as the returned pointer lives. Callers that
    /// need a buffer unconditionally fall back to [`add_buffer`][Self::add_buffer]:
    ///
    /// ```
    /// # use bufpool::{ArrayPool, SingleThreaded};
    /// # let pool: ArrayPool<Vec<u8>, SingleThreaded> = ArrayPool::new();
    /// let buffer = pool
    ///     .get_unused()
    ///     .unwrap_or_else(|| pool.add_buffer(Box::new(Vec::new())));
    /// ```
    #[must_use]
    pub fn get_unused(&self) -> Option<Pooled<T, R>> {
        R::acquire(self.deleting.management())
    }

    /// The pool's management backend, for manual tweaking beyond the pool API.
    ///
    /// Rarely needed; the portable surface is `add_buffer` and `get_unused`.
    #[must_use]
    pub fn internal_management(&self) -> &R::Management {
        self.deleting.management()
    }
}

impl<T, R, D> Default for BufferPool<T, R, D>
where
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R, D> fmt::Debug for BufferPool<T, R, D>
where
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management>,
{
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool").finish_non_exhaustive()
    }
}

// SAFETY: Moving a pool moves (the box around) its management object and with it the ownership
// of all registered buffers, so the payload must be Send; the policy objects themselves must be
// Send for the usual structural reasons. Single-threaded managements are !Send through their
// storage, which keeps their pools where they belong.
unsafe impl<T, R, D> Send for BufferPool<T, R, D>
where
    T: Send,
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management> + Send,
{
}

// SAFETY: A shared pool hands out exclusively owned buffers, so sharing the pool across threads
// moves payloads across threads, which requires T: Send. The shared management state must
// itself be Sync, which is exactly what the concurrency level's storage selection grants or
// withholds.
unsafe impl<T, R, D> Sync for BufferPool<T, R, D>
where
    T: Send,
    R: RecyclingPolicy<T>,
    D: DeletingPolicy<Management = R::Management> + Sync,
{
}

/// A pool with queue-based management and the default policies: owner reference in the pointer,
/// complaint on missing buffers.
///
/// Constant-time acquisition; requires `T: Queueable`.
pub type QueuePool<T, C> = BufferPool<
    T,
    StoreOwnerInPointer<QueueBased<T, C>>,
    ComplainOnMissingBuffers<QueueBased<T, C>>,
>;

/// A pool with array-based management and the default policies: owner reference in the pointer,
/// complaint on missing buffers.
///
/// Works with any `T`; acquisition scans the pool, so keep such pools modest in size.
pub type ArrayPool<T, C> = BufferPool<
    T,
    StoreOwnerInPointer<ArrayAndFlagBased<T, C>>,
    ComplainOnMissingBuffers<ArrayAndFlagBased<T, C>>,
>;

#[cfg(test)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use crate::concurrency::{FullyConcurrent, MultipleReaders, SingleThreaded};
    use crate::queueable::Queueable;

    use super::*;

    struct QueueableVec(Vec<u8>);

    impl Queueable for QueueableVec {}

    #[test]
    fn empty_pool_has_nothing() {
        let pool: ArrayPool<String, SingleThreaded> = ArrayPool::new();
        assert!(pool.get_unused().is_none());

        let pool: QueuePool<QueueableVec, FullyConcurrent> = QueuePool::default();
        assert!(pool.get_unused().is_none());

        drop(pool.add_buffer(Box::new(QueueableVec(Vec::new()))));
        let buffer = pool.get_unused().expect("the added buffer is free");
        assert!(buffer.0.is_empty());
    }

    #[test]
    fn added_buffers_circulate() {
        let pool: ArrayPool<String, MultipleReaders> = ArrayPool::new();

        drop(pool.add_buffer(Box::new(String::from("0"))));
        drop(pool.add_buffer(Box::new(String::from("1"))));

        let first = pool.get_unused().expect("two buffers are free");
        let second = pool.get_unused().expect("one buffer is free");
        assert_ne!(first.as_ptr(), second.as_ptr());
        assert!(pool.get_unused().is_none());
    }

    #[test]
    fn internal_management_is_the_real_one() {
        let pool: ArrayPool<String, SingleThreaded> = ArrayPool::new();
        drop(pool.add_buffer(Box::new(String::from("0"))));

        assert_eq!(pool.internal_management().buffer_count(), 1);
    }

    #[test]
    fn thread_safety_follows_level() {
        assert_impl_all!(ArrayPool<String, FullyConcurrent>: Send, Sync);
        assert_impl_all!(QueuePool<QueueableVec, FullyConcurrent>: Send, Sync);

        assert_not_impl_any!(ArrayPool<String, SingleThreaded>: Send, Sync);
        assert_not_impl_any!(QueuePool<QueueableVec, SingleThreaded>: Send, Sync);

        // A payload that must stay on its thread pins the pool regardless of level.
        assert_not_impl_any!(ArrayPool<std::rc::Rc<String>, FullyConcurrent>: Send, Sync);
    }
}
