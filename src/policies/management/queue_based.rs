// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crossbeam_queue::SegQueue;

use crate::concurrency::{Concurrency, CountCell};
use crate::deleter::{BoxDeleter, BufferDeleter};
use crate::info::ManagementInfo;
use crate::policies::management::ManagementPolicy;
use crate::queueable::Queueable;
use crate::thread_safe::ThreadSafe;

/// Management policy that collects free buffers in a lock-free queue.
///
/// Acquisition is a single dequeue and recycling a single enqueue, so this policy scales to
/// pools of any size; the price is that buffers must be [`Queueable`]. Types that are not can
/// wrap their payload in a [`BufferContainer`][1] (combined with the matching recycling policy),
/// which is queueable on their behalf.
///
/// The buffer's token is the address of this management object, so an outstanding buffer can
/// find its way home with no per-buffer state beyond the token itself. Recycling runs the
/// buffer's [`on_recycle`][2] notification just before the buffer re-enters the free queue.
///
/// The underlying queue is multi-producer multi-consumer, which covers every concurrency level;
/// the level still governs what the pool as a whole promises (and whether the pool is `Sync` at
/// all). The queue holds no sentinel element, so [`sweep`][3] drains it completely and the
/// reported residual is exactly the number of outstanding buffers.
///
/// [1]: crate::BufferContainer
/// [2]: crate::Queueable::on_recycle
/// [3]: ManagementPolicy::sweep
pub struct QueueBased<B: Queueable, C: Concurrency, D: BufferDeleter<B> = BoxDeleter> {
    /// The unused buffers of this pool. Pointers in the queue are exclusively owned by it.
    unused_buffers: SegQueue<ThreadSafe<NonNull<B>>>,

    /// Number of buffers registered with this pool, in use or not.
    buffer_count: C::Count,

    _marker: PhantomData<(C, D)>,
}

impl<B: Queueable, C: Concurrency, D: BufferDeleter<B>> Default for QueueBased<B, C, D> {
    fn default() -> Self {
        Self {
            unused_buffers: SegQueue::new(),
            buffer_count: Default::default(),
            _marker: PhantomData,
        }
    }
}

impl<B: Queueable, C: Concurrency, D: BufferDeleter<B>> QueueBased<B, C, D> {
    /// Number of buffers registered with this pool, in use or not.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffer_count.get()
    }

    fn token(&self) -> *mut () {
        ptr::from_ref(self).cast_mut().cast()
    }
}

// SAFETY: Tokens are the address of the management object, which the deleting policies keep at
// a stable heap location for as long as any handle can recycle into it; dequeued buffers are
// exclusively owned because only recycling enqueues them.
unsafe impl<B, C, D> ManagementPolicy for QueueBased<B, C, D>
where
    B: Queueable,
    C: Concurrency,
    D: BufferDeleter<B>,
{
    type Buffer = B;

    fn add(&self, _buffer: NonNull<B>, info: &mut ManagementInfo) {
        // The buffer is not enqueued: it stays with the caller as an in-use buffer and joins
        // the free queue on its first recycle.
        self.buffer_count.increment();
        info.set(self.token());
    }

    fn acquire(&self, info: &mut ManagementInfo) -> Option<NonNull<B>> {
        info.set(self.token());
        self.unused_buffers.pop().map(|buffer| *buffer)
    }

    unsafe fn recycle(info: &ManagementInfo, buffer: NonNull<B>) {
        let management = info.get().cast_const().cast::<Self>();
        assert!(
            !management.is_null(),
            "recycle received an empty management token; this policy always issues one"
        );

        // SAFETY: The token addresses the owning management object, alive per the recycle
        // contract.
        let management = unsafe { &*management };

        // SAFETY: The buffer is exclusively owned during the in-use to free transition.
        unsafe { (*buffer.as_ptr()).on_recycle() };

        // SAFETY: Ownership of the buffer moves into the queue; any cross-thread movement is
        // sanctioned by the pool's concurrency level.
        management.unused_buffers.push(unsafe { ThreadSafe::new(buffer) });
    }

    fn sweep(&self) -> usize {
        while let Some(buffer) = self.unused_buffers.pop() {
            // SAFETY: Dequeued buffers are exclusively owned by us.
            unsafe { D::delete(*buffer) };
            self.buffer_count.decrement();
        }

        self.buffer_count.get()
    }
}

impl<B: Queueable, C: Concurrency, D: BufferDeleter<B>> Drop for QueueBased<B, C, D> {
    fn drop(&mut self) {
        // The deleting policies sweep before dropping, so the queue is normally empty here.
        // Buffers that raced their way in between sweep and drop are still released properly.
        while let Some(buffer) = self.unused_buffers.pop() {
            // SAFETY: Dequeued buffers are exclusively owned by us.
            unsafe { D::delete(*buffer) };
        }
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::concurrency::{FullyConcurrent, SingleThreaded};

    #[derive(Debug, PartialEq)]
    struct TestBuffer(u32);

    impl Queueable for TestBuffer {}

    type ConcurrentBuffers = QueueBased<TestBuffer, FullyConcurrent>;

    fn add_buffer(management: &ConcurrentBuffers, value: u32) -> NonNull<TestBuffer> {
        let buffer = NonNull::from(Box::leak(Box::new(TestBuffer(value))));
        let mut info = ManagementInfo::new();
        management.add(buffer, &mut info);

        // A freshly added buffer counts as in use; return it so the state is consistent.
        // SAFETY: The token was just written for this buffer.
        unsafe { ConcurrentBuffers::recycle(&info, buffer) };
        buffer
    }

    #[test]
    fn smoke_test() {
        let management = Box::new(ConcurrentBuffers::default());

        add_buffer(&management, 1);
        add_buffer(&management, 2);
        assert_eq!(management.buffer_count(), 2);

        // First in, first out.
        let mut info = ManagementInfo::new();
        let first = management.acquire(&mut info).expect("two buffers are free");
        // SAFETY: Acquired buffers are exclusively ours to inspect.
        assert_eq!(unsafe { first.as_ref() }, &TestBuffer(1));

        // SAFETY: Token and buffer match and the management is alive.
        unsafe { ConcurrentBuffers::recycle(&info, first) };

        assert_eq!(management.sweep(), 0);
        assert_eq!(management.buffer_count(), 0);
    }

    #[test]
    fn sweep_counts_outstanding_buffers() {
        let management = Box::new(ConcurrentBuffers::default());

        add_buffer(&management, 1);
        add_buffer(&management, 2);
        add_buffer(&management, 3);

        let mut info = ManagementInfo::new();
        let held = management.acquire(&mut info).expect("buffers are free");

        assert_eq!(management.sweep(), 1);
        assert_eq!(management.sweep(), 1);

        // SAFETY: Token and buffer match and the management is alive.
        unsafe { ConcurrentBuffers::recycle(&info, held) };
        assert_eq!(management.sweep(), 0);
    }

    #[test]
    fn empty_pool_acquires_nothing() {
        let management = ConcurrentBuffers::default();

        let mut info = ManagementInfo::new();
        assert!(management.acquire(&mut info).is_none());
    }

    #[test]
    fn thread_safety_follows_level() {
        assert_impl_all!(ConcurrentBuffers: Send, Sync);
        assert_not_impl_any!(QueueBased<TestBuffer, SingleThreaded>: Sync);
    }
}
