// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::array;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::concurrency::{AddMutex, Concurrency, CountCell, LinkCell, SlotCell};
use crate::deleter::{BoxDeleter, BufferDeleter};
use crate::info::ManagementInfo;
use crate::policies::management::ManagementPolicy;

/// Number of buffer slots per chunk. Chunks are appended as buffers are added and never
/// removed, so the slot addresses recorded in tokens stay valid for the life of the pool.
const CHUNK_CAPACITY: usize = 15;

/// The slot list is a singly-linked chain of fixed-size chunks. The first chunk lives inline in
/// the management object, further ones are boxed on demand.
struct Chunk<B, C: Concurrency> {
    /// One entry per registered buffer: the buffer pointer while free, null while in use.
    slots: [C::Slot<B>; CHUNK_CAPACITY],

    /// Next chunk in the chain, null at the end.
    next: C::Link<Chunk<B, C>>,
}

impl<B, C: Concurrency> Chunk<B, C> {
    fn new() -> Self {
        Self {
            slots: array::from_fn(|_| Default::default()),
            next: Default::default(),
        }
    }
}

/// Management policy that stores buffers in a slot list and flags use by nulling the slot.
///
/// Every registered buffer has a fixed slot; the buffer's token is the slot address. Acquiring
/// scans the slots in order and claims the first free one, recycling stores the buffer pointer
/// back into its slot. The scan is linear, so this policy suits pools of modest size; in
/// exchange it imposes no requirements whatsoever on the buffer type, unlike [`QueueBased`][1],
/// which needs queueable buffers to achieve constant-time acquisition.
///
/// All operations are lock-free except adding and sweeping at the levels where several threads
/// acquire concurrently, which serialize growth behind a short mutex.
///
/// [1]: crate::policies::management::QueueBased
pub struct ArrayAndFlagBased<B, C: Concurrency, D = BoxDeleter> {
    first_chunk: Chunk<B, C>,
    buffer_count: C::Count,
    add_lock: C::AddLock,
    _deleter: PhantomData<D>,
}

impl<B, C: Concurrency, D> Default for ArrayAndFlagBased<B, C, D> {
    fn default() -> Self {
        Self {
            first_chunk: Chunk::new(),
            buffer_count: Default::default(),
            add_lock: Default::default(),
            _deleter: PhantomData,
        }
    }
}

impl<B, C: Concurrency, D> ArrayAndFlagBased<B, C, D> {
    /// Number of buffers registered with this pool, in use or not.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffer_count.get()
    }

    fn slot_token(slot: &C::Slot<B>) -> *mut () {
        ptr::from_ref(slot).cast_mut().cast()
    }
}

// SAFETY: Tokens are slot addresses; slots live in chunks that are only freed when the
// management object drops, and a claimed slot is exclusively the claimant's to refill.
unsafe impl<B, C, D> ManagementPolicy for ArrayAndFlagBased<B, C, D>
where
    C: Concurrency,
    D: BufferDeleter<B>,
{
    type Buffer = B;

    fn add(&self, _buffer: NonNull<B>, info: &mut ManagementInfo) {
        self.add_lock.locked(|| {
            let mut index = self.buffer_count.get();
            let mut chunk: &Chunk<B, C> = &self.first_chunk;

            while index >= CHUNK_CAPACITY {
                index -= CHUNK_CAPACITY;

                let next = chunk.next.load();
                chunk = if next.is_null() {
                    let fresh = Box::into_raw(Box::new(Chunk::new()));
                    chunk.next.store(fresh);

                    // SAFETY: Just allocated; owned by the chain until the management drops.
                    unsafe { &*fresh }
                } else {
                    // SAFETY: Links only ever point at live boxed chunks of this chain.
                    unsafe { &*next }
                };
            }

            // The slot stays null: the new buffer is in use by the caller and arrives in its
            // slot through the first recycle.
            info.set(Self::slot_token(&chunk.slots[index]));
            self.buffer_count.increment();
        });
    }

    fn acquire(&self, info: &mut ManagementInfo) -> Option<NonNull<B>> {
        let mut remaining = self.buffer_count.get();
        let mut chunk: &Chunk<B, C> = &self.first_chunk;

        while remaining > 0 {
            for slot in &chunk.slots {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;

                let observed = slot.load();
                if !observed.is_null() && slot.try_claim(observed) {
                    info.set(Self::slot_token(slot));

                    // SAFETY: A non-null slot always holds a buffer pointer.
                    return Some(unsafe { NonNull::new_unchecked(observed) });
                }
            }

            let next = chunk.next.load();
            if next.is_null() {
                break;
            }

            // SAFETY: Links only ever point at live boxed chunks of this chain.
            chunk = unsafe { &*next };
        }

        info.clear();
        None
    }

    unsafe fn recycle(info: &ManagementInfo, buffer: NonNull<B>) {
        let slot = info.get().cast_const().cast::<C::Slot<B>>();
        assert!(
            !slot.is_null(),
            "recycle received an empty management token; this policy always issues one"
        );

        // SAFETY: The token addresses this buffer's slot, and per the recycle contract the
        // management object (and with it the chunk chain) is still alive.
        let slot = unsafe { &*slot };
        slot.store(buffer.as_ptr());
    }

    fn sweep(&self) -> usize {
        self.add_lock.locked(|| {
            let mut remaining = self.buffer_count.get();
            let mut chunk: &Chunk<B, C> = &self.first_chunk;

            while remaining > 0 {
                for slot in &chunk.slots {
                    if remaining == 0 {
                        break;
                    }
                    remaining -= 1;

                    let observed = slot.load();
                    // Claiming before deleting keeps a repeated sweep from seeing the stale
                    // pointer again.
                    if !observed.is_null() && slot.try_claim(observed) {
                        // SAFETY: The claim made us the exclusive owner of the buffer.
                        unsafe { D::delete(NonNull::new_unchecked(observed)) };
                        self.buffer_count.decrement();
                    }
                }

                let next = chunk.next.load();
                if next.is_null() {
                    break;
                }

                // SAFETY: Links only ever point at live boxed chunks of this chain.
                chunk = unsafe { &*next };
            }

            self.buffer_count.get()
        })
    }
}

impl<B, C: Concurrency, D> Drop for ArrayAndFlagBased<B, C, D> {
    fn drop(&mut self) {
        let mut next = self.first_chunk.next.load();
        while !next.is_null() {
            // SAFETY: Chunks past the first were allocated with Box::into_raw in add() and are
            // owned solely by this chain.
            let chunk = unsafe { Box::from_raw(next) };
            next = chunk.next.load();
        }
    }
}
