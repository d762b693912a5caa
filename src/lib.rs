// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pools of reusable heap buffers for pipelines that cannot afford per-message allocation,
//! with the most important types being:
//!
//! * [`BufferPool`] - owns a set of buffers of one type and lends them out; buffers are
//!   allocated once, added explicitly, and then circulate for the life of the pool.
//! * [`Pooled`] - the uniquely owning smart pointer a pool hands out; dropping it returns the
//!   buffer to its pool instead of freeing it.
//!
//! Everything about a pool is chosen at compile time and monomorphised away: how free buffers
//! are tracked ([management policies][policies::management]), where an outstanding buffer keeps
//! the reference back to its pool ([recycling policies][policies::recycling]), what happens
//! when a pool is destroyed while buffers are still out
//! ([deleting policies][policies::deleting]), and which threads may do what
//! ([concurrency levels][concurrency]). The policies compose freely; the [`QueuePool`] and
//! [`ArrayPool`] aliases name the common configurations.
//!
//! ```
//! use bufpool::{ArrayPool, SingleThreaded};
//!
//! let pool: ArrayPool<Vec<u8>, SingleThreaded> = ArrayPool::new();
//!
//! // Pools never grow by themselves: adding buffers is explicit, and the new buffer comes
//! // back ready to use.
//! let mut message = pool.add_buffer(Box::new(Vec::with_capacity(1500)));
//! message.extend_from_slice(b"first payload");
//! drop(message); // back into the pool, allocation and capacity intact
//!
//! let mut message = pool.get_unused().expect("the buffer is free again");
//! assert!(message.capacity() >= 1500);
//! message.clear();
//! ```
//!
//! All pool operations are wait-free or lock-free except pool growth and sweeping at the
//! multi-reader concurrency levels, which take a short mutex. There is no blocking acquire:
//! an empty pool returns `None` and the caller decides.
//!
//! Pools deleted while buffers are still outstanding are the business of the deleting
//! policies; the forgiving one parks the remains in the process-wide
//! [garbage registry][garbage] until the last buffer comes home.

pub mod concurrency;
mod constants;
mod container;
mod deleter;
pub mod garbage;
mod handle;
mod info;
pub mod policies;
mod pool;
mod queueable;
mod thread_safe;

pub use concurrency::{
    Concurrency, FullyConcurrent, MultipleReaders, MultipleWriters, SingleReaderSingleWriter,
    SingleThreaded,
};
pub use container::BufferContainer;
pub use deleter::{BoxDeleter, BufferDeleter};
pub use handle::Pooled;
pub use info::{HasManagementInfo, ManagementInfo};
pub use pool::{ArrayPool, BufferPool, Managed, QueuePool};
pub use queueable::Queueable;
