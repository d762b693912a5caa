// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The three orthogonal policy families a [`BufferPool`][1] is composed from.
//!
//! * [`management`] decides how the pool keeps track of which buffers are free.
//! * [`recycling`] decides where a buffer remembers the pool it must return to, and with it the
//!   size and requirements of the smart pointer.
//! * [`deleting`] decides what happens when a pool is destroyed while buffers are still out.
//!
//! Any management policy combines with any recycling and any deleting policy; the type
//! requirements of the individual policies are the only constraints.
//!
//! [1]: crate::BufferPool

pub mod deleting;
pub mod management;
pub mod recycling;
