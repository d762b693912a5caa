// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deleting policies: what happens when a pool is destroyed while buffers are still out.
//!
//! Dropping a pool sweeps its free buffers away. The question is what to do about buffers that
//! are still held by pointers at that moment:
//!
//! * [`ComplainOnMissingBuffers`] logs an error and tears the pool down regardless. Choose it
//!   when every pointer's lifetime is provably bounded by the pool's; recycling a pointer that
//!   outlived such a pool writes into freed memory.
//! * [`CollectGarbage`] parks the pool's management in the process-wide [garbage
//!   registry][crate::garbage] until the last pointer has returned its buffer. Choose it when
//!   pools come and go while buffers circulate.
//!
//! Either way the management object is heap-allocated by the policy, so its address, which
//! outstanding tokens refer to, survives moves of the pool value itself.

use crate::policies::management::ManagementPolicy;

mod collect_garbage;
mod complain_on_missing;

pub use collect_garbage::CollectGarbage;
pub use complain_on_missing::ComplainOnMissingBuffers;

/// Owns a pool's management object and defines its end-of-life behaviour.
pub trait DeletingPolicy: Default {
    /// The management policy this deleting policy owns.
    type Management: ManagementPolicy;

    /// The owned management object.
    fn management(&self) -> &Self::Management;
}
