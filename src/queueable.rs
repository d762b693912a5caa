// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Marker for buffer types that the queue-based management policy may hold in its free queue.
///
/// The [`QueueBased`][1] policy keeps unused buffers in a concurrent queue, which is the price
/// of its constant-time acquisition. Implementing this trait declares that parking values of the
/// type in that queue is acceptable. Types that cannot opt in can still use queue-based pools by
/// wrapping their buffers in a [`BufferContainer`][2], which is queueable on their behalf.
///
/// # Recycle notification
///
/// Types that want to observe their own return to the pool override [`on_recycle`][3], which the
/// queue-based policy invokes exactly once per recycle, before the buffer re-enters the free
/// queue. The default does nothing. Typical uses are clearing payload state or releasing
/// resources that should not sit idle in the pool.
///
/// [1]: crate::policies::management::QueueBased
/// [2]: crate::BufferContainer
/// [3]: Queueable::on_recycle
pub trait Queueable {
    /// Called when the buffer transitions from in-use back to free.
    ///
    /// Runs on the thread that dropped the handle, while the buffer is still exclusively owned.
    fn on_recycle(&mut self) {}
}
