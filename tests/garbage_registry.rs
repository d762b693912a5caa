// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deferred reclamation of pools deleted while buffers were still out.
//!
//! The garbage registry is process-wide state, so every test in this file serializes on one
//! mutex and works with counts relative to its own baseline.

use std::sync::{Mutex, MutexGuard};

use bufpool::policies::deleting::CollectGarbage;
use bufpool::policies::management::{ArrayAndFlagBased, QueueBased};
use bufpool::policies::recycling::{StoreOwnerInPointer, UseOwnerStorageInBuffer};
use bufpool::{
    BufferPool, HasManagementInfo, ManagementInfo, MultipleWriters, Queueable, garbage,
};

static REGISTRY_ACCESS: Mutex<()> = Mutex::new(());

fn registry_access() -> MutexGuard<'static, ()> {
    // A panicking test must not wedge the others.
    REGISTRY_ACCESS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct TestBuffer {
    info: ManagementInfo,
    content: String,
}

impl TestBuffer {
    fn new(content: &str) -> Box<Self> {
        Box::new(Self {
            info: ManagementInfo::new(),
            content: String::from(content),
        })
    }
}

impl HasManagementInfo for TestBuffer {
    fn management_info(&self) -> &ManagementInfo {
        &self.info
    }

    fn management_info_mut(&mut self) -> &mut ManagementInfo {
        &mut self.info
    }
}

impl Queueable for TestBuffer {}

#[test]
fn orphan_lives_until_the_last_buffer_returns() {
    let _guard = registry_access();

    type Mgmt = QueueBased<TestBuffer, MultipleWriters>;
    type Pool = BufferPool<TestBuffer, UseOwnerStorageInBuffer<Mgmt>, CollectGarbage<Mgmt>>;

    let baseline = garbage::orphan_count();

    let pool = Pool::new();
    for i in 0..4 {
        drop(pool.add_buffer(TestBuffer::new(&i.to_string())));
    }

    let first = pool.get_unused().expect("four buffers are registered");
    let second = pool.get_unused().expect("three buffers are free");

    // Two buffers are out, so the management is parked rather than destroyed.
    drop(pool);
    assert_eq!(garbage::orphan_count(), baseline + 1);

    // Collecting reclaims nothing while buffers are missing.
    garbage::collect();
    assert_eq!(garbage::orphan_count(), baseline + 1);

    assert_eq!(first.content, "0");
    drop(first);
    garbage::collect();
    assert_eq!(garbage::orphan_count(), baseline + 1);

    drop(second);
    garbage::collect();
    assert_eq!(garbage::orphan_count(), baseline);
}

#[test]
fn array_managements_are_reclaimable_too() {
    let _guard = registry_access();

    type Mgmt = ArrayAndFlagBased<String, MultipleWriters>;
    type Pool = BufferPool<String, StoreOwnerInPointer<Mgmt>, CollectGarbage<Mgmt>>;

    let baseline = garbage::orphan_count();

    let pool = Pool::new();
    drop(pool.add_buffer(Box::new(String::from("kept"))));
    drop(pool.add_buffer(Box::new(String::from("dropped with pool"))));

    let held = pool.get_unused().expect("two buffers are registered");
    drop(pool);
    assert_eq!(garbage::orphan_count(), baseline + 1);

    // The free buffer was already destroyed by the drop-time sweep; repeated collection must
    // not disturb the one still out.
    garbage::collect();
    garbage::collect();
    assert_eq!(garbage::orphan_count(), baseline + 1);
    assert_eq!(*held, "kept");

    drop(held);
    garbage::collect();
    assert_eq!(garbage::orphan_count(), baseline);
}

#[test]
fn clean_pool_teardown_never_parks_anything() {
    let _guard = registry_access();

    type Mgmt = QueueBased<TestBuffer, MultipleWriters>;
    type Pool = BufferPool<TestBuffer, UseOwnerStorageInBuffer<Mgmt>, CollectGarbage<Mgmt>>;

    let baseline = garbage::orphan_count();

    let pool = Pool::new();
    drop(pool.add_buffer(TestBuffer::new("transient")));
    drop(pool);

    assert_eq!(garbage::orphan_count(), baseline);
}
