//! Lock-free single-producer/single-consumer double buffer (§4.3)
//!
//! The producer writes into whichever slot is not currently published,
//! then atomically flips the published index and bumps a version counter.
//! The consumer only ever reads the published slot. Neither side blocks
//! the other. This is **not** safe for more than one producer or more
//! than one consumer; that discipline is the caller's responsibility, not
//! something this type can enforce at compile time.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub struct DoubleBuffer<T> {
    slots: [UnsafeCell<T>; 2],
    published: AtomicUsize,
    version: AtomicU64,
}

// Safety: the producer only ever writes slots[1 - published], the consumer
// only ever reads slots[published]; the atomic flip makes the write visible
// before the index change is observed (Release/Acquire pair below).
unsafe impl<T: Send> Sync for DoubleBuffer<T> {}

impl<T: Default> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self {
            slots: [UnsafeCell::new(T::default()), UnsafeCell::new(T::default())],
            published: AtomicUsize::new(0),
            version: AtomicU64::new(0),
        }
    }
}

impl<T> DoubleBuffer<T> {
    /// Producer-side: build the next value in place via `f`, then publish
    /// it. Must only ever be called from the single producer thread.
    pub fn publish_with(&self, f: impl FnOnce(&mut T)) {
        let published = self.published.load(Ordering::Acquire);
        let write_idx = 1 - published;
        // Safety: single producer, this slot is not the published one.
        let slot = unsafe { &mut *self.slots[write_idx].get() };
        f(slot);
        self.published.store(write_idx, Ordering::Release);
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Consumer-side snapshot: current version and a clone of the
    /// published slot. Must only ever be called from the single consumer
    /// thread.
    ///
    /// Retries if the producer republishes mid-clone: with only two slots,
    /// a publish during the clone can flip `published` back to the slot
    /// being read, so the version is re-checked after the clone rather
    /// than trusted from the initial load (seqlock-style).
    pub fn snapshot(&self) -> (u64, T)
    where
        T: Clone,
    {
        loop {
            let version_before = self.version.load(Ordering::Acquire);
            let published = self.published.load(Ordering::Acquire);
            // Safety: the consumer never touches the write-side slot; the
            // Acquire load above pairs with the Release store in publish_with.
            let value = unsafe { (*self.slots[published].get()).clone() };
            let version_after = self.version.load(Ordering::Acquire);
            if version_after == version_before {
                return (version_before, value);
            }
        }
    }
}

impl<T: Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
