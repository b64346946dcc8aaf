// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Bounded, thread-safe object pools for [`crate::scanner::Scanner`]s and
//! [`crate::iterator::Iterator`]s.
//!
//! Grounded on the `scannerCache`/`iteratorCache` buffered channels in
//! `examples/original_source/hfile/reader.go`, reimplemented over
//! `crossbeam_queue::ArrayQueue` (an MPMC ring buffer) per spec.md §5: a
//! bounded queue of default capacity 5, `acquire` allocates on miss,
//! `release` drops silently on overflow.

use crossbeam_queue::ArrayQueue;

/// Default capacity of a [`Pool`], matching the Go reader's buffered
/// channels of size 5.
pub const DEFAULT_CAPACITY: usize = 5;

/// A bounded pool of reusable cursors.
pub struct Pool<T> {
    queue: ArrayQueue<T>,
}

impl<T> Pool<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Pops a pooled value, or runs `make` to allocate a fresh one.
    pub fn acquire(&self, make: impl FnOnce() -> T) -> T {
        self.queue.pop().unwrap_or_else(make)
    }

    /// Returns `value` to the pool, dropping it if the pool is full.
    pub fn release(&self, value: T) {
        let _ = self.queue.push(value);
    }
}
