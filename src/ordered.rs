// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Monotone key-order bookkeeping shared by [`crate::scanner::Scanner`],
//! [`crate::iterator::Iterator`], and the test-fixture writer.
//!
//! Grounded on `examples/original_source/hfile/ordered_lookup.go`
//! (`OrderedOps`).

use crate::error::{Error, Result};
use crate::Slice;

/// Tracks the last key seen by a cursor, to enforce spec.md §3's
/// "non-decreasing key access" invariant.
#[derive(Debug, Default, Clone)]
pub struct OrderedOps {
    last_key: Option<Slice>,
}

impl OrderedOps {
    pub fn reset(&mut self) {
        self.last_key = None;
    }

    #[must_use]
    pub fn is_same(&self, key: &[u8]) -> bool {
        self.last_key.as_deref() == Some(key)
    }

    /// Errors with [`Error::OutOfOrder`] if `key` is smaller than the last
    /// key observed; otherwise records `key` as the new last key.
    pub fn check_and_advance(&mut self, key: &[u8]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if last.as_ref() > key {
                return Err(Error::OutOfOrder);
            }
        }
        self.last_key = Some(Slice::new(key));
        Ok(())
    }
}
