// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A standard (non-blocked) bloom filter, used to short-circuit point and
//! multi-value lookups against collections that almost certainly don't
//! contain the requested key (spec.md §4.9).
//!
//! Not present in the Go original (`examples/original_source/` has no bloom
//! filter at all); grounded instead on `lsm-tree`'s own `src/bloom/mod.rs`,
//! which already uses the `xxhash-rust` double-hashing scheme this crate's
//! `Cargo.toml` carries.

mod bit_array;

use bit_array::BitArray;

/// Two hashes used for double hashing, avoiding `k` independent hash
/// functions per <https://fjall-rs.github.io/post/bloom-filter-hash-sharing>.
type CompositeHash = (u64, u64);

/// A probabilistic membership filter with no false negatives.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    inner: BitArray,
    m: usize,
    k: usize,
}

impl BloomFilter {
    /// Builds a filter sized to hold `n` items at roughly false-positive
    /// rate `fp_rate`.
    #[must_use]
    pub fn with_fp_rate(n: usize, fp_rate: f32) -> Self {
        use std::f32::consts::LN_2;

        let n = n.max(1);
        let fp_rate = fp_rate.max(0.000_001);

        let m = Self::calculate_m(n, fp_rate);
        let bpk = m / n;
        let k = (((bpk as f32) * LN_2) as usize).max(1);

        Self {
            inner: BitArray::with_capacity(m / 8),
            m,
            k,
        }
    }

    fn calculate_m(n: usize, fp_rate: f32) -> usize {
        use std::f32::consts::LN_2;

        let n = n as f32;
        let ln2_squared = LN_2.powi(2);
        let numerator = n * fp_rate.ln();
        let m = -(numerator / ln2_squared);

        ((m / 8.0).ceil() * 8.0) as usize
    }

    /// Adds `key` to the filter.
    pub fn insert(&mut self, key: &[u8]) {
        let (mut h1, mut h2) = Self::hash(key);
        for i in 0..(self.k as u64) {
            let idx = (h1 % (self.m as u64)) as usize;
            self.inner.enable(idx);
            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_add(i);
        }
    }

    /// Returns `true` if `key` may be present. Never false-negative.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (mut h1, mut h2) = Self::hash(key);
        for i in 0..(self.k as u64) {
            let idx = (h1 % (self.m as u64)) as usize;
            if !self.inner.get(idx) {
                return false;
            }
            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_add(i);
        }
        true
    }

    fn hash(key: &[u8]) -> CompositeHash {
        let h0 = xxhash_rust::xxh3::xxh3_128(key);
        ((h0 >> 64) as u64, h0 as u64)
    }
}
