// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The runtime handle to one loaded collection.
//!
//! Grounded on `examples/original_source/hfile/reader.go` (`NewReaderFromConfig`,
//! `PrintDebugInfo`, `FindBlock`, `GetBlockBuf`, `GetScanner`/`GetIterator`),
//! restated across spec.md §3–§4.2 and §4.9.

use crate::block;
use crate::block_index::{self, Block};
use crate::bloom::BloomFilter;
use crate::collection::CollectionConfig;
use crate::error::Result;
use crate::file::{self, FileBytes};
use crate::fileinfo::{self, FileInfo};
use crate::iterator::Iterator;
use crate::pool::{self, Pool};
use crate::scanner::Scanner;
use crate::trailer::{self, Trailer};
use crate::Slice;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::RwLock;

#[derive(Default)]
struct BloomState {
    filter: Option<BloomFilter>,
    enabled: bool,
}

/// Owns a loaded collection's bytes, parsed metadata, and cursor pools.
///
/// Immutable after construction except for the scanner/iterator pools and
/// the Bloom filter (spec.md §3's lifecycle note).
pub struct Reader {
    config: CollectionConfig,
    data: FileBytes,
    trailer: Trailer,
    file_info: FileInfo,
    index: Vec<Block>,

    scanners: Pool<Scanner>,
    iterators: Pool<Iterator>,
    bloom: RwLock<BloomState>,
}

impl Reader {
    /// Loads `config.local_path` and parses its trailer, FileInfo, and
    /// data-block index.
    pub fn open(config: CollectionConfig) -> Result<Self> {
        let data = file::load(Path::new(&config.local_path), config.load_method)?;
        let trailer = trailer::parse(&data)?;
        let file_info = fileinfo::parse(&data, &trailer)?;
        let index = block_index::parse(&data, &trailer)?;

        log::debug!(
            "{}: loaded {} blocks, {} entries, codec {:?}",
            config.name,
            index.len(),
            trailer.entry_count,
            trailer.compression_codec
        );

        Ok(Self {
            config,
            data,
            trailer,
            file_info,
            index,
            scanners: Pool::new(pool::DEFAULT_CAPACITY),
            iterators: Pool::new(pool::DEFAULT_CAPACITY),
            bloom: RwLock::new(BloomState::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    #[must_use]
    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    #[must_use]
    pub fn index(&self) -> &[Block] {
        &self.index
    }

    /// Number of data blocks in this collection.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Same as [`Reader::index`]; named for readability at call sites that
    /// just want to walk block boundaries.
    #[must_use]
    pub fn block_descriptors(&self) -> &[Block] {
        &self.index
    }

    #[must_use]
    pub fn entry_count(&self) -> u32 {
        self.trailer.entry_count
    }

    /// The first key of the collection. Errors if the collection is empty.
    pub fn first_key(&self) -> Result<Slice> {
        self.index.first().map(|b| b.first_key.clone()).ok_or_else(|| {
            crate::Error::Format("empty collection has no first key".into())
        })
    }

    /// Decodes block `idx` into `scratch` (Snappy) or leaves it untouched
    /// (uncompressed, where callers read straight out of [`Reader::data`]).
    pub(crate) fn get_block(&self, idx: usize, scratch: &mut Vec<u8>) -> Result<()> {
        block::load(&self.data, &self.trailer, &self.index[idx], scratch)?;
        Ok(())
    }

    /// See [`block_index::find_block`].
    #[must_use]
    pub fn find_block(&self, from: usize, key: &[u8]) -> usize {
        block_index::find_block(&self.index, from, key)
    }

    /// Acquires a `Scanner` from the pool, allocating one if empty.
    #[must_use]
    pub fn get_scanner(&self) -> Scanner {
        self.scanners.acquire(|| Scanner::new(self))
    }

    /// Resets and returns a `Scanner` to the pool.
    pub fn release_scanner(&self, mut scanner: Scanner) {
        scanner.reset();
        self.scanners.release(scanner);
    }

    /// Acquires an `Iterator` from the pool, allocating one if empty.
    #[must_use]
    pub fn get_iterator(&self) -> Iterator {
        self.iterators.acquire(|| Iterator::new(self))
    }

    /// Resets and returns an `Iterator` to the pool.
    pub fn release_iterator(&self, mut iterator: Iterator) {
        iterator.reset();
        self.iterators.release(iterator);
    }

    /// Formats block count, compression, and the first `include_start_keys`
    /// blocks' first keys (hex-encoded), mirroring the Go reader's
    /// `PrintDebugInfo`.
    #[must_use]
    pub fn debug_summary(&self, include_start_keys: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "entries: {}", self.trailer.entry_count);
        let _ = writeln!(
            out,
            "compressed: {} (codec: {:?})",
            self.trailer.compression_codec != crate::trailer::CompressionCodec::None,
            self.trailer.compression_codec
        );
        let _ = writeln!(out, "blocks: {}", self.index.len());

        for (i, blk) in self.index.iter().enumerate() {
            if i > include_start_keys {
                let _ = writeln!(out, "\t... and {} more", self.index.len() - i);
                break;
            }
            let hex: String = blk.first_key.iter().map(|b| format!("{b:02x}")).collect();
            let _ = writeln!(out, "\t#{i}: {hex}");
        }

        out
    }

    /// `true` if `key` may be present. Returns `true` unconditionally when
    /// no Bloom filter has been computed, or it is disabled — callers must
    /// still fall through to a Scanner for a definitive answer.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let state = self.bloom.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &state.filter {
            Some(filter) if state.enabled => filter.might_contain(key),
            _ => true,
        }
    }

    /// Builds a fresh Bloom filter sized for this collection's entry count
    /// at false-positive rate `fp_rate`, by walking every key with an
    /// `Iterator`, and installs it enabled. Spec.md §4.9: callers are
    /// expected to pause serving against this Reader while this runs.
    pub fn calculate_bloom(&self, fp_rate: f32) -> Result<()> {
        let mut filter = BloomFilter::with_fp_rate(self.trailer.entry_count.max(1) as usize, fp_rate);

        let mut it = Iterator::new(self);
        while it.next(self)? {
            if let Some(key) = it.key(self) {
                filter.insert(&key);
            }
        }

        let mut state = self.bloom.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.filter = Some(filter);
        state.enabled = true;
        Ok(())
    }

    /// Enables a previously computed Bloom filter. A no-op if none has been
    /// computed yet.
    pub fn enable_bloom(&self) {
        let mut state = self.bloom.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.filter.is_some() {
            state.enabled = true;
        }
    }

    /// Disables Bloom-filter gating without discarding the computed filter.
    pub fn disable_bloom(&self) {
        let mut state = self.bloom.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::LoadMethod;
    use crate::writer::Writer;
    use test_log::test;

    fn build(n: u32) -> (tempfile::TempDir, Reader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hfile");
        let mut w = Writer::create(&path, false, 4096).unwrap();
        for i in 0..n {
            w.write(&i.to_be_bytes(), format!("value-for-{i}").as_bytes())
                .unwrap();
        }
        w.close().unwrap();

        let cfg = CollectionConfig::new("t", path.to_str().unwrap(), LoadMethod::OnDisk);
        (dir, Reader::open(cfg).unwrap())
    }

    #[test]
    fn opens_and_reports_metadata() {
        let (_dir, reader) = build(1000);
        assert_eq!(reader.entry_count(), 1000);
        assert_eq!(reader.first_key().unwrap().to_vec(), 0u32.to_be_bytes().to_vec());
        assert!(reader.index_len() >= 1);
    }

    #[test]
    fn debug_summary_lists_block_keys() {
        let (_dir, reader) = build(5000);
        let summary = reader.debug_summary(2);
        assert!(summary.contains("entries: 5000"));
        assert!(summary.contains("blocks:"));
    }

    #[test]
    fn scanner_pool_round_trips() {
        let (_dir, reader) = build(100);
        let scanner = reader.get_scanner();
        reader.release_scanner(scanner);
        let _scanner = reader.get_scanner();
    }

    #[test]
    fn bloom_gates_after_calculation() {
        let (_dir, reader) = build(2000);
        assert!(reader.might_contain(&999u32.to_be_bytes()));

        reader.calculate_bloom(0.01).unwrap();
        assert!(reader.might_contain(&999u32.to_be_bytes()));

        let mut false_positives = 0;
        for i in 2000u32..4000 {
            if reader.might_contain(&i.to_be_bytes()) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 200, "fpr too high: {false_positives}/2000");

        reader.disable_bloom();
        assert!(reader.might_contain(&2500u32.to_be_bytes()));

        reader.enable_bloom();
        assert!(reader.might_contain(&999u32.to_be_bytes()));
    }
}
