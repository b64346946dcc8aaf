// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A minimal HFile v1 writer, used only to produce test fixtures.
//!
//! Grounded on `examples/original_source/hfile/writer.go`. Not part of the
//! serving core (spec.md §1's Non-goals explicitly carve out "writing new
//! HFiles in production"); this exists purely so unit and integration tests
//! can build fixtures without vendoring binary blobs.
//!
//! Unlike the Go writer, this one never writes a FileInfo block and always
//! sets `file_info_offset == data_index_offset`, so [`crate::fileinfo::parse`]
//! correctly takes its "no FileInfo" fast path (the Go writer's `Close`
//! never calls `flushFileInfo`, so `FileInfoOffset` is left at its
//! zero-value default there — harmless only because no file produced by
//! that writer is ever re-read with a FileInfoOffset check that matters).

use crate::block::DATA_MAGIC;
use crate::block_index::INDEX_MAGIC;
use crate::error::Result;
use crate::ordered::OrderedOps;
use crate::trailer::TRAILER_MAGIC;
use crate::vint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

struct PendingBlock {
    first_key: Vec<u8>,
    buf: Vec<u8>,
}

struct FlushedBlock {
    offset: u64,
    size: u32,
    first_key: Vec<u8>,
}

/// Writes a sorted stream of key/value pairs out as an HFile v1 file.
///
/// Not safe for malformed (non-sorted) input: callers must supply
/// non-decreasing keys, same as the reader requires on the way back in.
#[doc(hidden)]
pub struct Writer {
    file: BufWriter<File>,
    compress: bool,
    block_size_limit: usize,

    cur_offset: u64,
    cur_block: Option<PendingBlock>,
    blocks: Vec<FlushedBlock>,

    entry_count: u32,
    total_uncompressed_data_bytes: u64,

    ordered: OrderedOps,
}

impl Writer {
    /// Creates a new HFile at `path`. `block_size_limit` is a soft cap in
    /// bytes: a block is flushed once it reaches that size and the next key
    /// differs from the block's pending last key (never split a run of
    /// duplicate keys across blocks).
    pub fn create(path: &Path, compress: bool, block_size_limit: usize) -> Result<Self> {
        Ok(Self {
            file: BufWriter::new(File::create(path)?),
            compress,
            block_size_limit,
            cur_offset: 0,
            cur_block: None,
            blocks: Vec::new(),
            entry_count: 0,
            total_uncompressed_data_bytes: 0,
            ordered: OrderedOps::default(),
        })
    }

    /// Appends one record. Keys must be non-decreasing across the whole
    /// write sequence.
    pub fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.maybe_start_block(key);
        self.ordered.check_and_advance(key)?;

        let block = self.cur_block.as_mut().expect("just started above");
        block.buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        block.buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        block.buf.extend_from_slice(key);
        block.buf.extend_from_slice(value);

        self.entry_count += 1;
        Ok(())
    }

    fn maybe_start_block(&mut self, key: &[u8]) {
        if let Some(block) = &self.cur_block {
            if block.buf.len() >= self.block_size_limit && !self.ordered.is_same(key) {
                self.flush_block().expect("in-memory buffer flush cannot fail before I/O");
            }
        }

        if self.cur_block.is_none() {
            let mut buf = Vec::with_capacity(self.block_size_limit);
            buf.extend_from_slice(DATA_MAGIC);
            self.cur_block = Some(PendingBlock {
                first_key: key.to_vec(),
                buf,
            });
        }
    }

    fn flush_block(&mut self) -> Result<()> {
        let block = self.cur_block.take().expect("caller checked Some");
        self.total_uncompressed_data_bytes += block.buf.len() as u64;
        let offset = self.cur_offset;

        if self.compress {
            let compressed = snap::raw::Encoder::new()
                .compress_vec(&block.buf)
                .map_err(|e| crate::Error::Decompress(e.to_string()))?;

            self.file.write_all(&(block.buf.len() as u32).to_be_bytes())?;
            self.file.write_all(&(compressed.len() as u32).to_be_bytes())?;
            self.file.write_all(&compressed)?;
            self.cur_offset += 8 + compressed.len() as u64;
        } else {
            self.file.write_all(&block.buf)?;
            self.cur_offset += block.buf.len() as u64;
        }

        self.blocks.push(FlushedBlock {
            offset,
            size: block.buf.len() as u32,
            first_key: block.first_key,
        });
        Ok(())
    }

    fn flush_index(&mut self) -> Result<u64> {
        let data_index_offset = self.cur_offset;

        self.file.write_all(INDEX_MAGIC)?;
        self.cur_offset += INDEX_MAGIC.len() as u64;

        for block in &self.blocks {
            self.file.write_all(&block.offset.to_be_bytes())?;
            self.file.write_all(&block.size.to_be_bytes())?;
            self.cur_offset += 12;

            let encoded_len = vint::encode(block.first_key.len() as i64);
            self.file.write_all(&encoded_len)?;
            self.file.write_all(&block.first_key)?;
            self.cur_offset += (encoded_len.len() + block.first_key.len()) as u64;
        }

        Ok(data_index_offset)
    }

    /// Flushes any pending block, writes the index and trailer, and closes
    /// the file.
    pub fn close(mut self) -> Result<()> {
        if self.cur_block.is_some() {
            self.flush_block()?;
        }

        let data_index_offset = self.flush_index()?;
        // No FileInfo block is ever written; per this module's doc comment,
        // file_info_offset deliberately equals data_index_offset.
        let file_info_offset = data_index_offset;
        let data_index_count = self.blocks.len() as u32;

        self.file.write_all(TRAILER_MAGIC)?;
        self.file.write_all(&file_info_offset.to_be_bytes())?;
        self.file.write_all(&data_index_offset.to_be_bytes())?;
        self.file.write_all(&data_index_count.to_be_bytes())?;
        self.file.write_all(&0u64.to_be_bytes())?; // meta_index_offset
        self.file.write_all(&0u32.to_be_bytes())?; // meta_index_count
        self.file
            .write_all(&self.total_uncompressed_data_bytes.to_be_bytes())?;
        self.file.write_all(&self.entry_count.to_be_bytes())?;
        let codec: u32 = if self.compress { 3 } else { 2 };
        self.file.write_all(&codec.to_be_bytes())?;

        self.file.write_all(&1u32.to_be_bytes())?; // version 1.0
        self.file.flush()?;
        Ok(())
    }
}
