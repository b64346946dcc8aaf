// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Sequential range cursor with seek, prefix sweep, and resume.
//!
//! Grounded on `examples/original_source/hfile/iterator.go`, restated in
//! spec.md §4.7–§4.8. Like [`crate::scanner::Scanner`], this cursor takes
//! its `Reader` as an explicit argument on every call rather than holding a
//! reference back to it — see `scanner.rs`'s module doc for why.

use crate::error::Result;
use crate::ordered::OrderedOps;
use crate::reader::Reader;
use crate::trailer::CompressionCodec;
use crate::Slice;
use byteorder::{BigEndian, ByteOrder};
use rustc_hash::FxHashMap;

/// A reusable sequential cursor. See spec.md §4.7.
#[derive(Debug)]
pub struct Iterator {
    idx: usize,
    block_loaded: bool,
    pos: usize,
    scratch: Vec<u8>,

    key_start: usize,
    key_len: usize,
    val_start: usize,
    val_len: usize,
    current_valid: bool,

    ordered: OrderedOps,
}

impl Iterator {
    pub(crate) fn new(reader: &Reader) -> Self {
        Self {
            idx: 0,
            block_loaded: false,
            pos: 0,
            scratch: Vec::with_capacity(crate::scanner::scratch_capacity_hint(reader)),
            key_start: 0,
            key_len: 0,
            val_start: 0,
            val_len: 0,
            current_valid: false,
            ordered: OrderedOps::default(),
        }
    }

    /// Resets all cursor state; called before a cursor is returned to its
    /// `Reader`'s pool.
    pub fn reset(&mut self) {
        self.idx = 0;
        self.block_loaded = false;
        self.pos = 0;
        self.current_valid = false;
        self.ordered.reset();
    }

    /// `true` if the cursor is positioned at a record (i.e. `key()`/
    /// `value()` return `Some`).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current_valid
    }

    /// Copies the key of the current record.
    #[must_use]
    pub fn key(&self, reader: &Reader) -> Option<Slice> {
        self.current_valid
            .then(|| Slice::new(self.current_key_bytes(reader)))
    }

    /// Copies the value of the current record.
    #[must_use]
    pub fn value(&self, reader: &Reader) -> Option<Slice> {
        self.current_valid
            .then(|| Slice::new(self.current_value_bytes(reader)))
    }

    fn current_block<'a>(&'a self, reader: &'a Reader) -> &'a [u8] {
        let block = &reader.index()[self.idx];
        match reader.trailer().compression_codec {
            CompressionCodec::None => {
                let start = block.offset as usize;
                &reader.data()[start..start + block.size as usize]
            }
            CompressionCodec::Snappy => &self.scratch[..block.size as usize],
        }
    }

    fn current_key_bytes<'a>(&'a self, reader: &'a Reader) -> &'a [u8] {
        &self.current_block(reader)[self.key_start..self.key_start + self.key_len]
    }

    fn current_value_bytes<'a>(&'a self, reader: &'a Reader) -> &'a [u8] {
        &self.current_block(reader)[self.val_start..self.val_start + self.val_len]
    }

    /// Advances one record. Returns `false` at end of collection.
    pub fn next(&mut self, reader: &Reader) -> Result<bool> {
        self.current_valid = false;

        loop {
            if self.idx >= reader.index_len() {
                return Ok(false);
            }

            if !self.block_loaded {
                reader.get_block(self.idx, &mut self.scratch)?;
                self.pos = 8;
                self.block_loaded = true;
            }

            if self.current_block(reader).len() <= self.pos {
                self.idx += 1;
                self.block_loaded = false;
                continue;
            }

            break;
        }

        let block = self.current_block(reader);
        let key_len = BigEndian::read_u32(&block[self.pos..]) as usize;
        let val_len = BigEndian::read_u32(&block[self.pos + 4..]) as usize;

        self.key_start = self.pos + 8;
        self.key_len = key_len;
        self.val_start = self.key_start + key_len;
        self.val_len = val_len;
        self.pos += 8 + key_len + val_len;
        self.current_valid = true;

        Ok(true)
    }

    /// Positions at the first record whose key is `>= key`.
    ///
    /// Fails with [`crate::Error::OutOfOrder`] if `key` is smaller than the
    /// last key this iterator has been asked for.
    pub fn seek(&mut self, reader: &Reader, key: &[u8]) -> Result<bool> {
        self.ordered.check_and_advance(key)?;

        if self.current_valid && key <= self.current_key_bytes(reader) {
            log::trace!("iterator: already at or past requested key");
            return Ok(true);
        }

        let blk = reader.find_block(self.idx, key);
        if blk != self.idx {
            self.block_loaded = false;
            self.idx = blk;
        }

        let mut ok = self.next(reader)?;
        while ok {
            if self.current_key_bytes(reader) >= key {
                break;
            }
            ok = self.next(reader)?;
        }

        Ok(ok)
    }

    /// Finds, for each prefix in order, every (key, values) pair where the
    /// key starts with that prefix. See spec.md §4.8 for the limit/resume
    /// contract in full.
    pub fn all_for_prefixes(
        &mut self,
        reader: &Reader,
        prefixes: &[Slice],
        limit: i64,
        last_key: Option<&[u8]>,
    ) -> Result<(FxHashMap<Slice, Vec<Slice>>, Option<Slice>)> {
        let limit = if limit <= 0 { i64::from(i32::MAX) } else { limit };
        let mut res: FxHashMap<Slice, Vec<Slice>> = FxHashMap::default();
        let mut values: i64 = 0;

        let mut preseek_ok = false;
        if let Some(lk) = last_key {
            preseek_ok = self.seek(reader, lk)?;
        }

        for prefix in prefixes {
            let mut ok = if last_key.is_none_or(|lk| lk <= prefix.as_ref()) {
                self.seek(reader, prefix.as_ref())?
            } else {
                preseek_ok
            };

            let mut acc: Vec<Slice> = Vec::new();

            while ok && self.current_key_bytes(reader).starts_with(prefix.as_ref()) {
                let prev = Slice::new(self.current_key_bytes(reader));
                acc.push(Slice::new(self.current_value_bytes(reader)));

                ok = self.next(reader)?;
                values += 1;

                let same_key = ok && self.current_key_bytes(reader) == prev.as_ref();
                if !same_key {
                    res.insert(prev, std::mem::take(&mut acc));

                    if values >= limit {
                        let next_last_key = if ok
                            && self.current_key_bytes(reader).starts_with(prefix.as_ref())
                        {
                            Some(Slice::new(self.current_key_bytes(reader)))
                        } else {
                            None
                        };
                        return Ok((res, next_last_key));
                    }
                }
            }

            if !ok {
                break;
            }
        }

        Ok((res, None))
    }
}
