// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Data-block index: the table mapping each block's first key to its
//! on-disk offset and size.
//!
//! Grounded on `examples/original_source/hfile/reader.go` (`loadIndex`,
//! `FindBlock`), with the parse loop and the block-selection algorithm
//! restated in spec.md §4.2 and §4.5.

use crate::error::{Error, Result};
use crate::vint;
use crate::Slice;
use byteorder::{BigEndian, ByteOrder};

/// Magic at the start of the data-block index.
pub const INDEX_MAGIC: &[u8; 8] = b"IDXBLK)+";

/// Offset, on-disk size, and first key of a data block.
#[derive(Debug, Clone)]
pub struct Block {
    pub offset: u64,
    pub size: u32,
    pub first_key: Slice,
}

impl Block {
    /// `true` if this block's first key sorts strictly after `key`.
    fn is_after(&self, key: &[u8]) -> bool {
        self.first_key.as_ref() > key
    }
}

/// Parses the data-block index starting at `trailer.data_index_offset`.
///
/// Stops at `trailer.meta_index_offset` (or the trailer's own offset, if
/// there is no meta-index).
pub fn parse(data: &[u8], trailer: &crate::trailer::Trailer) -> Result<Vec<Block>> {
    let end = if trailer.meta_index_offset == 0 {
        trailer.offset as u64
    } else {
        trailer.meta_index_offset
    };

    let mut i = trailer.data_index_offset as usize;

    if data.len() < i + 8 {
        return Err(Error::Format("truncated data index".into()));
    }
    if &data[i..i + 8] != INDEX_MAGIC {
        return Err(Error::Format("bad data index magic".into()));
    }
    i += 8;

    let mut index = Vec::with_capacity(trailer.data_index_count as usize);

    while (i as u64) < end {
        if data.len() < i + 12 {
            return Err(Error::Format("truncated data index entry".into()));
        }

        let offset = BigEndian::read_u64(&data[i..]);
        i += 8;
        let size = BigEndian::read_u32(&data[i..]);
        i += 4;

        let (first_key_len, consumed) = vint::decode(&data[i..])?;
        if consumed < 1 || first_key_len < 1 {
            return Err(Error::Format(format!(
                "bad first-key vint (len {first_key_len}, consumed {consumed})"
            )));
        }
        i += consumed;

        let first_key_len = first_key_len as usize;
        if data.len() < i + first_key_len {
            return Err(Error::Format("truncated first key in data index".into()));
        }
        let first_key = Slice::new(&data[i..i + first_key_len]);
        i += first_key_len;

        index.push(Block {
            offset,
            size,
            first_key,
        });
    }

    Ok(index)
}

/// Finds the block that must contain `key` if present, starting the search
/// at block `from` (caller-provided so successive monotone lookups amortize).
///
/// Returns the largest `i >= from` such that `index[i].first_key <= key`,
/// clamped to the last block.
pub fn find_block(index: &[Block], from: usize, key: &[u8]) -> usize {
    let remaining = index.len() - from - 1;

    if remaining == 0 {
        return from;
    }

    if index[from + 1].is_after(key) {
        return from;
    }

    // Binary search the suffix `from+1..` for the first block after `from+1`
    // whose first key is strictly greater than `key`.
    let mut lo = 0usize;
    let mut hi = remaining;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if index[from + mid + 1].is_after(key) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    from + lo
}
