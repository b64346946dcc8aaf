// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! HFile v1 trailer parsing.
//!
//! Grounded on `examples/original_source/hfile/reader.go` (`readTrailer`),
//! with field order and widths restated in spec.md §4.2.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Trailing magic of the 60-byte trailer (the double quote and dollar sign
/// are literal bytes, not placeholders).
pub const TRAILER_MAGIC: &[u8; 8] = b"TRABLK\"$";

/// Size in bytes of the trailer, magic included.
pub const TRAILER_SIZE: usize = 60;

/// The compression codec a collection's data blocks were written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    None,
    Snappy,
}

impl CompressionCodec {
    fn from_wire(value: u32) -> Result<Self> {
        match value {
            2 => Ok(Self::None),
            3 => Ok(Self::Snappy),
            other => Err(Error::Format(format!(
                "unknown compression codec id {other}"
            ))),
        }
    }
}

/// Fixed-size footer fields, read from the last 60 bytes of the file.
#[derive(Debug, Clone, Copy)]
pub struct Trailer {
    pub file_info_offset: u64,
    pub data_index_offset: u64,
    pub data_index_count: u32,
    pub meta_index_offset: u64,
    pub meta_index_count: u32,
    pub total_uncompressed_data_bytes: u64,
    pub entry_count: u32,
    pub compression_codec: CompressionCodec,

    /// Offset of the trailer itself within the file (`data.len() - TRAILER_SIZE`).
    pub offset: usize,
}

/// Parses the 4-byte version word at the very end of the file.
///
/// Low 24 bits are the major version, high 8 bits are the minor version;
/// only 1.0 is supported.
pub fn check_version(data: &[u8]) -> Result<()> {
    if data.len() < 4 {
        return Err(Error::Format("file too short to contain a version word".into()));
    }
    let word = BigEndian::read_u32(&data[data.len() - 4..]);
    let major = word & 0x00ff_ffff;
    let minor = word >> 24;
    if major != 1 || minor != 0 {
        return Err(Error::Format(format!("unsupported version: {major}.{minor}")));
    }
    Ok(())
}

/// Parses the trailer out of the last [`TRAILER_SIZE`] bytes of `data`.
pub fn parse(data: &[u8]) -> Result<Trailer> {
    check_version(data)?;

    if data.len() < TRAILER_SIZE {
        return Err(Error::Format("file too short to contain a trailer".into()));
    }

    let offset = data.len() - TRAILER_SIZE;
    let mut cursor = offset;

    let magic = &data[cursor..cursor + 8];
    if magic != TRAILER_MAGIC {
        return Err(Error::Format("bad trailer magic".into()));
    }
    cursor += 8;

    let file_info_offset = BigEndian::read_u64(&data[cursor..]);
    cursor += 8;
    let data_index_offset = BigEndian::read_u64(&data[cursor..]);
    cursor += 8;
    let data_index_count = BigEndian::read_u32(&data[cursor..]);
    cursor += 4;
    let meta_index_offset = BigEndian::read_u64(&data[cursor..]);
    cursor += 8;
    let meta_index_count = BigEndian::read_u32(&data[cursor..]);
    cursor += 4;
    let total_uncompressed_data_bytes = BigEndian::read_u64(&data[cursor..]);
    cursor += 8;
    let entry_count = BigEndian::read_u32(&data[cursor..]);
    cursor += 4;
    let compression_codec_raw = BigEndian::read_u32(&data[cursor..]);

    Ok(Trailer {
        file_info_offset,
        data_index_offset,
        data_index_count,
        meta_index_offset,
        meta_index_count,
        total_uncompressed_data_bytes,
        entry_count,
        compression_codec: CompressionCodec::from_wire(compression_codec_raw)?,
        offset,
    })
}
