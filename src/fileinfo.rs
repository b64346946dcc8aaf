// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The optional, purely informational FileInfo block.
//!
//! Grounded on `examples/original_source/hfile/reader.go` (`readFileInfo`,
//! `varLenBytes`, `printableValue`), restated in spec.md §4.2.

use crate::error::{Error, Result};
use crate::vint;
use byteorder::{BigEndian, ByteOrder};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;

/// Key to human-readable-value mapping read from the FileInfo block.
///
/// Informational only; nothing in the core reads these values back.
pub type FileInfo = FxHashMap<String, String>;

fn read_var_len_bytes<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let (len, consumed) = vint::decode(&data[*pos..])?;
    if len < 0 {
        return Err(Error::Format("negative length in FileInfo entry".into()));
    }
    *pos += consumed;

    let len = len as usize;
    if data.len() < *pos + len {
        return Err(Error::Format("truncated FileInfo entry".into()));
    }
    let bytes = &data[*pos..*pos + len];
    *pos += len;
    Ok(bytes)
}

/// Renders a FileInfo value as a human-readable string: 4 bytes are a
/// big-endian `u32`, 8 bytes a big-endian `u64`, valid UTF-8 is printed
/// as text, and anything else is hex-encoded.
fn printable_value(bytes: &[u8]) -> String {
    if bytes.len() == 4 {
        BigEndian::read_u32(bytes).to_string()
    } else if bytes.len() == 8 {
        BigEndian::read_u64(bytes).to_string()
    } else if let Ok(s) = std::str::from_utf8(bytes) {
        s.to_string()
    } else {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

/// Parses the FileInfo block, or returns an empty map if the trailer says
/// there isn't one (`file_info_offset == data_index_offset`).
pub fn parse(data: &[u8], trailer: &crate::trailer::Trailer) -> Result<FileInfo> {
    let mut info = FileInfo::default();

    if trailer.file_info_offset == trailer.data_index_offset {
        return Ok(info);
    }

    let mut pos = trailer.file_info_offset as usize;
    if data.len() < pos + 4 {
        return Err(Error::Format("truncated FileInfo entry count".into()));
    }
    let entry_count = BigEndian::read_u32(&data[pos..]);
    pos += 4;

    for _ in 0..entry_count {
        let key = read_var_len_bytes(data, &mut pos)?.to_vec();

        if data.len() < pos + 1 {
            return Err(Error::Format("truncated FileInfo id byte".into()));
        }
        pos += 1; // skip the one-byte "id" field; we don't care about it.

        let value = read_var_len_bytes(data, &mut pos)?;
        info.insert(String::from_utf8_lossy(&key).into_owned(), printable_value(value));
    }

    Ok(info)
}
