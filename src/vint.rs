// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Hadoop's variable-length signed integer encoding.
//!
//! Grounded on `examples/original_source/hfile/vint.go` (`vintAndLen`), with
//! the decode table restated in spec.md §4.3. Used for the first-key length
//! prefix in the data-block index and by the FileInfo key/value lengths.

use crate::error::{Error, Result};

/// Decodes a Hadoop vint from the front of `bytes`.
///
/// Returns the decoded value and the number of bytes consumed. Errors if
/// `bytes` is empty or shorter than the length the leading byte implies.
pub fn decode(bytes: &[u8]) -> Result<(i64, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| Error::Format("vint: empty input".into()))?;

    if first < 0x80 {
        return Ok((i64::from(first), 1));
    }

    if first >= 0x90 {
        return Ok((i64::from(first) - 256, 1));
    }

    let negative = first < 0x88;
    let len = if negative {
        (0x88 - first) as usize + 1
    } else {
        (0x90 - first) as usize + 1
    };

    if bytes.len() < len {
        return Err(Error::Format(format!(
            "vint: truncated, need {len} bytes, have {}",
            bytes.len()
        )));
    }

    let mut value: i64 = 0;
    for &b in &bytes[1..len] {
        value = (value << 8) | i64::from(b);
    }

    if negative {
        value ^= -1;
    }

    Ok((value, len))
}

/// Encodes `value` using the Hadoop vint rules, writing the minimal form.
///
/// Grounded on the decode table in spec.md §4.3 run in reverse; the Go tree's
/// own writer (`hfile/writer.go`) instead emits protobuf-style uvarints for
/// small values, which happens to coincide with the Hadoop encoding for
/// values in `0..0x80` but diverges for negative or multi-byte lengths. We
/// follow the Hadoop format throughout, as spec.md §4.3 specifies.
pub fn encode(value: i64) -> Vec<u8> {
    if (0..0x80).contains(&value) {
        return vec![value as u8];
    }

    if (-112..0).contains(&value) {
        return vec![(value + 256) as u8];
    }

    let negative = value < 0;
    let magnitude: u64 = if negative {
        (!value) as u64
    } else {
        value as u64
    };

    let be = magnitude.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 && be[start] == 0 {
        start += 1;
    }
    let payload = &be[start..];
    let len = payload.len() as u8;

    let first = if negative { 0x88 - len } else { 0x90 - len };

    let mut out = Vec::with_capacity(1 + len);
    out.push(first);
    out.extend_from_slice(payload);
    out
}
