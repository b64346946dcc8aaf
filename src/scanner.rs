// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Forward-only point-lookup cursor over a [`Reader`](crate::reader::Reader).
//!
//! Grounded on `examples/original_source/hfile/scanner.go`, restated in
//! spec.md §4.6. A `Scanner` carries no reference back to its `Reader` (the
//! Go type embeds `reader *Reader`, which a garbage collector tolerates as
//! a cycle; doing the same with `Arc` here would make every `Reader` own a
//! strong cycle through its own cursor pool and never be freed). Instead
//! every operation takes the `Reader` as an explicit argument, matching the
//! "stateless functions over a `Reader`" framing of spec.md §2.

use crate::block;
use crate::error::Result;
use crate::ordered::OrderedOps;
use crate::reader::Reader;
use crate::trailer::CompressionCodec;
use crate::Slice;
use byteorder::{BigEndian, ByteOrder};

/// A reusable point-lookup cursor. See spec.md §4.6.
#[derive(Debug)]
pub struct Scanner {
    idx: usize,
    block_loaded: bool,
    pos: usize,
    scratch: Vec<u8>,
    ordered: OrderedOps,

    /// When off, may be faster but may silently return "not found" rather
    /// than erroring on out-of-order keys.
    pub enforce_key_order: bool,
}

impl Scanner {
    pub(crate) fn new(reader: &Reader) -> Self {
        let scratch = scratch_capacity_hint(reader);
        Self {
            idx: 0,
            block_loaded: false,
            pos: 0,
            scratch: Vec::with_capacity(scratch),
            ordered: OrderedOps::default(),
            enforce_key_order: true,
        }
    }

    /// Resets all cursor state; called before a cursor is returned to its
    /// `Reader`'s pool.
    pub fn reset(&mut self) {
        self.idx = 0;
        self.block_loaded = false;
        self.pos = 0;
        self.ordered.reset();
    }

    fn block_for(&mut self, reader: &Reader, key: &[u8]) -> Result<bool> {
        if self.enforce_key_order {
            self.ordered.check_and_advance(key)?;
        }

        if reader.index()[self.idx].first_key.as_ref() > key {
            log::trace!("scanner: current block is already past key, reporting not-found");
            return Ok(false);
        }

        let new_idx = reader.find_block(self.idx, key);

        if new_idx != self.idx || !self.block_loaded {
            reader.get_block(new_idx, &mut self.scratch)?;
            self.idx = new_idx;
            self.pos = 8;
            self.block_loaded = true;
        } else {
            log::trace!("scanner: reusing current block {}", self.idx);
        }

        Ok(true)
    }

    /// Returns the first value associated with `key`, file order.
    pub fn get_first(&mut self, reader: &Reader, key: &[u8]) -> Result<Option<Slice>> {
        if !self.block_for(reader, key)? {
            return Ok(None);
        }
        let block = block_bytes(reader, self.idx, &self.scratch);
        Ok(walk(block, &mut self.pos, key, true).0)
    }

    /// Returns every value associated with `key`, in file order.
    pub fn get_all(&mut self, reader: &Reader, key: &[u8]) -> Result<Vec<Slice>> {
        if !self.block_for(reader, key)? {
            return Ok(Vec::new());
        }
        let block = block_bytes(reader, self.idx, &self.scratch);
        Ok(walk(block, &mut self.pos, key, false).1)
    }
}

pub(crate) fn scratch_capacity_hint(reader: &Reader) -> usize {
    if reader.trailer().compression_codec == CompressionCodec::None {
        return 0;
    }
    let blocks = reader.index().len().max(1);
    ((reader.trailer().total_uncompressed_data_bytes as f64 / blocks as f64) * 1.5) as usize
}

fn block_bytes<'a>(reader: &'a Reader, idx: usize, scratch: &'a [u8]) -> &'a [u8] {
    let block = &reader.index()[idx];
    match reader.trailer().compression_codec {
        CompressionCodec::None => {
            let start = block.offset as usize;
            &reader.data()[start..start + block.size as usize]
        }
        CompressionCodec::Snappy => &scratch[..block.size as usize],
    }
}

/// Walks records forward from `*pos`, returning the first value (when
/// `first` is set) and/or the full accumulated list.
///
/// Grounded on `Scanner.getValuesFromBuffer`: records are `u32 keyLen, u32
/// valLen, key, value`; the block is sorted, so a strictly-greater key ends
/// the walk.
fn walk(buf: &[u8], pos: &mut usize, key: &[u8], first: bool) -> (Option<Slice>, Vec<Slice>) {
    let mut acc = Vec::new();
    let mut i = *pos;

    while buf.len() > i + 8 {
        let key_len = BigEndian::read_u32(&buf[i..]) as usize;
        let val_len = BigEndian::read_u32(&buf[i + 4..]) as usize;
        let record_key = &buf[i + 8..i + 8 + key_len];

        match record_key.cmp(key) {
            std::cmp::Ordering::Equal => {
                i += 8 + key_len;
                let value = Slice::new(&buf[i..i + val_len]);
                i += val_len;

                if first {
                    *pos = i;
                    return (Some(value), acc);
                }
                acc.push(value);
            }
            std::cmp::Ordering::Greater => {
                *pos = i;
                return (None, acc);
            }
            std::cmp::Ordering::Less => {
                i += 8 + key_len + val_len;
            }
        }
    }

    *pos = i;
    (None, acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionConfig;
    use crate::file::LoadMethod;
    use crate::writer::Writer;
    use test_log::test;

    fn build(pairs: &[(&[u8], &[u8])], compress: bool) -> (tempfile::TempDir, Reader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hfile");
        let mut w = Writer::create(&path, compress, 4096).unwrap();
        for (k, v) in pairs {
            w.write(k, v).unwrap();
        }
        w.close().unwrap();

        let cfg = CollectionConfig::new("t", path.to_str().unwrap(), LoadMethod::OnDisk);
        let reader = Reader::open(cfg).unwrap();
        (dir, reader)
    }

    #[test]
    fn point_lookup_unique_keys() {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u32..2000)
            .map(|i| (i.to_be_bytes().to_vec(), format!("value-{i}").into_bytes()))
            .collect();
        let refs: Vec<(&[u8], &[u8])> = pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
        let (_dir, reader) = build(&refs, false);

        let mut scanner = reader.get_scanner();
        for i in [0u32, 1, 500, 1999] {
            let found = scanner.get_first(&reader, &i.to_be_bytes()).unwrap();
            assert_eq!(found.unwrap().to_vec(), format!("value-{i}").into_bytes());
        }
        assert!(scanner
            .get_first(&reader, &2000u32.to_be_bytes())
            .unwrap()
            .is_none());
    }

    #[test]
    fn get_all_returns_duplicates_in_file_order() {
        let pairs: &[(&[u8], &[u8])] = &[
            (b"a", b"1"),
            (b"b", b"2"),
            (b"b", b"3"),
            (b"b", b"4"),
            (b"c", b"5"),
        ];
        let (_dir, reader) = build(pairs, false);

        let mut scanner = reader.get_scanner();
        let values = scanner.get_all(&reader, b"b").unwrap();
        let values: Vec<Vec<u8>> = values.into_iter().map(|s| s.to_vec()).collect();
        assert_eq!(values, vec![b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]);
    }

    #[test]
    fn out_of_order_errors_when_enforced() {
        let pairs: &[(&[u8], &[u8])] = &[(b"a", b"1"), (b"m", b"2"), (b"z", b"3")];
        let (_dir, reader) = build(pairs, false);

        let mut scanner = reader.get_scanner();
        scanner.get_first(&reader, b"m").unwrap();
        assert!(scanner.get_first(&reader, b"a").is_err());
    }

    #[test]
    fn block_boundaries_are_exact() {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u32..500)
            .map(|i| (i.to_be_bytes().to_vec(), format!("v{i}").into_bytes()))
            .collect();
        let refs: Vec<(&[u8], &[u8])> = pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
        let (_dir, reader) = build(&refs, false);
        assert!(reader.index_len() > 1, "fixture should span multiple blocks");

        let mut scanner = reader.get_scanner();
        for blk in reader.block_descriptors() {
            let first_key = blk.first_key.clone();
            let i = BigEndian::read_u32(&first_key);
            let got = scanner.get_first(&reader, &first_key).unwrap();
            assert_eq!(got.unwrap().to_vec(), format!("v{i}").into_bytes());
        }
    }

    #[test]
    fn compressed_blocks_round_trip() {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u32..2000)
            .map(|i| (i.to_be_bytes().to_vec(), format!("value-{i}").into_bytes()))
            .collect();
        let refs: Vec<(&[u8], &[u8])> = pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
        let (_dir, reader) = build(&refs, true);

        let mut scanner = reader.get_scanner();
        for i in [0u32, 777, 1999] {
            let found = scanner.get_first(&reader, &i.to_be_bytes()).unwrap();
            assert_eq!(found.unwrap().to_vec(), format!("value-{i}").into_bytes());
        }
    }
}
