// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Stateless query-engine functions binding a [`CollectionSet`] to the four
//! RPC-facing query verbs of spec.md §4.10.
//!
//! Grounded on `examples/original_source/rpc.go` (`ThriftRpcImpl`) and
//! `examples/original_source/collections.go` for `get_values_single` /
//! `get_values_multi` / `get_values_multi_split_keys`'s indexing and
//! found-count conventions, and on `examples/original_source/util/product.go`
//! for the `rev_product` cartesian product `get_values_multi_split_keys`
//! relies on. The Go tree never finished `GetIterator`/`GetInfo` (both are
//! permanent stubs returning `nil, nil` in every variant of `rpc.go` the
//! pack carries); `get_iterator` and `get_info` here are built directly from
//! spec.md §4.10's resume/sampling contract instead.

use crate::collection::CollectionSet;
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::Slice;
use rand::Rng;
use rustc_hash::FxHashMap;

/// Looks up `key` in `reader`'s first value, short-circuiting through the
/// Bloom filter if one is enabled. Shared by [`get_values_single`] and
/// [`get_values_multi`] (spec.md §4.9: "gates point and multi-lookups").
fn first_if_maybe_present(
    scanner: &mut crate::scanner::Scanner,
    reader: &Reader,
    key: &[u8],
) -> Result<Option<Slice>> {
    if !reader.might_contain(key) {
        return Ok(None);
    }
    scanner.get_first(reader, key)
}

fn all_if_maybe_present(
    scanner: &mut crate::scanner::Scanner,
    reader: &Reader,
    key: &[u8],
) -> Result<Vec<Slice>> {
    if !reader.might_contain(key) {
        return Ok(Vec::new());
    }
    scanner.get_all(reader, key)
}

/// Single-value lookup over `sorted_keys`. Grounded on `rpc.go`'s
/// `GetValuesSingle`: `key_count` is the number of input positions that
/// found a value, not the number of distinct keys.
///
/// `sorted_keys[i] == sorted_keys[i-1]` reuses the previous lookup's result
/// without a second scan (spec.md §4.10). `count_only` suppresses building
/// the returned value map but `key_count` is still accurate.
pub fn get_values_single(
    cs: &CollectionSet,
    collection: &str,
    sorted_keys: &[Slice],
    count_only: bool,
) -> Result<(FxHashMap<usize, Slice>, u32)> {
    let reader = cs.reader_for(collection)?;
    let mut scanner = reader.get_scanner();
    scanner.enforce_key_order = false;

    let mut values = FxHashMap::default();
    let mut found = 0u32;
    let mut prev: Option<(Slice, Option<Slice>)> = None;

    for (idx, key) in sorted_keys.iter().enumerate() {
        let value = match &prev {
            Some((prev_key, prev_value)) if prev_key == key => prev_value.clone(),
            _ => first_if_maybe_present(&mut scanner, reader, key)?,
        };

        if let Some(value) = &value {
            found += 1;
            if !count_only {
                values.insert(idx, value.clone());
            }
        }
        prev = Some((key.clone(), value));
    }

    reader.release_scanner(scanner);
    Ok((values, found))
}

/// Multi-value lookup over `sorted_keys`, optionally truncated per key by
/// `per_key_value_limit`. Grounded on `rpc.go`'s `GetValuesMulti`:
/// `key_count` is the total number of returned values across every key, not
/// the number of keys found.
pub fn get_values_multi(
    cs: &CollectionSet,
    collection: &str,
    sorted_keys: &[Slice],
    per_key_value_limit: Option<usize>,
) -> Result<(FxHashMap<usize, Vec<Slice>>, u32)> {
    let reader = cs.reader_for(collection)?;
    let mut scanner = reader.get_scanner();
    scanner.enforce_key_order = false;

    let mut values = FxHashMap::default();
    let mut found = 0u32;
    let mut prev: Option<(Slice, Vec<Slice>)> = None;

    for (idx, key) in sorted_keys.iter().enumerate() {
        let mut all = match &prev {
            Some((prev_key, prev_values)) if prev_key == key => prev_values.clone(),
            _ => all_if_maybe_present(&mut scanner, reader, key)?,
        };

        if let Some(limit) = per_key_value_limit {
            all.truncate(limit);
        }

        if !all.is_empty() {
            found += all.len() as u32;
            values.insert(idx, all.clone());
        }
        prev = Some((key.clone(), all));
    }

    reader.release_scanner(scanner);
    Ok((values, found))
}

/// Thin wrapper over [`crate::iterator::Iterator::all_for_prefixes`]; see
/// spec.md §4.8 for the full limit/resume contract.
pub fn get_values_for_prefixes(
    cs: &CollectionSet,
    collection: &str,
    sorted_prefixes: &[Slice],
    value_limit: i64,
    last_key: Option<&[u8]>,
) -> Result<(FxHashMap<Slice, Vec<Slice>>, Option<Slice>)> {
    let reader = cs.reader_for(collection)?;
    let mut iter = reader.get_iterator();
    let result = iter.all_for_prefixes(reader, sorted_prefixes, value_limit, last_key);
    reader.release_iterator(iter);
    result
}

/// Reverse cartesian product: the rightmost list of `lists` varies fastest.
///
/// Grounded verbatim on `examples/original_source/util/product.go`'s
/// `RevProduct`: recurses on the tail first, then crosses the head over the
/// tail's product, so for `[[A1,A2],[B1,B2,B3]]` the emitted order is
/// `A1B1, A1B2, A1B3, A2B1, A2B2, A2B3` (spec.md §4.10/§9, pinned by §8.E5).
fn rev_product(lists: &[Vec<Slice>]) -> Vec<Vec<Slice>> {
    let Some((head, tail)) = lists.split_first() else {
        return vec![Vec::new()];
    };

    let tail_product = rev_product(tail);
    let mut out = Vec::with_capacity(head.len() * tail_product.len());
    for item in head {
        for rest in &tail_product {
            let mut combo = Vec::with_capacity(1 + rest.len());
            combo.push(item.clone());
            combo.extend(rest.iter().cloned());
            out.push(combo);
        }
    }
    out
}

/// Cartesian-product multi-lookup: `split_key` is a list of lists of byte
/// fragments, concatenated per [`rev_product`]'s ordering into candidate
/// keys, each looked up with [`crate::scanner::Scanner::get_all`]. Only
/// candidates with at least one value are returned (spec.md §4.10 E5).
pub fn get_values_multi_split_keys(
    cs: &CollectionSet,
    collection: &str,
    split_key: &[Vec<Slice>],
) -> Result<FxHashMap<Slice, Vec<Slice>>> {
    let reader = cs.reader_for(collection)?;
    let mut scanner = reader.get_scanner();
    scanner.enforce_key_order = false;

    let mut out = FxHashMap::default();
    for parts in rev_product(split_key) {
        let mut key = Vec::new();
        for part in &parts {
            key.extend_from_slice(part.as_ref());
        }

        let values = all_if_maybe_present(&mut scanner, reader, &key)?;
        if !values.is_empty() {
            out.insert(Slice::new(&key), values);
        }
    }

    reader.release_scanner(scanner);
    Ok(out)
}

/// One record returned by [`get_iterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorItem {
    pub key: Slice,
    pub value: Option<Slice>,
}

/// Bounded, resumable sequential scan. See spec.md §4.10 for the full
/// skip/end-key/resume contract; `response_limit` is required (its absence
/// is spec.md §7's `InputError`), everything else is optional.
#[allow(clippy::too_many_arguments)]
pub fn get_iterator(
    cs: &CollectionSet,
    collection: &str,
    last_key: Option<&[u8]>,
    skip_keys: u32,
    end_key: Option<&[u8]>,
    response_limit: Option<u32>,
    include_values: bool,
) -> Result<(Vec<IteratorItem>, Option<Slice>, u32)> {
    let response_limit =
        response_limit.ok_or_else(|| Error::Input("response_limit is required".into()))?;

    let reader = cs.reader_for(collection)?;
    let mut iter = reader.get_iterator();

    let mut ok = match last_key {
        Some(lk) => iter.seek(reader, lk)?,
        None => iter.next(reader)?,
    };

    // The key we're positioned at before skipping over already-delivered
    // duplicates, so we know whether the run continues past the skip.
    let start_key = if ok { iter.key(reader) } else { None };

    let mut remaining_skip = skip_keys;
    while remaining_skip > 0 && ok {
        ok = iter.next(reader)?;
        remaining_skip -= 1;
    }

    let carry_in = if ok && iter.key(reader) == start_key {
        skip_keys
    } else {
        0
    };

    let mut items = Vec::new();
    let mut last_emitted_key: Option<Slice> = if ok { iter.key(reader) } else { None };
    let mut dup_count = carry_in;

    while ok && items.len() < response_limit as usize {
        let key = iter.key(reader).expect("ok implies a valid record");

        if let Some(end) = end_key {
            if key.as_ref() > end {
                break;
            }
        }

        if last_emitted_key.as_ref() == Some(&key) {
            dup_count += 1;
        } else {
            dup_count = 1;
            last_emitted_key = Some(key.clone());
        }

        let value = include_values.then(|| iter.value(reader).expect("ok implies a valid record"));
        items.push(IteratorItem { key, value });

        ok = iter.next(reader)?;
    }

    reader.release_iterator(iter);

    if items.is_empty() {
        return Ok((items, None, 0));
    }

    Ok((items, last_emitted_key, dup_count))
}

/// Summary of one collection, as returned by [`get_info`].
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub source_path: String,
    pub entry_count: u32,
    pub first_key: Option<Slice>,
    pub sample: Option<Vec<Slice>>,
}

/// `true` if `name` matches `filter`, per spec.md §4.10: a filter containing
/// a `/` is a plain prefix match; a filter without one matches `name` as a
/// whole path segment, so a parent name like `"foo"` matches shards
/// `"foo/0"`, `"foo/1"`, ... without also matching an unrelated `"foobar"`.
fn matches_filter(name: &str, filter: &str) -> bool {
    if filter.contains('/') {
        name.starts_with(filter)
    } else {
        name == filter || name.starts_with(&format!("{filter}/"))
    }
}

/// Draws up to `sample_size` keys from `reader` by Bernoulli sampling with
/// probability `sample_size / entry_count`, walking every key once with a
/// fresh [`crate::iterator::Iterator`].
///
/// Not present in `examples/original_source/` (its `GetInfo` is an
/// unimplemented stub); grounded on spec.md §4.10's "reservoir sample ...
/// drawn by Bernoulli sampling" and built with `rand`, the crate's own
/// runtime (not just dev) dependency for exactly this purpose.
fn reservoir_sample(reader: &Reader, sample_size: usize) -> Result<Vec<Slice>> {
    if sample_size == 0 || reader.entry_count() == 0 {
        return Ok(Vec::new());
    }

    let probability = (sample_size as f64 / f64::from(reader.entry_count())).min(1.0);
    let mut rng = rand::rng();
    let mut sample = Vec::with_capacity(sample_size);

    let mut iter = reader.get_iterator();
    while sample.len() < sample_size && iter.next(reader)? {
        if rng.random_bool(probability) {
            if let Some(key) = iter.key(reader) {
                sample.push(key);
            }
        }
    }
    reader.release_iterator(iter);

    Ok(sample)
}

/// Lists collections whose name matches `name_filter` (all of them, if
/// `None`), optionally attaching a random key sample to each.
pub fn get_info(
    cs: &CollectionSet,
    name_filter: Option<&str>,
    sample_size: Option<usize>,
) -> Result<Vec<CollectionInfo>> {
    let mut out = Vec::new();

    for (name, reader) in cs.iter() {
        if let Some(filter) = name_filter {
            if !matches_filter(name, filter) {
                continue;
            }
        }

        let sample = match sample_size {
            Some(n) if n > 0 => Some(reservoir_sample(reader, n)?),
            _ => None,
        };

        out.push(CollectionInfo {
            name: name.to_string(),
            source_path: reader.config().source_path.clone(),
            entry_count: reader.entry_count(),
            first_key: reader.first_key().ok(),
            sample,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::LoadMethod;
    use crate::writer::Writer;
    use test_log::test;

    fn build_set(n: u32) -> (tempfile::TempDir, CollectionSet) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hfile");
        let mut w = Writer::create(&path, false, 4096).unwrap();
        for i in 0..n {
            w.write(&i.to_be_bytes(), format!("value-for-{i}").as_bytes())
                .unwrap();
        }
        w.close().unwrap();

        let cfg = crate::collection::CollectionConfig::new("t", path.to_str().unwrap(), LoadMethod::OnDisk);
        let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap()).unwrap();
        (dir, set)
    }

    #[test]
    fn single_lookup_counts_found_and_reuses_duplicates() {
        let (_dir, set) = build_set(1000);
        let keys = vec![
            Slice::from(1u32.to_be_bytes()),
            Slice::from(1u32.to_be_bytes()),
            Slice::from(999_999u32.to_be_bytes()),
            Slice::from(500u32.to_be_bytes()),
        ];
        let (values, found) = get_values_single(&set, "t", &keys, false).unwrap();
        assert_eq!(found, 2);
        assert_eq!(values.get(&0).unwrap().to_vec(), b"value-for-1".to_vec());
        assert_eq!(values.get(&1).unwrap().to_vec(), b"value-for-1".to_vec());
        assert!(values.get(&2).is_none());
        assert_eq!(values.get(&3).unwrap().to_vec(), b"value-for-500".to_vec());
    }

    #[test]
    fn single_lookup_count_only_omits_values() {
        let (_dir, set) = build_set(1000);
        let keys = vec![Slice::from(1u32.to_be_bytes())];
        let (values, found) = get_values_single(&set, "t", &keys, true).unwrap();
        assert_eq!(found, 1);
        assert!(values.is_empty());
    }

    #[test]
    fn multi_lookup_sums_value_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.hfile");
        let mut w = Writer::create(&path, false, 4096).unwrap();
        w.write(b"a", b"1").unwrap();
        w.write(b"b", b"2").unwrap();
        w.write(b"b", b"3").unwrap();
        w.write(b"c", b"4").unwrap();
        w.close().unwrap();

        let cfg = crate::collection::CollectionConfig::new("multi", path.to_str().unwrap(), LoadMethod::OnDisk);
        let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap()).unwrap();

        let keys = vec![Slice::from("a"), Slice::from("b"), Slice::from("missing")];
        let (values, found) = get_values_multi(&set, "multi", &keys, None).unwrap();
        assert_eq!(found, 3);
        assert_eq!(values.get(&1).unwrap().len(), 2);
        assert!(values.get(&2).is_none());
    }

    #[test]
    fn multi_lookup_respects_per_key_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.hfile");
        let mut w = Writer::create(&path, false, 4096).unwrap();
        for v in [b"1", b"2", b"3"] {
            w.write(b"a", v).unwrap();
        }
        w.close().unwrap();

        let cfg = crate::collection::CollectionConfig::new("multi", path.to_str().unwrap(), LoadMethod::OnDisk);
        let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap()).unwrap();

        let keys = vec![Slice::from("a")];
        let (values, found) = get_values_multi(&set, "multi", &keys, Some(2)).unwrap();
        assert_eq!(found, 2);
        assert_eq!(values.get(&0).unwrap().len(), 2);
    }

    #[test]
    fn rev_product_matches_spec_example() {
        let a = vec![Slice::from("A1"), Slice::from("A2")];
        let b = vec![Slice::from("B1"), Slice::from("B2"), Slice::from("B3")];
        let combos = rev_product(&[a, b]);
        let joined: Vec<String> = combos
            .iter()
            .map(|c| c.iter().map(|s| String::from_utf8(s.to_vec()).unwrap()).collect::<String>())
            .collect();
        assert_eq!(joined, vec!["A1B1", "A1B2", "A1B3", "A2B1", "A2B2", "A2B3"]);
    }

    #[test]
    fn split_keys_only_returns_nonempty_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.hfile");
        let mut w = Writer::create(&path, false, 4096).unwrap();
        w.write(b"A1B1", b"v1").unwrap();
        w.write(b"A1B3", b"v2").unwrap();
        w.write(b"A2B2", b"v3").unwrap();
        w.close().unwrap();

        let cfg = crate::collection::CollectionConfig::new("split", path.to_str().unwrap(), LoadMethod::OnDisk);
        let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap()).unwrap();

        let split_key = vec![
            vec![Slice::from("A1"), Slice::from("A2")],
            vec![Slice::from("B1"), Slice::from("B2"), Slice::from("B3")],
        ];
        let found = get_values_multi_split_keys(&set, "split", &split_key).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.contains_key(&Slice::from("A1B1")));
        assert!(found.contains_key(&Slice::from("A1B3")));
        assert!(found.contains_key(&Slice::from("A2B2")));
        assert!(!found.contains_key(&Slice::from("A1B2")));
    }

    #[test]
    fn iterator_resume_e4() {
        let (_dir, set) = build_set(20);

        let (items, next_last_key, skip_keys) =
            get_iterator(&set, "t", None, 0, None, Some(5), true).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].key.to_vec(), 0u32.to_be_bytes().to_vec());
        assert_eq!(items[4].key.to_vec(), 4u32.to_be_bytes().to_vec());
        assert_eq!(next_last_key.clone().unwrap().to_vec(), 4u32.to_be_bytes().to_vec());
        assert_eq!(skip_keys, 1);

        let (items, _next, _skip) = get_iterator(
            &set,
            "t",
            Some(next_last_key.unwrap().as_ref()),
            skip_keys,
            None,
            Some(5),
            true,
        )
        .unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].key.to_vec(), 5u32.to_be_bytes().to_vec());
        assert_eq!(items[4].key.to_vec(), 9u32.to_be_bytes().to_vec());
    }

    #[test]
    fn iterator_stops_at_end_key() {
        let (_dir, set) = build_set(100);
        let end = 10u32.to_be_bytes();
        let (items, next_last_key, _skip) =
            get_iterator(&set, "t", None, 0, Some(&end), Some(1000), true).unwrap();
        assert_eq!(items.len(), 11); // 0..=10
        assert_eq!(items.last().unwrap().key.to_vec(), end.to_vec());
        assert_eq!(next_last_key.unwrap().to_vec(), end.to_vec());
    }

    #[test]
    fn iterator_requires_response_limit() {
        let (_dir, set) = build_set(10);
        assert!(matches!(
            get_iterator(&set, "t", None, 0, None, None, true),
            Err(Error::Input(_))
        ));
    }

    #[test]
    fn iterator_excludes_values_when_not_requested() {
        let (_dir, set) = build_set(10);
        let (items, _, _) = get_iterator(&set, "t", None, 0, None, Some(3), false).unwrap();
        assert!(items.iter().all(|i| i.value.is_none()));
    }

    #[test]
    fn info_filters_by_name_and_samples_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cfgs = ["parent/0", "parent/1", "parentbar", "other"].map(|name| {
            let path = dir.path().join(format!("{}.hfile", name.replace('/', "_")));
            let mut w = Writer::create(&path, false, 4096).unwrap();
            for i in 0u32..100 {
                w.write(&i.to_be_bytes(), b"v").unwrap();
            }
            w.close().unwrap();
            crate::collection::CollectionConfig::new(name, path.to_str().unwrap(), LoadMethod::OnDisk)
        });
        let set = CollectionSet::load(cfgs.to_vec(), dir.path().to_str().unwrap()).unwrap();

        let all = get_info(&set, None, None).unwrap();
        assert_eq!(all.len(), 4);

        // "parent" must match its shards ("parent/0", "parent/1") and an exact
        // "parent" collection, but not an unrelated sibling like "parentbar"
        // that merely shares the literal prefix.
        let parent_only = get_info(&set, Some("parent"), None).unwrap();
        assert_eq!(parent_only.len(), 2);
        assert!(parent_only.iter().all(|c| c.name.starts_with("parent/")));

        let sampled = get_info(&set, Some("other"), Some(10)).unwrap();
        assert_eq!(sampled.len(), 1);
        assert!(sampled[0].sample.as_ref().unwrap().len() <= 10);
        assert_eq!(sampled[0].entry_count, 100);
        assert!(sampled[0].first_key.is_some());
    }
}
