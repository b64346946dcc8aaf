use quiver::test_support::Writer;
use quiver::{CollectionConfig, CollectionSet, LoadMethod, Reader};

/// Builds a single-collection fixture from `pairs` (already in sorted key
/// order) and opens a `Reader` over it.
pub fn build_reader(pairs: &[(Vec<u8>, Vec<u8>)], compress: bool, block_size: usize) -> (tempfile::TempDir, Reader) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.hfile");

    let mut w = Writer::create(&path, compress, block_size).unwrap();
    for (k, v) in pairs {
        w.write(k, v).unwrap();
    }
    w.close().unwrap();

    let cfg = CollectionConfig::new("fixture", path.to_str().unwrap(), LoadMethod::OnDisk);
    (dir, Reader::open(cfg).unwrap())
}

/// Same as [`build_reader`] but wrapped in a `CollectionSet` under `name`,
/// for exercising the query-engine entry points that take a collection name.
pub fn build_set(name: &str, pairs: &[(Vec<u8>, Vec<u8>)], compress: bool, block_size: usize) -> (tempfile::TempDir, CollectionSet) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.hfile");

    let mut w = Writer::create(&path, compress, block_size).unwrap();
    for (k, v) in pairs {
        w.write(k, v).unwrap();
    }
    w.close().unwrap();

    let cfg = CollectionConfig::new(name, path.to_str().unwrap(), LoadMethod::OnDisk);
    let set = CollectionSet::load(vec![cfg], dir.path().to_str().unwrap()).unwrap();
    (dir, set)
}

/// The `(key, value)` stream of spec.md §8's E1 fixture: `u32_be(i) -> "value-for-"+i`.
pub fn e1_fixture(n: u32) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| (i.to_be_bytes().to_vec(), format!("value-for-{i}").into_bytes()))
        .collect()
}
