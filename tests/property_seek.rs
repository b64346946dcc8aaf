//! spec.md §8 "Seek idempotence" and "Monotone seek" properties.

mod common;

use common::{build_reader, e1_fixture};
use test_log::test;

#[test]
fn seek_is_idempotent() {
    let (_dir, reader) = build_reader(&e1_fixture(10_000), false, 4096);

    let mut it = reader.get_iterator();
    assert!(it.seek(&reader, &1234u32.to_be_bytes()).unwrap());
    let once = it.key(&reader).unwrap();

    assert!(it.seek(&reader, &1234u32.to_be_bytes()).unwrap());
    let twice = it.key(&reader).unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.to_vec(), 1234u32.to_be_bytes().to_vec());
}

#[test]
fn seek_is_monotone() {
    let (_dir, reader) = build_reader(&e1_fixture(10_000), false, 4096);

    let mut it = reader.get_iterator();
    assert!(it.seek(&reader, &100u32.to_be_bytes()).unwrap());
    assert!(it.seek(&reader, &9000u32.to_be_bytes()).unwrap());
    assert_eq!(it.key(&reader).unwrap().to_vec(), 9000u32.to_be_bytes().to_vec());
}

#[test]
fn seek_to_a_gap_lands_on_the_next_present_key() {
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u32..10_000)
        .filter(|i| i % 2 == 0)
        .map(|i| (i.to_be_bytes().to_vec(), format!("v{i}").into_bytes()))
        .collect();
    let (_dir, reader) = build_reader(&pairs, false, 4096);

    let mut it = reader.get_iterator();
    // 4001 is absent (odd); the first present key >= 4001 is 4002.
    assert!(it.seek(&reader, &4001u32.to_be_bytes()).unwrap());
    assert_eq!(it.key(&reader).unwrap().to_vec(), 4002u32.to_be_bytes().to_vec());
}
