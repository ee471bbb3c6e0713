//! End-to-end tests of the B+Tree index: bulk load, inserts, scans and
//! persistence through the public API.

use std::fs;

use secidx::index::btree::LEAF_CAPACITY;
use secidx::{BTreeIndex, Datatype, Error, IndexConfig, Operator, RecordId};
use tempfile::{tempdir, TempDir};

/// Records whose key sits after a 4-byte prefix; record `i` has key `keys[i]`
/// and lives at relation page `i + 1`.
fn relation(keys: &[i32]) -> std::vec::IntoIter<(RecordId, Vec<u8>)> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| {
            let mut record = vec![0xA5u8; 4];
            record.extend_from_slice(&k.to_le_bytes());
            record.extend_from_slice(b"payload");
            (RecordId::new(i as u32 + 1, (i % 13) as u16), record)
        })
        .collect::<Vec<_>>()
        .into_iter()
}

fn build(keys: &[i32], config: IndexConfig) -> (TempDir, BTreeIndex) {
    let dir = tempdir().unwrap();
    let index =
        BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(keys), config).unwrap();
    (dir, index)
}

fn small() -> IndexConfig {
    IndexConfig::default()
        .with_leaf_capacity(4)
        .with_internal_capacity(4)
        .with_pool_size(6)
}

/// Keys of the records a scan returned, recovered from their record ids.
fn keys_of(keys: &[i32], rids: &[RecordId]) -> Vec<i32> {
    rids.iter().map(|r| keys[r.page_number as usize - 1]).collect()
}

#[test]
fn test_five_key_scans() {
    let keys = [1, 5, 7, 10, 12];
    let (_dir, mut index) = build(&keys, IndexConfig::default());

    let rids = index.scan_range(5, Operator::Gte, 10, Operator::Lte).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![5, 7, 10]);

    let rids = index.scan_range(5, Operator::Gt, 10, Operator::Lt).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![7]);

    assert!(matches!(
        index.start_scan(20, Operator::Gte, 30, Operator::Lte),
        Err(Error::NoSuchKeyFound)
    ));
    assert_eq!(index.pinned_page_count(), 0);
}

#[test]
fn test_bad_range_touches_no_page() {
    let keys: Vec<i32> = (0..500).collect();
    let (_dir, mut index) = build(&keys, small());
    let before = index.buffer_stats();

    assert!(matches!(
        index.start_scan(10, Operator::Gte, 5, Operator::Lte),
        Err(Error::BadScanRange { low: 10, high: 5 })
    ));
    assert!(matches!(
        index.start_scan(5, Operator::Lte, 10, Operator::Lte),
        Err(Error::BadOpcodes)
    ));

    assert_eq!(index.buffer_stats().fetches(), before.fetches());
}

#[test]
fn test_scan_next_before_start() {
    let (_dir, mut index) = build(&[3, 1, 2], IndexConfig::default());

    assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
    assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));
}

#[test]
fn test_manual_scan_protocol() {
    let keys: Vec<i32> = (0..100).rev().collect();
    let (_dir, mut index) = build(&keys, small());

    index.start_scan(40, Operator::Gte, 44, Operator::Lte).unwrap();
    let mut seen = vec![];
    loop {
        match index.scan_next() {
            Ok(rid) => seen.push(rid),
            Err(Error::IndexScanCompleted) => break,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(keys_of(&keys, &seen), vec![40, 41, 42, 43, 44]);
    assert!(!index.is_scan_active());
    assert_eq!(index.pinned_page_count(), 0);
}

#[test]
fn test_root_leaf_split_partitions_keys() {
    let capacity = 8;
    let keys: Vec<i32> = (0..=capacity as i32).map(|k| k * 3).collect();
    let config = IndexConfig::default().with_leaf_capacity(capacity);
    let (_dir, index) = build(&keys, config);

    assert_eq!(index.height().unwrap(), 2);
    let chain = index.leaf_chain().unwrap();
    assert_eq!(chain.len(), 2);
    assert!(chain[0].last().unwrap() < chain[1].first().unwrap());
    assert_eq!(chain.concat(), keys);
}

#[test]
fn test_leaves_stay_half_full() {
    let capacity = 6;
    let n = 200;
    let keys: Vec<i32> = (0..n).map(|i| (i * 7919) % 1009).collect();
    let config = IndexConfig::default()
        .with_leaf_capacity(capacity)
        .with_internal_capacity(5);
    let (_dir, index) = build(&keys, config);

    let chain = index.leaf_chain().unwrap();
    assert!(chain.len() >= (n as usize).div_ceil(capacity));

    let min_fill = capacity.div_ceil(2);
    for leaf in &chain[..chain.len() - 1] {
        assert!(leaf.len() >= min_fill, "leaf {:?} under half full", leaf);
        assert!(leaf.len() <= capacity);
    }

    let flattened = chain.concat();
    assert!(flattened.windows(2).all(|w| w[0] <= w[1]));
    let mut expected = keys.clone();
    expected.sort_unstable();
    assert_eq!(flattened, expected);
}

#[test]
fn test_default_capacity_splits() {
    let keys: Vec<i32> = (0..(LEAF_CAPACITY as i32 * 3)).collect();
    let (_dir, mut index) = build(&keys, IndexConfig::default());

    assert_eq!(index.height().unwrap(), 2);
    let rids = index
        .scan_range(i32::MIN, Operator::Gte, i32::MAX, Operator::Lte)
        .unwrap();
    assert_eq!(rids.len(), keys.len());
}

#[test]
fn test_inserts_after_bulk_load() {
    let keys: Vec<i32> = (0..50).map(|k| k * 2).collect();
    let (_dir, mut index) = build(&keys, small());

    for k in (0..50).map(|k| k * 2 + 1) {
        index.insert_entry(k, RecordId::new(10_000 + k as u32, 0)).unwrap();
    }

    let rids = index.scan_range(10, Operator::Gt, 20, Operator::Lt).unwrap();
    assert_eq!(rids.len(), 9);
    assert_eq!(index.leaf_chain().unwrap().concat(), (0..100).collect::<Vec<_>>());
    assert_eq!(index.pinned_page_count(), 0);
}

#[test]
fn test_negative_and_extreme_keys() {
    let keys = [i32::MIN, -5, 0, 5, i32::MAX];
    let (_dir, mut index) = build(&keys, small());

    let rids = index.scan_range(i32::MIN, Operator::Gt, 0, Operator::Lte).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![-5, 0]);

    let rids = index.scan_range(5, Operator::Gte, i32::MAX, Operator::Lte).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![5, i32::MAX]);
}

#[test]
fn test_duplicates_all_returned() {
    let keys = [4, 4, 4, 4, 4, 4, 4, 4, 4, 1, 9];
    let (_dir, mut index) = build(&keys, small());

    let rids = index.lookup(4).unwrap();
    assert_eq!(rids.len(), 9);
    let rids = index.scan_range(4, Operator::Gt, 9, Operator::Lte).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![9]);
}

#[test]
fn test_reopen_preserves_contents() {
    let dir = tempdir().unwrap();
    let keys: Vec<i32> = (0..300).map(|k| 1000 - k).collect();

    let chain = {
        let mut index =
            BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&keys), small())
                .unwrap();
        index.insert_entry(5000, RecordId::new(9999, 1)).unwrap();
        let chain = index.leaf_chain().unwrap();
        index.close().unwrap();
        chain
    };
    assert!(dir.path().join("relA.4").is_file());

    // The relation is not read again when the index already exists.
    let mut index =
        BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[]), small()).unwrap();
    assert_eq!(index.leaf_chain().unwrap(), chain);
    assert_eq!(index.lookup(5000).unwrap(), vec![RecordId::new(9999, 1)]);
}

#[test]
fn test_drop_with_active_scan_flushes() {
    let dir = tempdir().unwrap();
    {
        let mut index =
            BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[1, 2, 3]), small())
                .unwrap();
        index.insert_entry(4, RecordId::new(77, 0)).unwrap();
        index.start_scan(1, Operator::Gte, 4, Operator::Lte).unwrap();
    }

    let index =
        BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[]), small()).unwrap();
    assert_eq!(index.leaf_chain().unwrap().concat(), vec![1, 2, 3, 4]);
}

#[test]
fn test_mismatched_header_is_bad_index_info() {
    let dir = tempdir().unwrap();
    BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[1]), small())
        .unwrap()
        .close()
        .unwrap();

    // An index file whose header names a different relation.
    fs::copy(dir.path().join("relA.4"), dir.path().join("relB.4")).unwrap();
    let err = BTreeIndex::open(dir.path(), "relB", 4, Datatype::Integer, relation(&[]), small())
        .unwrap_err();
    assert!(matches!(err, Error::BadIndexInfo(_)));

    // One whose header records a different attribute offset.
    fs::copy(dir.path().join("relA.4"), dir.path().join("relA.8")).unwrap();
    let err = BTreeIndex::open(dir.path(), "relA", 8, Datatype::Integer, relation(&[]), small())
        .unwrap_err();
    assert!(matches!(err, Error::BadIndexInfo(_)));
}

#[test]
fn test_corrupted_file_is_structural_error() {
    let dir = tempdir().unwrap();
    BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[1, 2]), small())
        .unwrap()
        .close()
        .unwrap();

    // Flip a byte inside the root leaf (page 1).
    let path = dir.path().join("relA.4");
    let mut bytes = fs::read(&path).unwrap();
    bytes[secidx::PAGE_SIZE + 20] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let mut index =
        BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[]), small()).unwrap();
    let err = index
        .start_scan(0, Operator::Gte, 10, Operator::Lte)
        .unwrap_err();
    assert!(err.is_structural());
    assert_eq!(index.pinned_page_count(), 0);
}

#[test]
fn test_tiny_pool_forces_eviction() {
    let keys: Vec<i32> = (0..2000).map(|k| (k * 37) % 2000).collect();
    let config = IndexConfig::default()
        .with_leaf_capacity(3)
        .with_internal_capacity(2)
        .with_pool_size(4);
    let (_dir, mut index) = build(&keys, config);

    assert!(index.buffer_stats().evictions > 0);
    let rids = index.scan_range(100, Operator::Gte, 199, Operator::Lte).unwrap();
    let mut found = keys_of(&keys, &rids);
    found.sort_unstable();
    assert_eq!(found, (100..200).collect::<Vec<_>>());
    assert_eq!(index.pinned_page_count(), 0);
}

#[test]
fn test_invalid_record_id_rejected() {
    let (_dir, mut index) = build(&[1], small());
    assert!(matches!(
        index.insert_entry(2, RecordId::UNUSED),
        Err(Error::InvalidRecordId(_))
    ));
}

#[test]
fn test_failed_build_is_rebuilt_on_next_open() {
    let dir = tempdir().unwrap();
    let mut records: Vec<_> = relation(&(0..40).collect::<Vec<_>>()).collect();
    // Too short to hold a key at offset 4.
    records.push((RecordId::new(500, 0), vec![0u8; 6]));

    let err = BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, records.into_iter(), small())
        .unwrap_err();
    assert!(matches!(err, Error::RecordTooShort { offset: 4, .. }));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    let keys = [9, 3, 6];
    let mut index =
        BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&keys), small()).unwrap();
    assert_eq!(index.leaf_chain().unwrap(), vec![vec![3, 6, 9]]);
    let rids = index.scan_range(0, Operator::Gte, 100, Operator::Lte).unwrap();
    assert_eq!(keys_of(&keys, &rids), vec![3, 6, 9]);
}

#[test]
fn test_empty_index_file_is_structural_error() {
    let dir = tempdir().unwrap();
    fs::File::create(dir.path().join("relA.4")).unwrap();

    let err = BTreeIndex::open(dir.path(), "relA", 4, Datatype::Integer, relation(&[1]), small())
        .unwrap_err();
    assert!(err.is_structural(), "{:?}", err);
}
