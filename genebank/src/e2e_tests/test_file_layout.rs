//! Test the byte layout of finalized tree files.

use crate::config::CreateConfig;
use crate::driver::build_index;
use crate::e2e_tests::helpers::*;
use crate::storage::TreeFile;
use crate::storage::btree::BTree;

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(bytes[offset..offset + 8].try_into().expect("8 bytes"))
}

#[test]
fn test_single_leaf_file() {
    let dir = TestDir::new();
    let path = dir.path("leaf.btree");

    let file = TreeFile::create(&path).expect("create");
    let mut tree = BTree::create(file, 2, 0).expect("tree");
    insert_kmers(&mut tree, &["AAT", "AAA", "AAT"]);
    tree.save_metadata().expect("save");

    let bytes = std::fs::read(&path).expect("read");
    assert_eq!(bytes.len(), 12 + 77);
    assert_eq!(&bytes[..12], &[0, 0, 0, 12, 0, 0, 0, 1, 0, 0, 0, 2]);

    let record = &bytes[12..];
    assert_eq!(record[0], 1, "leaf flag");
    assert_eq!(u32_at(record, 1), 2, "key count");
    assert_eq!(u32_at(record, 5), 12, "own location");

    // aaa, seen once
    assert_eq!(u64_at(record, 9), 0);
    assert_eq!(u32_at(record, 17), 1);
    assert_eq!(u32_at(record, 21), 1);
    // aat, seen twice
    assert_eq!(u64_at(record, 25), 0b11);
    assert_eq!(u32_at(record, 33), 2);
    assert_eq!(u32_at(record, 37), 1);

    // Three null children, a null parent, then padding
    assert!(record[41..].iter().all(|&b| b == 0));
}

#[test]
fn test_internal_records_point_at_children() {
    let dir = TestDir::new();
    let path = dir.path("split.btree");

    let file = TreeFile::create(&path).expect("create");
    let mut tree = BTree::create(file, 2, 3).expect("tree");
    insert_kmers(&mut tree, &["AAA", "AAC", "AAG", "AAT"]);
    tree.save_metadata().expect("save");

    let bytes = std::fs::read(&path).expect("read");
    assert_eq!(bytes.len(), 12 + 3 * 77);
    assert_eq!(u32_at(&bytes, 0), 12 + 77, "root location");
    assert_eq!(u32_at(&bytes, 4), 3, "node count");

    let root = &bytes[12 + 77..12 + 2 * 77];
    assert_eq!(root[0], 0, "internal");
    assert_eq!(u32_at(root, 1), 1);
    assert_eq!(u64_at(root, 9), 1, "median aac");
    assert_eq!(u32_at(root, 25), 12);
    assert_eq!(u32_at(root, 29), 12 + 2 * 77);

    for child in [12, 12 + 2 * 77] {
        let record = &bytes[child..child + 77];
        assert_eq!(record[0], 1);
        assert_eq!(u32_at(record, 5), u32::try_from(child).expect("offset"));
    }
}

#[test]
fn test_auto_degree_fills_a_page() {
    let dir = TestDir::new();
    dir.write("empty.gbk", "LOCUS       EMPTY\n//\n");

    let create = CreateConfig::from_args(&args(&["0", "0", &dir.arg("empty.gbk"), "5"]))
        .expect("create args");
    let summary = build_index(&create).expect("build");
    assert_eq!(summary.degree, 102);
    assert_eq!(summary.counts.sequences, 0);

    let bytes = std::fs::read(&summary.tree_path).expect("read");
    assert_eq!(bytes.len(), 12 + 4077);
    assert_eq!(&bytes[..12], &[0, 0, 0, 12, 0, 0, 0, 1, 0, 0, 0, 102]);
}

#[test]
fn test_output_file_names() {
    let dir = TestDir::new();
    dir.write("seq.gbk", SAMPLE_GBK);

    let create = CreateConfig::from_args(&args(&["1", "3", &dir.arg("seq.gbk"), "4", "8", "1"]))
        .expect("create args");
    let summary = build_index(&create).expect("build");

    assert_eq!(summary.tree_path, dir.path("seq.gbk.btree.data.4.3"));
    assert!(summary.tree_path.exists());
    assert_eq!(summary.dump_path, Some(dir.path("seq.gbk.btree.dump.4")));
    assert!(!dir.read("seq.gbk.btree.dump.4").is_empty());
}
