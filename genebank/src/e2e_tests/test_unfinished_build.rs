//! Test that trees which were never finalized are rejected.

use crate::config::SearchConfig;
use crate::driver::{DriverError, search_index};
use crate::e2e_tests::helpers::*;
use crate::storage::btree::{BTree, BTreeError};
use crate::storage::{HeaderError, TreeFile};

fn search(dir: &TestDir, tree: &str) -> Result<crate::driver::QuerySummary, DriverError> {
    dir.write("queries", "aaaa\n");
    let config = SearchConfig::from_args(&args(&["0", &dir.arg(tree), &dir.arg("queries"), "1"]))
        .expect("search args");
    search_index(&config)
}

#[test]
fn test_dropped_tree_is_unfinalized() {
    let dir = TestDir::new();
    {
        let file = TreeFile::create(&dir.path("partial.btree")).expect("create");
        let mut tree = BTree::create(file, 2, 0).expect("tree");
        for key in 0..50 {
            tree.insert(key).expect("insert");
        }
        // Dropped without save_metadata
    }

    let result = search(&dir, "partial.btree");
    assert!(matches!(
        result,
        Err(DriverError::Tree(BTreeError::Header(HeaderError::Unfinalized)))
    ));
}

#[test]
fn test_empty_file_is_too_short() {
    let dir = TestDir::new();
    dir.write("empty.btree", "");

    let result = search(&dir, "empty.btree");
    assert!(matches!(
        result,
        Err(DriverError::Tree(BTreeError::Header(HeaderError::TooShort(0))))
    ));
}

#[test]
fn test_garbage_header_is_rejected() {
    let dir = TestDir::new();
    let path = dir.path("garbage.btree");
    let mut bytes = vec![0u8; 12 + 77];
    // Root location not on a record boundary
    bytes[..12].copy_from_slice(&[0, 0, 0, 13, 0, 0, 0, 1, 0, 0, 0, 2]);
    std::fs::write(&path, &bytes).expect("write");

    assert!(matches!(
        search(&dir, "garbage.btree"),
        Err(DriverError::Tree(BTreeError::Header(
            HeaderError::InvalidRootLocation { .. }
        )))
    ));

    // Degree 1
    bytes[..12].copy_from_slice(&[0, 0, 0, 12, 0, 0, 0, 1, 0, 0, 0, 1]);
    std::fs::write(&path, &bytes).expect("write");
    assert!(matches!(
        search(&dir, "garbage.btree"),
        Err(DriverError::Tree(BTreeError::Header(HeaderError::InvalidDegree(1))))
    ));
}

#[test]
fn test_missing_tree_file() {
    let dir = TestDir::new();
    assert!(matches!(
        search(&dir, "nope.btree"),
        Err(DriverError::Storage(_))
    ));
}
