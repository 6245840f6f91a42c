//! Test reopening a finalized tree and inserting into it.

use crate::config::{CreateConfig, SearchConfig};
use crate::driver::{build_index, index_sequences, search_index};
use crate::e2e_tests::helpers::*;
use crate::simulation::TreeInvariantChecker;
use crate::storage::TreeFile;
use crate::storage::btree::BTree;

#[test]
fn test_extend_built_index() {
    let dir = TestDir::new();
    dir.write("seq.gbk", SAMPLE_GBK);
    let create = CreateConfig::from_args(&args(&["1", "2", &dir.arg("seq.gbk"), "4", "5"]))
        .expect("create args");
    let built = build_index(&create).expect("build");

    {
        let file = TreeFile::open(&built.tree_path).expect("open");
        let mut tree = BTree::load_metadata(file, 5).expect("load");
        assert_eq!(tree.node_count(), built.node_count);
        assert_eq!(frequency(&mut tree, "aaat"), Some(4));

        let counts = index_sequences(&mut tree, "ORIGIN\n 1 aaatcccc\n//\n".as_bytes(), 4)
            .expect("index");
        assert_eq!(counts.keys_inserted, 5);
        assert!(tree.node_count() >= built.node_count);

        let checker = TreeInvariantChecker::check(&mut tree).expect("check");
        assert!(!checker.has_violations(), "{:?}", checker.violations());
        tree.save_metadata().expect("save");
    }

    dir.write("queries", "aaat\ncccc\natcc\n");
    let search = SearchConfig::from_args(&args(&[
        "0",
        &built.tree_path.display().to_string(),
        &dir.arg("queries"),
        "1",
    ]))
    .expect("search args");
    let summary = search_index(&search).expect("search");

    assert_eq!(summary.found, 3);
    assert_eq!(
        std::fs::read_to_string(search.result_path()).expect("result"),
        "aaat: 5\ncccc: 1\natcc: 1\n"
    );
}

#[test]
fn test_reopen_many_times() {
    let dir = TestDir::new();
    let path = dir.path("grow.btree");
    let file = TreeFile::create(&path).expect("create");
    BTree::create(file, 3, 0)
        .expect("tree")
        .save_metadata()
        .expect("save");

    let mut expected = std::collections::BTreeMap::new();
    for round in 0..10u64 {
        let file = TreeFile::open(&path).expect("open");
        let mut tree = BTree::load_metadata(file, 4).expect("load");
        for i in 0..30 {
            let key = (round * 7 + i * 13) % 97;
            tree.insert(key).expect("insert");
            *expected.entry(key).or_insert(0u32) += 1;
        }
        tree.save_metadata().expect("save");
    }

    let file = TreeFile::open_read_only(&path).expect("open");
    let mut tree = BTree::load_metadata(file, 0).expect("load");
    let entries: Vec<(u64, u32)> = tree
        .entries()
        .expect("entries")
        .iter()
        .map(|e| (e.key, e.frequency))
        .collect();
    let expected: Vec<(u64, u32)> = expected.into_iter().collect();
    assert_eq!(entries, expected);

    let checker = TreeInvariantChecker::check(&mut tree).expect("check");
    assert!(!checker.has_violations(), "{:?}", checker.violations());
}
