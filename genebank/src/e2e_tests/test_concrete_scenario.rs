//! Test the three-insert scenario from a degree 2 tree with 3-symbol keys.

use crate::config::{CreateConfig, SearchConfig};
use crate::driver::{build_index, search_index};
use crate::e2e_tests::helpers::*;

#[test]
fn test_duplicate_and_distinct_kmers() {
    for cache in [0, 2, 10] {
        let mut tree = memory_tree(2, cache);
        insert_kmers(&mut tree, &["AAA", "AAT", "AAA"]);

        assert_eq!(frequency(&mut tree, "AAA"), Some(2), "cache {cache}");
        assert_eq!(frequency(&mut tree, "AAT"), Some(1), "cache {cache}");
        assert_eq!(frequency(&mut tree, "GGG"), None, "cache {cache}");
        assert_eq!(tree.entries().expect("entries").len(), 2);
    }
}

#[test]
fn test_scenario_survives_reload() {
    let mut tree = memory_tree(2, 4);
    insert_kmers(&mut tree, &["AAA", "AAT", "AAA"]);
    let storage = tree.save_metadata().expect("save");

    let mut tree = crate::storage::btree::BTree::load_metadata(storage, 0).expect("load");
    assert_eq!(frequency(&mut tree, "aaa"), Some(2));
    assert_eq!(frequency(&mut tree, "aat"), Some(1));
    assert_eq!(frequency(&mut tree, "ggg"), None);
}

#[test]
fn test_scenario_through_sessions() {
    let dir = TestDir::new();
    // Windows of 3: aaa aat ata taa aaa
    dir.write("tiny.gbk", "ORIGIN\n        1 aaataaa\n//\n");
    dir.write("queries", "AAA\nAAT\nGGG\n");

    let create = CreateConfig::from_args(&args(&["0", "2", &dir.arg("tiny.gbk"), "3"]))
        .expect("create args");
    let summary = build_index(&create).expect("build");
    assert_eq!(summary.counts.keys_inserted, 5);
    assert_eq!(summary.degree, 2);

    let search = SearchConfig::from_args(&args(&[
        "0",
        &summary.tree_path.display().to_string(),
        &dir.arg("queries"),
        "1",
    ]))
    .expect("search args");
    let result = search_index(&search).expect("search");

    assert_eq!(result.found, 2);
    assert_eq!(
        std::fs::read_to_string(search.result_path()).expect("result file"),
        "aaa: 2\naat: 1\n"
    );
}
