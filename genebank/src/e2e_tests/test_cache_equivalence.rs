//! Test that the node cache never changes what ends up on disk.

use crate::config::CreateConfig;
use crate::driver::build_index;
use crate::e2e_tests::helpers::*;
use crate::storage::btree::BTree;

#[test]
fn test_tree_files_identical_across_cache_sizes() {
    let gbk_text = generate_gbk(23, 4_000);
    let mut files = Vec::new();

    for cache_args in [&["0"][..], &["1", "2"][..], &["1", "7"][..], &["1", "500"][..]] {
        let dir = TestDir::new();
        let gbk = dir.arg("gen.gbk");
        dir.write("gen.gbk", &gbk_text);

        let mut list = vec![cache_args[0], "3", gbk.as_str(), "7"];
        list.extend_from_slice(&cache_args[1..]);
        let config = CreateConfig::from_args(&args(&list)).expect("args");
        let summary = build_index(&config).expect("build");

        let bytes = std::fs::read(&summary.tree_path).expect("read tree");
        files.push((config.cache_capacity, summary.cache, bytes));
    }

    let (_, _, expected) = &files[0];
    for (capacity, stats, bytes) in &files[1..] {
        assert!(bytes == expected, "tree file differs with cache {capacity}");
        assert!(stats.hits > 0, "cache {capacity} never hit");
    }
}

#[test]
fn test_interleaved_searches_agree() {
    let mut uncached = memory_tree(2, 0);
    let mut cached = memory_tree(2, 3);
    let kmers = ["ACGT", "TTTT", "ACGT", "GGGA", "CCCA", "ACGA", "TTTT", "AAAC"];

    for (i, kmer) in kmers.iter().cycle().take(200).enumerate() {
        let k = key(kmer) ^ (i as u64 % 13);
        uncached.insert(k).expect("insert");
        cached.insert(k).expect("insert");

        let probe = key(kmers[i % kmers.len()]);
        assert_eq!(
            uncached.search(probe).expect("search"),
            cached.search(probe).expect("search"),
            "after insert {i}"
        );
    }

    assert_eq!(
        uncached.entries().expect("entries"),
        cached.entries().expect("entries")
    );

    let cached = cached.save_metadata().expect("save");
    let mut reloaded = BTree::load_metadata(cached, 0).expect("load");
    assert_eq!(
        reloaded.entries().expect("entries"),
        uncached.entries().expect("entries")
    );
}
