//! Test full build, dump and query sessions on GenBank input.

use crate::config::{Command, CreateConfig, SearchConfig};
use crate::driver::{DriverError, build_index, run_queries, search_index};
use crate::e2e_tests::helpers::*;
use crate::storage::TreeFile;
use crate::storage::btree::BTree;

fn expected_dump(gbk: &str, length: usize) -> String {
    naive_counts(gbk, length)
        .into_iter()
        .map(|(kmer, count)| format!("{kmer}: {count}\n"))
        .collect()
}

#[test]
fn test_build_counts_windows() {
    let dir = TestDir::new();
    let gbk = dir.arg("sample.gbk");
    dir.write("sample.gbk", SAMPLE_GBK);

    let config = CreateConfig::from_args(&args(&["0", "3", &gbk, "4"])).expect("args");
    let summary = build_index(&config).expect("build");

    // First section: 17 windows, 6 touch the `nnn` run. Second: 15 windows.
    assert_eq!(summary.counts.sequences, 2);
    assert_eq!(summary.counts.keys_inserted, 26);
    assert_eq!(summary.counts.windows_skipped, 6);
    assert_eq!(summary.tree_path, dir.path("sample.gbk.btree.data.4.3"));
    assert!(summary.tree_path.exists());
    assert_eq!(summary.dump_path, None);
}

#[test]
fn test_build_with_dump() {
    let dir = TestDir::new();
    let gbk = dir.arg("sample.gbk");
    dir.write("sample.gbk", SAMPLE_GBK);

    let command = Command::from_args(&args(&["create", "1", "2", &gbk, "4", "5", "1"]))
        .expect("args");
    let Command::Create(config) = command else {
        panic!("expected a create command");
    };
    let summary = build_index(&config).expect("build");

    assert_eq!(summary.dump_path, Some(dir.path("sample.gbk.btree.dump.4")));
    let dump = dir.read("sample.gbk.btree.dump.4");
    assert_eq!(dump, expected_dump(SAMPLE_GBK, 4));
    assert!(dump.starts_with("aaaa: 1\naaat: 4\n"));
}

#[test]
fn test_dump_of_generated_genome() {
    let dir = TestDir::new();
    let gbk_text = generate_gbk(17, 5_000);
    let gbk = dir.arg("gen.gbk");
    dir.write("gen.gbk", &gbk_text);

    for length in [1usize, 6, 20] {
        let k = length.to_string();
        let config =
            CreateConfig::from_args(&args(&["1", "0", &gbk, &k, "20", "1"])).expect("args");
        let summary = build_index(&config).expect("build");
        assert_eq!(summary.degree, 102);

        let dump_name = format!("gen.gbk.btree.dump.{length}");
        assert_eq!(dir.read(&dump_name), expected_dump(&gbk_text, length));
    }
}

#[test]
fn test_queries_to_result_file() {
    let dir = TestDir::new();
    let gbk = dir.arg("sample.gbk");
    dir.write("sample.gbk", SAMPLE_GBK);
    dir.write("queries", "AAAT\r\nGaTT\n\nCCCC\nANNA\n");

    let create = CreateConfig::from_args(&args(&["0", "2", &gbk, "4"])).expect("args");
    let summary = build_index(&create).expect("build");

    let search = SearchConfig::from_args(&args(&[
        "1",
        &summary.tree_path.display().to_string(),
        &dir.arg("queries"),
        "3",
        "1",
    ]))
    .expect("args");
    let result = search_index(&search).expect("search");

    assert_eq!(result.queries, 4);
    assert_eq!(result.found, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(
        search.result_path(),
        dir.path("sample.gbk.btree.data.4.2_queries_result")
    );
    assert_eq!(
        std::fs::read_to_string(search.result_path()).expect("result"),
        "aaat: 4\ngatt: 2\n"
    );
}

#[test]
fn test_every_indexed_kmer_is_found() {
    let dir = TestDir::new();
    let gbk_text = generate_gbk(5, 2_000);
    let gbk = dir.arg("gen.gbk");
    dir.write("gen.gbk", &gbk_text);

    let create = CreateConfig::from_args(&args(&["1", "3", &gbk, "5", "8"])).expect("args");
    let summary = build_index(&create).expect("build");

    let expected = naive_counts(&gbk_text, 5);
    let queries: String = expected.keys().map(|k| format!("{}\n", k.to_uppercase())).collect();

    let file = TreeFile::open_read_only(&summary.tree_path).expect("open");
    let mut tree = BTree::load_metadata(file, 8).expect("load");
    let mut out = Vec::new();
    let result = run_queries(&mut tree, queries.as_bytes(), Some(5), &mut out).expect("queries");

    assert_eq!(result.found, expected.len() as u64);
    let output = String::from_utf8(out).expect("utf8");
    assert_eq!(output, expected_dump(&gbk_text, 5));
}

#[test]
fn test_missing_input_file() {
    let dir = TestDir::new();
    let gbk = dir.arg("absent.gbk");

    let config = CreateConfig::from_args(&args(&["0", "2", &gbk, "4"])).expect("args");
    let result = build_index(&config);
    assert!(matches!(result, Err(DriverError::Open { .. })));
}

#[test]
fn test_cached_search_session_skips_wrong_lengths() {
    let dir = TestDir::new();
    let gbk = dir.arg("sample.gbk");
    dir.write("sample.gbk", SAMPLE_GBK);
    dir.write("short", "AA\nA\nAAAA\naaa\naat\n");

    let create = CreateConfig::from_args(&args(&["0", "2", &gbk, "3"])).expect("args");
    let summary = build_index(&create).expect("build");
    assert!(summary.node_count > 2);

    // A two-node cache over a read-only tree file
    let search = SearchConfig::from_args(&args(&[
        "1",
        &summary.tree_path.display().to_string(),
        &dir.arg("short"),
        "2",
        "1",
    ]))
    .expect("args");
    assert_eq!(search.sequence_length(), Some(3));
    let result = search_index(&search).expect("search");

    assert_eq!(result.queries, 5);
    assert_eq!(result.skipped, 3);
    assert_eq!(result.found, 2);
    assert_eq!(
        std::fs::read_to_string(search.result_path()).expect("result"),
        "aaa: 5\naat: 4\n"
    );
}
