//! Common helpers for end-to-end tests.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::kmer;
use crate::simulation::SimulatedStorage;
use crate::storage::Storage;
use crate::storage::btree::BTree;

/// A small GenBank record with two sequence sections.
///
/// The first section has an `n` run; the second spans two lines.
pub const SAMPLE_GBK: &str = "\
LOCUS       SAMPLE                    38 bp    DNA     linear   SYN 01-JAN-2020
DEFINITION  Synthetic sample for tests.
ACCESSION   SAMPLE
FEATURES             Location/Qualifiers
     source          1..38
ORIGIN
        1 aaatgcaaat nnnaaatgca
//
LOCUS       SAMPLE2                   18 bp    DNA     linear   SYN 01-JAN-2020
ORIGIN
        1 gattacagat
       11 tacaAAAT
//
";

/// Scratch directory removed on drop.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self { dir }
    }

    /// Path of `name` inside the directory.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        #[allow(clippy::expect_used)]
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Read `name` as text.
    #[must_use]
    pub fn read(&self, name: &str) -> String {
        #[allow(clippy::expect_used)]
        std::fs::read_to_string(self.path(name)).expect("Failed to read test file")
    }

    /// Path of `name` as an argument string.
    #[must_use]
    pub fn arg(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }
}

/// Build an argument vector.
#[must_use]
pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Encode a k-mer, panicking on invalid input.
#[must_use]
pub fn key(kmer: &str) -> u64 {
    #[allow(clippy::expect_used)]
    kmer::encode(kmer).expect("Invalid k-mer in test")
}

/// A fresh tree over in-memory storage.
#[must_use]
pub fn memory_tree(degree: i64, cache: usize) -> BTree<SimulatedStorage> {
    #[allow(clippy::expect_used)]
    BTree::create(SimulatedStorage::new(0), degree, cache).expect("Failed to create tree")
}

/// Insert each k-mer once, in order.
pub fn insert_kmers<S: Storage>(tree: &mut BTree<S>, kmers: &[&str]) {
    for kmer in kmers {
        #[allow(clippy::expect_used)]
        tree.insert(key(kmer)).expect("Insert failed");
    }
}

/// Frequency of `kmer`, if present.
pub fn frequency<S: Storage>(tree: &mut BTree<S>, kmer: &str) -> Option<u32> {
    #[allow(clippy::expect_used)]
    tree.search(key(kmer))
        .expect("Search failed")
        .map(|e| e.frequency)
}

/// A GenBank record with one `ORIGIN` section of `length` random symbols,
/// laid out 60 per line with position numbers.
///
/// About one symbol in 200 is an `n`.
#[must_use]
pub fn generate_gbk(seed: u64, length: usize) -> String {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SYMBOLS: [char; 4] = ['a', 'c', 'g', 't'];
    let mut rng = StdRng::seed_from_u64(seed);
    let sequence: Vec<char> = (0..length)
        .map(|_| {
            if rng.random_range(0..200) == 0 {
                'n'
            } else {
                SYMBOLS[rng.random_range(0..4)]
            }
        })
        .collect();

    let mut gbk = format!("LOCUS       GEN{seed}   {length} bp    DNA\nORIGIN\n");
    for (line, chunk) in sequence.chunks(60).enumerate() {
        gbk.push_str(&format!("{:>9}", line * 60 + 1));
        for word in chunk.chunks(10) {
            gbk.push(' ');
            gbk.extend(word);
        }
        gbk.push('\n');
    }
    gbk.push_str("//\n");
    gbk
}

/// Count every valid `length`-window of every `ORIGIN` section, the slow way.
#[must_use]
pub fn naive_counts(gbk: &str, length: usize) -> std::collections::BTreeMap<String, u32> {
    let mut counts = std::collections::BTreeMap::new();
    let mut sequence: Option<String> = None;

    let mut flush = |sequence: &str| {
        let symbols: Vec<char> = sequence.chars().collect();
        for window in symbols.windows(length) {
            let kmer: String = window.iter().collect::<String>().to_lowercase();
            if kmer.chars().all(|c| "acgt".contains(c)) {
                *counts.entry(kmer).or_insert(0) += 1;
            }
        }
    };

    for line in gbk.lines() {
        if line.contains("//") {
            if let Some(s) = sequence.take() {
                flush(&s);
            }
        } else if let Some(s) = sequence.as_mut() {
            s.extend(line.chars().filter(|c| !c.is_ascii_digit() && !c.is_whitespace()));
        } else if line.to_uppercase().contains("ORIGIN") {
            sequence = Some(String::new());
        }
    }
    if let Some(s) = sequence {
        flush(&s);
    }
    counts
}
