//! Build, dump and query sessions.
//!
//! The generic functions (`index_sequences`, `dump_entries`, `run_queries`)
//! work on any `Storage` and any reader/writer; the `*_file` wrappers bind
//! them to the paths from a parsed command line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{CreateConfig, SearchConfig};
use crate::genbank::{SequenceReader, kmer_windows};
use crate::kmer::{self, KmerError};
use crate::storage::btree::{BTree, BTreeError, CacheStats, Entry};
use crate::storage::{Storage, StorageError, TreeFile};

/// Errors from running a session.
#[derive(Debug)]
pub enum DriverError {
    /// The tree rejected an operation.
    Tree(BTreeError),
    /// The tree file could not be created or opened.
    Storage(StorageError),
    /// A k-mer length the encoder cannot handle.
    Kmer(KmerError),
    /// Reading input or writing output failed.
    Io(std::io::Error),
    /// An input or output file could not be opened.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree(e) => write!(f, "tree error: {e}"),
            Self::Storage(e) => write!(f, "tree file error: {e}"),
            Self::Kmer(e) => write!(f, "k-mer error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Open { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(e) => Some(e),
            Self::Storage(e) => Some(e),
            Self::Kmer(e) => Some(e),
            Self::Io(e) | Self::Open { source: e, .. } => Some(e),
        }
    }
}

impl From<BTreeError> for DriverError {
    fn from(e: BTreeError) -> Self {
        Self::Tree(e)
    }
}

impl From<StorageError> for DriverError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<KmerError> for DriverError {
    fn from(e: KmerError) -> Self {
        Self::Kmer(e)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

fn open(path: &Path) -> Result<File, DriverError> {
    File::open(path).map_err(|source| DriverError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn create(path: &Path) -> Result<File, DriverError> {
    File::create(path).map_err(|source| DriverError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Counts from feeding sequences into a tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexCounts {
    /// `ORIGIN` sections read.
    pub sequences: u64,
    /// Windows inserted.
    pub keys_inserted: u64,
    /// Windows dropped for containing a symbol outside `{A, C, G, T}`.
    pub windows_skipped: u64,
}

/// Outcome of a finished build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub tree_path: PathBuf,
    pub counts: IndexCounts,
    pub node_count: u32,
    pub degree: u32,
    pub cache: CacheStats,
    /// Dump file written, when requested.
    pub dump_path: Option<PathBuf>,
}

/// Insert every `length`-symbol window of every sequence in `reader`.
pub fn index_sequences<S: Storage, R: BufRead>(
    tree: &mut BTree<S>,
    reader: R,
    length: usize,
) -> Result<IndexCounts, DriverError> {
    let mut counts = IndexCounts::default();

    for sequence in SequenceReader::new(reader) {
        let sequence = sequence?;
        counts.sequences += 1;

        let before = counts;
        for window in kmer_windows(&sequence, length)? {
            match window {
                Some(key) => {
                    tree.insert(key)?;
                    counts.keys_inserted += 1;
                }
                None => counts.windows_skipped += 1,
            }
        }

        tracing::debug!(
            sequence = counts.sequences,
            symbols = sequence.len(),
            inserted = counts.keys_inserted - before.keys_inserted,
            skipped = counts.windows_skipped - before.windows_skipped,
            "indexed sequence"
        );
    }
    Ok(counts)
}

/// Build the tree file for `config` and finalize it.
///
/// The tree file is replaced if it exists. With `debug` set, the finished
/// tree is reopened and dumped to `config.dump_path()`.
pub fn build_index(config: &CreateConfig) -> Result<BuildSummary, DriverError> {
    let input = BufReader::new(open(&config.gbk_file)?);
    let tree_path = config.tree_path();
    let length = config.sequence_length as usize;

    let file = TreeFile::create(&tree_path)?;
    let mut tree = BTree::create(file, config.degree, config.cache_capacity)?;
    tracing::info!(
        input = %config.gbk_file.display(),
        tree = %tree_path.display(),
        sequence_length = length,
        "building index"
    );

    let counts = index_sequences(&mut tree, input, length)?;

    let node_count = tree.node_count();
    let degree = tree.degree().get();
    let cache = tree.cache_stats();
    drop(tree.save_metadata()?);

    tracing::info!(
        sequences = counts.sequences,
        keys_inserted = counts.keys_inserted,
        windows_skipped = counts.windows_skipped,
        node_count,
        degree,
        "build finished"
    );

    let dump_path = if config.debug {
        let path = config.dump_path();
        dump_file(&tree_path, length, &path)?;
        Some(path)
    } else {
        None
    };

    Ok(BuildSummary {
        tree_path,
        counts,
        node_count,
        degree,
        cache,
        dump_path,
    })
}

/// Format one entry as `<kmer>: <frequency>`.
#[must_use]
pub fn format_entry(entry: &Entry, length: usize) -> String {
    format!("{}: {}", kmer::decode(entry.key, length), entry.frequency)
}

/// Write every entry in ascending key order, one `<kmer>: <frequency>` line
/// each. Returns the number of lines written.
pub fn dump_entries<S: Storage, W: Write>(
    tree: &mut BTree<S>,
    length: usize,
    out: &mut W,
) -> Result<u64, DriverError> {
    let mut lines = 0;
    tree.traverse(|entry| -> Result<(), DriverError> {
        writeln!(out, "{}", format_entry(entry, length))?;
        lines += 1;
        Ok(())
    })?;
    Ok(lines)
}

/// Dump the finalized tree at `tree_path` into `dump_path`.
pub fn dump_file(tree_path: &Path, length: usize, dump_path: &Path) -> Result<u64, DriverError> {
    let file = TreeFile::open_read_only(tree_path)?;
    let mut tree = BTree::load_metadata(file, 0)?;

    let mut out = BufWriter::new(create(dump_path)?);
    let lines = dump_entries(&mut tree, length, &mut out)?;
    out.flush()?;

    tracing::info!(dump = %dump_path.display(), lines, "wrote tree dump");
    Ok(lines)
}

/// Counts from a query session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuerySummary {
    /// Non-blank lines read.
    pub queries: u64,
    /// Queries present in the tree.
    pub found: u64,
    /// Lines skipped because they are not a k-mer.
    pub skipped: u64,
}

/// Answer one query per line of `queries`.
///
/// Found queries produce `<lowercased query>: <frequency>`; queries not in
/// the tree produce nothing. With `length` known, queries of any other
/// length are skipped, since their encodings would alias keys of the tree.
pub fn run_queries<S: Storage, R: BufRead, W: Write>(
    tree: &mut BTree<S>,
    queries: R,
    length: Option<usize>,
    out: &mut W,
) -> Result<QuerySummary, DriverError> {
    let mut summary = QuerySummary::default();

    for (number, line) in queries.lines().enumerate() {
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        summary.queries += 1;

        if let Some(expected) = length.filter(|&k| k != query.len()) {
            tracing::warn!(line = number + 1, query, expected, "skipping query of wrong length");
            summary.skipped += 1;
            continue;
        }

        let key = match kmer::encode(query) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(line = number + 1, query, error = %e, "skipping query");
                summary.skipped += 1;
                continue;
            }
        };

        if let Some(entry) = tree.search(key)? {
            writeln!(out, "{}: {}", query.to_lowercase(), entry.frequency)?;
            summary.found += 1;
        }
    }
    Ok(summary)
}

/// Run the query session described by `config`.
///
/// Results go to standard output, or to `config.result_path()` with `debug`.
pub fn search_index(config: &SearchConfig) -> Result<QuerySummary, DriverError> {
    let file = TreeFile::open_read_only(&config.btree_file)?;
    let mut tree = BTree::load_metadata(file, config.cache_capacity)?;
    let queries = BufReader::new(open(&config.query_file)?);
    let length = config.sequence_length();

    tracing::info!(
        tree = %config.btree_file.display(),
        queries = %config.query_file.display(),
        cache_capacity = config.cache_capacity,
        sequence_length = ?length,
        "starting queries"
    );

    let summary = if config.debug {
        let path = config.result_path();
        let mut out = BufWriter::new(create(&path)?);
        let summary = run_queries(&mut tree, queries, length, &mut out)?;
        out.flush()?;
        tracing::info!(result = %path.display(), "wrote query results");
        summary
    } else {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        let summary = run_queries(&mut tree, queries, length, &mut out)?;
        out.flush()?;
        summary
    };

    tracing::info!(
        queries = summary.queries,
        found = summary.found,
        skipped = summary.skipped,
        "queries finished"
    );
    Ok(summary)
}
