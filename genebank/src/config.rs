//! Command-line configuration.
//!
//! Two sessions, selected by the first argument:
//!
//! ```text
//! genebank create <0/1 cache> <degree> <gbk file> <sequence length> [<cache size>] [<debug 0/1>]
//! genebank search <0/1 cache> <btree file> <query file> [<cache size>] [<debug 0/1>]
//! ```
//!
//! Positional arguments are interpreted the same way the cache flag says:
//! with the cache on, the first optional argument is the cache size; with it
//! off, it is the debug level.
//!
//! # Invariants
//!
//! - `cache_capacity` is 0 (disabled) or at least 2
//! - `degree` is 0 (auto) or at least 2
//! - `sequence_length` is in `1..=MAX_KMER_LENGTH`

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::kmer::MAX_KMER_LENGTH;
use crate::storage::btree::Degree;

pub const CREATE_USAGE: &str = "genebank create <0/1 (no/with cache)> <degree> <gbk file> <sequence length> [<cache size>] [<debug level 0/1>]";
pub const SEARCH_USAGE: &str = "genebank search <0/1 (no/with cache)> <btree file> <query file> [<cache size>] [<debug level 0/1>]";

/// Smallest cache a session may ask for.
pub const MIN_CACHE_SIZE: usize = 2;

/// Error returned when the command line is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Wrong shape of command line; holds the usage text to show.
    Usage(String),
    /// A required argument is missing.
    MissingArgument(String),
    /// An argument has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "usage: {usage}"),
            Self::MissingArgument(name) => write!(f, "missing required argument: {name}"),
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Parse a `0`/`1` flag.
fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(invalid(name, format!("'{other}' must be 0 or 1"))),
    }
}

fn parse_cache_size(value: &str) -> Result<usize, ConfigError> {
    let size = value
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid("cache size", format!("'{value}' is not a number")))?;
    usize::try_from(size)
        .ok()
        .filter(|&s| s >= MIN_CACHE_SIZE)
        .ok_or_else(|| invalid("cache size", format!("{size} must be at least {MIN_CACHE_SIZE}")))
}

/// Append `suffix` to the full text of `path`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(CreateConfig),
    Search(SearchConfig),
}

impl Command {
    /// Parse the arguments following the program name.
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        match args.split_first() {
            Some((command, rest)) if command == "create" => {
                CreateConfig::from_args(rest).map(Self::Create)
            }
            Some((command, rest)) if command == "search" => {
                SearchConfig::from_args(rest).map(Self::Search)
            }
            _ => Err(ConfigError::Usage(format!("{CREATE_USAGE}\n       {SEARCH_USAGE}"))),
        }
    }
}

/// Configuration of a build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConfig {
    /// Requested degree as given (0 selects the page-fitted degree).
    pub degree: i64,
    /// GenBank input file.
    pub gbk_file: PathBuf,
    /// k-mer length.
    pub sequence_length: u32,
    /// Node cache capacity, 0 when disabled.
    pub cache_capacity: usize,
    /// Write an in-order dump of the finished tree.
    pub debug: bool,
}

impl CreateConfig {
    /// Parse `<cache> <degree> <gbk> <length> [<cache size>] [<debug>]`.
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        if !(4..=6).contains(&args.len()) {
            return Err(ConfigError::Usage(CREATE_USAGE.to_string()));
        }

        let use_cache = parse_flag("cache", &args[0])?;
        let degree = Self::parse_degree(&args[1])?;
        let gbk_file = PathBuf::from(&args[2]);
        let sequence_length = Self::parse_sequence_length(&args[3])?;

        let (cache_capacity, debug) = match (use_cache, &args[4..]) {
            (false, []) => (0, false),
            (false, [debug]) => (0, parse_flag("debug level", debug)?),
            (false, _) => {
                return Err(invalid("cache size", "not allowed when the cache is disabled"));
            }
            (true, []) => return Err(ConfigError::MissingArgument("cache size".to_string())),
            (true, [size]) => (parse_cache_size(size)?, false),
            (true, [size, debug, ..]) => {
                (parse_cache_size(size)?, parse_flag("debug level", debug)?)
            }
        };

        Ok(Self {
            degree,
            gbk_file,
            sequence_length,
            cache_capacity,
            debug,
        })
    }

    fn parse_degree(value: &str) -> Result<i64, ConfigError> {
        let degree = value
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid("degree", format!("'{value}' is not a number")))?;
        match degree {
            1 => Err(invalid("degree", "cannot be 1")),
            d if d < 0 => Err(invalid("degree", "cannot be negative")),
            d => Degree::resolve(d)
                .map(|_| d)
                .map_err(|e| invalid("degree", e.to_string())),
        }
    }

    fn parse_sequence_length(value: &str) -> Result<u32, ConfigError> {
        value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|k| (1..=MAX_KMER_LENGTH).contains(k))
            .ok_or_else(|| {
                invalid(
                    "sequence length",
                    format!("'{value}' must be between 1 and {MAX_KMER_LENGTH}"),
                )
            })
    }

    /// Tree file: `<gbk>.btree.data.<k>.<degree>`.
    #[must_use]
    pub fn tree_path(&self) -> PathBuf {
        with_suffix(
            &self.gbk_file,
            &format!(".btree.data.{}.{}", self.sequence_length, self.degree),
        )
    }

    /// Dump file: `<gbk>.btree.dump.<k>`.
    #[must_use]
    pub fn dump_path(&self) -> PathBuf {
        with_suffix(
            &self.gbk_file,
            &format!(".btree.dump.{}", self.sequence_length),
        )
    }
}

/// Configuration of a query session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Finalized tree file.
    pub btree_file: PathBuf,
    /// One query per line.
    pub query_file: PathBuf,
    /// Node cache capacity, 0 when disabled.
    pub cache_capacity: usize,
    /// Write results to `result_path()` instead of standard output.
    pub debug: bool,
}

impl SearchConfig {
    /// Parse `<cache> <btree> <queries> [<cache size>] [<debug>]`.
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        if !(3..=5).contains(&args.len()) {
            return Err(ConfigError::Usage(SEARCH_USAGE.to_string()));
        }

        let use_cache = parse_flag("cache", &args[0])?;
        let btree_file = PathBuf::from(&args[1]);
        let query_file = PathBuf::from(&args[2]);

        let (cache_capacity, debug) = match (use_cache, &args[3..]) {
            (false, []) => (0, false),
            (false, [debug]) => (0, parse_flag("debug level", debug)?),
            (false, _) => {
                return Err(invalid("cache size", "not allowed when the cache is disabled"));
            }
            (true, []) => return Err(ConfigError::MissingArgument("cache size".to_string())),
            (true, [size]) => (parse_cache_size(size)?, false),
            (true, [size, debug, ..]) => {
                (parse_cache_size(size)?, parse_flag("debug level", debug)?)
            }
        };

        Ok(Self {
            btree_file,
            query_file,
            cache_capacity,
            debug,
        })
    }

    /// k-mer length recorded in a tree file named `….btree.data.<k>.<degree>`.
    ///
    /// `None` when the file was named some other way.
    #[must_use]
    pub fn sequence_length(&self) -> Option<usize> {
        let name = self.btree_file.file_name()?.to_str()?;
        let (_, suffix) = name.rsplit_once(".btree.data.")?;
        let (length, degree) = suffix.split_once('.')?;
        degree.parse::<u32>().ok()?;
        length
            .parse::<u32>()
            .ok()
            .filter(|k| (1..=MAX_KMER_LENGTH).contains(k))
            .map(|k| k as usize)
    }

    /// Result file: `<btree>_<query file name>_result`, next to the tree.
    #[must_use]
    pub fn result_path(&self) -> PathBuf {
        let query = self
            .query_file
            .file_name()
            .unwrap_or(self.query_file.as_os_str())
            .to_string_lossy();
        with_suffix(&self.btree_file, &format!("_{query}_result"))
    }
}
