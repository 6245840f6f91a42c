//! Single-file storage for the k-mer index.
//!
//! # File Format
//!
//! ```text
//! [0, 12)        header: root_location, node_count, degree (big-endian u32)
//! [12, ...)      node records, each `40t - 3` bytes, in allocation order
//! ```
//!
//! The header is zero until a build session finalizes the tree, so an
//! interrupted build is detectable on open.

pub mod btree;
mod file;
mod header;
mod io;

pub use file::TreeFile;
pub use header::{HEADER_SIZE, HEADER_SIZE_U32, HeaderError, TreeHeader};
pub use io::{Storage, StorageError};
