//! Disk-based B-tree keyed by encoded k-mers.
//!
//! # Structure
//!
//! Every node (leaf or internal) holds up to `2t - 1` entries of
//! `(key, frequency, status)` plus `2t` child offsets. Nodes are fixed-size
//! records placed back to back after the tree header, so a node's file offset
//! doubles as its identity.
//!
//! # Usage
//!
//! ```
//! use genebank::simulation::SimulatedStorage;
//! use genebank::storage::btree::BTree;
//!
//! let mut tree = BTree::create(SimulatedStorage::new(0), 2, 4).unwrap();
//! for key in [3, 1, 3, 2] {
//!     tree.insert(key).unwrap();
//! }
//! assert_eq!(tree.search(3).unwrap().map(|e| e.frequency), Some(2));
//! ```

mod allocator;
mod cache;
mod degree;
mod node;
mod tree;

pub use allocator::NodeAllocator;
pub use cache::{CacheStats, NodeCache};
pub use degree::{Degree, MIN_DEGREE, PAGE_SIZE, record_length};
pub use node::{Entry, Location, NO_LOCATION, Node, NodeError, SlotStatus};
pub use tree::{BTree, BTreeError};
