//! B-tree engine for the k-mer index.
//!
//! This is a disk-based B-tree (CLRS style, keys in every node) where:
//! - Key: an encoded k-mer (`u64`)
//! - Value: the number of times the key was inserted
//!
//! Insertion splits full nodes on the way down, so a single descent always
//! suffices. Nodes are only ever read and written through the `NodeCache`;
//! the tree never touches node records on the store directly.

use crate::storage::btree::allocator::NodeAllocator;
use crate::storage::btree::cache::{CacheStats, NodeCache};
use crate::storage::btree::degree::Degree;
use crate::storage::btree::node::{Entry, Location, Node, NodeError};
use crate::storage::header::{HEADER_SIZE, HeaderError, TreeHeader};
use crate::storage::io::{Storage, StorageError};

/// A B-tree backed by a byte-addressed store.
///
/// The tree exclusively owns its store for the whole session. A build session
/// ends with `save_metadata`, which flushes the cache and writes the header;
/// a query session simply drops the tree.
pub struct BTree<S: Storage> {
    storage: S,
    degree: Degree,
    allocator: NodeAllocator,
    cache: NodeCache,
    root_location: Location,
}

impl<S: Storage> BTree<S> {
    /// Create a new, empty tree on `storage`.
    ///
    /// `requested_degree` is resolved with `Degree::resolve` (0 picks the
    /// page-fitted degree). The root is allocated immediately after the
    /// header and written through the cache, so even a tree without inserts
    /// is readable once finalized.
    pub fn create(
        storage: S,
        requested_degree: i64,
        cache_capacity: usize,
    ) -> Result<Self, BTreeError> {
        let degree = Degree::resolve(requested_degree)?;
        let mut allocator = NodeAllocator::new(degree);

        let mut root = Node::new(degree);
        let root_location = allocator.allocate(&mut root)?;

        let mut tree = Self {
            storage,
            degree,
            allocator,
            cache: NodeCache::new(cache_capacity),
            root_location,
        };
        tree.write_node(root)?;

        tracing::info!(
            degree = degree.get(),
            record_length = degree.record_length(),
            cache_capacity,
            "created tree"
        );
        Ok(tree)
    }

    /// Open a finalized tree: read the header, then the root through the cache.
    ///
    /// The opened tree can be searched, traversed and inserted into; node
    /// allocation resumes after the last existing record.
    pub fn load_metadata(mut storage: S, cache_capacity: usize) -> Result<Self, BTreeError> {
        let len = storage.len()?;
        if len < HEADER_SIZE as u64 {
            #[allow(clippy::cast_possible_truncation)] // len < 12
            return Err(HeaderError::TooShort(len as usize).into());
        }

        let mut buf = [0u8; HEADER_SIZE];
        storage.read_at(0, &mut buf)?;
        let header = TreeHeader::from_bytes(&buf)?;

        let degree = Degree::new(header.degree)
            .map_err(|_| HeaderError::InvalidDegree(header.degree))?;
        let allocator = NodeAllocator::resume(degree, header.node_count)?;

        let mut tree = Self {
            storage,
            degree,
            allocator,
            cache: NodeCache::new(cache_capacity),
            root_location: header.root_location,
        };
        tree.read_node(header.root_location)?;

        tracing::info!(
            degree = header.degree,
            node_count = header.node_count,
            root_location = header.root_location,
            cache_capacity,
            "opened tree"
        );
        Ok(tree)
    }

    /// The tree degree.
    #[must_use]
    pub const fn degree(&self) -> Degree {
        self.degree
    }

    /// File offset of the current root.
    #[must_use]
    pub const fn root_location(&self) -> Location {
        self.root_location
    }

    /// Number of nodes allocated over the life of the tree file.
    #[must_use]
    pub const fn node_count(&self) -> u32 {
        self.allocator.node_count()
    }

    /// Cache counters for this session.
    #[must_use]
    pub const fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The metadata `save_metadata` would persist right now.
    #[must_use]
    pub const fn header(&self) -> TreeHeader {
        TreeHeader {
            root_location: self.root_location,
            node_count: self.allocator.node_count(),
            degree: self.degree.get(),
        }
    }

    /// The backing store.
    ///
    /// Writes made here bypass the cache; nodes it still holds stay
    /// authoritative.
    pub const fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Read a node through the cache.
    pub fn read_node(&mut self, location: Location) -> Result<Node, BTreeError> {
        self.cache.read(&mut self.storage, self.degree, location)
    }

    /// Read the current root through the cache.
    pub fn root(&mut self) -> Result<Node, BTreeError> {
        self.read_node(self.root_location)
    }

    fn write_node(&mut self, node: Node) -> Result<(), BTreeError> {
        self.cache.write(&mut self.storage, self.degree, node)
    }

    /// Insert one occurrence of `key`.
    ///
    /// A key already present anywhere in the tree has its frequency
    /// incremented where it is found; keys are never duplicated across levels.
    pub fn insert(&mut self, key: u64) -> Result<(), BTreeError> {
        let root = self.root()?;
        if !root.is_full() {
            return self.insert_nonfull(root, key);
        }

        // Grow the tree from the top: the old root becomes the only child of
        // a new root and is split before descending.
        let mut old_root = root;
        let mut new_root = Node::new(self.degree);
        new_root.is_leaf = false;
        self.allocator.allocate(&mut new_root)?;
        new_root.children[0] = old_root.location;
        old_root.parent = new_root.location;
        self.root_location = new_root.location;

        tracing::debug!(
            old_root = old_root.location,
            new_root = new_root.location,
            "root split"
        );

        self.split_child(&mut new_root, 0, &mut old_root)?;
        self.insert_nonfull(new_root, key)
    }

    /// Insert into a node known not to be full.
    fn insert_nonfull(&mut self, mut node: Node, key: u64) -> Result<(), BTreeError> {
        if let Some(i) = node.find(key) {
            if node.entries[i].is_occupied() {
                node.entries[i].increment_frequency();
                return self.write_node(node);
            }
            if node.is_leaf {
                // Reclaim a slot holding a non-occupied copy of the key.
                node.entries[i] = Entry::new(key);
                return self.write_node(node);
            }
        }

        let index = node.child_index(key);

        if node.is_leaf {
            node.entries.copy_within(index..node.key_count, index + 1);
            node.entries[index] = Entry::new(key);
            node.key_count += 1;
            return self.write_node(node);
        }

        let mut child = self.read_node(node.children[index])?;
        if !child.is_full() {
            return self.insert_nonfull(child, key);
        }

        let sibling = self.split_child(&mut node, index, &mut child)?;

        // The promoted median may be the key itself.
        let median = node.entries[index];
        if median.key == key && median.is_occupied() {
            node.entries[index].increment_frequency();
            return self.write_node(node);
        }

        if key > median.key {
            self.insert_nonfull(sibling, key)
        } else {
            self.insert_nonfull(child, key)
        }
    }

    /// Split the full `child`, the `index`-th child of `parent`.
    ///
    /// The upper `t - 1` entries (and upper `t` children) move to a newly
    /// allocated sibling, the median moves up into `parent` at `index`, and
    /// all three nodes are written back. Returns the sibling.
    fn split_child(
        &mut self,
        parent: &mut Node,
        index: usize,
        child: &mut Node,
    ) -> Result<Node, BTreeError> {
        let t = self.degree.get() as usize;

        let mut sibling = Node::new(self.degree);
        self.allocator.allocate(&mut sibling)?;
        sibling.is_leaf = child.is_leaf;
        sibling.entries[..t - 1].copy_from_slice(&child.entries[t..2 * t - 1]);
        if !child.is_leaf {
            sibling.children[..t].copy_from_slice(&child.children[t..2 * t]);
        }
        sibling.key_count = t - 1;

        let median = child.entries[t - 1];
        child.truncate(t - 1);

        let count = parent.key_count;
        parent.children.copy_within(index + 1..=count, index + 2);
        parent.children[index] = child.location;
        parent.children[index + 1] = sibling.location;
        parent.entries.copy_within(index..count, index + 1);
        parent.entries[index] = median;
        parent.key_count += 1;

        child.parent = parent.location;
        sibling.parent = parent.location;

        tracing::trace!(
            parent = parent.location,
            child = child.location,
            sibling = sibling.location,
            median = median.key,
            "split node"
        );

        self.write_node(child.clone())?;
        self.write_node(sibling.clone())?;
        self.write_node(parent.clone())?;
        Ok(sibling)
    }

    /// Look up `key` starting at the root.
    pub fn search(&mut self, key: u64) -> Result<Option<Entry>, BTreeError> {
        let root = self.root()?;
        self.search_from(root, key)
    }

    /// Look up `key` in the subtree rooted at `node`.
    ///
    /// Each level scans for the first entry `>= key`; an exact match is
    /// returned, otherwise the search descends into the child at that index.
    pub fn search_from(&mut self, mut node: Node, key: u64) -> Result<Option<Entry>, BTreeError> {
        loop {
            let index = node
                .keys()
                .iter()
                .position(|e| e.key >= key)
                .unwrap_or(node.key_count);

            if index < node.key_count && node.entries[index].key == key {
                return Ok(Some(node.entries[index]));
            }
            if node.is_leaf {
                return Ok(None);
            }
            node = self.read_node(node.children[index])?;
        }
    }

    /// Visit every entry in ascending key order.
    ///
    /// Stops at the first error returned by `visit`.
    pub fn traverse<E, F>(&mut self, mut visit: F) -> Result<(), E>
    where
        E: From<BTreeError>,
        F: FnMut(&Entry) -> Result<(), E>,
    {
        let root = self.root()?;
        self.traverse_node(&root, &mut visit)
    }

    fn traverse_node<E, F>(&mut self, node: &Node, visit: &mut F) -> Result<(), E>
    where
        E: From<BTreeError>,
        F: FnMut(&Entry) -> Result<(), E>,
    {
        if node.is_leaf {
            for entry in node.keys() {
                visit(entry)?;
            }
            return Ok(());
        }

        for i in 0..=node.key_count {
            let child = self.read_node(node.children[i])?;
            self.traverse_node(&child, visit)?;
            if i < node.key_count {
                visit(&node.entries[i])?;
            }
        }
        Ok(())
    }

    /// Collect every entry in ascending key order.
    pub fn entries(&mut self) -> Result<Vec<Entry>, BTreeError> {
        let mut entries = Vec::new();
        self.traverse(|entry| -> Result<(), BTreeError> {
            entries.push(*entry);
            Ok(())
        })?;
        Ok(entries)
    }

    /// Finalize the session.
    ///
    /// Flushes every cached node, then writes the header as the last write
    /// and syncs. The store is handed back; dropping it releases the file.
    pub fn save_metadata(mut self) -> Result<S, BTreeError> {
        self.cache.flush_all(&mut self.storage, self.degree)?;

        let header = self.header();
        self.storage.write_at(0, &header.to_bytes())?;
        self.storage.sync()?;

        let stats = self.cache.stats();
        tracing::info!(
            root_location = header.root_location,
            node_count = header.node_count,
            degree = header.degree,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            cache_evictions = stats.evictions,
            "saved tree metadata"
        );
        Ok(self.storage)
    }

    /// End a session without writing metadata, handing back the store.
    ///
    /// Nodes still held in the cache are discarded; use this for query
    /// sessions, where nothing is dirty.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// Degree request of exactly 1, negative, or too large to address.
    InvalidDegree(i64),
    /// Storage failure while reading or writing the tree file.
    Storage(StorageError),
    /// Node record failed to decode.
    Node(NodeError),
    /// Tree header missing or invalid.
    Header(HeaderError),
    /// Node offsets no longer fit in 32 bits.
    OffsetOverflow,
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDegree(d) => {
                write!(f, "invalid degree {d}: must be 0 (auto) or at least 2")
            }
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Node(e) => write!(f, "node error: {e}"),
            Self::Header(e) => write!(f, "header error: {e}"),
            Self::OffsetOverflow => write!(f, "tree file exceeds 32-bit node offsets"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Node(e) => Some(e),
            Self::Header(e) => Some(e),
            Self::InvalidDegree(_) | Self::OffsetOverflow => None,
        }
    }
}

impl From<StorageError> for BTreeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<NodeError> for BTreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}

impl From<HeaderError> for BTreeError {
    fn from(e: HeaderError) -> Self {
        Self::Header(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{FaultConfig, SimulatedStorage, TreeInvariantChecker};
    use crate::storage::btree::node::{NO_LOCATION, SlotStatus};
    use crate::storage::file::TreeFile;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::tempdir;

    fn memory_tree(degree: i64, cache: usize) -> BTree<SimulatedStorage> {
        BTree::create(SimulatedStorage::new(7), degree, cache).expect("create tree")
    }

    fn random_keys(seed: u64, count: usize, space: u64) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count).map(|_| rng.random_range(0..space)).collect()
    }

    #[test]
    fn test_create_empty_tree() {
        let mut tree = memory_tree(3, 0);
        assert_eq!(tree.degree().get(), 3);
        assert_eq!(tree.root_location(), 12);
        assert_eq!(tree.node_count(), 1);

        let root = tree.root().expect("root");
        assert!(root.is_leaf);
        assert_eq!(root.key_count, 0);
        assert_eq!(root.parent, NO_LOCATION);
        assert!(tree.entries().expect("entries").is_empty());
        assert_eq!(tree.search(1).expect("search"), None);
    }

    #[test]
    fn test_create_rejects_invalid_degree() {
        for degree in [1, -1, -100] {
            let result = BTree::create(SimulatedStorage::new(1), degree, 0);
            assert!(matches!(result, Err(BTreeError::InvalidDegree(d)) if d == degree));
        }
    }

    #[test]
    fn test_create_auto_degree() {
        let tree = memory_tree(0, 0);
        assert_eq!(tree.degree(), Degree::optimal());
    }

    #[test]
    fn test_insert_and_search() {
        let mut tree = memory_tree(2, 0);
        for key in [50u64, 20, 80, 10, 30, 70, 90, 60, 40] {
            tree.insert(key).expect("insert");
        }

        for key in [10u64, 20, 30, 40, 50, 60, 70, 80, 90] {
            let entry = tree.search(key).expect("search").expect("should be found");
            assert_eq!(entry.key, key);
            assert_eq!(entry.frequency, 1);
            assert_eq!(entry.status, SlotStatus::Occupied);
        }
        for key in [0u64, 15, 55, 95] {
            assert_eq!(tree.search(key).expect("search"), None);
        }
    }

    #[test]
    fn test_duplicate_folding() {
        for cache in [0, 4] {
            let mut tree = memory_tree(2, cache);
            for key in 0..40u64 {
                tree.insert(key).expect("insert");
            }
            for _ in 0..7 {
                tree.insert(17).expect("insert duplicate");
            }

            let entries = tree.entries().expect("entries");
            assert_eq!(entries.len(), 40);
            assert_eq!(entries.iter().filter(|e| e.key == 17).count(), 1);
            let entry = tree.search(17).expect("search").expect("found");
            assert_eq!(entry.frequency, 8);
        }
    }

    #[test]
    fn test_insert_reclaims_non_occupied_leaf_slot() {
        for status in [SlotStatus::Empty, SlotStatus::Deleted] {
            let mut tree = memory_tree(2, 0);
            for key in [10u64, 30] {
                tree.insert(key).expect("insert");
            }

            // Leave a stale copy of 30 inside the key count
            let mut root = tree.root().expect("root");
            root.entries[1] = Entry {
                key: 30,
                frequency: 5,
                status,
            };
            let bytes = root.encode(tree.degree());
            tree.storage_mut()
                .write_at(u64::from(root.location), &bytes)
                .expect("raw write");

            tree.insert(30).expect("insert");

            let root = tree.root().expect("root");
            assert_eq!(root.key_count, 2, "{status:?}");
            assert_eq!(root.entries[1], Entry::new(30), "{status:?}");
            assert_eq!(
                tree.search(30).expect("search").map(|e| e.frequency),
                Some(1)
            );
        }
    }

    #[test]
    fn test_duplicate_folds_in_internal_node() {
        let mut tree = memory_tree(2, 0);
        for key in 1..=4u64 {
            tree.insert(key).expect("insert");
        }

        // The 4th insert split the root, promoting 2
        let root = tree.root().expect("root");
        assert!(!root.is_leaf);
        assert_eq!(root.keys()[0].key, 2);

        tree.insert(2).expect("insert duplicate");
        let root = tree.root().expect("root");
        assert_eq!(root.keys()[0].frequency, 2);
        assert_eq!(tree.entries().expect("entries").len(), 4);
    }

    #[test]
    fn test_duplicate_of_promoted_median() {
        let mut tree = memory_tree(2, 0);
        // Fill root, split it, then fill the right leaf so the next insert of
        // its median lands on the freshly promoted entry.
        for key in [10u64, 20, 30, 40, 50] {
            tree.insert(key).expect("insert");
        }
        let root = tree.root().expect("root");
        let right = tree.read_node(root.children[1]).expect("right child");
        assert!(right.is_full());
        let median = right.keys()[1].key;

        tree.insert(median).expect("insert duplicate median");

        let root = tree.root().expect("root");
        let promoted = root.find(median).expect("median promoted into root");
        assert_eq!(root.keys()[promoted].frequency, 2);
        let entries = tree.entries().expect("entries");
        assert_eq!(entries.iter().filter(|e| e.key == median).count(), 1);
    }

    #[test]
    fn test_root_split_on_2t_ascending_keys() {
        for t in 2..=6u32 {
            let mut tree = memory_tree(i64::from(t), 0);
            let max_keys = u64::from(2 * t - 1);

            for key in 0..max_keys {
                tree.insert(key).expect("insert");
            }
            let root = tree.root().expect("root");
            assert!(root.is_leaf);
            assert!(root.is_full());

            tree.insert(max_keys).expect("insert triggering split");

            let root = tree.root().expect("root");
            assert!(!root.is_leaf);
            assert_eq!(root.key_count, 1);
            assert_eq!(root.keys()[0].key, u64::from(t - 1));

            let left = tree.read_node(root.children[0]).expect("left");
            let right = tree.read_node(root.children[1]).expect("right");
            assert_eq!(left.key_count, t as usize - 1);
            // t - 1 from the split, plus the key that triggered it
            assert_eq!(right.key_count, t as usize);
            assert_eq!(left.parent, root.location);
            assert_eq!(right.parent, root.location);
            assert_eq!(tree.node_count(), 3);
        }
    }

    #[test]
    fn test_split_child_invariant() {
        for t in 2..=5u32 {
            let mut tree = memory_tree(i64::from(t), 0);
            let max_keys = u64::from(2 * t - 1);
            for key in 0..max_keys {
                tree.insert(key * 10).expect("insert");
            }

            let mut child = tree.root().expect("root");
            let mut parent = Node::new(tree.degree());
            parent.is_leaf = false;
            tree.allocator.allocate(&mut parent).expect("allocate");
            parent.children[0] = child.location;

            let before = parent.key_count;
            let sibling = tree
                .split_child(&mut parent, 0, &mut child)
                .expect("split");

            let t = t as usize;
            assert_eq!(parent.key_count, before + 1);
            for node in [&child, &sibling] {
                assert!(node.key_count >= t - 1 && node.key_count <= 2 * t - 2);
                assert_eq!(node.parent, parent.location);
            }
            assert_eq!(parent.children[0], child.location);
            assert_eq!(parent.children[1], sibling.location);

            let median = parent.keys()[0].key;
            assert!(child.keys().iter().all(|e| e.key < median));
            assert!(sibling.keys().iter().all(|e| e.key > median));
            assert_eq!(parent.keys()[0].status, SlotStatus::Occupied);

            // All three were written back
            assert_eq!(tree.read_node(child.location).expect("child"), child);
            assert_eq!(tree.read_node(sibling.location).expect("sibling"), sibling);
            assert_eq!(tree.read_node(parent.location).expect("parent"), parent);
        }
    }

    #[test]
    fn test_traversal_is_sorted() {
        for t in [2i64, 3, 7] {
            let mut tree = memory_tree(t, 5);
            let keys = random_keys(t.unsigned_abs(), 2_000, 500);
            for &key in &keys {
                tree.insert(key).expect("insert");
            }

            let entries = tree.entries().expect("entries");
            assert!(entries.windows(2).all(|w| w[0].key < w[1].key));

            let total: u64 = entries.iter().map(|e| u64::from(e.frequency)).sum();
            assert_eq!(total, keys.len() as u64);

            let checker = TreeInvariantChecker::check(&mut tree).expect("check");
            assert!(checker.violations().is_empty(), "{:?}", checker.violations());
        }
    }

    #[test]
    fn test_cache_transparency() {
        let keys = random_keys(99, 3_000, 1_000);
        let mut snapshots = Vec::new();

        for cache in [0usize, 1, 2, 10, 100] {
            let mut tree = memory_tree(3, cache);
            for &key in &keys {
                tree.insert(key).expect("insert");
            }
            let entries = tree.entries().expect("entries");
            let storage = tree.save_metadata().expect("save");
            snapshots.push((cache, entries, storage.bytes().to_vec()));
        }

        let (_, expected_entries, expected_bytes) = &snapshots[0];
        for (cache, entries, bytes) in &snapshots[1..] {
            assert_eq!(entries, expected_entries, "entries differ with cache {cache}");
            assert_eq!(bytes, expected_bytes, "file differs with cache {cache}");
        }
    }

    #[test]
    fn test_cache_reduces_disk_writes() {
        let keys = random_keys(5, 1_000, 10_000);

        let mut uncached = memory_tree(4, 0);
        let mut cached = memory_tree(4, 64);
        for &key in &keys {
            uncached.insert(key).expect("insert");
            cached.insert(key).expect("insert");
        }

        let uncached = uncached.save_metadata().expect("save");
        let cached = cached.save_metadata().expect("save");
        assert!(cached.stats().writes < uncached.stats().writes);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.btree");
        let keys = random_keys(11, 500, 200);

        let expected = {
            let file = TreeFile::create(&path).expect("create file");
            let mut tree = BTree::create(file, 3, 8).expect("create tree");
            for &key in &keys {
                tree.insert(key).expect("insert");
            }
            let expected = tree.entries().expect("entries");
            tree.save_metadata().expect("save");
            expected
        };

        let file = TreeFile::open_read_only(&path).expect("open file");
        let mut tree = BTree::load_metadata(file, 0).expect("load");
        assert_eq!(tree.degree().get(), 3);
        assert_eq!(tree.entries().expect("entries"), expected);

        for entry in &expected {
            assert_eq!(tree.search(entry.key).expect("search"), Some(*entry));
        }

        let record = u64::from(tree.degree().record_length());
        let len = std::fs::metadata(&path).expect("metadata").len();
        assert_eq!(len, 12 + u64::from(tree.node_count()) * record);
    }

    #[test]
    fn test_cached_search_on_read_only_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.btree");

        {
            let file = TreeFile::create(&path).expect("create file");
            let mut tree = BTree::create(file, 2, 0).expect("create tree");
            for key in 0..50u64 {
                tree.insert(key).expect("insert");
            }
            tree.save_metadata().expect("save");
        }

        // Far fewer cache slots than nodes, so every search evicts
        let file = TreeFile::open_read_only(&path).expect("open file");
        let mut tree = BTree::load_metadata(file, 2).expect("load");
        assert!(tree.node_count() > 10);
        for key in 0..50u64 {
            let entry = tree.search(key).expect("search").expect("found");
            assert_eq!(entry.frequency, 1);
        }
        assert_eq!(tree.entries().expect("entries").len(), 50);

        let stats = tree.cache_stats();
        assert!(stats.evictions > 0);
        assert_eq!(stats.disk_writes, 0);
    }

    #[test]
    fn test_load_empty_tree() {
        let storage = memory_tree(2, 0).save_metadata().expect("save");
        let mut tree = BTree::load_metadata(storage, 4).expect("load");
        assert_eq!(tree.node_count(), 1);
        assert!(tree.entries().expect("entries").is_empty());
    }

    #[test]
    fn test_load_unfinalized_tree() {
        let mut tree = memory_tree(2, 0);
        for key in 0..20 {
            tree.insert(key).expect("insert");
        }
        let storage = tree.into_storage();

        let result = BTree::load_metadata(storage, 0);
        assert!(matches!(
            result,
            Err(BTreeError::Header(HeaderError::Unfinalized))
        ));
    }

    #[test]
    fn test_load_too_short() {
        let result = BTree::load_metadata(SimulatedStorage::new(1), 0);
        assert!(matches!(
            result,
            Err(BTreeError::Header(HeaderError::TooShort(0)))
        ));
    }

    #[test]
    fn test_reopen_and_extend() {
        let mut tree = memory_tree(2, 3);
        for key in 0..50u64 {
            tree.insert(key).expect("insert");
        }
        let storage = tree.save_metadata().expect("save");

        let mut tree = BTree::load_metadata(storage, 3).expect("load");
        let before = tree.node_count();
        for key in 25..100u64 {
            tree.insert(key).expect("insert");
        }
        assert!(tree.node_count() > before);
        let storage = tree.save_metadata().expect("save");

        let mut tree = BTree::load_metadata(storage, 0).expect("reload");
        let entries = tree.entries().expect("entries");
        assert_eq!(entries.len(), 100);
        for entry in entries {
            let expected = if (25..50).contains(&entry.key) { 2 } else { 1 };
            assert_eq!(entry.frequency, expected, "key {}", entry.key);
        }
    }

    #[test]
    fn test_write_error_propagates() {
        let mut tree = memory_tree(2, 0);
        tree.insert(1).expect("insert");
        tree.storage.set_fault_config(FaultConfig {
            write_error_rate: 1.0,
            ..FaultConfig::default()
        });

        let result = tree.insert(2);
        assert!(matches!(
            result,
            Err(BTreeError::Storage(StorageError::InjectedFault(_)))
        ));
    }

    #[test]
    fn test_read_error_propagates() {
        let mut tree = memory_tree(2, 0);
        for key in 0..10 {
            tree.insert(key).expect("insert");
        }
        tree.storage.set_fault_config(FaultConfig {
            read_error_rate: 1.0,
            ..FaultConfig::default()
        });

        assert!(matches!(tree.search(3), Err(BTreeError::Storage(_))));
    }

    #[test]
    fn test_flush_error_propagates_from_save() {
        let mut tree = memory_tree(2, 16);
        for key in 0..10 {
            tree.insert(key).expect("insert");
        }
        tree.storage.set_fault_config(FaultConfig {
            write_error_rate: 1.0,
            ..FaultConfig::default()
        });

        assert!(matches!(tree.save_metadata(), Err(BTreeError::Storage(_))));
    }

    #[test]
    fn test_traverse_stops_on_visitor_error() {
        let mut tree = memory_tree(2, 0);
        for key in 0..30 {
            tree.insert(key).expect("insert");
        }

        let mut seen = 0;
        let result = tree.traverse(|entry| {
            seen += 1;
            if entry.key == 9 {
                Err(BTreeError::OffsetOverflow)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(BTreeError::OffsetOverflow)));
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_optimal_degree_many_keys() {
        let mut tree = memory_tree(Degree::AUTO, 10);
        let keys = random_keys(3, 20_000, 1 << 20);
        for &key in &keys {
            tree.insert(key).expect("insert");
        }

        let root = tree.root().expect("root");
        assert!(!root.is_leaf);
        let entries = tree.entries().expect("entries");
        assert!(entries.windows(2).all(|w| w[0].key < w[1].key));
        let total: u64 = entries.iter().map(|e| u64::from(e.frequency)).sum();
        assert_eq!(total, 20_000);
    }

    #[test]
    fn test_btree_error_display() {
        assert!(BTreeError::InvalidDegree(1).to_string().contains("invalid degree 1"));
        let e = BTreeError::from(HeaderError::Unfinalized);
        assert!(e.to_string().contains("never written"));
    }
}
