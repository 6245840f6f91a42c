//! Write-back node cache.
//!
//! The cache sits between the tree algorithms and the backing store. All node
//! reads and writes go through it; with capacity 0 every operation falls
//! through to the store directly.
//!
//! # Design
//!
//! - Recency list (`VecDeque`), most recently used at the front
//! - Linear lookup by location; capacities are small next to tree fan-out
//! - Writes to a cached node only refresh its position and mark it dirty;
//!   the record is serialized when a dirty node is evicted or on `flush_all`
//! - Nodes that were only read are dropped on eviction without a write, so
//!   a read-only store can be cached
//!
//! # Invariants
//!
//! - `nodes.len() <= capacity`
//! - At most one cached copy per location; when present it is authoritative
//!   over the record on disk

use std::collections::VecDeque;

use crate::storage::btree::degree::Degree;
use crate::storage::btree::node::{Location, Node, NodeError};
use crate::storage::btree::tree::BTreeError;
use crate::storage::io::Storage;

/// Counters describing cache behaviour over a session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from memory.
    pub hits: u64,
    /// Reads that went to the store.
    pub misses: u64,
    /// Least recently used nodes dropped to make room.
    pub evictions: u64,
    /// Dirty nodes serialized by `flush_all`.
    pub flushed: u64,
    /// Records written to the store, for any reason.
    pub disk_writes: u64,
}

/// A cached node and whether it differs from its record on the store.
#[derive(Debug)]
struct CachedNode {
    node: Node,
    dirty: bool,
}

/// A bounded, recency-ordered, write-back cache of nodes.
#[derive(Debug)]
pub struct NodeCache {
    capacity: usize,
    nodes: VecDeque<CachedNode>,
    stats: CacheStats,
}

impl NodeCache {
    /// Create a cache holding at most `capacity` nodes.
    ///
    /// A capacity of 0 disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            nodes: VecDeque::with_capacity(capacity),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Number of nodes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether a node for `location` is held in memory.
    #[must_use]
    pub fn contains(&self, location: Location) -> bool {
        self.position(location).is_some()
    }

    /// Number of cached nodes not yet written to the store.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.nodes.iter().filter(|c| c.dirty).count()
    }

    /// Read the node at `location`.
    ///
    /// A cached node moves to the front. Otherwise the record is decoded from
    /// the store and, when caching is enabled, inserted at the front after
    /// evicting the least recently used node if the cache is full.
    pub fn read<S: Storage>(
        &mut self,
        storage: &mut S,
        degree: Degree,
        location: Location,
    ) -> Result<Node, BTreeError> {
        if let Some(index) = self.position(location) {
            self.stats.hits += 1;
            if let Some(cached) = self.nodes.remove(index) {
                let node = cached.node.clone();
                self.nodes.push_front(cached);
                return Ok(node);
            }
        }

        self.stats.misses += 1;
        let node = load(storage, degree, location)?;

        if self.is_enabled() {
            self.make_room(storage, degree)?;
            self.nodes.push_front(CachedNode {
                node: node.clone(),
                dirty: false,
            });
        }
        Ok(node)
    }

    /// Write `node` back.
    ///
    /// A node already cached replaces its cached copy and moves to the front
    /// without touching the store. Either way the cached copy is dirty. An uncached node is inserted at the front,
    /// evicting the least recently used node if the cache is full. With
    /// caching disabled the record is serialized immediately.
    pub fn write<S: Storage>(
        &mut self,
        storage: &mut S,
        degree: Degree,
        node: Node,
    ) -> Result<(), BTreeError> {
        if !self.is_enabled() {
            self.stats.disk_writes += 1;
            return store(storage, degree, &node);
        }

        if let Some(index) = self.position(node.location) {
            self.nodes.remove(index);
        } else {
            self.make_room(storage, degree)?;
        }
        self.nodes.push_front(CachedNode { node, dirty: true });
        Ok(())
    }

    /// Serialize every dirty node and empty the cache.
    ///
    /// Nodes are only dropped from memory once their record is written, so a
    /// failed flush leaves the unwritten nodes cached.
    pub fn flush_all<S: Storage>(
        &mut self,
        storage: &mut S,
        degree: Degree,
    ) -> Result<(), BTreeError> {
        let mut count = 0u64;
        while let Some(cached) = self.nodes.front() {
            if cached.dirty {
                store(storage, degree, &cached.node)?;
                self.stats.flushed += 1;
                self.stats.disk_writes += 1;
                count += 1;
            }
            self.nodes.pop_front();
        }

        tracing::debug!(count, "flushed node cache");
        Ok(())
    }

    fn position(&self, location: Location) -> Option<usize> {
        self.nodes.iter().position(|c| c.node.location == location)
    }

    /// Evict the least recently used node if the cache is at capacity,
    /// writing it out first when dirty.
    fn make_room<S: Storage>(&mut self, storage: &mut S, degree: Degree) -> Result<(), BTreeError> {
        if self.nodes.len() < self.capacity {
            return Ok(());
        }

        if let Some(victim) = self.nodes.back() {
            if victim.dirty {
                store(storage, degree, &victim.node)?;
                self.stats.disk_writes += 1;
            }
            tracing::trace!(
                location = victim.node.location,
                dirty = victim.dirty,
                "evicted node"
            );
            self.nodes.pop_back();
            self.stats.evictions += 1;
        }
        Ok(())
    }
}

/// Decode the record at `location` straight from the store.
fn load<S: Storage>(storage: &mut S, degree: Degree, location: Location) -> Result<Node, BTreeError> {
    let mut buf = vec![0u8; degree.record_length() as usize];
    storage.read_at(u64::from(location), &mut buf)?;

    let node = Node::decode(&buf, degree)?;
    if node.location != location {
        return Err(NodeError::LocationMismatch {
            expected: location,
            found: node.location,
        }
        .into());
    }
    Ok(node)
}

/// Serialize `node` into its own slot.
fn store<S: Storage>(storage: &mut S, degree: Degree, node: &Node) -> Result<(), BTreeError> {
    storage.write_at(u64::from(node.location), &node.encode(degree))?;
    Ok(())
}
