//! Append-only node allocator.
//!
//! Node records are laid out back to back after the tree header. Each new
//! node gets the next free slot; slots are never reclaimed or moved.

use crate::storage::btree::degree::Degree;
use crate::storage::btree::node::{Location, Node};
use crate::storage::btree::tree::BTreeError;
use crate::storage::header::HEADER_SIZE_U32;

/// A bump allocator over fixed-size node records.
///
/// # Invariants
/// - `next_free == HEADER_SIZE + node_count * record_length`
#[derive(Debug, Clone)]
pub struct NodeAllocator {
    record_length: u32,
    next_free: Location,
    node_count: u32,
}

impl NodeAllocator {
    /// Create an allocator for a fresh tree file.
    #[must_use]
    pub const fn new(degree: Degree) -> Self {
        Self {
            record_length: degree.record_length(),
            next_free: HEADER_SIZE_U32,
            node_count: 0,
        }
    }

    /// Resume allocation in a tree that already holds `node_count` nodes.
    pub fn resume(degree: Degree, node_count: u32) -> Result<Self, BTreeError> {
        let next_free = degree
            .record_length()
            .checked_mul(node_count)
            .and_then(|used| used.checked_add(HEADER_SIZE_U32))
            .ok_or(BTreeError::OffsetOverflow)?;

        Ok(Self {
            record_length: degree.record_length(),
            next_free,
            node_count,
        })
    }

    /// Assign the next free slot to `node`.
    ///
    /// Returns the assigned location. Fails once offsets would no longer fit
    /// in 32 bits.
    pub fn allocate(&mut self, node: &mut Node) -> Result<Location, BTreeError> {
        let location = self.next_free;
        let next_free = location
            .checked_add(self.record_length)
            .ok_or(BTreeError::OffsetOverflow)?;

        node.location = location;
        self.next_free = next_free;
        self.node_count += 1;

        tracing::trace!(location, node_count = self.node_count, "allocated node");
        Ok(location)
    }

    /// Number of nodes allocated so far.
    #[must_use]
    pub const fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Offset the next node will be placed at.
    #[must_use]
    pub const fn next_free(&self) -> Location {
        self.next_free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_allocation_follows_header() {
        let degree = Degree::new(2).expect("degree");
        let mut alloc = NodeAllocator::new(degree);
        let mut node = Node::new(degree);

        let location = alloc.allocate(&mut node).expect("allocate");
        assert_eq!(location, 12);
        assert_eq!(node.location, 12);
        assert_eq!(alloc.node_count(), 1);
        assert_eq!(alloc.next_free(), 12 + 77);
    }

    #[test]
    fn test_allocations_are_contiguous() {
        let degree = Degree::new(3).expect("degree");
        let mut alloc = NodeAllocator::new(degree);

        let locations: Vec<Location> = (0..5)
            .map(|_| {
                let mut node = Node::new(degree);
                alloc.allocate(&mut node).expect("allocate")
            })
            .collect();

        assert_eq!(locations, vec![12, 129, 246, 363, 480]);
        assert_eq!(alloc.node_count(), 5);
    }

    #[test]
    fn test_resume() {
        let degree = Degree::new(3).expect("degree");
        let mut alloc = NodeAllocator::resume(degree, 5).expect("resume");
        assert_eq!(alloc.next_free(), 12 + 5 * 117);

        let mut node = Node::new(degree);
        assert_eq!(alloc.allocate(&mut node).expect("allocate"), 597);
        assert_eq!(alloc.node_count(), 6);
    }

    #[test]
    fn test_offset_overflow() {
        let degree = Degree::new(2).expect("degree");
        assert!(matches!(
            NodeAllocator::resume(degree, u32::MAX),
            Err(BTreeError::OffsetOverflow)
        ));

        let max_nodes = (u32::MAX - 12) / 77;
        let mut alloc = NodeAllocator::resume(degree, max_nodes).expect("resume");
        let mut node = Node::new(degree);
        assert!(matches!(
            alloc.allocate(&mut node),
            Err(BTreeError::OffsetOverflow)
        ));
    }
}
