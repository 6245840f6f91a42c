//! Invariant checking for deterministic simulation testing.
//!
//! Two kinds of checks:
//! - Structural: walk every node of a tree and verify B-tree shape
//! - Model: compare the tree's contents with an independently kept
//!   expected state

use std::collections::BTreeMap;

use crate::storage::Storage;
use crate::storage::btree::{BTree, BTreeError, Node, SlotStatus};

/// Tracks inserts and the frequencies they should have produced.
#[derive(Debug, Default)]
pub struct OperationHistory {
    /// Expected frequency per key for every insert that succeeded.
    expected_state: BTreeMap<u64, u32>,
    successful_inserts: u64,
    failed_inserts: u64,
    successful_searches: u64,
    failed_searches: u64,
}

impl OperationHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an insert of `key`.
    pub fn record_insert(&mut self, key: u64, success: bool) {
        if success {
            self.successful_inserts += 1;
            let frequency = self.expected_state.entry(key).or_insert(0);
            *frequency = frequency.saturating_add(1);
        } else {
            self.failed_inserts += 1;
        }
    }

    /// Record a search.
    pub const fn record_search(&mut self, success: bool) {
        if success {
            self.successful_searches += 1;
        } else {
            self.failed_searches += 1;
        }
    }

    /// Number of operations recorded.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.successful_inserts
            + self.failed_inserts
            + self.successful_searches
            + self.failed_searches
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_operations: self.len(),
            successful_inserts: self.successful_inserts,
            failed_inserts: self.failed_inserts,
            successful_searches: self.successful_searches,
            failed_searches: self.failed_searches,
            unique_keys: self.expected_state.len(),
        }
    }

    /// Expected frequency of every key inserted so far.
    #[must_use]
    pub const fn expected_state(&self) -> &BTreeMap<u64, u32> {
        &self.expected_state
    }

    /// Expected frequency of `key`, if it was ever inserted.
    #[must_use]
    pub fn expected(&self, key: u64) -> Option<u32> {
        self.expected_state.get(&key).copied()
    }
}

/// Statistics about the operation history.
#[derive(Debug, Clone)]
pub struct HistoryStats {
    pub total_operations: u64,
    pub successful_inserts: u64,
    pub failed_inserts: u64,
    pub successful_searches: u64,
    pub failed_searches: u64,
    pub unique_keys: usize,
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Offset of the node the violation was found in, if any.
    pub location: Option<u32>,
    /// Additional context.
    pub context: String,
}

/// Structural checker for a whole tree.
///
/// Verifies for every reachable node:
/// - `key_count <= 2t - 1`, and `>= t - 1` outside the root
/// - keys strictly ascending and inside the separator bounds from the parent
/// - every counted slot is occupied with a non-zero frequency
/// - all leaves at the same depth
#[derive(Debug, Default)]
pub struct TreeInvariantChecker {
    violations: Vec<InvariantViolation>,
    leaf_depth: Option<usize>,
    nodes_visited: u64,
    entries_visited: u64,
}

impl TreeInvariantChecker {
    /// Walk `tree` and collect every violation.
    ///
    /// Storage and decode failures abort the walk and are returned as errors;
    /// shape problems are collected as violations.
    pub fn check<S: Storage>(tree: &mut BTree<S>) -> Result<Self, BTreeError> {
        let mut checker = Self::default();
        let root = tree.root()?;
        checker.check_node(tree, &root, Bounds::default(), 0, true)?;

        if checker.nodes_visited > u64::from(tree.node_count()) {
            checker.violations.push(InvariantViolation {
                description: "More reachable nodes than allocated".to_string(),
                location: None,
                context: format!(
                    "visited {}, node_count {}",
                    checker.nodes_visited,
                    tree.node_count()
                ),
            });
        }
        Ok(checker)
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Number of nodes reached from the root.
    #[must_use]
    pub const fn nodes_visited(&self) -> u64 {
        self.nodes_visited
    }

    /// Number of entries across all reachable nodes.
    #[must_use]
    pub const fn entries_visited(&self) -> u64 {
        self.entries_visited
    }

    /// Depth of the leaves (0 for a single-leaf tree).
    #[must_use]
    pub const fn height(&self) -> Option<usize> {
        self.leaf_depth
    }

    /// Compare the tree's contents with the expected state.
    pub fn check_against_model<S: Storage>(
        &mut self,
        tree: &mut BTree<S>,
        history: &OperationHistory,
    ) -> Result<(), BTreeError> {
        let actual: Vec<(u64, u32)> = tree
            .entries()?
            .into_iter()
            .map(|e| (e.key, e.frequency))
            .collect();
        let expected: Vec<(u64, u32)> = history
            .expected_state()
            .iter()
            .map(|(&k, &f)| (k, f))
            .collect();

        if actual.len() != expected.len() {
            self.violations.push(InvariantViolation {
                description: "Distinct key count differs from model".to_string(),
                location: None,
                context: format!("tree {}, model {}", actual.len(), expected.len()),
            });
        }

        if let Some((a, e)) = actual.iter().zip(&expected).find(|(a, e)| a != e) {
            self.violations.push(InvariantViolation {
                description: "Entry differs from model".to_string(),
                location: None,
                context: format!("tree {a:?}, model {e:?}"),
            });
        }
        Ok(())
    }

    fn violation(&mut self, node: &Node, description: &str, context: String) {
        self.violations.push(InvariantViolation {
            description: description.to_string(),
            location: Some(node.location),
            context,
        });
    }

    fn check_node<S: Storage>(
        &mut self,
        tree: &mut BTree<S>,
        node: &Node,
        bounds: Bounds,
        depth: usize,
        is_root: bool,
    ) -> Result<(), BTreeError> {
        self.nodes_visited += 1;
        self.entries_visited += node.key_count as u64;

        let degree = tree.degree();
        if node.key_count > degree.max_keys() {
            self.violation(
                node,
                "Node over capacity",
                format!("{} keys, max {}", node.key_count, degree.max_keys()),
            );
            return Ok(());
        }
        if !is_root && node.key_count < degree.min_keys() {
            self.violation(
                node,
                "Node under minimum occupancy",
                format!("{} keys, min {}", node.key_count, degree.min_keys()),
            );
        }

        for (i, entry) in node.keys().iter().enumerate() {
            if entry.status != SlotStatus::Occupied || entry.frequency == 0 {
                self.violation(
                    node,
                    "Counted slot not occupied",
                    format!("slot {i}: {entry:?}"),
                );
            }
            if !bounds.contains(entry.key) {
                self.violation(
                    node,
                    "Key outside separator bounds",
                    format!("slot {i}: key {} not in {bounds:?}", entry.key),
                );
            }
        }
        if node.keys().windows(2).any(|w| w[0].key >= w[1].key) {
            self.violation(node, "Keys not strictly ascending", String::new());
        }

        if node.is_leaf {
            match self.leaf_depth {
                None => self.leaf_depth = Some(depth),
                Some(expected) if expected != depth => self.violation(
                    node,
                    "Leaves at different depths",
                    format!("depth {depth}, expected {expected}"),
                ),
                Some(_) => {}
            }
            return Ok(());
        }

        if node.key_count == 0 {
            self.violation(node, "Internal node without keys", String::new());
            return Ok(());
        }

        for i in 0..=node.key_count {
            let child_bounds = Bounds {
                lower: if i == 0 { bounds.lower } else { Some(node.entries[i - 1].key) },
                upper: if i == node.key_count { bounds.upper } else { Some(node.entries[i].key) },
            };
            let child = tree.read_node(node.children[i])?;
            self.check_node(tree, &child, child_bounds, depth + 1, false)?;
        }
        Ok(())
    }
}

/// Exclusive key bounds inherited from ancestor separators.
#[derive(Debug, Clone, Copy, Default)]
struct Bounds {
    lower: Option<u64>,
    upper: Option<u64>,
}

impl Bounds {
    fn contains(self, key: u64) -> bool {
        self.lower.is_none_or(|l| key > l) && self.upper.is_none_or(|u| key < u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedStorage;
    use crate::storage::btree::Entry;

    #[test]
    fn test_operation_history_tracks_frequencies() {
        let mut history = OperationHistory::new();
        history.record_insert(5, true);
        history.record_insert(5, true);
        history.record_insert(6, false);
        history.record_search(true);

        assert_eq!(history.len(), 4);
        assert_eq!(history.expected(5), Some(2));
        assert_eq!(history.expected(6), None);

        let stats = history.stats();
        assert_eq!(stats.successful_inserts, 2);
        assert_eq!(stats.failed_inserts, 1);
        assert_eq!(stats.unique_keys, 1);
    }

    #[test]
    fn test_checker_accepts_valid_tree() {
        let mut tree = BTree::create(SimulatedStorage::new(1), 2, 0).expect("create");
        let mut history = OperationHistory::new();
        for key in (0..200u64).rev() {
            tree.insert(key % 70).expect("insert");
            history.record_insert(key % 70, true);
        }

        let mut checker = TreeInvariantChecker::check(&mut tree).expect("check");
        checker
            .check_against_model(&mut tree, &history)
            .expect("model check");

        assert!(!checker.has_violations(), "{:?}", checker.violations());
        assert_eq!(checker.entries_visited(), 70);
        assert!(checker.height().expect("height") >= 2);
    }

    #[test]
    fn test_checker_empty_tree() {
        let mut tree = BTree::create(SimulatedStorage::new(1), 3, 0).expect("create");
        let checker = TreeInvariantChecker::check(&mut tree).expect("check");
        assert!(!checker.has_violations());
        assert_eq!(checker.height(), Some(0));
        assert_eq!(checker.nodes_visited(), 1);
    }

    #[test]
    fn test_checker_detects_model_mismatch() {
        let mut tree = BTree::create(SimulatedStorage::new(1), 2, 0).expect("create");
        let mut history = OperationHistory::new();
        tree.insert(1).expect("insert");
        tree.insert(1).expect("insert");
        history.record_insert(1, true);

        let mut checker = TreeInvariantChecker::default();
        checker
            .check_against_model(&mut tree, &history)
            .expect("model check");
        assert!(checker.has_violations());
    }

    #[test]
    fn test_checker_detects_unsorted_keys() {
        let mut checker = TreeInvariantChecker::default();
        let mut tree = BTree::create(SimulatedStorage::new(1), 2, 0).expect("create");

        let mut node = tree.root().expect("root");
        node.entries[0] = Entry::new(9);
        node.entries[1] = Entry::new(3);
        node.key_count = 2;

        checker
            .check_node(&mut tree, &node, Bounds::default(), 0, true)
            .expect("check");
        assert!(
            checker
                .violations()
                .iter()
                .any(|v| v.description.contains("ascending"))
        );
    }

    #[test]
    fn test_bounds() {
        let bounds = Bounds {
            lower: Some(10),
            upper: Some(20),
        };
        assert!(bounds.contains(15));
        assert!(!bounds.contains(10));
        assert!(!bounds.contains(20));
        assert!(Bounds::default().contains(u64::MAX));
    }
}
