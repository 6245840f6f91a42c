//! Main simulator harness for deterministic simulation testing.
//!
//! Drives a `BTree` over `SimulatedStorage` with a generated workload and
//! checks it against an `OperationHistory` model. Without faults every run
//! must end with zero violations. With faults the run is fail-stop: the
//! first error ends it, and the error must be a propagated `Err` rather than
//! a panic.

use super::invariants::{InvariantViolation, OperationHistory, TreeInvariantChecker};
use super::storage::{FaultConfig, SimulatedStorage};
use super::workload::{Operation, OperationGenerator, WorkloadConfig};
use crate::storage::btree::{BTree, BTreeError};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Requested tree degree (0 for auto).
    pub degree: i64,
    /// Node cache capacity (0 disables caching).
    pub cache_capacity: usize,
    /// Fault injection configuration.
    pub fault_config: FaultConfig,
    /// Workload generation configuration.
    pub workload: WorkloadConfig,
    /// Run the structural check every this many operations (0 = only at end).
    pub check_interval: usize,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            degree: 2,
            cache_capacity: 4,
            fault_config: FaultConfig::default(),
            workload: WorkloadConfig::default(),
            check_interval: 250,
        }
    }

    #[must_use]
    pub const fn with_degree(mut self, degree: i64) -> Self {
        self.degree = degree;
        self
    }

    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_fault_config(mut self, config: FaultConfig) -> Self {
        self.fault_config = config;
        self
    }

    #[must_use]
    pub const fn with_workload(mut self, config: WorkloadConfig) -> Self {
        self.workload = config;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations executed (including the one that failed, if any).
    pub operations_processed: u64,
    pub inserts: u64,
    pub searches: u64,
    pub reopens: u64,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether every operation returned `Ok`.
    pub completed_successfully: bool,
    /// The error that stopped the run.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Whether the run completed without violations.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    history: OperationHistory,
    violations: Vec<InvariantViolation>,
    operations_processed: u64,
    inserts: u64,
    searches: u64,
    reopens: u64,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OperationGenerator::with_config(config.seed, config.workload.clone());
        Self {
            config,
            generator,
            history: OperationHistory::new(),
            violations: Vec::new(),
            operations_processed: 0,
            inserts: 0,
            searches: 0,
            reopens: 0,
        }
    }

    /// Run `operation_count` generated operations against a fresh tree.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        let storage =
            SimulatedStorage::with_config(self.config.seed, self.config.fault_config.clone());

        let error = match self.run_with_storage(storage, operation_count) {
            Ok(()) => None,
            Err(e) => {
                tracing::debug!(seed = self.config.seed, error = %e, "simulation stopped");
                Some(e.to_string())
            }
        };

        SimulationResult {
            seed: self.config.seed,
            operations_processed: self.operations_processed,
            inserts: self.inserts,
            searches: self.searches,
            reopens: self.reopens,
            invariant_violations: self.violations.clone(),
            completed_successfully: error.is_none(),
            error,
        }
    }

    fn run_with_storage(
        &mut self,
        storage: SimulatedStorage,
        operation_count: usize,
    ) -> Result<(), BTreeError> {
        let cache = self.config.cache_capacity;
        let mut tree = BTree::create(storage, self.config.degree, cache)?;

        for index in 0..operation_count {
            self.operations_processed += 1;

            match self.generator.next_operation() {
                Operation::Insert(key) => {
                    self.inserts += 1;
                    let result = tree.insert(key);
                    self.history.record_insert(key, result.is_ok());
                    result?;
                }
                Operation::Search(key) => {
                    self.searches += 1;
                    let result = tree.search(key);
                    self.history.record_search(result.is_ok());
                    let found = result?.map(|e| e.frequency);
                    if found != self.history.expected(key) {
                        self.violations.push(InvariantViolation {
                            description: "Search disagrees with model".to_string(),
                            location: None,
                            context: format!(
                                "op {index}: key {key}, tree {found:?}, model {:?}",
                                self.history.expected(key)
                            ),
                        });
                    }
                }
                Operation::Reopen => {
                    self.reopens += 1;
                    let storage = tree.save_metadata()?;
                    tree = BTree::load_metadata(storage, cache)?;
                }
            }

            let interval = self.config.check_interval;
            if interval > 0 && (index + 1) % interval == 0 {
                self.check(&mut tree)?;
            }
        }

        self.check(&mut tree)?;

        // The finalized file must reload to the same contents.
        let storage = tree.save_metadata()?;
        let mut reloaded = BTree::load_metadata(storage, 0)?;
        self.check(&mut reloaded)
    }

    fn check(&mut self, tree: &mut BTree<SimulatedStorage>) -> Result<(), BTreeError> {
        let mut checker = TreeInvariantChecker::check(tree)?;
        checker.check_against_model(tree, &self.history)?;
        self.violations.extend_from_slice(checker.violations());
        Ok(())
    }

    #[must_use]
    pub const fn history(&self) -> &OperationHistory {
        &self.history
    }
}
