//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! Tools for exercising the B-tree with:
//! - In-memory storage with seeded fault injection
//! - Reproducible random workloads of k-mer keys
//! - Structural and model invariant checking
//!
//! # Design Principles
//!
//! 1. All I/O goes through `Storage` and can be simulated
//! 2. All randomness is seeded for reproducibility
//! 3. Faults can be injected at any I/O boundary
//! 4. Given the same seed, execution is identical
//!
//! # Usage
//!
//! ```
//! use genebank::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_degree(3);
//! let result = Simulator::new(config).run(1000);
//!
//! assert!(result.passed());
//! ```

mod invariants;
mod simulator;
mod storage;
mod workload;

pub use invariants::{HistoryStats, InvariantViolation, OperationHistory, TreeInvariantChecker};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use storage::{FaultConfig, SimulatedStorage, SimulatedStorageStats};
pub use workload::{Operation, OperationGenerator, WorkloadConfig};
