//! Operation generator for deterministic simulation testing.
//!
//! Produces random but reproducible sequences of tree operations. Keys are
//! encoded k-mers; a pool of previously drawn keys is reused so that
//! duplicate folding is exercised as heavily as fresh inserts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kmer::MAX_KMER_LENGTH;

/// Configuration for workload generation.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// K-mer length keys are drawn for (1..=31).
    pub kmer_length: u32,
    /// Probability of a search instead of an insert.
    pub search_rate: f64,
    /// Probability of closing and reopening the tree.
    pub reopen_rate: f64,
    /// Probability of reusing a previously drawn key.
    pub repeat_rate: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            kmer_length: 6,
            search_rate: 0.2,
            reopen_rate: 0.005,
            repeat_rate: 0.4,
        }
    }
}

/// A single simulated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Insert one occurrence of the key.
    Insert(u64),
    /// Look the key up and compare with the model.
    Search(u64),
    /// Finalize the tree and load it again from the same store.
    Reopen,
}

/// Generator for random `Operation` sequences.
pub struct OperationGenerator {
    rng: StdRng,
    config: WorkloadConfig,
    key_space: u64,
    drawn: Vec<u64>,
}

impl OperationGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        let length = config.kmer_length.clamp(1, MAX_KMER_LENGTH);
        Self {
            rng: StdRng::seed_from_u64(seed),
            key_space: 1u64 << (2 * length),
            config,
            drawn: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Number of distinct encodings for the configured k-mer length.
    #[must_use]
    pub const fn key_space(&self) -> u64 {
        self.key_space
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let roll = self.rng.random::<f64>();
        if roll < self.config.reopen_rate {
            return Operation::Reopen;
        }
        let key = self.next_key();
        if roll < self.config.reopen_rate + self.config.search_rate {
            Operation::Search(key)
        } else {
            Operation::Insert(key)
        }
    }

    fn next_key(&mut self) -> u64 {
        if !self.drawn.is_empty() && self.rng.random::<f64>() < self.config.repeat_rate {
            let index = self.rng.random_range(0..self.drawn.len());
            return self.drawn[index];
        }
        let key = self.rng.random_range(0..self.key_space);
        self.drawn.push(key);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_generator_deterministic() {
        let mut a = OperationGenerator::new(42);
        let mut b = OperationGenerator::new(42);
        for _ in 0..500 {
            assert_eq!(a.next_operation(), b.next_operation());
        }
    }

    #[test]
    fn test_keys_stay_in_kmer_space() {
        let config = WorkloadConfig {
            kmer_length: 3,
            ..WorkloadConfig::default()
        };
        let mut generator = OperationGenerator::with_config(7, config);
        assert_eq!(generator.key_space(), 64);

        for _ in 0..1_000 {
            match generator.next_operation() {
                Operation::Insert(key) | Operation::Search(key) => assert!(key < 64),
                Operation::Reopen => {}
            }
        }
    }

    #[test]
    fn test_mix_follows_rates() {
        let config = WorkloadConfig {
            search_rate: 0.0,
            reopen_rate: 0.0,
            ..WorkloadConfig::default()
        };
        let mut generator = OperationGenerator::with_config(1, config);
        assert!(
            (0..200).all(|_| matches!(generator.next_operation(), Operation::Insert(_)))
        );
    }

    #[test]
    fn test_longest_kmer_space() {
        let config = WorkloadConfig {
            kmer_length: 31,
            ..WorkloadConfig::default()
        };
        let generator = OperationGenerator::with_config(1, config);
        assert_eq!(generator.key_space(), 1 << 62);
    }
}
