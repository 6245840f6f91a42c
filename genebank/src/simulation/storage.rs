//! Simulated in-memory storage for deterministic testing.
//!
//! This module provides an in-memory implementation of the `Storage` trait
//! with support for fault injection:
//! - Read/write errors
//! - Byte-level corruption on read (bit flips)
//! - Torn writes (only a prefix of the bytes lands)
//! - Sync failures

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::{Storage, StorageError};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a read error (0.0 - 1.0).
    pub read_error_rate: f64,
    /// Probability of a write error (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Probability of a sync error (0.0 - 1.0).
    pub sync_error_rate: f64,
    /// Probability of corrupting the bytes returned by a read (0.0 - 1.0).
    pub corruption_rate: f64,
    /// Probability that only a prefix of a write lands (0.0 - 1.0).
    pub partial_write_rate: f64,
}

impl FaultConfig {
    /// No faults, for baseline runs.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Low fault rates, for stress runs.
    #[must_use]
    pub const fn low_faults() -> Self {
        Self {
            read_error_rate: 0.001,
            write_error_rate: 0.001,
            sync_error_rate: 0.001,
            corruption_rate: 0.0,
            partial_write_rate: 0.0,
        }
    }

    /// High error rates. Silent corruption stays off; it has to be asked for
    /// explicitly.
    #[must_use]
    pub const fn high_faults() -> Self {
        Self {
            read_error_rate: 0.05,
            write_error_rate: 0.05,
            sync_error_rate: 0.05,
            corruption_rate: 0.0,
            partial_write_rate: 0.0,
        }
    }
}

/// Statistics about simulated storage operations.
#[derive(Debug, Default, Clone)]
pub struct SimulatedStorageStats {
    /// Number of `read_at` calls.
    pub reads: u64,
    /// Number of `write_at` calls.
    pub writes: u64,
    /// Number of syncs.
    pub syncs: u64,
    /// Number of injected read errors.
    pub injected_read_errors: u64,
    /// Number of injected write errors.
    pub injected_write_errors: u64,
    /// Number of injected sync errors.
    pub injected_sync_errors: u64,
    /// Number of reads that returned flipped bits.
    pub corrupted_reads: u64,
    /// Number of torn writes.
    pub partial_writes: u64,
}

/// In-memory, growable byte store for deterministic testing.
///
/// Behaves like a file: writes past the end extend it with zeros, reads past
/// the end fail. Faults are drawn from a seeded RNG, so the same seed and
/// the same call sequence always fail in the same places.
///
/// # Thread Safety
///
/// Not thread-safe; simulations run on a single thread.
pub struct SimulatedStorage {
    bytes: Vec<u8>,
    fault_config: FaultConfig,
    rng: StdRng,
    stats: SimulatedStorageStats,
}

impl SimulatedStorage {
    /// Create an empty store with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, FaultConfig::default())
    }

    /// Create an empty store with the given fault configuration.
    #[must_use]
    pub fn with_config(seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            bytes: Vec::new(),
            fault_config,
            rng: StdRng::seed_from_u64(seed),
            stats: SimulatedStorageStats::default(),
        }
    }

    /// Current contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn stats(&self) -> &SimulatedStorageStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SimulatedStorageStats::default();
    }

    /// Update the fault configuration.
    pub fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
    }

    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    /// Flip 1-8 random bits.
    fn corrupt(&mut self, buf: &mut [u8]) {
        if buf.is_empty() {
            return;
        }
        let flips = self.rng.random_range(1..=8);
        for _ in 0..flips {
            let offset = self.rng.random_range(0..buf.len());
            let bit = self.rng.random_range(0..8u8);
            buf[offset] ^= 1 << bit;
        }
    }
}

impl Storage for SimulatedStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        self.stats.reads += 1;

        let size = self.bytes.len() as u64;
        let in_bounds = offset
            .checked_add(buf.len() as u64)
            .is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(StorageError::OutOfBounds {
                offset,
                len: buf.len(),
                size,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // offset < bytes.len()
        let start = offset as usize;

        if self.should_inject_fault(self.fault_config.read_error_rate) {
            self.stats.injected_read_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated read error".to_string(),
            ));
        }

        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);

        if self.should_inject_fault(self.fault_config.corruption_rate) {
            self.stats.corrupted_reads += 1;
            self.corrupt(buf);
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.stats.writes += 1;

        if self.should_inject_fault(self.fault_config.write_error_rate) {
            self.stats.injected_write_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated write error".to_string(),
            ));
        }

        let mut len = bytes.len();
        if self.should_inject_fault(self.fault_config.partial_write_rate) {
            self.stats.partial_writes += 1;
            len = self.rng.random_range(0..=bytes.len());
        }

        let start = usize::try_from(offset).map_err(|_| StorageError::OutOfBounds {
            offset,
            len: bytes.len(),
            size: self.bytes.len() as u64,
        })?;
        let end = start + bytes.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..start + len].copy_from_slice(&bytes[..len]);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.stats.syncs += 1;

        if self.should_inject_fault(self.fault_config.sync_error_rate) {
            self.stats.injected_sync_errors += 1;
            return Err(StorageError::InjectedFault(
                "simulated sync error".to_string(),
            ));
        }

        // Writes are already "durable" in memory
        Ok(())
    }

    fn len(&self) -> Result<u64, StorageError> {
        Ok(self.bytes.len() as u64)
    }
}
