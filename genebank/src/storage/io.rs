//! Storage abstraction for deterministic simulation testing.
//!
//! This module provides a `Storage` trait that abstracts over byte-addressed
//! storage, allowing the B-tree to use real file I/O in production and
//! simulated in-memory storage in tests.
//!
//! # Design
//!
//! The trait is a minimal abstraction over what the tree actually needs:
//! - Positioned reads and writes of whole records
//! - File synchronization
//! - The current length of the backing store
//!
//! This allows for deterministic simulation testing where we can inject
//! faults at the storage level and check that they surface as errors.

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// Read past the end of the backing store.
    OutOfBounds { offset: u64, len: usize, size: u64 },
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OutOfBounds { offset, len, size } => write!(
                f,
                "read of {len} bytes at offset {offset} out of bounds (size: {size})"
            ),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::OutOfBounds { .. } | Self::InjectedFault(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over byte-addressed storage.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `read_at` returns the last content written at that range
/// - `write_at` past the current end extends the store (gaps read as zeros)
/// - `sync` makes all previous writes durable
pub trait Storage {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Returns an error if the range extends past the end of the store.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `bytes` starting at `offset`.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError>;

    /// Sync all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), StorageError>;

    /// Current length of the store in bytes.
    fn len(&self) -> Result<u64, StorageError>;

    /// Whether the store holds no bytes at all.
    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl<T: Storage + ?Sized> Storage for &mut T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write_at(offset, bytes)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        (**self).sync()
    }

    fn len(&self) -> Result<u64, StorageError> {
        (**self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let e = StorageError::OutOfBounds {
            offset: 100,
            len: 16,
            size: 50,
        };
        assert!(e.to_string().contains("offset 100"));
        assert!(e.to_string().contains("size: 50"));

        let e = StorageError::InjectedFault("test fault".to_string());
        assert!(e.to_string().contains("test fault"));
    }

    #[test]
    fn test_storage_error_source() {
        use std::error::Error;

        let e = StorageError::from(std::io::Error::other("disk gone"));
        assert!(e.source().is_some());
        assert!(StorageError::InjectedFault(String::new()).source().is_none());
    }
}
