//! Tree file I/O operations.
//!
//! This module handles positioned reads and writes against the tree file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::io::{Storage, StorageError};

/// A tree file handle with low-level record I/O operations.
///
/// The handle is released when the value is dropped, so a build session
/// closes the file exactly once when the finished tree is dropped.
#[derive(Debug)]
pub struct TreeFile {
    file: File,
    path: PathBuf,
}

impl TreeFile {
    /// Create a new tree file at the given path.
    ///
    /// An existing file at the same path is truncated: a build session always
    /// starts from an empty file.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing tree file for reading and writing.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing tree file read-only.
    ///
    /// Any attempt to write through the returned handle fails with an I/O error.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new().read(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for TreeFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let size = self.file.metadata()?.len();
        let end = offset.saturating_add(buf.len() as u64);
        if end > size {
            return Err(StorageError::OutOfBounds {
                offset,
                len: buf.len(),
                size,
            });
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> Result<u64, StorageError> {
        Ok(self.file.metadata()?.len())
    }
}
