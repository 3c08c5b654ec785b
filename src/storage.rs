//! Storage abstraction for reading index files.
//!
//! The engine only needs three capabilities from its backing store: list the
//! files of an index, open one of them, and read a block of bytes at an
//! offset. [`Storage`] and [`StorageInput`] capture exactly that, so segment
//! parsing can run against real directories or an in-memory fake.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod structured;

use file::{FileStorage, FileStorageConfig};
use memory::{MemoryStorage, MemoryStorageConfig};

/// A read-only view over a collection of named files.
pub trait Storage: Send + Sync + Debug {
    /// Names of all files in this storage, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Check whether a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Open a file for positional reads.
    ///
    /// Fails with [`ClueError::NotFound`](crate::ClueError::NotFound) if the
    /// file does not exist.
    fn open_input(&self, name: &str) -> Result<Arc<dyn StorageInput>>;

    /// Human-readable location, used in messages.
    fn location(&self) -> String;
}

/// An opened file supporting concurrent positional reads.
///
/// Implementations must not keep a shared cursor: two threads may call
/// [`read_block`](StorageInput::read_block) at the same time.
pub trait StorageInput: Send + Sync + Debug {
    /// Total size of the file in bytes.
    fn len(&self) -> u64;

    /// Whether the file is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes starting at `offset`.
    fn read_block(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// Backend selection.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    File(FileStorageConfig),
    Memory(MemoryStorageConfig),
}

/// Creates storage backends from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    /// Open the storage described by `config`.
    pub fn open(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File(file_config) => Ok(Arc::new(FileStorage::open(file_config)?)),
            StorageConfig::Memory(memory_config) => {
                Ok(Arc::new(MemoryStorage::new(memory_config)))
            }
        }
    }
}

/// Check that `[offset, offset + len)` lies within a file of `file_len` bytes.
pub(crate) fn check_range(offset: u64, len: usize, file_len: u64) -> bool {
    offset
        .checked_add(len as u64)
        .is_some_and(|end| end <= file_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 10, 10));
        assert!(check_range(10, 0, 10));
        assert!(!check_range(5, 6, 10));
        assert!(!check_range(u64::MAX, 1, u64::MAX));
    }

    #[test]
    fn test_factory_memory() {
        let storage = StorageFactory::open(StorageConfig::Memory(MemoryStorageConfig::default()))
            .unwrap();
        assert!(storage.list_files().unwrap().is_empty());
        assert_eq!(storage.location(), "memory");
    }

    #[test]
    fn test_factory_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = StorageFactory::open(StorageConfig::File(FileStorageConfig::new(&missing)))
            .unwrap_err();
        assert!(matches!(err, crate::ClueError::NotFound(_)));
    }
}
