//! In-memory storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ClueError, Result};
use crate::storage::{Storage, StorageInput, check_range};

/// Configuration for [`MemoryStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageConfig {
    /// Initial files.
    pub files: Vec<(String, Vec<u8>)>,
}

/// Storage that keeps every file in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Arc<[u8]>>>,
}

impl MemoryStorage {
    pub fn new(config: MemoryStorageConfig) -> Self {
        let storage = MemoryStorage::default();
        for (name, data) in config.files {
            storage.insert(name, data);
        }
        storage
    }

    /// Add or replace a file.
    pub fn insert<S: Into<String>>(&self, name: S, data: Vec<u8>) {
        self.files.write().insert(name.into(), Arc::from(data));
    }

    /// Remove a file, returning whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.files.write().remove(name).is_some()
    }
}

impl Storage for MemoryStorage {
    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn open_input(&self, name: &str) -> Result<Arc<dyn StorageInput>> {
        let data = self
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ClueError::not_found(format!("file {name}")))?;
        Ok(Arc::new(MemoryInput { data }))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Input over a shared byte buffer; later `insert`s do not affect it.
#[derive(Debug)]
struct MemoryInput {
    data: Arc<[u8]>,
}

impl StorageInput for MemoryInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_block(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if !check_range(offset, len, self.len()) {
            return Err(ClueError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read of {len} bytes at {offset} past end of file"),
            )));
        }
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_read() {
        let storage = MemoryStorage::default();
        storage.insert("z.seg", vec![1, 2, 3]);
        storage.insert("a.seg", vec![4]);

        assert_eq!(storage.list_files().unwrap(), vec!["a.seg", "z.seg"]);
        let input = storage.open_input("z.seg").unwrap();
        assert_eq!(input.read_block(1, 2).unwrap(), vec![2, 3]);
        assert!(input.read_block(2, 2).is_err());
    }

    #[test]
    fn test_open_input_snapshot() {
        let storage = MemoryStorage::new(MemoryStorageConfig {
            files: vec![("a".to_string(), vec![1])],
        });
        let input = storage.open_input("a").unwrap();
        storage.insert("a", vec![9, 9]);
        assert_eq!(input.len(), 1);
        assert!(storage.remove("a"));
        assert!(matches!(
            storage.open_input("a").unwrap_err(),
            ClueError::NotFound(_)
        ));
    }
}
