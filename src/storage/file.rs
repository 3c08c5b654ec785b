//! File system storage.
//!
//! A [`FileStorage`] is rooted at one index directory. Files are opened
//! either through a mutex-guarded handle with seek + read, or through a
//! read-only memory map when [`FileStorageConfig::use_mmap`] is set.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::error::{ClueError, Result};
use crate::storage::{Storage, StorageInput, check_range};

/// Configuration for [`FileStorage`].
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// The index directory.
    pub path: PathBuf,
    /// Memory-map files instead of reading through a file handle.
    pub use_mmap: bool,
}

impl FileStorageConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStorageConfig {
            path: path.as_ref().to_path_buf(),
            use_mmap: false,
        }
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }
}

/// Storage backed by a directory on the local file system.
#[derive(Debug)]
pub struct FileStorage {
    config: FileStorageConfig,
}

impl FileStorage {
    /// Open an existing directory.
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        if !config.path.is_dir() {
            return Err(ClueError::not_found(format!(
                "index directory {}",
                config.path.display()
            )));
        }
        Ok(FileStorage { config })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl Storage for FileStorage {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.config.path.join(name).is_file()
    }

    fn open_input(&self, name: &str) -> Result<Arc<dyn StorageInput>> {
        let path = self.config.path.join(name);
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ClueError::not_found(format!("file {}", path.display())),
            _ => ClueError::Io(e),
        })?;
        let len = file.metadata()?.len();

        if self.config.use_mmap && len > 0 {
            // SAFETY: segment files are immutable once written; the index is
            // only ever opened read-only.
            let map = unsafe { Mmap::map(&file)? };
            debug!("memory-mapped {} ({len} bytes)", path.display());
            return Ok(Arc::new(MmapInput { map }));
        }

        Ok(Arc::new(FileInput {
            file: Mutex::new(file),
            len,
        }))
    }

    fn location(&self) -> String {
        self.config.path.display().to_string()
    }
}

/// File handle input; the mutex serializes the seek + read pair.
#[derive(Debug)]
struct FileInput {
    file: Mutex<File>,
    len: u64,
}

impl StorageInput for FileInput {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_block(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if !check_range(offset, len, self.len) {
            return Err(ClueError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {len} bytes at {offset} past end of file ({})", self.len),
            )));
        }
        let mut buf = vec![0u8; len];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Memory-mapped input.
#[derive(Debug)]
struct MmapInput {
    map: Mmap,
}

impl StorageInput for MmapInput {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_block(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if !check_range(offset, len, self.len()) {
            return Err(ClueError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {len} bytes at {offset} past end of file ({})",
                    self.len()
                ),
            )));
        }
        let start = offset as usize;
        Ok(self.map[start..start + len].to_vec())
    }
}
