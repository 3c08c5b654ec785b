//! Index open configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ClueError, Result};

/// Smallest accepted posting read buffer.
pub const MIN_READ_BUFFER_SIZE: usize = 16;

/// Options fixed at the moment an index is opened.
///
/// The value is passed explicitly to [`Index::open`](crate::Index::open);
/// there is no process-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Open in read-only mode. Read-only is the only supported mode.
    pub read_only: bool,
    /// Memory-map segment files instead of reading through file handles.
    pub use_mmap: bool,
    /// Bytes fetched per storage read while decoding a posting list.
    pub read_buffer_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            read_only: true,
            use_mmap: false,
            read_buffer_size: 4096,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Reject settings this build cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !self.read_only {
            return Err(ClueError::invalid_config(
                "only read-only mode is supported",
            ));
        }
        if self.read_buffer_size < MIN_READ_BUFFER_SIZE {
            return Err(ClueError::invalid_config(format!(
                "read_buffer_size must be at least {MIN_READ_BUFFER_SIZE}, got {}",
                self.read_buffer_size
            )));
        }
        Ok(())
    }
}
