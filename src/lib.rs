//! # Clue
//!
//! Read-only inspection of on-disk inverted indexes.
//!
//! An index is a directory of immutable segment files. [`Index`] opens all
//! of them and answers introspection requests: field names, document
//! counts, prefix scans over the term dictionary and per-term postings with
//! index-wide document ids.
//!
//! ```no_run
//! use clue::{Index, IndexConfig};
//!
//! let index = Index::open_dir("/var/data/idx", IndexConfig::default())?;
//! for stat in index.term_scan("body", "ca")? {
//!     let stat = stat?;
//!     println!("{} {}", stat.term, stat.doc_freq);
//! }
//! index.close()?;
//! # Ok::<(), clue::ClueError>(())
//! ```

pub mod config;
mod error;
pub mod index;
pub mod segment;
pub mod storage;
mod util;

// Re-exports for the public API
pub use config::IndexConfig;
pub use error::{ClueError, ErrorKind, Result};
pub use index::{FieldInfo, GlobalPosting, Index, MergedPostings, TermScan, TermStat};
pub use segment::{IndexOptions, SegmentInfo};
pub use storage::{Storage, StorageConfig, StorageFactory};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
