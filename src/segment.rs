//! Immutable on-disk segments.
//!
//! A segment is one physical unit of an index: a header, a term dictionary
//! and a postings region in a single file. See [`format`] for the layout.

use serde::Serialize;

pub mod dictionary;
pub mod format;
pub mod postings;
pub mod reader;
pub mod writer;

pub use dictionary::{FieldEntry, PostingLocation, SegmentTermScan, TermEntry};
pub use format::IndexOptions;
pub use postings::{Posting, PostingsCursor};
pub use reader::Segment;

/// Reportable summary of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    pub segment_id: String,
    pub version: u32,
    pub doc_count: u32,
    /// Global id of this segment's local document 0.
    pub base_doc_id: u64,
    pub field_count: u32,
    /// Sum of per-field term counts.
    pub term_count: u64,
    pub size_bytes: u64,
}
