//! Segment reader.
//!
//! [`Segment::open`] validates the header and loads the field directory
//! with its block index. Term blocks and postings stay on storage and are
//! read on demand through the retained [`StorageInput`].

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};
use parking_lot::RwLock;

use crate::config::IndexConfig;
use crate::error::{ClueError, Result};
use crate::segment::SegmentInfo;
use crate::segment::dictionary::{
    self, BlockLimits, FieldEntry, PostingLocation, SegmentTermScan, TermDictionary, TermEntry,
};
use crate::segment::format::{HEADER_LEN, Region, SegmentHeader, segment_file_name};
use crate::segment::postings::PostingsCursor;
use crate::storage::{Storage, StorageInput};

/// One immutable on-disk segment.
#[derive(Debug)]
pub struct Segment {
    id: String,
    header: SegmentHeader,
    dictionary: TermDictionary,
    file_len: u64,
    read_buffer_size: usize,
    input: RwLock<Option<Arc<dyn StorageInput>>>,
}

impl Segment {
    /// Open the segment stored in `<segment_id>.seg`.
    ///
    /// Fails with `NotFound` if the file is missing, `IncompatibleVersion`
    /// for an unsupported format, and `CorruptSegment` for any structural
    /// problem in the header or field directory.
    pub fn open(storage: &dyn Storage, segment_id: &str, config: &IndexConfig) -> Result<Self> {
        let input = storage.open_input(&segment_file_name(segment_id))?;
        let file_len = input.len();

        if file_len < HEADER_LEN as u64 {
            return Err(ClueError::corrupt(
                segment_id,
                format!("file too short for header ({file_len} bytes)"),
            ));
        }
        let header_bytes = input.read_block(0, HEADER_LEN)?;
        let header = SegmentHeader::decode(segment_id, &header_bytes, file_len)?;

        let dict = header.dictionary;
        if dict.length < 4 {
            return Err(ClueError::corrupt(
                segment_id,
                "dictionary region too short for directory length",
            ));
        }
        let directory_len = LittleEndian::read_u32(&input.read_block(dict.offset, 4)?) as u64;
        if !dict.contains(4, directory_len) {
            return Err(ClueError::corrupt(
                segment_id,
                format!(
                    "field directory of {directory_len} bytes exceeds dictionary region of {}",
                    dict.length
                ),
            ));
        }
        let directory = input.read_block(dict.offset + 4, directory_len as usize)?;
        let dictionary = TermDictionary::parse(
            segment_id,
            &directory,
            header.field_count,
            4 + directory_len,
            dict.length,
        )?;

        debug!(
            "opened segment {segment_id}: {} docs, {} fields, {file_len} bytes",
            header.doc_count, header.field_count
        );

        Ok(Segment {
            id: segment_id.to_string(),
            header,
            dictionary,
            file_len,
            read_buffer_size: config.read_buffer_size,
            input: RwLock::new(Some(input)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn doc_count(&self) -> u32 {
        self.header.doc_count
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn fields(&self) -> &[FieldEntry] {
        self.dictionary.fields()
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.dictionary.field(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.dictionary.fields().iter().map(|f| f.name())
    }

    /// Summary of this segment, given its base document id in an index.
    pub fn info(&self, base_doc_id: u64) -> SegmentInfo {
        SegmentInfo {
            segment_id: self.id.clone(),
            version: self.header.version,
            doc_count: self.header.doc_count,
            base_doc_id,
            field_count: self.header.field_count,
            term_count: self.dictionary.term_count(),
            size_bytes: self.file_len,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.input.read().is_none()
    }

    /// Release the storage handle. Calling it again does nothing.
    pub fn close(&self) {
        if self.input.write().take().is_some() {
            debug!("closed segment {}", self.id);
        }
    }

    /// Find the posting location of `term` in `field`.
    pub fn lookup(&self, field: &str, term: &str) -> Result<Option<PostingLocation>> {
        if self.is_closed() {
            return Err(ClueError::UseAfterClose);
        }
        let Some(field_idx) = self.dictionary.field_index(field) else {
            return Ok(None);
        };
        let Some(block_idx) = self.dictionary.fields()[field_idx].block_for_term(term) else {
            return Ok(None);
        };

        let entries = self.load_block(field_idx, block_idx)?;
        Ok(entries
            .binary_search_by(|entry| entry.term.as_str().cmp(term))
            .ok()
            .map(|idx| entries[idx].location))
    }

    /// Start an independent ascending scan over terms of `field` that begin
    /// with `prefix`. An unknown field yields an empty scan.
    pub fn scan(self: &Arc<Self>, field: &str, prefix: &str) -> Result<SegmentTermScan> {
        if self.is_closed() {
            return Err(ClueError::UseAfterClose);
        }
        Ok(SegmentTermScan::new(Arc::clone(self), field, prefix))
    }

    /// Start decoding the posting list at `location` of `field`.
    pub fn postings(self: &Arc<Self>, field: &str, location: PostingLocation) -> Result<PostingsCursor> {
        if self.is_closed() {
            return Err(ClueError::UseAfterClose);
        }
        let entry = self.dictionary.field(field).ok_or_else(|| {
            ClueError::invalid_argument(format!("segment {} has no field '{field}'", self.id))
        })?;
        if !self.header.postings.contains(location.offset, location.length) {
            return Err(ClueError::invalid_argument(format!(
                "posting location {}+{} outside segment {}",
                location.offset, location.length, self.id
            )));
        }
        Ok(PostingsCursor::new(
            Arc::clone(self),
            location,
            entry.has_freqs(),
        ))
    }

    pub(crate) fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub(crate) fn postings_region(&self) -> Region {
        self.header.postings
    }

    pub(crate) fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Read `len` bytes at absolute file offset `offset`.
    pub(crate) fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let input = self
            .input
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(ClueError::UseAfterClose)?;
        input.read_block(offset, len)
    }

    /// Read and decode one term block.
    pub(crate) fn load_block(&self, field_idx: usize, block_idx: usize) -> Result<Vec<TermEntry>> {
        let field = &self.dictionary.fields()[field_idx];
        let block = &field.blocks()[block_idx];
        trace!(
            "loading block {block_idx} of field '{}' in segment {}",
            field.name(),
            self.id
        );

        let bytes = self.read_at(
            self.header.dictionary.offset + block.offset,
            block.length as usize,
        )?;
        let limits = BlockLimits {
            next_first_term: field
                .blocks()
                .get(block_idx + 1)
                .map(|next| next.first_term.as_str()),
            postings_len: self.header.postings.length,
            doc_count: self.header.doc_count,
        };
        dictionary::decode_block(&self.id, field, block_idx, &bytes, limits)
    }
}
