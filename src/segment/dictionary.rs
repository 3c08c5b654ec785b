//! Term dictionary of a segment.
//!
//! Each field keeps a sorted block index in memory: the first term of every
//! term block plus the block's location. Point lookups binary-search the
//! index to pick one block and then binary-search inside it; prefix scans
//! start at the block that may hold the prefix and walk forward. Term blocks
//! themselves are read from storage only when a lookup or scan reaches them.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ClueError, Result};
use crate::segment::format::IndexOptions;
use crate::segment::reader::Segment;
use crate::storage::structured::StructReader;

/// Smallest encoded field directory entry: one-byte name, flags and counts.
const MIN_FIELD_ENTRY_LEN: usize = 2 + 1 + 1 + 4 + 4;

/// Smallest encoded block reference: empty first term, offset and length.
const MIN_BLOCK_REF_LEN: usize = 2 + 8 + 4;

/// Where a term's posting list lives inside the postings region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostingLocation {
    /// Offset relative to the postings region.
    pub offset: u64,
    /// Encoded length in bytes.
    pub length: u64,
    /// Number of documents in the list.
    pub doc_freq: u32,
}

/// A term together with its posting location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    pub term: String,
    pub location: PostingLocation,
}

/// Index entry for one term block.
#[derive(Debug, Clone)]
pub struct BlockRef {
    pub first_term: String,
    /// Offset relative to the dictionary region.
    pub offset: u64,
    pub length: u32,
}

/// Per-field dictionary metadata.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    name: String,
    options: IndexOptions,
    term_count: u32,
    blocks: Vec<BlockRef>,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_freqs(&self) -> bool {
        self.options.has_freqs()
    }

    pub fn term_count(&self) -> u32 {
        self.term_count
    }

    pub fn blocks(&self) -> &[BlockRef] {
        &self.blocks
    }

    /// The only block that can contain `term`.
    pub fn block_for_term(&self, term: &str) -> Option<usize> {
        let after = self
            .blocks
            .partition_point(|block| block.first_term.as_str() <= term);
        after.checked_sub(1)
    }

    /// The first block that can contain a term starting with `prefix`.
    pub fn first_block_for_prefix(&self, prefix: &str) -> usize {
        let after = self
            .blocks
            .partition_point(|block| block.first_term.as_str() <= prefix);
        after.saturating_sub(1)
    }
}

/// Field directory and block index of one segment.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    fields: Vec<FieldEntry>,
}

impl TermDictionary {
    /// Parse the field directory.
    ///
    /// `blocks_start` is where term blocks begin and `region_len` the length
    /// of the dictionary region; every block must fit between them.
    pub fn parse(
        segment_id: &str,
        directory: &[u8],
        field_count: u32,
        blocks_start: u64,
        region_len: u64,
    ) -> Result<Self> {
        let mut reader = StructReader::new(segment_id, directory);
        if field_count as usize > directory.len() / MIN_FIELD_ENTRY_LEN {
            return Err(reader.corrupt(format!(
                "{field_count} fields cannot fit in a directory of {} bytes",
                directory.len()
            )));
        }
        let mut fields: Vec<FieldEntry> = Vec::with_capacity(field_count as usize);

        for _ in 0..field_count {
            let name = reader.read_string()?;
            if name.is_empty() {
                return Err(reader.corrupt("empty field name"));
            }
            if let Some(prev) = fields.last()
                && prev.name >= name
            {
                return Err(reader.corrupt(format!(
                    "field '{name}' out of order or duplicated after '{}'",
                    prev.name
                )));
            }

            let flags = reader.read_u8()?;
            let options = IndexOptions::from_flags(flags).ok_or_else(|| {
                reader.corrupt(format!("unknown flags {flags:#04x} on field '{name}'"))
            })?;
            let term_count = reader.read_u32()?;
            let block_count = reader.read_u32()?;
            if (term_count == 0) != (block_count == 0) || block_count > term_count {
                return Err(reader.corrupt(format!(
                    "field '{name}' has {term_count} terms in {block_count} blocks"
                )));
            }

            if block_count as usize > reader.remaining() / MIN_BLOCK_REF_LEN {
                return Err(reader.corrupt(format!(
                    "field '{name}' declares {block_count} blocks but only {} directory bytes remain",
                    reader.remaining()
                )));
            }
            let mut blocks: Vec<BlockRef> = Vec::with_capacity(block_count as usize);
            for _ in 0..block_count {
                let first_term = reader.read_string()?;
                let offset = reader.read_u64()?;
                let length = reader.read_u32()?;

                if let Some(prev) = blocks.last()
                    && prev.first_term >= first_term
                {
                    return Err(reader.corrupt(format!(
                        "duplicate or unordered block key '{first_term}' in field '{name}'"
                    )));
                }
                let in_bounds = offset >= blocks_start
                    && offset
                        .checked_add(length as u64)
                        .is_some_and(|end| end <= region_len);
                if !in_bounds {
                    return Err(reader.corrupt(format!(
                        "term block at {offset} (+{length}) of field '{name}' outside dictionary region"
                    )));
                }

                blocks.push(BlockRef {
                    first_term,
                    offset,
                    length,
                });
            }

            fields.push(FieldEntry {
                name,
                options,
                term_count,
                blocks,
            });
        }

        if !reader.is_empty() {
            return Err(reader.corrupt(format!(
                "{} trailing bytes after field directory",
                reader.remaining()
            )));
        }

        Ok(TermDictionary { fields })
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Position of a field in [`fields`](Self::fields).
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.field_index(name).map(|idx| &self.fields[idx])
    }

    /// Total number of terms over all fields.
    pub fn term_count(&self) -> u64 {
        self.fields.iter().map(|f| f.term_count as u64).sum()
    }
}

/// Limits a decoded block is validated against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLimits<'a> {
    pub next_first_term: Option<&'a str>,
    pub postings_len: u64,
    pub doc_count: u32,
}

/// Decode one term block, enforcing ordering and bounds.
pub(crate) fn decode_block(
    segment_id: &str,
    field: &FieldEntry,
    block_idx: usize,
    bytes: &[u8],
    limits: BlockLimits<'_>,
) -> Result<Vec<TermEntry>> {
    let block = &field.blocks[block_idx];
    let mut reader = StructReader::new(segment_id, bytes);
    let entry_count = reader.read_varint()?;
    if entry_count == 0 || entry_count > bytes.len() as u64 {
        return Err(reader.corrupt(format!(
            "block {block_idx} of field '{}' claims {entry_count} entries",
            field.name
        )));
    }

    let mut entries: Vec<TermEntry> = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let term = reader.read_string()?;
        let doc_freq = reader.read_varint()?;
        let offset = reader.read_varint()?;
        let length = reader.read_varint()?;

        match entries.last() {
            None if term != block.first_term => {
                return Err(reader.corrupt(format!(
                    "block {block_idx} of field '{}' starts with '{term}', index says '{}'",
                    field.name, block.first_term
                )));
            }
            Some(prev) if prev.term >= term => {
                return Err(reader.corrupt(format!(
                    "duplicate or unordered term '{term}' after '{}' in field '{}'",
                    prev.term, field.name
                )));
            }
            _ => {}
        }

        if doc_freq == 0 || doc_freq > limits.doc_count as u64 {
            return Err(reader.corrupt(format!(
                "term '{term}' has doc_freq {doc_freq} in a segment of {} docs",
                limits.doc_count
            )));
        }
        let fits = length >= doc_freq
            && offset
                .checked_add(length)
                .is_some_and(|end| end <= limits.postings_len);
        if !fits {
            return Err(reader.corrupt(format!(
                "postings of term '{term}' at {offset} (+{length}) outside postings region"
            )));
        }

        entries.push(TermEntry {
            term,
            location: PostingLocation {
                offset,
                length,
                doc_freq: doc_freq as u32,
            },
        });
    }

    if !reader.is_empty() {
        return Err(reader.corrupt(format!(
            "{} trailing bytes in block {block_idx} of field '{}'",
            reader.remaining(),
            field.name
        )));
    }
    if let (Some(last), Some(next)) = (entries.last(), limits.next_first_term)
        && last.term.as_str() >= next
    {
        return Err(ClueError::corrupt(
            segment_id,
            format!(
                "term '{}' in block {block_idx} overlaps next block starting at '{next}'",
                last.term
            ),
        ));
    }

    Ok(entries)
}

/// Forward cursor over the terms of one field in one segment that start
/// with a prefix, in ascending order.
///
/// Each call to [`Segment::scan`] builds a fresh, independent cursor.
#[derive(Debug)]
pub struct SegmentTermScan {
    segment: Arc<Segment>,
    field_idx: Option<usize>,
    prefix: String,
    next_block: usize,
    entries: std::vec::IntoIter<TermEntry>,
    done: bool,
}

impl SegmentTermScan {
    pub(crate) fn new(segment: Arc<Segment>, field: &str, prefix: &str) -> Self {
        let field_idx = segment.dictionary().field_index(field);
        let next_block = field_idx
            .map(|idx| segment.dictionary().fields()[idx].first_block_for_prefix(prefix))
            .unwrap_or(0);
        SegmentTermScan {
            segment,
            field_idx,
            prefix: prefix.to_string(),
            next_block,
            entries: Vec::new().into_iter(),
            done: field_idx.is_none(),
        }
    }

    fn advance(&mut self) -> Result<Option<TermEntry>> {
        if self.segment.is_closed() {
            return Err(ClueError::UseAfterClose);
        }
        let Some(field_idx) = self.field_idx else {
            return Ok(None);
        };

        loop {
            if let Some(entry) = self.entries.next() {
                if entry.term.as_str() < self.prefix.as_str() {
                    continue;
                }
                if entry.term.starts_with(&self.prefix) {
                    return Ok(Some(entry));
                }
                return Ok(None);
            }

            let block_count = self.segment.dictionary().fields()[field_idx].blocks().len();
            if self.next_block >= block_count {
                return Ok(None);
            }
            let entries = self.segment.load_block(field_idx, self.next_block)?;
            self.entries = entries.into_iter();
            self.next_block += 1;
        }
    }
}

impl Iterator for SegmentTermScan {
    type Item = Result<TermEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
