//! Segment encoder.
//!
//! [`SegmentWriter`] serializes one complete, immutable segment into the
//! layout described in [`format`](crate::segment::format). It produces bytes
//! only; placing them in a directory is up to the caller. It is what tests,
//! benchmarks and fixtures use to build indexes for inspection.

use std::collections::BTreeMap;

use crate::error::{ClueError, Result};
use crate::segment::format::{FORMAT_VERSION, HEADER_LEN, IndexOptions, Region, SegmentHeader};
use crate::storage::structured::StructWriter;

/// Default number of terms per block.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

#[derive(Debug)]
struct FieldBuilder {
    options: IndexOptions,
    /// term -> doc id -> frequency
    terms: BTreeMap<String, BTreeMap<u32, u32>>,
}

struct BlockKey {
    first_term: String,
    offset: u64,
    length: u32,
}

/// Builds a single segment in memory.
#[derive(Debug)]
pub struct SegmentWriter {
    doc_count: u32,
    block_size: usize,
    fields: BTreeMap<String, FieldBuilder>,
}

impl SegmentWriter {
    /// Create a writer for a segment holding `doc_count` documents.
    pub fn new(doc_count: u32) -> Self {
        SegmentWriter {
            doc_count,
            block_size: DEFAULT_BLOCK_SIZE,
            fields: BTreeMap::new(),
        }
    }

    /// Set the number of terms per dictionary block.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Declare a field.
    pub fn add_field(&mut self, name: &str, options: IndexOptions) -> Result<()> {
        if name.is_empty() {
            return Err(ClueError::invalid_argument("field name must not be empty"));
        }
        if self.fields.contains_key(name) {
            return Err(ClueError::invalid_argument(format!(
                "field '{name}' already declared"
            )));
        }
        self.fields.insert(
            name.to_string(),
            FieldBuilder {
                options,
                terms: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Record that `term` occurs `freq` times in local document `doc_id`.
    ///
    /// The frequency is dropped for fields declared with
    /// [`IndexOptions::Docs`].
    pub fn add_posting(&mut self, field: &str, term: &str, doc_id: u32, freq: u32) -> Result<()> {
        if doc_id >= self.doc_count {
            return Err(ClueError::invalid_argument(format!(
                "doc id {doc_id} out of range for {} docs",
                self.doc_count
            )));
        }
        let builder = self
            .fields
            .get_mut(field)
            .ok_or_else(|| ClueError::invalid_argument(format!("unknown field '{field}'")))?;
        let postings = builder.terms.entry(term.to_string()).or_default();
        if postings.insert(doc_id, freq).is_some() {
            return Err(ClueError::invalid_argument(format!(
                "duplicate posting for '{field}:{term}' in doc {doc_id}"
            )));
        }
        Ok(())
    }

    /// Encode the segment.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut postings = StructWriter::new();
        let mut blocks = StructWriter::new();
        let mut block_keys: Vec<Vec<BlockKey>> = Vec::with_capacity(self.fields.len());

        for builder in self.fields.values() {
            let terms: Vec<_> = builder.terms.iter().collect();
            let mut keys = Vec::new();

            for chunk in terms.chunks(self.block_size) {
                let block_start = blocks.position();
                blocks.write_varint(chunk.len() as u64)?;

                for (term, docs) in chunk {
                    let posting_start = postings.position();
                    let mut prev: Option<u32> = None;
                    for (&doc_id, &freq) in docs.iter() {
                        let delta = match prev {
                            None => doc_id,
                            Some(p) => doc_id - p,
                        };
                        postings.write_varint(delta as u64)?;
                        if builder.options.has_freqs() {
                            postings.write_varint(freq as u64)?;
                        }
                        prev = Some(doc_id);
                    }

                    blocks.write_string(term)?;
                    blocks.write_varint(docs.len() as u64)?;
                    blocks.write_varint(posting_start)?;
                    blocks.write_varint(postings.position() - posting_start)?;
                }

                let length = u32::try_from(blocks.position() - block_start).map_err(|_| {
                    ClueError::invalid_argument("term block larger than u32::MAX bytes")
                })?;
                keys.push(BlockKey {
                    first_term: chunk[0].0.clone(),
                    offset: block_start,
                    length,
                });
            }
            block_keys.push(keys);
        }

        // The directory size does not depend on block offsets, so it can be
        // written once the blocks are laid out.
        let mut directory = StructWriter::new();
        let directory_len = {
            let mut probe = StructWriter::new();
            write_directory(&mut probe, &self.fields, &block_keys, 0)?;
            probe.position()
        };
        let blocks_start = 4 + directory_len;
        write_directory(&mut directory, &self.fields, &block_keys, blocks_start)?;

        let directory = directory.into_inner();
        let blocks = blocks.into_inner();
        let postings = postings.into_inner();

        let dictionary = Region {
            offset: HEADER_LEN as u64,
            length: blocks_start + blocks.len() as u64,
        };
        let header = SegmentHeader {
            version: FORMAT_VERSION,
            doc_count: self.doc_count,
            field_count: self.fields.len() as u32,
            dictionary,
            postings: Region {
                offset: dictionary.offset + dictionary.length,
                length: postings.len() as u64,
            },
        };

        let mut out = StructWriter::new();
        out.write_bytes(&header.encode())?;
        out.write_u32(directory_len as u32)?;
        out.write_bytes(&directory)?;
        out.write_bytes(&blocks)?;
        out.write_bytes(&postings)?;
        Ok(out.into_inner())
    }
}

fn write_directory(
    out: &mut StructWriter,
    fields: &BTreeMap<String, FieldBuilder>,
    block_keys: &[Vec<BlockKey>],
    blocks_start: u64,
) -> Result<()> {
    for ((name, builder), keys) in fields.iter().zip(block_keys) {
        out.write_string(name)?;
        out.write_u8(builder.options.to_flags())?;
        out.write_u32(builder.terms.len() as u32)?;
        out.write_u32(keys.len() as u32)?;
        for key in keys {
            out.write_string(&key.first_term)?;
            out.write_u64(blocks_start + key.offset)?;
            out.write_u32(key.length)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_postings() {
        let mut writer = SegmentWriter::new(2);
        writer.add_field("body", IndexOptions::Docs).unwrap();
        assert!(writer.add_field("body", IndexOptions::Docs).is_err());
        assert!(writer.add_posting("body", "cat", 2, 1).is_err());
        assert!(writer.add_posting("title", "cat", 0, 1).is_err());
        writer.add_posting("body", "cat", 0, 1).unwrap();
        assert!(writer.add_posting("body", "cat", 0, 1).is_err());
    }

    #[test]
    fn test_layout() {
        let mut writer = SegmentWriter::new(4);
        writer.add_field("body", IndexOptions::Docs).unwrap();
        writer.add_posting("body", "a", 2, 1).unwrap();
        writer.add_posting("body", "a", 3, 1).unwrap();
        let bytes = writer.finish().unwrap();

        let header = SegmentHeader::decode("s", &bytes[..HEADER_LEN], bytes.len() as u64).unwrap();
        assert_eq!(header.doc_count, 4);
        assert_eq!(header.field_count, 1);
        assert_eq!(header.postings.length, 2);
        let start = header.postings.offset as usize;
        // Deltas: first id is absolute, then +1.
        assert_eq!(&bytes[start..start + 2], &[2, 1]);
        assert_eq!(
            header.postings.offset + header.postings.length,
            bytes.len() as u64
        );
    }
}
