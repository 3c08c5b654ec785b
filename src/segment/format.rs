//! On-disk segment layout.
//!
//! ```text
//! Segment file (<segment_id>.seg), little-endian
//! ├── Header (52 bytes)
//! │   magic u32 | version u32 | doc_count u32 | field_count u32
//! │   dict_offset u64 | dict_length u64
//! │   postings_offset u64 | postings_length u64
//! │   crc32 u32 (over the 48 bytes before it)
//! ├── Dictionary region
//! │   directory_length u32
//! │   Field directory: per field, ascending by name
//! │     name str | flags u8 | term_count u32 | block_count u32
//! │     per block: first_term str | offset u64 | length u32
//! │   Term blocks: entry_count varint, then per entry
//! │     term str | doc_freq varint | postings_offset varint | postings_length varint
//! └── Postings region
//!     per term, doc_freq times: doc delta varint [freq varint]
//! ```
//!
//! Strings are a `u16` byte length followed by UTF-8. Block offsets are
//! relative to the dictionary region, posting offsets to the postings region.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::{ClueError, Result};

/// Magic number for segment files "CSEG".
pub const SEGMENT_MAGIC: u32 = 0x4745_5343;

/// The only format version this build reads.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 52;

/// Bytes covered by the header checksum.
const CHECKSUMMED_LEN: usize = 48;

/// File extension of segment files.
pub const SEGMENT_EXTENSION: &str = "seg";

/// Field flag: postings carry term frequencies.
pub const FIELD_FLAG_FREQS: u8 = 0x01;

/// File name for a segment id.
pub fn segment_file_name(segment_id: &str) -> String {
    format!("{segment_id}.{SEGMENT_EXTENSION}")
}

/// Segment id for a file name, if it names a segment file.
pub fn segment_id_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SEGMENT_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .filter(|id| !id.is_empty())
}

/// What a field's postings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexOptions {
    /// Document ids only.
    Docs,
    /// Document ids and term frequencies.
    DocsAndFreqs,
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        self == IndexOptions::DocsAndFreqs
    }

    pub fn to_flags(self) -> u8 {
        match self {
            IndexOptions::Docs => 0,
            IndexOptions::DocsAndFreqs => FIELD_FLAG_FREQS,
        }
    }

    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags {
            0 => Some(IndexOptions::Docs),
            FIELD_FLAG_FREQS => Some(IndexOptions::DocsAndFreqs),
            _ => None,
        }
    }
}

/// A byte range inside the segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: u64,
    pub length: u64,
}

impl Region {
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Whether `[rel_offset, rel_offset + len)` lies inside this region.
    pub fn contains(&self, rel_offset: u64, len: u64) -> bool {
        rel_offset
            .checked_add(len)
            .is_some_and(|end| end <= self.length)
    }

    fn overlaps(&self, other: &Region) -> bool {
        if self.length == 0 || other.length == 0 {
            return false;
        }
        self.offset < other.offset + other.length && other.offset < self.offset + self.length
    }
}

/// Decoded segment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub version: u32,
    pub doc_count: u32,
    pub field_count: u32,
    pub dictionary: Region,
    pub postings: Region,
}

impl SegmentHeader {
    /// Encode the header, including its checksum.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        LittleEndian::write_u32(&mut buf[0..4], SEGMENT_MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        LittleEndian::write_u32(&mut buf[8..12], self.doc_count);
        LittleEndian::write_u32(&mut buf[12..16], self.field_count);
        LittleEndian::write_u64(&mut buf[16..24], self.dictionary.offset);
        LittleEndian::write_u64(&mut buf[24..32], self.dictionary.length);
        LittleEndian::write_u64(&mut buf[32..40], self.postings.offset);
        LittleEndian::write_u64(&mut buf[40..48], self.postings.length);
        let crc = crc32fast::hash(&buf[..CHECKSUMMED_LEN]);
        LittleEndian::write_u32(&mut buf[48..52], crc);
        buf
    }

    /// Decode and validate a header read from a file of `file_len` bytes.
    ///
    /// The version is checked before the checksum, since a future version
    /// may lay out its header differently. Region offsets are only trusted
    /// once the checksum matches.
    pub fn decode(segment_id: &str, bytes: &[u8], file_len: u64) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ClueError::corrupt(
                segment_id,
                format!("file too short for header ({} bytes)", bytes.len()),
            ));
        }

        let magic = LittleEndian::read_u32(&bytes[0..4]);
        if magic != SEGMENT_MAGIC {
            return Err(ClueError::corrupt(
                segment_id,
                format!("bad magic {magic:#010x}"),
            ));
        }

        let version = LittleEndian::read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(ClueError::IncompatibleVersion {
                segment: segment_id.to_string(),
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let stored_crc = LittleEndian::read_u32(&bytes[48..52]);
        let actual_crc = crc32fast::hash(&bytes[..CHECKSUMMED_LEN]);
        if stored_crc != actual_crc {
            return Err(ClueError::corrupt(
                segment_id,
                format!("header checksum mismatch (stored {stored_crc:#010x}, computed {actual_crc:#010x})"),
            ));
        }

        let header = SegmentHeader {
            version,
            doc_count: LittleEndian::read_u32(&bytes[8..12]),
            field_count: LittleEndian::read_u32(&bytes[12..16]),
            dictionary: Region {
                offset: LittleEndian::read_u64(&bytes[16..24]),
                length: LittleEndian::read_u64(&bytes[24..32]),
            },
            postings: Region {
                offset: LittleEndian::read_u64(&bytes[32..40]),
                length: LittleEndian::read_u64(&bytes[40..48]),
            },
        };
        header.check_regions(segment_id, file_len)?;
        Ok(header)
    }

    fn check_regions(&self, segment_id: &str, file_len: u64) -> Result<()> {
        for (name, region) in [("dictionary", &self.dictionary), ("postings", &self.postings)] {
            let in_bounds = region.offset >= HEADER_LEN as u64
                && region.end().is_some_and(|end| end <= file_len);
            if !in_bounds {
                return Err(ClueError::corrupt(
                    segment_id,
                    format!(
                        "{name} region [{}, +{}) outside file of {file_len} bytes",
                        region.offset, region.length
                    ),
                ));
            }
        }
        if self.dictionary.overlaps(&self.postings) {
            return Err(ClueError::corrupt(
                segment_id,
                "dictionary and postings regions overlap",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> SegmentHeader {
        SegmentHeader {
            version: FORMAT_VERSION,
            doc_count: 3,
            field_count: 1,
            dictionary: Region {
                offset: 52,
                length: 20,
            },
            postings: Region {
                offset: 72,
                length: 8,
            },
        }
    }

    #[test]
    fn test_header_encode_decode() {
        let header = sample_header();
        let bytes = header.encode();
        let decoded = SegmentHeader::decode("s", &bytes, 80).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample_header().encode();
        bytes[0] ^= 0xFF;
        let err = SegmentHeader::decode("s", &bytes, 80).unwrap_err();
        assert!(matches!(err, ClueError::CorruptSegment { .. }));
    }

    #[test]
    fn test_future_version() {
        let mut bytes = sample_header().encode();
        LittleEndian::write_u32(&mut bytes[4..8], 2);
        let err = SegmentHeader::decode("s", &bytes, 80).unwrap_err();
        assert!(matches!(
            err,
            ClueError::IncompatibleVersion {
                found: 2,
                supported: FORMAT_VERSION,
                ..
            }
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = sample_header().encode();
        bytes[8] = 99;
        let err = SegmentHeader::decode("s", &bytes, 80).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_region_outside_file() {
        let bytes = sample_header().encode();
        let err = SegmentHeader::decode("s", &bytes, 79).unwrap_err();
        assert!(err.to_string().contains("postings region"));
    }

    #[test]
    fn test_overlapping_regions() {
        let mut header = sample_header();
        header.postings.offset = 60;
        let bytes = header.encode();
        let err = SegmentHeader::decode("s", &bytes, 80).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_segment_file_names() {
        assert_eq!(segment_file_name("seg_0001"), "seg_0001.seg");
        assert_eq!(segment_id_from_file_name("seg_0001.seg"), Some("seg_0001"));
        assert_eq!(segment_id_from_file_name(".seg"), None);
        assert_eq!(segment_id_from_file_name("segments.json"), None);
        assert_eq!(segment_id_from_file_name("xseg"), None);
    }

    #[test]
    fn test_index_options_flags() {
        assert_eq!(IndexOptions::from_flags(0), Some(IndexOptions::Docs));
        assert_eq!(
            IndexOptions::from_flags(FIELD_FLAG_FREQS),
            Some(IndexOptions::DocsAndFreqs)
        );
        assert_eq!(IndexOptions::from_flags(0x80), None);
        assert!(IndexOptions::DocsAndFreqs.has_freqs());
    }
}
