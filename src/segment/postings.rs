//! Posting list decoding.
//!
//! Document ids are delta-encoded, so a list can only be decoded front to
//! back. [`PostingsCursor`] is therefore a single forward cursor: it is not
//! `Clone` and cannot be rewound. Bytes are pulled from storage in chunks of
//! [`IndexConfig::read_buffer_size`](crate::IndexConfig::read_buffer_size).

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ClueError, Result};
use crate::segment::dictionary::PostingLocation;
use crate::segment::reader::Segment;
use crate::util::varint::{self, MAX_VARINT_LEN};

/// One decoded posting with a segment-local document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub doc_id: u32,
    /// `None` when the field does not record frequencies.
    pub freq: Option<u32>,
}

/// Single-pass decoder over one term's posting list.
#[derive(Debug)]
pub struct PostingsCursor {
    segment: Arc<Segment>,
    /// Absolute file offset of the next byte not yet buffered.
    next_offset: u64,
    /// Absolute file offset one past the list.
    end_offset: u64,
    buf: Vec<u8>,
    pos: usize,
    doc_freq: u32,
    remaining: u32,
    last_doc: Option<u32>,
    has_freqs: bool,
    done: bool,
}

impl PostingsCursor {
    pub(crate) fn new(segment: Arc<Segment>, location: PostingLocation, has_freqs: bool) -> Self {
        let start = segment.postings_region().offset + location.offset;
        PostingsCursor {
            segment,
            next_offset: start,
            end_offset: start + location.length,
            buf: Vec::new(),
            pos: 0,
            doc_freq: location.doc_freq,
            remaining: location.doc_freq,
            last_doc: None,
            has_freqs,
            done: false,
        }
    }

    /// Number of postings in the whole list.
    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    fn corrupt(&self, reason: String) -> ClueError {
        ClueError::corrupt(self.segment.id(), reason)
    }

    /// Make at least `want` unread bytes available, or everything left.
    fn fill(&mut self, want: usize) -> Result<()> {
        while self.buf.len() - self.pos < want && self.next_offset < self.end_offset {
            self.buf.drain(..self.pos);
            self.pos = 0;
            let chunk = (self.end_offset - self.next_offset)
                .min(self.segment.read_buffer_size() as u64) as usize;
            let bytes = self.segment.read_at(self.next_offset, chunk)?;
            self.buf.extend_from_slice(&bytes);
            self.next_offset += chunk as u64;
        }
        Ok(())
    }

    fn read_varint(&mut self, what: &str) -> Result<u64> {
        self.fill(MAX_VARINT_LEN)?;
        match varint::decode_u64(&self.buf[self.pos..]) {
            Ok((value, used)) => {
                self.pos += used;
                Ok(value)
            }
            Err(e) => Err(self.corrupt(format!(
                "{e} reading {what} of posting {} of {}",
                self.doc_freq - self.remaining + 1,
                self.doc_freq
            ))),
        }
    }

    fn advance(&mut self) -> Result<Option<Posting>> {
        if self.segment.is_closed() {
            return Err(ClueError::UseAfterClose);
        }

        if self.remaining == 0 {
            self.fill(1)?;
            if self.pos < self.buf.len() {
                return Err(self.corrupt(format!(
                    "trailing bytes after {} postings",
                    self.doc_freq
                )));
            }
            return Ok(None);
        }

        let delta = self.read_varint("doc delta")?;
        let doc = match self.last_doc {
            None => delta,
            Some(prev) => {
                if delta == 0 {
                    return Err(self.corrupt(format!(
                        "non-increasing doc id after {prev} (zero delta)"
                    )));
                }
                (prev as u64).checked_add(delta).ok_or_else(|| {
                    self.corrupt(format!("doc delta {delta} overflows after {prev}"))
                })?
            }
        };
        if doc >= self.segment.doc_count() as u64 {
            return Err(self.corrupt(format!(
                "doc id {doc} out of range for {} docs",
                self.segment.doc_count()
            )));
        }

        let freq = if self.has_freqs {
            let raw = self.read_varint("frequency")?;
            let freq = u32::try_from(raw)
                .map_err(|_| self.corrupt(format!("frequency {raw} overflows u32")))?;
            Some(freq)
        } else {
            None
        };

        self.remaining -= 1;
        self.last_doc = Some(doc as u32);
        Ok(Some(Posting {
            doc_id: doc as u32,
            freq,
        }))
    }
}

impl Iterator for PostingsCursor {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(posting)) => Some(Ok(posting)),
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

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.remaining as usize + 1))
        }
    }
}
