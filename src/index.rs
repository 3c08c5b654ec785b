//! Read-only index view over all segments of a directory.
//!
//! An [`Index`] loads every segment of a storage location in segment-id
//! order and presents them as one logical index. Segment `i` owns the
//! global document ids `[base_i, base_i + doc_count_i)`, with bases assigned
//! by cumulative doc count, so concatenating per-segment postings in
//! segment order keeps global ids ascending without re-sorting.
//!
//! # Lifecycle and concurrency
//!
//! An index is either open or closed; closing is terminal. The handle is
//! `Send + Sync` and cloning it shares the same index. Every read, and every
//! step of a cursor, holds a shared lease for its duration. [`Index::close`]
//! never waits for leases: if any read is in flight it fails with
//! [`ClueError::Busy`] and leaves the index open. After a successful close,
//! all reads and all outstanding cursors fail with
//! [`ClueError::UseAfterClose`].

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;

use crate::config::IndexConfig;
use crate::error::{ClueError, Result};
use crate::segment::format::segment_id_from_file_name;
use crate::segment::{PostingsCursor, Segment, SegmentInfo, SegmentTermScan};
use crate::storage::file::FileStorageConfig;
use crate::storage::{Storage, StorageConfig, StorageFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexState {
    Open,
    Closed,
}

#[derive(Debug)]
struct IndexInner {
    location: String,
    segments: Vec<Arc<Segment>>,
    bases: Vec<u64>,
    doc_count: u64,
    state: RwLock<IndexState>,
}

impl IndexInner {
    /// Acquire a read lease, failing if the index is closed.
    fn lease(&self) -> Result<RwLockReadGuard<'_, IndexState>> {
        let guard = self.state.read();
        match *guard {
            IndexState::Open => Ok(guard),
            IndexState::Closed => Err(ClueError::UseAfterClose),
        }
    }
}

/// A term and the number of documents containing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermStat {
    pub term: String,
    pub doc_freq: u64,
}

/// A posting with an index-wide document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalPosting {
    pub doc_id: u64,
    /// `None` when the field does not record frequencies.
    pub freq: Option<u32>,
}

/// Summary of a field across all segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    /// Whether any segment records frequencies for this field.
    pub has_freqs: bool,
    /// Number of segments containing the field.
    pub segment_count: usize,
    /// Sum of per-segment term counts; terms shared by segments count once
    /// per segment.
    pub term_count: u64,
}

/// Handle to an open, read-only index.
#[derive(Debug, Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl Index {
    /// Open the index in a local directory.
    pub fn open_dir<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Index> {
        config.validate()?;
        let storage_config =
            StorageConfig::File(FileStorageConfig::new(path).with_mmap(config.use_mmap));
        let storage = StorageFactory::open(storage_config)?;
        Index::open(storage, config)
    }

    /// Open every segment in `storage`.
    ///
    /// Fails with `EmptyIndex` if there are no segment files, and with
    /// `PartialOpen` if any segment fails to load; segments loaded before
    /// the failure are closed again.
    pub fn open(storage: Arc<dyn Storage>, config: IndexConfig) -> Result<Index> {
        config.validate()?;
        let location = storage.location();

        let files = storage.list_files()?;
        let mut segment_ids: Vec<&str> = files
            .iter()
            .filter_map(|name| segment_id_from_file_name(name))
            .collect();
        segment_ids.sort_unstable();
        if segment_ids.is_empty() {
            return Err(ClueError::EmptyIndex(location));
        }

        let mut segments: Vec<Arc<Segment>> = Vec::with_capacity(segment_ids.len());
        for segment_id in segment_ids {
            match Segment::open(storage.as_ref(), segment_id, &config) {
                Ok(segment) => segments.push(Arc::new(segment)),
                Err(source) => {
                    for segment in &segments {
                        segment.close();
                    }
                    return Err(ClueError::PartialOpen {
                        segment: segment_id.to_string(),
                        loaded: segments.len(),
                        source: Box::new(source),
                    });
                }
            }
        }

        let mut bases = Vec::with_capacity(segments.len());
        let mut doc_count = 0u64;
        for segment in &segments {
            bases.push(doc_count);
            doc_count += segment.doc_count() as u64;
        }

        debug!(
            "opened index at {location}: {} segments, {doc_count} docs",
            segments.len()
        );

        Ok(Index {
            inner: Arc::new(IndexInner {
                location,
                segments,
                bases,
                doc_count,
                state: RwLock::new(IndexState::Open),
            }),
        })
    }

    /// Where the index was loaded from.
    pub fn location(&self) -> &str {
        &self.inner.location
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.state.read() == IndexState::Closed
    }

    /// Total number of documents over all segments.
    pub fn doc_count(&self) -> Result<u64> {
        let _lease = self.inner.lease()?;
        Ok(self.inner.doc_count)
    }

    /// Number of segments.
    pub fn segment_count(&self) -> Result<usize> {
        let _lease = self.inner.lease()?;
        Ok(self.inner.segments.len())
    }

    /// Per-segment summaries in segment order.
    pub fn segments(&self) -> Result<Vec<SegmentInfo>> {
        let _lease = self.inner.lease()?;
        Ok(self
            .inner
            .segments
            .iter()
            .zip(&self.inner.bases)
            .map(|(segment, &base)| segment.info(base))
            .collect())
    }

    /// Union of field names across segments.
    pub fn field_names(&self) -> Result<BTreeSet<String>> {
        let _lease = self.inner.lease()?;
        Ok(self
            .inner
            .segments
            .iter()
            .flat_map(|segment| segment.field_names())
            .map(str::to_string)
            .collect())
    }

    /// Per-field summaries, sorted by name.
    pub fn field_infos(&self) -> Result<Vec<FieldInfo>> {
        let _lease = self.inner.lease()?;
        let mut infos: AHashMap<&str, FieldInfo> = AHashMap::new();
        for segment in &self.inner.segments {
            for field in segment.fields() {
                let info = infos.entry(field.name()).or_insert_with(|| FieldInfo {
                    name: field.name().to_string(),
                    has_freqs: false,
                    segment_count: 0,
                    term_count: 0,
                });
                info.has_freqs |= field.has_freqs();
                info.segment_count += 1;
                info.term_count += field.term_count() as u64;
            }
        }
        let mut infos: Vec<FieldInfo> = infos.into_values().collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// Scan the terms of `field` starting with `prefix`, merged across
    /// segments. Each call returns an independent cursor.
    pub fn term_scan(&self, field: &str, prefix: &str) -> Result<TermScan> {
        let _lease = self.inner.lease()?;
        let scans = self
            .inner
            .segments
            .iter()
            .map(|segment| segment.scan(field, prefix))
            .collect::<Result<Vec<_>>>()?;
        Ok(TermScan {
            inner: Arc::clone(&self.inner),
            scans,
            heap: BinaryHeap::new(),
            primed: false,
            done: false,
        })
    }

    /// Look up the postings of `field:term` across all segments.
    ///
    /// Returns `None` when no segment contains the term.
    pub fn term_lookup(&self, field: &str, term: &str) -> Result<Option<MergedPostings>> {
        let _lease = self.inner.lease()?;
        let mut parts = Vec::new();
        for (segment, &base) in self.inner.segments.iter().zip(&self.inner.bases) {
            if let Some(location) = segment.lookup(field, term)? {
                parts.push((base, segment.postings(field, location)?));
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }

        let doc_freq = parts.iter().map(|(_, c)| c.doc_freq() as u64).sum();
        Ok(Some(MergedPostings {
            inner: Arc::clone(&self.inner),
            parts: parts.into_iter(),
            current: None,
            doc_freq,
            last_doc: None,
            done: false,
        }))
    }

    /// Close every segment. Idempotent.
    ///
    /// Fails with [`ClueError::Busy`] while any read holds a lease; the
    /// index then stays open.
    pub fn close(&self) -> Result<()> {
        let Some(mut state) = self.inner.state.try_write() else {
            return Err(ClueError::Busy);
        };
        if *state == IndexState::Closed {
            return Ok(());
        }
        for segment in &self.inner.segments {
            segment.close();
        }
        *state = IndexState::Closed;
        debug!("closed index at {}", self.inner.location);
        Ok(())
    }
}

/// Min-heap of (term, segment position, doc_freq).
type MergeHeap = BinaryHeap<Reverse<(String, usize, u32)>>;

/// Ascending, de-duplicated term cursor merged over all segments.
///
/// Doc frequencies of a term present in several segments are summed.
#[derive(Debug)]
pub struct TermScan {
    inner: Arc<IndexInner>,
    scans: Vec<SegmentTermScan>,
    heap: MergeHeap,
    primed: bool,
    done: bool,
}

impl TermScan {
    /// Push the next entry of scan `idx`, if any, onto the heap.
    fn pull(scans: &mut [SegmentTermScan], heap: &mut MergeHeap, idx: usize) -> Result<()> {
        if let Some(entry) = scans[idx].next() {
            let entry = entry?;
            heap.push(Reverse((entry.term, idx, entry.location.doc_freq)));
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<TermStat>> {
        let _lease = self.inner.lease()?;

        if !self.primed {
            for idx in 0..self.scans.len() {
                Self::pull(&mut self.scans, &mut self.heap, idx)?;
            }
            self.primed = true;
        }

        let Some(Reverse((term, idx, doc_freq))) = self.heap.pop() else {
            return Ok(None);
        };
        let mut total = doc_freq as u64;
        Self::pull(&mut self.scans, &mut self.heap, idx)?;

        while let Some(Reverse((next_term, _, _))) = self.heap.peek() {
            if *next_term != term {
                break;
            }
            let Some(Reverse((_, other, other_freq))) = self.heap.pop() else {
                break;
            };
            total += other_freq as u64;
            Self::pull(&mut self.scans, &mut self.heap, other)?;
        }

        Ok(Some(TermStat {
            term,
            doc_freq: total,
        }))
    }
}

impl Iterator for TermScan {
    type Item = Result<TermStat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(stat)) => Some(Ok(stat)),
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

/// Postings of one term over all segments, with global document ids.
///
/// Single pass, like the per-segment [`PostingsCursor`]s it chains.
#[derive(Debug)]
pub struct MergedPostings {
    inner: Arc<IndexInner>,
    parts: std::vec::IntoIter<(u64, PostingsCursor)>,
    current: Option<(u64, PostingsCursor)>,
    doc_freq: u64,
    last_doc: Option<u64>,
    done: bool,
}

impl MergedPostings {
    /// Number of documents containing the term across all segments.
    pub fn doc_freq(&self) -> u64 {
        self.doc_freq
    }

    fn advance(&mut self) -> Result<Option<GlobalPosting>> {
        let _lease = self.inner.lease()?;
        loop {
            if self.current.is_none() {
                self.current = self.parts.next();
            }
            let Some((base, cursor)) = self.current.as_mut() else {
                return Ok(None);
            };
            match cursor.next() {
                Some(posting) => {
                    let posting = posting?;
                    let doc_id = *base + posting.doc_id as u64;
                    debug_assert!(self.last_doc.is_none_or(|last| last < doc_id));
                    self.last_doc = Some(doc_id);
                    return Ok(Some(GlobalPosting {
                        doc_id,
                        freq: posting.freq,
                    }));
                }
                None => self.current = None,
            }
        }
    }
}

impl Iterator for MergedPostings {
    type Item = Result<GlobalPosting>;

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
}
