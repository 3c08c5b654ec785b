use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use clue::segment::format::segment_file_name;
use clue::segment::writer::SegmentWriter;
use clue::storage::memory::MemoryStorage;
use clue::{ClueError, GlobalPosting, Index, IndexConfig, IndexOptions};

fn write_segment(dir: &Path, segment_id: &str, writer: SegmentWriter) {
    let bytes = writer.finish().unwrap();
    std::fs::write(dir.join(segment_file_name(segment_id)), bytes).unwrap();
}

/// seg0: 3 docs, "cat" in doc 1. seg1: 2 docs, "cat" in doc 0.
fn two_segment_index(dir: &Path) {
    let mut seg0 = SegmentWriter::new(3);
    seg0.add_field("body", IndexOptions::DocsAndFreqs).unwrap();
    seg0.add_field("title", IndexOptions::Docs).unwrap();
    seg0.add_posting("body", "ant", 0, 1).unwrap();
    seg0.add_posting("body", "cat", 1, 4).unwrap();
    seg0.add_posting("body", "dog", 2, 1).unwrap();
    seg0.add_posting("title", "pets", 1, 1).unwrap();
    write_segment(dir, "seg0", seg0);

    let mut seg1 = SegmentWriter::new(2).with_block_size(1);
    seg1.add_field("body", IndexOptions::DocsAndFreqs).unwrap();
    seg1.add_field("summary", IndexOptions::Docs).unwrap();
    seg1.add_posting("body", "bat", 1, 1).unwrap();
    seg1.add_posting("body", "cat", 0, 2).unwrap();
    seg1.add_posting("body", "dog", 0, 1).unwrap();
    seg1.add_posting("body", "dog", 1, 3).unwrap();
    seg1.add_posting("summary", "short", 0, 1).unwrap();
    write_segment(dir, "seg1", seg1);
}

fn collect_terms(index: &Index, field: &str, prefix: &str) -> Vec<(String, u64)> {
    index
        .term_scan(field, prefix)
        .unwrap()
        .map(|stat| {
            let stat = stat.unwrap();
            (stat.term, stat.doc_freq)
        })
        .collect()
}

#[test]
fn test_two_segment_lookup_remaps_doc_ids() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());

    let index = Index::open_dir(dir.path(), IndexConfig::default())?;
    let postings = index.term_lookup("body", "cat")?.expect("cat is indexed");
    assert_eq!(postings.doc_freq(), 2);

    let postings: Vec<GlobalPosting> = postings.collect::<clue::Result<_>>()?;
    assert_eq!(
        postings,
        vec![
            GlobalPosting { doc_id: 1, freq: Some(4) },
            GlobalPosting { doc_id: 3, freq: Some(2) },
        ]
    );
    Ok(())
}

#[test]
fn test_doc_count_is_sum_of_segments() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());

    let index = Index::open_dir(dir.path(), IndexConfig::default())?;
    let segments = index.segments()?;
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].segment_id, "seg0");
    assert_eq!(segments[0].base_doc_id, 0);
    assert_eq!(segments[1].base_doc_id, 3);

    let total: u64 = segments.iter().map(|s| s.doc_count as u64).sum();
    assert_eq!(index.doc_count()?, total);
    assert_eq!(index.doc_count()?, 5);
    Ok(())
}

#[test]
fn test_term_scan_merges_segments() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());
    let index = Index::open_dir(dir.path(), IndexConfig::default())?;

    let terms = collect_terms(&index, "body", "");
    assert_eq!(
        terms,
        vec![
            ("ant".to_string(), 1),
            ("bat".to_string(), 1),
            ("cat".to_string(), 2),
            ("dog".to_string(), 3),
        ]
    );
    assert!(terms.windows(2).all(|w| w[0].0 < w[1].0));

    assert_eq!(collect_terms(&index, "body", "d"), vec![("dog".to_string(), 3)]);
    assert!(collect_terms(&index, "body", "z").is_empty());
    assert_eq!(collect_terms(&index, "summary", ""), vec![("short".to_string(), 1)]);
    assert!(collect_terms(&index, "missing", "").is_empty());
    Ok(())
}

#[test]
fn test_global_ids_strictly_ascending() -> clue::Result<()> {
    let storage = Arc::new(MemoryStorage::default());
    let mut expected = Vec::new();
    let mut base = 0u64;
    for (seg, doc_count) in [("a", 10u32), ("b", 1), ("c", 7)] {
        let mut writer = SegmentWriter::new(doc_count);
        writer.add_field("n", IndexOptions::Docs).unwrap();
        for doc in (0..doc_count).filter(|d| d % 2 == 0) {
            writer.add_posting("n", "even", doc, 1).unwrap();
            expected.push(base + doc as u64);
        }
        storage.insert(segment_file_name(seg), writer.finish().unwrap());
        base += doc_count as u64;
    }

    let index = Index::open(storage, IndexConfig::default())?;
    let ids: Vec<u64> = index
        .term_lookup("n", "even")?
        .unwrap()
        .map(|p| p.map(|p| p.doc_id))
        .collect::<clue::Result<_>>()?;
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids, expected);
    Ok(())
}

#[test]
fn test_missing_term_and_field() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());
    let index = Index::open_dir(dir.path(), IndexConfig::default())?;

    assert!(index.term_lookup("body", "zebra")?.is_none());
    assert!(index.term_lookup("nope", "cat")?.is_none());
    Ok(())
}

#[test]
fn test_field_names_and_infos() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());
    let index = Index::open_dir(dir.path(), IndexConfig::default())?;

    let names: Vec<String> = index.field_names()?.into_iter().collect();
    assert_eq!(names, vec!["body", "summary", "title"]);

    let infos = index.field_infos()?;
    let body = infos.iter().find(|f| f.name == "body").unwrap();
    assert!(body.has_freqs);
    assert_eq!(body.segment_count, 2);
    assert_eq!(body.term_count, 6);
    let title = infos.iter().find(|f| f.name == "title").unwrap();
    assert!(!title.has_freqs);
    assert_eq!(title.segment_count, 1);
    Ok(())
}

#[test]
fn test_reopen_yields_same_view() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());

    let first = Index::open_dir(dir.path(), IndexConfig::default())?;
    let names = first.field_names()?;
    let docs = first.doc_count()?;
    first.close()?;

    let second = Index::open_dir(dir.path(), IndexConfig::default())?;
    assert_eq!(second.field_names()?, names);
    assert_eq!(second.doc_count()?, docs);
    Ok(())
}

#[test]
fn test_mmap_mode_matches_buffered_reads() -> clue::Result<()> {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());

    let buffered = Index::open_dir(dir.path(), IndexConfig::default())?;
    let mapped = Index::open_dir(dir.path(), IndexConfig::default().with_mmap(true))?;

    assert_eq!(
        collect_terms(&buffered, "body", ""),
        collect_terms(&mapped, "body", "")
    );
    let a: Vec<_> = buffered.term_lookup("body", "dog")?.unwrap().collect::<clue::Result<_>>()?;
    let b: Vec<_> = mapped.term_lookup("body", "dog")?.unwrap().collect::<clue::Result<_>>()?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_nonexistent_directory_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = Index::open_dir(dir.path().join("missing"), IndexConfig::default()).unwrap_err();
    assert!(matches!(err, ClueError::NotFound(_)), "{err}");
}

#[test]
fn test_directory_without_segments_is_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("README"), b"not a segment").unwrap();
    let err = Index::open_dir(dir.path(), IndexConfig::default()).unwrap_err();
    assert!(matches!(err, ClueError::EmptyIndex(_)), "{err}");
}

#[test]
fn test_bad_segment_fails_whole_open() {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());

    // Bump the format version of the second segment.
    let path = dir.path().join(segment_file_name("seg1"));
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[4] = 7;
    std::fs::write(&path, bytes).unwrap();

    let err = Index::open_dir(dir.path(), IndexConfig::default()).unwrap_err();
    match err {
        ClueError::PartialOpen {
            segment,
            loaded,
            source,
        } => {
            assert_eq!(segment, "seg1");
            assert_eq!(loaded, 1);
            assert!(matches!(
                *source,
                ClueError::IncompatibleVersion { found: 7, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_corrupt_segment_fails_whole_open() {
    let storage = Arc::new(MemoryStorage::default());
    let mut writer = SegmentWriter::new(1);
    writer.add_field("f", IndexOptions::Docs).unwrap();
    writer.add_posting("f", "t", 0, 1).unwrap();
    storage.insert(segment_file_name("a"), writer.finish().unwrap());
    storage.insert(segment_file_name("b"), b"garbage that is not a segment header at all..........".to_vec());

    let err = Index::open(storage, IndexConfig::default()).unwrap_err();
    match err {
        ClueError::PartialOpen { source, .. } => {
            assert!(matches!(*source, ClueError::CorruptSegment { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_write_mode_is_rejected() {
    let dir = TempDir::new().unwrap();
    two_segment_index(dir.path());
    let config = IndexConfig {
        read_only: false,
        ..IndexConfig::default()
    };
    let err = Index::open_dir(dir.path(), config).unwrap_err();
    assert!(matches!(err, ClueError::InvalidConfig(_)));
}

#[test]
fn test_corrupt_postings_surface_through_lookup() -> clue::Result<()> {
    let storage = Arc::new(MemoryStorage::default());
    let mut writer = SegmentWriter::new(4);
    writer.add_field("body", IndexOptions::Docs).unwrap();
    writer.add_posting("body", "a", 2, 1).unwrap();
    writer.add_posting("body", "a", 3, 1).unwrap();
    let mut bytes = writer.finish().unwrap();
    let last = bytes.len() - 1;
    bytes[last] = 0;
    storage.insert(segment_file_name("s"), bytes);

    let index = Index::open(storage, IndexConfig::default())?;
    let results: Vec<_> = index.term_lookup("body", "a")?.unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ClueError::CorruptSegment { .. })));

    // A corrupt read does not close the index.
    assert!(!index.is_closed());
    assert_eq!(index.doc_count()?, 4);
    Ok(())
}
