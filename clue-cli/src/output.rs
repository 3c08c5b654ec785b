use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use clue::{FieldInfo, GlobalPosting, SegmentInfo, TermStat};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON output.
    Json,
}

/// Index overview printed by `info`.
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub location: String,
    pub segment_count: usize,
    pub doc_count: u64,
    pub field_count: usize,
}

pub fn print_summary(out: &mut dyn Write, summary: &IndexSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        }
        OutputFormat::Table => {
            writeln!(out, "Location:  {}", summary.location)?;
            writeln!(out, "Segments:  {}", summary.segment_count)?;
            writeln!(out, "Documents: {}", summary.doc_count)?;
            writeln!(out, "Fields:    {}", summary.field_count)?;
        }
    }
    Ok(())
}

pub fn print_segments(out: &mut dyn Write, segments: &[SegmentInfo], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(segments)?)?;
        }
        OutputFormat::Table => {
            let rows: Vec<SegmentRow> = segments
                .iter()
                .map(|s| SegmentRow {
                    id: s.segment_id.clone(),
                    version: s.version,
                    docs: s.doc_count,
                    base: s.base_doc_id,
                    fields: s.field_count,
                    terms: s.term_count,
                    size: s.size_bytes,
                })
                .collect();
            writeln!(out, "{}", Table::new(&rows).with(Style::rounded()))?;
        }
    }
    Ok(())
}

pub fn print_fields(out: &mut dyn Write, fields: &[FieldInfo], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(fields)?)?;
        }
        OutputFormat::Table => {
            if fields.is_empty() {
                writeln!(out, "No fields.")?;
                return Ok(());
            }
            let rows: Vec<FieldRow> = fields
                .iter()
                .map(|f| FieldRow {
                    name: f.name.clone(),
                    freqs: if f.has_freqs { "yes" } else { "no" }.to_string(),
                    segments: f.segment_count,
                    terms: f.term_count,
                })
                .collect();
            writeln!(out, "{}", Table::new(&rows).with(Style::rounded()))?;
        }
    }
    Ok(())
}

pub fn print_terms(
    out: &mut dyn Write,
    field: &str,
    terms: &[TermStat],
    truncated: bool,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "field": field,
                "terms": terms,
                "truncated": truncated,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Table => {
            if terms.is_empty() {
                writeln!(out, "No terms found in field '{field}'.")?;
                return Ok(());
            }
            let rows: Vec<TermRow> = terms
                .iter()
                .map(|t| TermRow {
                    term: t.term.clone(),
                    doc_freq: t.doc_freq,
                })
                .collect();
            writeln!(out, "{}", Table::new(&rows).with(Style::rounded()))?;
            if truncated {
                writeln!(out, "(more terms not shown)")?;
            }
        }
    }
    Ok(())
}

pub fn print_postings(
    out: &mut dyn Write,
    field: &str,
    term: &str,
    doc_freq: u64,
    postings: &[GlobalPosting],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "field": field,
                "term": term,
                "doc_freq": doc_freq,
                "postings": postings,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Table => {
            writeln!(out, "{field}:{term} (doc_freq {doc_freq})")?;
            let rows: Vec<PostingRow> = postings
                .iter()
                .map(|p| PostingRow {
                    doc_id: p.doc_id,
                    freq: p.freq.map_or_else(|| "-".to_string(), |f| f.to_string()),
                })
                .collect();
            writeln!(out, "{}", Table::new(&rows).with(Style::rounded()))?;
            if (postings.len() as u64) < doc_freq {
                writeln!(out, "({} more postings not shown)", doc_freq - postings.len() as u64)?;
            }
        }
    }
    Ok(())
}

pub fn print_doc_freq(
    out: &mut dyn Write,
    field: &str,
    term: &str,
    doc_freq: u64,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "field": field,
                "term": term,
                "doc_freq": doc_freq,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Table => {
            writeln!(out, "{field}:{term} {doc_freq}")?;
        }
    }
    Ok(())
}

/// A file in the index directory.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

pub fn print_files(
    out: &mut dyn Write,
    dir: &str,
    files: &[FileEntry],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "directory": dir,
                "files": files,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Table => {
            writeln!(out, "{dir}")?;
            let rows: Vec<FileRow> = files
                .iter()
                .map(|f| FileRow {
                    name: f.name.clone(),
                    size: f.size,
                })
                .collect();
            writeln!(out, "{}", Table::new(&rows).with(Style::rounded()))?;
        }
    }
    Ok(())
}

// --- Helper types ---

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "Segment")]
    id: String,
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Docs")]
    docs: u32,
    #[tabled(rename = "Base")]
    base: u64,
    #[tabled(rename = "Fields")]
    fields: u32,
    #[tabled(rename = "Terms")]
    terms: u64,
    #[tabled(rename = "Bytes")]
    size: u64,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Freqs")]
    freqs: String,
    #[tabled(rename = "Segments")]
    segments: usize,
    #[tabled(rename = "Terms")]
    terms: u64,
}

#[derive(Tabled)]
struct TermRow {
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "DocFreq")]
    doc_freq: u64,
}

#[derive(Tabled)]
struct PostingRow {
    #[tabled(rename = "Doc")]
    doc_id: u64,
    #[tabled(rename = "Freq")]
    freq: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    name: String,
    #[tabled(rename = "Bytes")]
    size: u64,
}
