use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::commands::ClueCommand;
use crate::context::ClueContext;
use crate::output::{self, FileEntry, IndexSummary};

pub struct InfoCommand;

impl ClueCommand for InfoCommand {
    fn name(&self) -> &'static str {
        "info"
    }

    fn help(&self) -> &'static str {
        "Show document, segment and field counts"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        let index = ctx.index();
        let summary = IndexSummary {
            location: index.location().to_string(),
            segment_count: index.segment_count()?,
            doc_count: index.doc_count()?,
            field_count: index.field_names()?.len(),
        };
        output::print_summary(out, &summary, ctx.format())
    }
}

pub struct SegmentsCommand;

impl ClueCommand for SegmentsCommand {
    fn name(&self) -> &'static str {
        "segments"
    }

    fn help(&self) -> &'static str {
        "List segments with their base document ids"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        let segments = ctx.index().segments()?;
        output::print_segments(out, &segments, ctx.format())
    }
}

pub struct FieldsCommand;

impl ClueCommand for FieldsCommand {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn help(&self) -> &'static str {
        "List indexed fields"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        let fields = ctx.index().field_infos()?;
        output::print_fields(out, &fields, ctx.format())
    }
}

pub struct DirCommand;

impl ClueCommand for DirCommand {
    fn name(&self) -> &'static str {
        "dir"
    }

    fn help(&self) -> &'static str {
        "List the files in the index directory"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        let dir = ctx.dir();
        let mut files = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                files.push(FileEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: metadata.len(),
                });
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        output::print_files(out, &dir.display().to_string(), &files, ctx.format())
    }
}

pub struct OpenCommand;

impl ClueCommand for OpenCommand {
    fn name(&self) -> &'static str {
        "open"
    }

    fn usage(&self) -> &'static str {
        "<dir>"
    }

    fn help(&self) -> &'static str {
        "Switch to the index in another directory"
    }

    fn execute(&self, ctx: &mut ClueContext, args: &[String], out: &mut dyn Write) -> Result<()> {
        let [dir] = args else {
            bail!("usage: {} {}", self.name(), self.usage());
        };
        ctx.switch_to(Path::new(dir))?;
        writeln!(out, "Opened index at {}.", ctx.dir().display())?;
        Ok(())
    }
}

pub struct ReopenCommand;

impl ClueCommand for ReopenCommand {
    fn name(&self) -> &'static str {
        "reopen"
    }

    fn help(&self) -> &'static str {
        "Reopen the current index to pick up new segments"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        let dir = ctx.dir().to_path_buf();
        ctx.switch_to(&dir)?;
        writeln!(
            out,
            "Reopened index at {} ({} segments).",
            dir.display(),
            ctx.index().segment_count()?
        )?;
        Ok(())
    }
}
