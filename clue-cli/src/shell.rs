use std::io::Write;

use anyhow::Result;
use clue::ClueError;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Editor, Helper, Highlighter, Hinter, Validator};

use crate::context::ClueContext;

/// What the caller should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

/// Dispatches command lines against a [`ClueContext`].
pub struct Shell {
    ctx: ClueContext,
}

impl Shell {
    pub fn new(ctx: ClueContext) -> Self {
        Shell { ctx }
    }

    /// Run one command. Failures are reported to `out` and never end the
    /// session.
    pub fn handle_command(&mut self, name: &str, args: &[String], out: &mut dyn Write) -> Result<()> {
        let registry = self.ctx.registry();
        let Some(command) = registry.get(name) else {
            writeln!(out, "{name} is not supported:")?;
            if let Some(help) = registry.get("help") {
                help.execute(&mut self.ctx, &[], out)?;
            }
            return Ok(());
        };

        log::debug!("executing '{name}' with {} argument(s)", args.len());
        if let Err(err) = command.execute(&mut self.ctx, args, out) {
            writeln!(out, "{}", describe_error(&err))?;
        }
        Ok(())
    }

    /// Split a line on whitespace and dispatch it.
    pub fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> Result<LineOutcome> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(LineOutcome::Continue);
        };
        if name == "exit" || name == "quit" {
            return Ok(LineOutcome::Exit);
        }
        let args: Vec<String> = words.map(str::to_string).collect();
        self.handle_command(name, &args, out)?;
        Ok(LineOutcome::Continue)
    }

    /// Interactive loop. Ends on `exit`, `quit`, EOF or Ctrl-C.
    pub fn run(&mut self) -> Result<()> {
        let mut rl: Editor<ClueHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(ClueHelper::default()));

        println!(
            "Clue {} on {} (type 'help' for commands, 'exit' to quit)",
            clue::VERSION,
            self.ctx.dir().display()
        );

        let mut stdout = std::io::stdout();
        loop {
            // The index may have been switched by `open`.
            let commands: Vec<String> = self.ctx.registry().names().map(str::to_string).collect();
            let fields = self.ctx.field_names();
            if let Some(helper) = rl.helper_mut() {
                helper.commands = commands;
                helper.fields = fields;
            }

            let prompt = self.ctx.config().prompt.clone();
            let line = match rl.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = rl.add_history_entry(line);

            let outcome = self.handle_line(line, &mut stdout)?;
            stdout.flush()?;
            if outcome == LineOutcome::Exit {
                break;
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.ctx.shutdown()
    }
}

/// Render a command failure, naming the error kind when it comes from the
/// index.
fn describe_error(err: &anyhow::Error) -> String {
    match err.chain().find_map(|cause| cause.downcast_ref::<ClueError>()) {
        Some(clue_err) => format!("Error [{}]: {err:#}", clue_err.kind()),
        None => format!("Error: {err:#}"),
    }
}

/// Tab completion of command names and, after the first word, field names.
#[derive(Default, Helper, Hinter, Highlighter, Validator)]
struct ClueHelper {
    commands: Vec<String>,
    fields: Vec<String>,
}

impl ClueHelper {
    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let before = &line[..pos];
        let start = before
            .rfind(|c: char| c == ' ' || c == '\t')
            .map_or(0, |i| i + 1);
        let word = &before[start..];
        let pool = if before[..start].trim().is_empty() {
            &self.commands
        } else {
            &self.fields
        };
        let matches = pool
            .iter()
            .filter(|candidate| candidate.starts_with(word))
            .cloned()
            .collect();
        (start, matches)
    }
}

impl Completer for ClueHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, matches) = self.candidates(line, pos);
        let pairs = matches
            .into_iter()
            .map(|m| Pair {
                display: m.clone(),
                replacement: m,
            })
            .collect();
        Ok((start, pairs))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clue::IndexOptions;
    use clue::segment::format::segment_file_name;
    use clue::segment::writer::SegmentWriter;
    use tempfile::TempDir;

    use super::*;
    use crate::config::AppConfig;
    use crate::output::OutputFormat;

    fn write_index(dir: &Path) {
        let mut seg0 = SegmentWriter::new(3);
        seg0.add_field("body", IndexOptions::DocsAndFreqs).unwrap();
        seg0.add_posting("body", "ant", 0, 1).unwrap();
        seg0.add_posting("body", "cat", 1, 4).unwrap();
        std::fs::write(dir.join(segment_file_name("seg0")), seg0.finish().unwrap()).unwrap();

        let mut seg1 = SegmentWriter::new(2);
        seg1.add_field("body", IndexOptions::DocsAndFreqs).unwrap();
        seg1.add_field("title", IndexOptions::Docs).unwrap();
        seg1.add_posting("body", "cat", 0, 2).unwrap();
        seg1.add_posting("title", "pets", 1, 1).unwrap();
        std::fs::write(dir.join(segment_file_name("seg1")), seg1.finish().unwrap()).unwrap();
    }

    fn shell(dir: &Path, format: OutputFormat) -> Shell {
        let ctx = ClueContext::open(dir, AppConfig::default(), format).unwrap();
        Shell::new(ctx)
    }

    fn run_line(shell: &mut Shell, line: &str) -> String {
        let mut out = Vec::new();
        shell.handle_line(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unknown_command_prints_help() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Table);

        let output = run_line(&mut shell, "search cat");
        assert!(output.starts_with("search is not supported:\n"), "{output}");
        assert!(output.contains("Available commands:"));
        assert!(output.contains("postings <field>:<term> [limit]"));
    }

    #[test]
    fn test_open_missing_directory_reports_and_continues() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Table);

        let missing = dir.path().join("missing");
        let output = run_line(&mut shell, &format!("open {}", missing.display()));
        assert!(output.starts_with("Error [NotFound]:"), "{output}");

        let output = run_line(&mut shell, "info");
        assert!(output.contains("Documents: 5"), "{output}");
    }

    #[test]
    fn test_terms_lists_merged_frequencies() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Json);

        let output = run_line(&mut shell, "terms body");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["field"], "body");
        assert_eq!(value["truncated"], false);
        assert_eq!(value["terms"][1]["term"], "cat");
        assert_eq!(value["terms"][1]["doc_freq"], 2);

        let output = run_line(&mut shell, "terms body 1");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["terms"].as_array().unwrap().len(), 1);
        assert_eq!(value["truncated"], true);
    }

    #[test]
    fn test_terms_with_maximum_limit() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Json);

        let output = run_line(&mut shell, &format!("terms body {}", usize::MAX));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["terms"].as_array().unwrap().len(), 2);
        assert_eq!(value["truncated"], false);

        let output = run_line(&mut shell, &format!("postings body:cat {}", usize::MAX));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["postings"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_postings_use_global_ids() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Json);

        let output = run_line(&mut shell, "postings body:cat");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["doc_freq"], 2);
        assert_eq!(value["postings"][0]["doc_id"], 1);
        assert_eq!(value["postings"][0]["freq"], 4);
        assert_eq!(value["postings"][1]["doc_id"], 3);

        let output = run_line(&mut shell, "docfreq title:pets");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["doc_freq"], 1);
    }

    #[test]
    fn test_usage_errors_keep_session() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Table);

        let output = run_line(&mut shell, "postings body");
        assert!(output.starts_with("Error: usage: postings"), "{output}");
        let output = run_line(&mut shell, "terms body zero");
        assert!(output.starts_with("Error: limit must be"), "{output}");
        let output = run_line(&mut shell, "docfreq body:zebra");
        assert_eq!(output, "body:zebra 0\n");
    }

    #[test]
    fn test_reopen_and_exit() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path());
        let mut shell = shell(dir.path(), OutputFormat::Table);

        let output = run_line(&mut shell, "reopen");
        assert!(output.contains("(2 segments)"), "{output}");
        assert_eq!(
            shell.handle_line("  exit ", &mut Vec::new()).unwrap(),
            LineOutcome::Exit
        );
        assert_eq!(
            shell.handle_line("", &mut Vec::new()).unwrap(),
            LineOutcome::Continue
        );

        shell.shutdown().unwrap();
        let output = run_line(&mut shell, "info");
        assert!(output.starts_with("Error [UseAfterClose]:"), "{output}");
    }

    #[test]
    fn test_completion_candidates() {
        let helper = ClueHelper {
            commands: vec!["postings".into(), "reopen".into(), "segments".into()],
            fields: vec!["body".into(), "title".into()],
        };
        assert_eq!(helper.candidates("po", 2), (0, vec!["postings".to_string()]));
        assert_eq!(helper.candidates("terms ti", 8), (6, vec!["title".to_string()]));
        assert_eq!(helper.candidates("terms ", 6).1.len(), 2);
    }
}
