use std::io::Write;

use anyhow::{Result, bail};
use clue::GlobalPosting;

use crate::commands::{ClueCommand, parse_limit, split_field_term};
use crate::context::ClueContext;
use crate::output::{self, OutputFormat};

pub struct TermsCommand;

impl ClueCommand for TermsCommand {
    fn name(&self) -> &'static str {
        "terms"
    }

    fn usage(&self) -> &'static str {
        "<field>[:prefix] [limit]"
    }

    fn help(&self) -> &'static str {
        "List terms of a field with document frequencies"
    }

    fn execute(&self, ctx: &mut ClueContext, args: &[String], out: &mut dyn Write) -> Result<()> {
        let Some(target) = args.first().filter(|_| args.len() <= 2) else {
            bail!("usage: {} {}", self.name(), self.usage());
        };
        let (field, prefix) = split_field_term(target);
        let limit = parse_limit(args.get(1), ctx.config().default_limit)?;

        // One extra row tells whether the listing was cut short.
        let mut terms = ctx
            .index()
            .term_scan(field, prefix.unwrap_or(""))?
            .take(limit.saturating_add(1))
            .collect::<clue::Result<Vec<_>>>()?;
        let truncated = terms.len() > limit;
        terms.truncate(limit);

        output::print_terms(out, field, &terms, truncated, ctx.format())
    }
}

pub struct PostingsCommand;

impl ClueCommand for PostingsCommand {
    fn name(&self) -> &'static str {
        "postings"
    }

    fn usage(&self) -> &'static str {
        "<field>:<term> [limit]"
    }

    fn help(&self) -> &'static str {
        "List the documents containing a term"
    }

    fn execute(&self, ctx: &mut ClueContext, args: &[String], out: &mut dyn Write) -> Result<()> {
        let Some((field, Some(term))) = args
            .first()
            .filter(|_| args.len() <= 2)
            .map(String::as_str)
            .map(split_field_term)
        else {
            bail!("usage: {} {}", self.name(), self.usage());
        };
        let limit = parse_limit(args.get(1), ctx.config().default_limit)?;
        let format = ctx.format();

        let Some(postings) = ctx.index().term_lookup(field, term)? else {
            return match format {
                OutputFormat::Json => output::print_postings(out, field, term, 0, &[], format),
                OutputFormat::Table => {
                    writeln!(out, "Term '{term}' not found in field '{field}'.")?;
                    Ok(())
                }
            };
        };
        let doc_freq = postings.doc_freq();
        let postings: Vec<GlobalPosting> = postings.take(limit).collect::<clue::Result<_>>()?;

        output::print_postings(out, field, term, doc_freq, &postings, format)
    }
}

pub struct DocFreqCommand;

impl ClueCommand for DocFreqCommand {
    fn name(&self) -> &'static str {
        "docfreq"
    }

    fn usage(&self) -> &'static str {
        "<field>:<term>"
    }

    fn help(&self) -> &'static str {
        "Count the documents containing a term"
    }

    fn execute(&self, ctx: &mut ClueContext, args: &[String], out: &mut dyn Write) -> Result<()> {
        let [arg] = args else {
            bail!("usage: {} {}", self.name(), self.usage());
        };
        let (field, Some(term)) = split_field_term(arg) else {
            bail!("usage: {} {}", self.name(), self.usage());
        };
        let doc_freq = ctx
            .index()
            .term_lookup(field, term)?
            .map_or(0, |postings| postings.doc_freq());
        output::print_doc_freq(out, field, term, doc_freq, ctx.format())
    }
}
