pub mod help;
pub mod index;
pub mod terms;

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;

use crate::context::ClueContext;

/// A named operation the shell can dispatch to.
pub trait ClueCommand: Send + Sync {
    fn name(&self) -> &'static str;

    /// Argument synopsis, e.g. `<field>:<term> [limit]`.
    fn usage(&self) -> &'static str {
        ""
    }

    /// One-line description shown by `help`.
    fn help(&self) -> &'static str;

    fn execute(&self, ctx: &mut ClueContext, args: &[String], out: &mut dyn Write) -> Result<()>;
}

/// Commands keyed by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Arc<dyn ClueCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(help::HelpCommand));
        registry.register(Arc::new(index::InfoCommand));
        registry.register(Arc::new(index::SegmentsCommand));
        registry.register(Arc::new(index::FieldsCommand));
        registry.register(Arc::new(index::DirCommand));
        registry.register(Arc::new(index::OpenCommand));
        registry.register(Arc::new(index::ReopenCommand));
        registry.register(Arc::new(terms::TermsCommand));
        registry.register(Arc::new(terms::PostingsCommand));
        registry.register(Arc::new(terms::DocFreqCommand));
        registry
    }

    pub fn register(&mut self, command: Arc<dyn ClueCommand>) {
        log::debug!("registering command '{}'", command.name());
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ClueCommand>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Arc<dyn ClueCommand>> {
        self.commands.values()
    }
}

/// Split `field:term` at the first colon. The term part is `None` when no
/// colon is present.
pub fn split_field_term(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once(':') {
        Some((field, term)) => (field, Some(term)),
        None => (arg, None),
    }
}

/// Parse an optional positive row limit, falling back to `default`.
pub fn parse_limit(arg: Option<&String>, default: usize) -> Result<usize> {
    match arg {
        None => Ok(default),
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(limit),
            _ => anyhow::bail!("limit must be a positive integer, got '{raw}'"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sorted_by_name() {
        let registry = CommandRegistry::with_defaults();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "dir", "docfreq", "fields", "help", "info", "open", "postings", "reopen",
                "segments", "terms"
            ]
        );
        assert!(registry.get("terms").is_some());
        assert!(registry.get("search").is_none());
    }

    #[test]
    fn test_split_field_term() {
        assert_eq!(split_field_term("body"), ("body", None));
        assert_eq!(split_field_term("body:"), ("body", Some("")));
        assert_eq!(split_field_term("body:ca"), ("body", Some("ca")));
        assert_eq!(split_field_term("url:http://x"), ("url", Some("http://x")));
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, 7).unwrap(), 7);
        assert_eq!(parse_limit(Some(&"3".to_string()), 7).unwrap(), 3);
        assert!(parse_limit(Some(&"0".to_string()), 7).is_err());
        assert!(parse_limit(Some(&"many".to_string()), 7).is_err());
    }
}
