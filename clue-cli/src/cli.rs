use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

/// Clue - inspect the segments, terms and postings of an index
#[derive(Parser)]
#[command(name = "clue", version, about)]
pub struct Cli {
    /// Path to the index directory.
    pub index: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(long, env = "CLUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format. Overrides the configured format.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Command to run instead of starting the shell, optionally preceded by `readonly`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
