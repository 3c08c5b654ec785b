mod cli;
mod commands;
mod config;
mod context;
mod output;
mod shell;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clue::ClueError;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::context::ClueContext;
use crate::shell::Shell;

/// What the words after the index path ask for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    /// No words: start the interactive shell.
    Shell,
    /// A bare `readonly`: open and close the index, nothing else.
    OpenOnly,
    /// Run one command and exit.
    Command { name: String, args: Vec<String> },
}

impl Invocation {
    fn from_words(mut words: Vec<String>) -> Self {
        // `readonly` is accepted for compatibility; the index is always read-only.
        let readonly = words
            .first()
            .is_some_and(|word| word.eq_ignore_ascii_case("readonly"));
        if readonly {
            words.remove(0);
            if words.is_empty() {
                return Invocation::OpenOnly;
            }
        }
        if words.is_empty() {
            return Invocation::Shell;
        }
        let name = words.remove(0);
        Invocation::Command { name, args: words }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<ClueError>() {
                Some(clue_err) => eprintln!("Error [{}]: {err:#}", clue_err.kind()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let format = cli.format.unwrap_or(config.format);

    let ctx = match ClueContext::open(&cli.index, config, format) {
        Ok(ctx) => ctx,
        Err(ClueError::NotFound(_) | ClueError::EmptyIndex(_)) => {
            println!("index does not exist at: {}", cli.index.display());
            return Ok(ExitCode::from(1));
        }
        Err(err) => return Err(err.into()),
    };
    let mut shell = Shell::new(ctx);

    match Invocation::from_words(cli.command) {
        Invocation::Shell => shell.run()?,
        Invocation::OpenOnly => {}
        Invocation::Command { name, args } => {
            let mut stdout = std::io::stdout();
            shell.handle_command(&name, &args, &mut stdout)?;
        }
    }

    shell.shutdown()?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_no_words_starts_shell() {
        assert_eq!(Invocation::from_words(Vec::new()), Invocation::Shell);
    }

    #[test]
    fn test_readonly_prefix_is_stripped() {
        assert_eq!(
            Invocation::from_words(words("ReadOnly terms body:ca 5")),
            Invocation::Command {
                name: "terms".to_string(),
                args: words("body:ca 5"),
            }
        );
        assert_eq!(Invocation::from_words(words("readonly")), Invocation::OpenOnly);
    }

    #[test]
    fn test_readonly_only_as_first_word() {
        assert_eq!(
            Invocation::from_words(words("info readonly")),
            Invocation::Command {
                name: "info".to_string(),
                args: words("readonly"),
            }
        );
    }
}
