use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clue::{ClueError, Index};

use crate::commands::CommandRegistry;
use crate::config::AppConfig;
use crate::output::OutputFormat;

/// State shared by every command in a session: the open index and the
/// settings it was opened with.
pub struct ClueContext {
    dir: PathBuf,
    index: Index,
    config: AppConfig,
    format: OutputFormat,
    registry: Arc<CommandRegistry>,
}

impl ClueContext {
    /// Open the index at `dir` with the built-in commands registered.
    pub fn open(dir: &Path, config: AppConfig, format: OutputFormat) -> clue::Result<Self> {
        let index = Index::open_dir(dir, config.index.clone())?;
        Ok(ClueContext {
            dir: dir.to_path_buf(),
            index,
            config,
            format,
            registry: Arc::new(CommandRegistry::with_defaults()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn registry(&self) -> Arc<CommandRegistry> {
        Arc::clone(&self.registry)
    }

    /// Field names of the current index, empty when it cannot be read.
    pub fn field_names(&self) -> Vec<String> {
        self.index
            .field_names()
            .map(|names| names.into_iter().collect())
            .unwrap_or_default()
    }

    /// Replace the current index with the one at `dir`.
    ///
    /// The new index is opened first; on failure the current one stays
    /// open and untouched.
    pub fn switch_to(&mut self, dir: &Path) -> clue::Result<()> {
        let index = Index::open_dir(dir, self.config.index.clone())?;
        let previous = std::mem::replace(&mut self.index, index);
        self.dir = dir.to_path_buf();
        if let Err(err) = previous.close() {
            log::warn!("failed to close previous index: {err}");
        }
        log::debug!("switched to index at {}", self.dir.display());
        Ok(())
    }

    /// Close the index at the end of a session.
    pub fn shutdown(&self) -> Result<()> {
        match self.index.close() {
            Ok(()) | Err(ClueError::UseAfterClose) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
