use std::path::Path;

use anyhow::{Context, Result, bail};
use clue::IndexConfig;
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

pub const DEFAULT_PROMPT: &str = "clue> ";
pub const DEFAULT_LIMIT: usize = 100;

/// Shell settings, read from TOML.
///
/// ```toml
/// prompt = "idx> "
/// default_limit = 50
/// format = "json"
///
/// [index]
/// use_mmap = true
/// read_buffer_size = 8192
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Options used whenever an index is opened.
    pub index: IndexConfig,
    pub prompt: String,
    /// Row limit for `terms` and `postings` when none is given.
    pub default_limit: usize,
    pub format: OutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            index: IndexConfig::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            default_limit: DEFAULT_LIMIT,
            format: OutputFormat::Table,
        }
    }
}

impl AppConfig {
    /// Load the configuration file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(AppConfig::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse config TOML")?;
        config.index.validate()?;
        if config.default_limit == 0 {
            bail!("default_limit must be greater than 0");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert!(config.index.read_only);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = AppConfig::parse(
            r#"
default_limit = 5
format = "json"

[index]
use_mmap = true
"#,
        )
        .unwrap();
        assert_eq!(config.default_limit, 5);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.index.use_mmap);
        assert_eq!(config.index.read_buffer_size, IndexConfig::default().read_buffer_size);
        assert_eq!(config.prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AppConfig::parse("default_limit = 0").is_err());
        assert!(AppConfig::parse("[index]\nread_only = false").is_err());
        assert!(AppConfig::parse("[index]\nread_buffer_size = 1").is_err());
        assert!(AppConfig::parse("prompt = ").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clue.toml");
        std::fs::write(&path, "prompt = \"idx> \"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.prompt, "idx> ");

        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
