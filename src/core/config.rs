/// Story configuration, loaded from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::filter::FilterConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid filter pattern: {0}")]
    Filter(#[from] regex::Error),
}

fn default_header_tag() -> String {
    "header".to_string()
}

fn default_footer_tag() -> String {
    "footer".to_string()
}

fn default_max_reductions() -> usize {
    1000
}

fn default_max_depth() -> usize {
    64
}

/// Per-story settings. Every field has a default, so `()` is a valid
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryConfig {
    /// Passage to open with instead of "Start".
    #[serde(default)]
    pub start_passage: Option<String>,
    #[serde(default = "default_header_tag")]
    pub header_tag: String,
    #[serde(default = "default_footer_tag")]
    pub footer_tag: String,
    /// Iteration cap for each reduction loop.
    #[serde(default = "default_max_reductions")]
    pub max_reductions: usize,
    /// How deep selected bodies may nest before the rest is left as text.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Seed for `(random:)`; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            start_passage: None,
            header_tag: default_header_tag(),
            footer_tag: default_footer_tag(),
            max_reductions: default_max_reductions(),
            max_depth: default_max_depth(),
            seed: None,
            filters: Vec::new(),
        }
    }
}

impl StoryConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = StoryConfig::parse_ron("()").unwrap();
        assert_eq!(config, StoryConfig::default());
        assert_eq!(config.header_tag, "header");
        assert_eq!(config.max_reductions, 1000);
        assert_eq!(config.max_depth, 64);
    }

    #[test]
    fn parse_full_config() {
        let input = r#"(
            start_passage: Some("Prologue"),
            header_tag: "top",
            max_reductions: 50,
            max_depth: 8,
            seed: Some(42),
            filters: [
                StripLiteral("[debug]"),
                StripBetween(start: "<stats>", end: "</stats>"),
                StripPattern("HP: \\d+"),
            ],
        )"#;
        let config = StoryConfig::parse_ron(input).unwrap();
        assert_eq!(config.start_passage.as_deref(), Some("Prologue"));
        assert_eq!(config.header_tag, "top");
        assert_eq!(config.footer_tag, "footer");
        assert_eq!(config.max_reductions, 50);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.filters.len(), 3);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            StoryConfig::parse_ron("(max_reductions: \"many\")"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StoryConfig::load_from_ron(Path::new("tests/fixtures/no_such.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
