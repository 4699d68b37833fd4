//! Configuration file handling

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use tsqlgraph_core::EdgeKind;

use crate::args::OutputFormat;

pub const CONFIG_FILE_NAME: &str = "tsqlgraph.toml";

/// Configuration for tsqlgraph
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// SQL file paths or glob patterns
    #[serde(default)]
    pub files: Vec<String>,

    /// Output format (dot, digraph, json)
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Produce no graph when any file has parse errors
    #[serde(default)]
    pub strict: bool,

    /// Edge kinds to leave out (e.g., ["TRIG", "QUEUE"])
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).into_diagnostic()
    }

    /// Try to find and load tsqlgraph.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(
        mut self,
        files: &[PathBuf],
        format: Option<OutputFormat>,
        strict: bool,
        exclude: &[EdgeKind],
    ) -> Self {
        if !files.is_empty() {
            self.files = files.iter().map(|p| p.display().to_string()).collect();
        }

        if format.is_some() {
            self.format = format;
        }

        // a flag can only switch strict mode on
        self.strict |= strict;

        if !exclude.is_empty() {
            self.exclude = exclude.iter().map(|k| k.label().to_string()).collect();
        }

        self
    }

    /// Parse the `exclude` entries into edge kinds
    pub fn excluded_kinds(&self) -> Result<Vec<EdgeKind>> {
        self.exclude
            .iter()
            .map(|s| s.parse::<EdgeKind>().map_err(|e| miette::miette!(e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_file() {
        let config = Config::from_toml(
            r#"
            files = ["sql/**/*.sql"]
            format = "json"
            strict = true
            exclude = ["trig"]
            "#,
        )
        .unwrap();
        assert_eq!(config.files, vec!["sql/**/*.sql"]);
        assert_eq!(config.format, Some(OutputFormat::Json));
        assert!(config.strict);
        assert_eq!(config.excluded_kinds().unwrap(), vec![EdgeKind::Trig]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.files.is_empty());
        assert_eq!(config.format, None);
        assert!(!config.strict);
    }

    #[test]
    fn test_args_take_precedence() {
        let config = Config {
            files: vec!["from_config.sql".to_string()],
            format: Some(OutputFormat::Json),
            strict: false,
            exclude: vec!["EXEC".to_string()],
        }
        .merge_with_args(
            &[PathBuf::from("cli.sql")],
            Some(OutputFormat::Dot),
            true,
            &[EdgeKind::Queue],
        );
        assert_eq!(config.files, vec!["cli.sql"]);
        assert_eq!(config.format, Some(OutputFormat::Dot));
        assert!(config.strict);
        assert_eq!(config.excluded_kinds().unwrap(), vec![EdgeKind::Queue]);
    }

    #[test]
    fn test_unknown_excluded_kind() {
        let config = Config {
            exclude: vec!["SELECT".to_string()],
            ..Config::default()
        };
        assert!(config.excluded_kinds().is_err());
    }
}
