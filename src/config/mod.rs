//! Configuration module
//!
//! Handles loading and validating the suite configuration. Values come from a
//! file, environment overrides (see [`env`]) or command-line flags (see
//! [`crate::cli`]).

pub mod env;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::SuiteError;

/// Suite configuration, snapshotted into every report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Seed for spec ordering; identical on every worker
    pub random_seed: u64,

    /// Permute every spec instead of top-level groups
    pub randomize_all_specs: bool,

    /// Regexes; only specs whose text matches one of them run
    pub focus_strings: Vec<String>,

    /// Regexes; specs whose text matches one of them are skipped
    pub skip_strings: Vec<String>,

    /// Fail the suite when any spec is pending
    pub fail_on_pending: bool,

    /// Skip the remaining specs after the first failure
    pub fail_fast: bool,

    /// Retry budget overriding per-spec decorations; 0 means no override
    pub flake_attempts: u32,

    /// Report every spec and hook as passed without running bodies
    pub dry_run: bool,

    /// Write a progress line to the diagnostic writer before every node
    pub emit_spec_progress: bool,

    /// 1-based index of this worker
    pub parallel_worker: usize,

    /// Number of workers sharing the suite
    pub parallel_total: usize,

    /// Address of the coordination service
    pub parallel_host: Option<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            randomize_all_specs: false,
            focus_strings: Vec::new(),
            skip_strings: Vec::new(),
            fail_on_pending: false,
            fail_fast: false,
            flake_attempts: 0,
            dry_run: false,
            emit_spec_progress: false,
            parallel_worker: 1,
            parallel_total: 1,
            parallel_host: None,
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if is_yaml(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if is_yaml(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel_total > 1
    }

    pub fn is_primary(&self) -> bool {
        self.parallel_worker == 1
    }

    /// Check worker indices and focus/skip patterns
    pub fn validate(&self) -> Result<(), SuiteError> {
        if self.parallel_total == 0 {
            return Err(SuiteError::InvalidConfig(
                "parallel_total must be at least 1".to_string(),
            ));
        }
        if self.parallel_worker == 0 || self.parallel_worker > self.parallel_total {
            return Err(SuiteError::InvalidConfig(format!(
                "parallel_worker {} is outside 1..={}",
                self.parallel_worker, self.parallel_total
            )));
        }
        for pattern in self.focus_strings.iter().chain(&self.skip_strings) {
            Regex::new(pattern)?;
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SuiteConfig::default();
        assert_eq!(config.parallel_worker, 1);
        assert_eq!(config.parallel_total, 1);
        assert!(!config.is_parallel());
        assert!(config.is_primary());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_worker() {
        let config = SuiteConfig {
            parallel_worker: 4,
            parallel_total: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SuiteError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let config = SuiteConfig {
            focus_strings: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SuiteError::InvalidFocusPattern(_))
        ));
    }

    #[test]
    fn test_save_and_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        let config = SuiteConfig {
            random_seed: 1234,
            fail_fast: true,
            skip_strings: vec!["slow".to_string()],
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = SuiteConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(&path, r#"{"flake_attempts": 3}"#).unwrap();

        let loaded = SuiteConfig::load(&path).unwrap();
        assert_eq!(loaded.flake_attempts, 3);
        assert_eq!(loaded.parallel_total, 1);
    }
}
