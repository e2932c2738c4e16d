//! CLI argument parsing
//!
//! Defines the suite flags using clap. A test binary either parses
//! [`SuiteArgs`] directly or flattens it into its own parser.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::env::EnvConfig;
use crate::config::SuiteConfig;
use crate::utils::logger::LogLevel;

/// Suite run flags
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "speckle")]
#[command(about = "Run a spec suite")]
#[command(long_about = None)]
pub struct SuiteArgs {
    /// Load settings from a YAML or JSON file before applying flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for spec ordering (defaults to the current Unix time)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Randomize every spec instead of top-level groups
    #[arg(long)]
    pub randomize_all: bool,

    /// Only run specs whose text matches this regex (repeatable)
    #[arg(long = "focus", value_name = "REGEX")]
    pub focus: Vec<String>,

    /// Skip specs whose text matches this regex (repeatable)
    #[arg(long = "skip", value_name = "REGEX")]
    pub skip: Vec<String>,

    /// Stop running specs after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Fail the suite when any spec is pending
    #[arg(long)]
    pub fail_on_pending: bool,

    /// Retry failing specs up to this many attempts
    #[arg(long)]
    pub flake_attempts: Option<u32>,

    /// Walk the suite without running any bodies
    #[arg(long)]
    pub dry_run: bool,

    /// Print a progress line before every node
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// 1-based index of this worker
    #[arg(long)]
    pub parallel_worker: Option<usize>,

    /// Number of workers
    #[arg(long)]
    pub parallel_total: Option<usize>,

    /// Address of the coordination service
    #[arg(long)]
    pub parallel_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Raise the log level one step per occurrence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl SuiteArgs {
    /// Build the effective configuration: file, then SPECKLE_* variables,
    /// then flags
    pub fn into_config(self) -> Result<SuiteConfig> {
        let env = EnvConfig::load();

        let config_file = self
            .config
            .clone()
            .or_else(|| env.config_file.clone().map(PathBuf::from));
        let mut config = match config_file {
            Some(path) => SuiteConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => SuiteConfig::default(),
        };
        env.apply(&mut config);

        if let Some(seed) = self.seed {
            config.random_seed = seed;
        } else if config.random_seed == 0 {
            config.random_seed = unix_time_seed();
        }
        if self.randomize_all {
            config.randomize_all_specs = true;
        }
        if !self.focus.is_empty() {
            config.focus_strings = self.focus;
        }
        if !self.skip.is_empty() {
            config.skip_strings = self.skip;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.fail_on_pending {
            config.fail_on_pending = true;
        }
        if let Some(attempts) = self.flake_attempts {
            config.flake_attempts = attempts;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.progress {
            config.emit_spec_progress = true;
        }
        if let Some(worker) = self.parallel_worker {
            config.parallel_worker = worker;
        }
        if let Some(total) = self.parallel_total {
            config.parallel_total = total;
        }
        if let Some(host) = self.parallel_host {
            config.parallel_host = Some(host);
        }

        config.validate()?;
        Ok(config)
    }

    /// `--log-level`, falling back to info when unparseable, raised by `-v`
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .parse::<LogLevel>()
            .unwrap_or_default()
            .more_verbose(self.verbose)
    }
}

fn unix_time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1)
}
