//! Environment variable configuration
//!
//! Provides environment variable overrides for the suite configuration.
//! Parallel workers are usually launched with their index and the worker
//! count in the environment.

use std::env;

use super::SuiteConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "SPECKLE";

/// Configuration overrides read from SPECKLE_* variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Seed from SPECKLE_SEED
    pub seed: Option<u64>,
    /// Randomize all specs from SPECKLE_RANDOMIZE_ALL
    pub randomize_all: Option<bool>,
    /// Comma-separated focus regexes from SPECKLE_FOCUS
    pub focus: Option<Vec<String>>,
    /// Comma-separated skip regexes from SPECKLE_SKIP
    pub skip: Option<Vec<String>>,
    /// Fail fast from SPECKLE_FAIL_FAST
    pub fail_fast: Option<bool>,
    /// Fail on pending from SPECKLE_FAIL_ON_PENDING
    pub fail_on_pending: Option<bool>,
    /// Retry budget from SPECKLE_FLAKE_ATTEMPTS
    pub flake_attempts: Option<u32>,
    /// Dry run from SPECKLE_DRY_RUN
    pub dry_run: Option<bool>,
    /// Progress lines from SPECKLE_EMIT_PROGRESS
    pub emit_progress: Option<bool>,
    /// Worker index from SPECKLE_PARALLEL_WORKER
    pub parallel_worker: Option<usize>,
    /// Worker count from SPECKLE_PARALLEL_TOTAL
    pub parallel_total: Option<usize>,
    /// Coordinator address from SPECKLE_PARALLEL_HOST
    pub parallel_host: Option<String>,
    /// Config file from SPECKLE_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            seed: get_env_parse("SEED"),
            randomize_all: get_env_bool("RANDOMIZE_ALL"),
            focus: get_env_list("FOCUS"),
            skip: get_env_list("SKIP"),
            fail_fast: get_env_bool("FAIL_FAST"),
            fail_on_pending: get_env_bool("FAIL_ON_PENDING"),
            flake_attempts: get_env_parse("FLAKE_ATTEMPTS"),
            dry_run: get_env_bool("DRY_RUN"),
            emit_progress: get_env_bool("EMIT_PROGRESS"),
            parallel_worker: get_env_parse("PARALLEL_WORKER"),
            parallel_total: get_env_parse("PARALLEL_TOTAL"),
            parallel_host: get_env("PARALLEL_HOST"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.seed.is_some()
            || self.randomize_all.is_some()
            || self.focus.is_some()
            || self.skip.is_some()
            || self.fail_fast.is_some()
            || self.fail_on_pending.is_some()
            || self.flake_attempts.is_some()
            || self.dry_run.is_some()
            || self.emit_progress.is_some()
            || self.parallel_worker.is_some()
            || self.parallel_total.is_some()
            || self.parallel_host.is_some()
            || self.config_file.is_some()
    }

    /// Overlay every variable that is set onto `config`
    pub fn apply(&self, config: &mut SuiteConfig) {
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(v) = self.randomize_all {
            config.randomize_all_specs = v;
        }
        if let Some(focus) = &self.focus {
            config.focus_strings = focus.clone();
        }
        if let Some(skip) = &self.skip {
            config.skip_strings = skip.clone();
        }
        if let Some(v) = self.fail_fast {
            config.fail_fast = v;
        }
        if let Some(v) = self.fail_on_pending {
            config.fail_on_pending = v;
        }
        if let Some(v) = self.flake_attempts {
            config.flake_attempts = v;
        }
        if let Some(v) = self.dry_run {
            config.dry_run = v;
        }
        if let Some(v) = self.emit_progress {
            config.emit_spec_progress = v;
        }
        if let Some(v) = self.parallel_worker {
            config.parallel_worker = v;
        }
        if let Some(v) = self.parallel_total {
            config.parallel_total = v;
        }
        if let Some(host) = &self.parallel_host {
            config.parallel_host = Some(host.clone());
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Get comma-separated environment variable
fn get_env_list(name: &str) -> Option<Vec<String>> {
    get_env(name).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set an arbitrary SPECKLE_* variable
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Set worker index and count
    pub fn worker(self, worker: usize, total: usize) -> Self {
        self.var("PARALLEL_WORKER", worker.to_string())
            .var("PARALLEL_TOTAL", total.to_string())
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every test touches the process environment, so they share one
    // sequence instead of racing each other.
    #[test]
    fn test_env_overrides() {
        let empty = EnvConfig::default();
        assert!(!empty.has_any());

        {
            let _guard = EnvBuilder::new()
                .worker(2, 3)
                .var("SEED", "99")
                .var("FAIL_FAST", "yes")
                .var("FOCUS", "login, checkout")
                .apply_scoped();

            let env = EnvConfig::load();
            assert!(env.has_any());

            let mut config = SuiteConfig::default();
            env.apply(&mut config);
            assert_eq!(config.parallel_worker, 2);
            assert_eq!(config.parallel_total, 3);
            assert_eq!(config.random_seed, 99);
            assert!(config.fail_fast);
            assert_eq!(config.focus_strings, vec!["login", "checkout"]);
            assert!(!config.dry_run);
        }

        let env = EnvConfig::load();
        assert_eq!(env.parallel_worker, None);
        assert_eq!(env.seed, None);
    }
}
