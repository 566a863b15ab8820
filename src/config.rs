//! Configuration module for the synth-logs generator.
//!
//! Process settings are read from environment variables with defaults and
//! range checks. Command-line flags in the binary override them.

use std::env;
use std::path::PathBuf;

use crate::orchestrator::{DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY};

/// Patterns directory, relative to the home directory
const DEFAULT_PATTERNS_SUBDIR: &str = ".config/synth-logs/patterns";

/// Output root that is always allowed by default
const DEFAULT_ALLOWED_DIR: &str = "/tmp";

const ENV_PATTERNS: &str = "SYNTH_LOGS_PATTERNS";
const ENV_MAX_CONCURRENCY: &str = "SYNTH_LOGS_MAX_CONCURRENCY";
const ENV_PROGRESS: &str = "SYNTH_LOGS_PROGRESS";
const ENV_SEED: &str = "SYNTH_LOGS_SEED";
const ENV_ALLOWED_DIRS: &str = "SYNTH_LOGS_ALLOWED_DIRS";

/// Configuration for a generator run.
///
/// All settings can be configured via environment variables:
/// - `SYNTH_LOGS_PATTERNS`: Directory of `*.yml` pattern files (default: ~/.config/synth-logs/patterns)
/// - `SYNTH_LOGS_MAX_CONCURRENCY`: Concurrent patterns, 1-100 (default: 10)
/// - `SYNTH_LOGS_PROGRESS`: Log periodic progress (default: false)
/// - `SYNTH_LOGS_SEED`: Seed for reproducible field values (default: unset)
/// - `SYNTH_LOGS_ALLOWED_DIRS`: Comma-separated output roots (default: /tmp and $HOME)
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding pattern files
    pub patterns_dir: PathBuf,

    /// Maximum number of patterns emitting at once
    pub max_concurrency: usize,

    /// Log periodic progress while emitting
    pub progress: bool,

    /// Seed for the random streams; entropy when unset
    pub seed: Option<u64>,

    /// Pattern output paths must live under one of these
    pub allowed_dirs: Vec<PathBuf>,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `SYNTH_LOGS_MAX_CONCURRENCY` is not a number or outside 1-100
    /// - `SYNTH_LOGS_PROGRESS` is not a recognizable boolean
    /// - `SYNTH_LOGS_SEED` is not a valid unsigned integer
    /// - `SYNTH_LOGS_ALLOWED_DIRS` is set but names no directory
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use synth_logs::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Patterns: {}", config.patterns_dir.display());
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let patterns_dir = env::var(ENV_PATTERNS)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_patterns_dir());

        let max_concurrency = match env::var(ENV_MAX_CONCURRENCY) {
            Ok(value) => Self::parse_max_concurrency(&value, Some(ENV_MAX_CONCURRENCY))?,
            Err(_) => DEFAULT_MAX_CONCURRENCY,
        };

        let progress = match env::var(ENV_PROGRESS) {
            Ok(value) => parse_bool(&value).ok_or_else(|| ConfigError {
                message: format!("'{}' is not a valid boolean", value),
                env_var: Some(ENV_PROGRESS.to_string()),
            })?,
            Err(_) => false,
        };

        let seed = match env::var(ENV_SEED) {
            Ok(value) => Some(value.parse().map_err(|_| ConfigError {
                message: format!("'{}' is not a valid seed", value),
                env_var: Some(ENV_SEED.to_string()),
            })?),
            Err(_) => None,
        };

        let allowed_dirs = Self::parse_allowed_dirs()?;

        Ok(Self {
            patterns_dir,
            max_concurrency,
            progress,
            seed,
            allowed_dirs,
        })
    }

    /// Validate a max concurrency value from the environment or the CLI.
    pub fn parse_max_concurrency(value: &str, env_var: Option<&str>) -> Result<usize, ConfigError> {
        let error = |message: String| ConfigError {
            message,
            env_var: env_var.map(str::to_string),
        };

        let max: usize = value
            .trim()
            .parse()
            .map_err(|_| error(format!("'{}' is not a valid number", value)))?;

        if max == 0 {
            return Err(error("max concurrency must be greater than 0".to_string()));
        }

        if max > MAX_CONCURRENCY {
            return Err(error(format!(
                "max concurrency {} exceeds maximum allowed ({})",
                max, MAX_CONCURRENCY
            )));
        }

        Ok(max)
    }

    fn parse_allowed_dirs() -> Result<Vec<PathBuf>, ConfigError> {
        match env::var(ENV_ALLOWED_DIRS) {
            Ok(value) => {
                let dirs: Vec<PathBuf> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();

                if dirs.is_empty() {
                    return Err(ConfigError {
                        message: "no directory given".to_string(),
                        env_var: Some(ENV_ALLOWED_DIRS.to_string()),
                    });
                }

                Ok(dirs)
            }
            Err(_) => Ok(default_allowed_dirs()),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    fn default() -> Self {
        Self {
            patterns_dir: default_patterns_dir(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            progress: false,
            seed: None,
            allowed_dirs: default_allowed_dirs(),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

fn default_patterns_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PATTERNS_SUBDIR)
}

fn default_allowed_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(DEFAULT_ALLOWED_DIR)];
    dirs.extend(home_dir());
    dirs
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
