//! synth-logs - Synthetic log stream generator
//!
//! Reads every `*.yml` pattern in the patterns directory and writes each
//! enabled pattern's log lines to its output file at the configured rate.
//!
//! ## Configuration
//!
//! Settings come from environment variables, overridden by flags:
//!
//! - `SYNTH_LOGS_PATTERNS` / `--patterns`: Pattern directory (default: ~/.config/synth-logs/patterns)
//! - `SYNTH_LOGS_MAX_CONCURRENCY` / `--max-concur-req`: Concurrent patterns (default: 10)
//! - `SYNTH_LOGS_PROGRESS` / `--progress-bar`: Log periodic progress (default: off)
//! - `SYNTH_LOGS_SEED` / `--seed`: Seed for reproducible values (default: unset)
//! - `SYNTH_LOGS_ALLOWED_DIRS`: Allowed output roots (default: /tmp and $HOME)
//! - `RUST_LOG`: Logging filter, takes precedence over `--log-level` (default: warn)
//!
//! ## Exit codes
//!
//! 0 on success, 1 for configuration errors, 2 for any other failure and
//! 130 when interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use synth_logs::config::{Config, ConfigError};
use synth_logs::pattern::{enabled, load_patterns, validate_path};
use synth_logs::{run_until, ErrorKind, GeneratorContext, GeneratorError, RunOptions};

const EXIT_CONFIGURATION: u8 = 1;
const EXIT_FAILURE: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

/// Generate synthetic log streams from YAML patterns
#[derive(Parser, Debug)]
#[command(name = "synth-logs", version, about, long_about = None)]
struct Cli {
    /// Directory of *.yml pattern files
    #[arg(short = 'p', long)]
    patterns: Option<PathBuf>,

    /// Maximum number of patterns generating concurrently (1-100)
    #[arg(short = 'm', long = "max-concur-req", value_parser = parse_max_concurrency)]
    max_concur_req: Option<usize>,

    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(short = 'l', long, default_value = "WARNING")]
    log_level: String,

    /// Log periodic progress for every pattern
    #[arg(long, overrides_with = "no_progress_bar")]
    progress_bar: bool,

    /// Disable progress logging
    #[arg(long, overrides_with = "progress_bar")]
    no_progress_bar: bool,

    /// Seed for reproducible field values
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    /// Apply flag overrides on top of environment configuration.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(patterns) = &self.patterns {
            config.patterns_dir = patterns.clone();
        }
        if let Some(max) = self.max_concur_req {
            config.max_concurrency = max;
        }
        if self.progress_bar {
            config.progress = true;
        } else if self.no_progress_bar {
            config.progress = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

fn parse_max_concurrency(value: &str) -> Result<usize, String> {
    Config::parse_max_concurrency(value, None).map_err(|e| e.message)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    let config = match Config::from_env() {
        Ok(config) => cli.apply(config),
        Err(e) => return config_failure(e),
    };
    info!(
        patterns_dir = %config.patterns_dir.display(),
        max_concurrency = config.max_concurrency,
        progress = config.progress,
        seed = ?config.seed,
        "Configuration loaded"
    );

    match generate(&config).await {
        Ok(total) => {
            println!("Generated {} logs", total);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::Interrupt => warn!(error = %e, "Generation interrupted"),
                _ => error!(error = %e, "Generation failed"),
            }
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

/// Load, guard, and run every enabled pattern.
async fn generate(config: &Config) -> Result<u64, GeneratorError> {
    let patterns = enabled(load_patterns(&config.patterns_dir)?);

    for (id, pattern) in &patterns {
        if let Err(e) = validate_path(&pattern.path, &config.allowed_dirs) {
            error!(
                pattern = %id,
                allowed = ?config.allowed_dirs,
                "Output path outside allowed directories"
            );
            return Err(e);
        }
    }

    let ctx = match config.seed {
        Some(seed) => GeneratorContext::with_seed(seed),
        None => GeneratorContext::new(),
    };
    let options = RunOptions {
        max_concurrency: config.max_concurrency,
        progress: config.progress,
    };

    run_until(patterns, &ctx, options, shutdown_signal()).await
}

/// Resolve on Ctrl+C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping..."),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}

fn config_failure(e: ConfigError) -> ExitCode {
    error!(error = %e, "Failed to load configuration");
    ExitCode::from(EXIT_CONFIGURATION)
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Configuration | ErrorKind::Lookup => EXIT_CONFIGURATION,
        ErrorKind::Interrupt => EXIT_INTERRUPTED,
        ErrorKind::Io | ErrorKind::Internal => EXIT_FAILURE,
    }
}

/// Map a level name to a filter directive. `WARNING` and `CRITICAL` are
/// accepted alongside the tracing names.
fn level_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
