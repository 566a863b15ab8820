//! Fan-out of pattern emission over a bounded worker pool.
//!
//! Every enabled pattern is validated up front; only then is one emission
//! task spawned per pattern. A semaphore caps how many tasks emit at once.
//! Results are aggregated fail-fast: the first error aborts every remaining
//! task and is returned to the caller. Output already written stays on disk.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::GeneratorContext;
use crate::emitter::{emit, EmitOptions};
use crate::error::GeneratorError;
use crate::pattern::{validate_patterns, PatternConfig};

/// Hard ceiling on concurrent emission tasks.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of concurrent emission tasks.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Options for one generation run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Upper bound on concurrently emitting patterns
    pub max_concurrency: usize,
    /// Forwarded to every emitter as the progress hint
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            progress: false,
        }
    }
}

/// Number of workers for `patterns` patterns: `min(100, patterns, max)`,
/// never below one.
pub fn worker_count(patterns: usize, max_concurrency: usize) -> usize {
    MAX_CONCURRENCY
        .min(patterns)
        .min(max_concurrency)
        .max(1)
}

/// Generate logs for every enabled pattern and return the total line count.
///
/// Equivalent to [`run_until`] with a shutdown signal that never fires.
pub async fn run(
    configs: Vec<(String, PatternConfig)>,
    ctx: &GeneratorContext,
    options: RunOptions,
) -> Result<u64, GeneratorError> {
    run_until(configs, ctx, options, std::future::pending()).await
}

/// Generate logs for every enabled pattern until done or `shutdown` resolves.
///
/// Disabled patterns are skipped. An empty enabled set returns 0 without
/// spawning anything.
///
/// # Errors
///
/// - Any validation error, before a single file is touched
/// - The first error reported by an emission task; the rest are aborted
/// - `GeneratorError::Interrupted` when `shutdown` resolves first, carrying
///   the line count of tasks that had already finished
/// - `GeneratorError::WorkerPanic` if a task panicked
pub async fn run_until<F>(
    configs: Vec<(String, PatternConfig)>,
    ctx: &GeneratorContext,
    options: RunOptions,
    shutdown: F,
) -> Result<u64, GeneratorError>
where
    F: Future<Output = ()>,
{
    let configs: Vec<_> = configs
        .into_iter()
        .filter(|(_, config)| config.enabled)
        .collect();
    if configs.is_empty() {
        info!("No enabled patterns, nothing to generate");
        return Ok(0);
    }

    let patterns = validate_patterns(configs, ctx.registry())?;
    let workers = worker_count(patterns.len(), options.max_concurrency);
    info!(
        patterns = patterns.len(),
        workers = workers,
        "Starting log generation"
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let emit_options = EmitOptions {
        progress: options.progress,
    };
    let started = Instant::now();

    let mut tasks = JoinSet::new();
    for (index, pattern) in patterns.into_iter().enumerate() {
        let mut rng = ctx.rng_for(index);
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| GeneratorError::WorkerPanic(e.to_string()))?;
            debug!(pattern = %pattern.name, "Worker acquired");
            emit(&pattern, &mut rng, emit_options).await
        });
    }

    let mut total: u64 = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok(Ok(count))) => total += count,
                Some(Ok(Err(e))) => {
                    error!(error = %e, "Pattern failed, aborting remaining tasks");
                    tasks.shutdown().await;
                    return Err(e);
                }
                Some(Err(e)) => {
                    error!(error = %e, "Worker task failed, aborting remaining tasks");
                    tasks.shutdown().await;
                    return Err(GeneratorError::WorkerPanic(e.to_string()));
                }
            },
            () = &mut shutdown => {
                warn!(lines_completed = total, "Shutdown signal received, stopping generation");
                tasks.shutdown().await;
                return Err(GeneratorError::Interrupted { lines_completed: total });
            }
        }
    }

    info!(
        total_lines = total,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Log generation completed"
    );
    Ok(total)
}
