//! Rate-controlled emission of one pattern.
//!
//! The emitter writes `effective_eps * time_period` lines to the pattern's
//! output file, one at a time, flushing after each so a tailer sees lines at
//! the paced rate. Between lines it sleeps for whatever is left of the target
//! interval, minus the overshoot of the previous sleep, which keeps the long
//! run average close to the target despite write and scheduler jitter.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::GeneratorError;
use crate::pattern::{Content, Pattern};
use crate::template::render_template;

/// Longest gap between two progress reports.
const PROGRESS_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Number of progress reports over a full run.
const PROGRESS_STEPS: u64 = 10;

/// Per-run emission options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    /// Log periodic progress at info level
    pub progress: bool,
}

/// Drift-compensating sleep calculator.
///
/// All quantities are signed seconds: a negative wait means the iteration is
/// already late, and the debt carries into the next one.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: f64,
    overshoot: f64,
}

impl Pacer {
    /// Create a pacer targeting one emission per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.as_secs_f64(),
            overshoot: 0.0,
        }
    }

    /// Requested wait after a write that took `elapsed_write`.
    pub fn wait_after(&self, elapsed_write: Duration) -> f64 {
        self.interval - elapsed_write.as_secs_f64() - self.overshoot
    }

    /// Duration to actually suspend for a requested wait. Never negative.
    pub fn suspension(wait: f64) -> Duration {
        if wait > 0.0 {
            Duration::from_secs_f64(wait)
        } else {
            Duration::ZERO
        }
    }

    /// Record how long the suspension for `wait` really took.
    pub fn record(&mut self, wait: f64, slept: Duration) {
        self.overshoot = slept.as_secs_f64() - wait;
    }

    /// Overshoot carried into the next iteration.
    pub fn overshoot(&self) -> f64 {
        self.overshoot
    }
}

/// Emit every line of `pattern` and return how many were written.
///
/// # Errors
///
/// Returns `GeneratorError::Io` if the file cannot be removed (other than
/// not existing), created, or written. Nothing is retried; lines already
/// written stay on disk.
pub async fn emit<R: Rng + ?Sized>(
    pattern: &Pattern,
    rng: &mut R,
    options: EmitOptions,
) -> Result<u64, GeneratorError> {
    let name = pattern.name.as_str();
    let path = pattern.path.as_path();
    let total = pattern.total_lines();
    let interval = pattern.target_interval();

    debug!(
        pattern = %name,
        path = %path.display(),
        eps = pattern.eps,
        correction = pattern.correction,
        effective_eps = pattern.effective_eps,
        time_period = pattern.time_period,
        total_lines = total,
        interval_secs = interval.as_secs_f64(),
        generator_type = pattern.content.generator_type(),
        "Generating logs"
    );

    let mut file = prime_file(pattern).await?;

    let mut pacer = Pacer::new(interval);
    let report_every = (total / PROGRESS_STEPS).max(1);
    let started = Instant::now();
    let mut last_report = started;
    let mut line = String::new();

    for written in 1..=total {
        let start = Instant::now();

        line.clear();
        next_line(&pattern.content, rng, &mut line);
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GeneratorError::io(path, e))?;
        // Each line must be visible to a tailer before the next one starts
        file.flush().await.map_err(|e| GeneratorError::io(path, e))?;

        let wait = pacer.wait_after(start.elapsed());
        let sleep_start = Instant::now();
        let suspension = Pacer::suspension(wait);
        if !suspension.is_zero() {
            tokio::time::sleep(suspension).await;
        }
        pacer.record(wait, sleep_start.elapsed());

        if options.progress
            && (written % report_every == 0
                || last_report.elapsed() >= PROGRESS_REPORT_INTERVAL)
        {
            let elapsed = started.elapsed().as_secs_f64();
            info!(
                pattern = %name,
                lines_written = written,
                total_lines = total,
                rate = format!("{:.1}/s", written as f64 / elapsed.max(f64::EPSILON)),
                "Generator progress"
            );
            last_report = Instant::now();
        }
    }

    file.flush().await.map_err(|e| GeneratorError::io(path, e))?;
    debug!(
        pattern = %name,
        lines = total,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Pattern completed"
    );

    Ok(total)
}

/// Remove the old file if requested, create the parent directory, and open
/// the output in append mode.
async fn prime_file(pattern: &Pattern) -> Result<File, GeneratorError> {
    let path = pattern.path.as_path();

    if pattern.remove_file {
        match fs::remove_file(path).await {
            Ok(()) => debug!(pattern = %pattern.name, path = %path.display(), "File removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(pattern = %pattern.name, path = %path.display(), "File doesn't exist")
            }
            Err(e) => return Err(GeneratorError::io(path, e)),
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !path_exists(parent).await {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GeneratorError::io(parent, e))?;
            debug!(pattern = %pattern.name, path = %parent.display(), "Created path");
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| GeneratorError::io(path, e))
}

async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Produce one line (without terminator) into `out`.
fn next_line<R: Rng + ?Sized>(content: &Content, rng: &mut R, out: &mut String) {
    match content {
        Content::Template { templates, fields } => {
            if let Some(template) = templates.choose(rng) {
                out.push_str(&render_template(template, fields, rng));
            }
        }
        Content::Raw { examples } => {
            if let Some(example) = examples.choose(rng) {
                out.push_str(example);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternConfig;
    use crate::registry::Registry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn raw_pattern(path: &Path, examples: &[&str], eps: u64, time_period: u64) -> Pattern {
        let mut config = PatternConfig::raw(path, examples.iter().map(|s| s.to_string()).collect());
        config.eps = eps;
        config.time_period = time_period;
        config.correction = 0.0;
        config.validate("test", &Registry::new()).unwrap()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_pacer_wait_and_overshoot() {
        let mut pacer = Pacer::new(Duration::from_millis(100));
        let wait = pacer.wait_after(Duration::from_millis(10));
        assert!((wait - 0.09).abs() < 1e-9);

        // Slept 5ms too long: next wait shrinks by 5ms
        pacer.record(wait, Duration::from_millis(95));
        assert!((pacer.overshoot() - 0.005).abs() < 1e-9);
        let next = pacer.wait_after(Duration::from_millis(10));
        assert!((next - 0.085).abs() < 1e-9);
    }

    #[test]
    fn test_pacer_negative_wait_carries_debt() {
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let wait = pacer.wait_after(Duration::from_millis(25));
        assert!(wait < 0.0);
        assert_eq!(Pacer::suspension(wait), Duration::ZERO);

        pacer.record(wait, Duration::ZERO);
        assert!((pacer.overshoot() - 0.015).abs() < 1e-9);
        // Next iteration is owed nothing: 10ms - 1ms - 15ms < 0
        assert!(pacer.wait_after(Duration::from_millis(1)) < 0.0);
    }

    #[test]
    fn test_suspension_is_never_negative() {
        assert_eq!(Pacer::suspension(-1.0), Duration::ZERO);
        assert_eq!(Pacer::suspension(0.0), Duration::ZERO);
        assert_eq!(Pacer::suspension(0.25), Duration::from_millis(250));
    }

    fn shares(content: &Content, prefixes: &[&str], trials: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = vec![0usize; prefixes.len()];
        let mut line = String::new();
        for _ in 0..trials {
            line.clear();
            next_line(content, &mut rng, &mut line);
            let hit = prefixes
                .iter()
                .position(|p| line.starts_with(p))
                .unwrap_or_else(|| panic!("unexpected line {:?}", line));
            counts[hit] += 1;
        }
        counts.iter().map(|&c| c as f64 / trials as f64).collect()
    }

    #[test]
    fn test_every_template_is_chosen() {
        let yaml = "path: /tmp/unused.log\ngenerator_type: template\n\
                    template: [\"first {user}\", \"second {user}\"]\nfields:\n  user: [alice]\n";
        let pattern = PatternConfig::from_yaml(yaml)
            .unwrap()
            .validate("two", &Registry::new())
            .unwrap();

        for share in shares(&pattern.content, &["first alice", "second alice"], 1_000) {
            assert!((share - 0.5).abs() < 0.06, "share {}", share);
        }
    }

    #[test]
    fn test_every_example_is_chosen() {
        let pattern = raw_pattern(Path::new("/tmp/unused.log"), &["one", "two", "three"], 1, 1);

        for share in shares(&pattern.content, &["one", "two", "three"], 1_500) {
            assert!((share - 1.0 / 3.0).abs() < 0.06, "share {}", share);
        }
    }

    #[tokio::test]
    async fn test_raw_scenario_emits_exact_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.log");
        let pattern = raw_pattern(&path, &["A", "B"], 2, 1);
        let mut rng = StdRng::seed_from_u64(42);

        let count = emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();

        assert_eq!(count, 2);
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l == "A" || l == "B"));
    }

    #[tokio::test]
    async fn test_template_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpl.log");
        let yaml = format!(
            "path: {}\ngenerator_type: template\neps: 1\ntime_period: 1\ncorrection: 0\n\
             template: [\"{{0}} user={{user}}\"]\nfields:\n  user: [alice, bob]\n",
            path.display()
        );
        let pattern = PatternConfig::from_yaml(&yaml)
            .unwrap()
            .validate("tpl", &Registry::new())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let count = emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();

        assert_eq!(count, 1);
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.ends_with(" user=alice") || line.ends_with(" user=bob"));
        let (stamp, _) = line.split_once(" user=").unwrap();
        assert!(
            chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.f").is_ok(),
            "unexpected timestamp {}",
            stamp
        );
    }

    #[tokio::test]
    async fn test_zero_time_period_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        let pattern = raw_pattern(&path, &["A"], 5, 0);
        let mut rng = StdRng::seed_from_u64(0);

        let count = emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();

        assert_eq!(count, 0);
        assert!(read_lines(&path).is_empty());
    }

    #[tokio::test]
    async fn test_appends_and_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.log");
        std::fs::write(&path, "old\n").unwrap();

        let pattern = raw_pattern(&path, &["new"], 20, 0);
        let mut rng = StdRng::seed_from_u64(0);
        emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();
        assert_eq!(read_lines(&path), vec!["old"]);

        let mut pattern = raw_pattern(&path, &["new"], 4, 1);
        emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();
        assert_eq!(read_lines(&path).len(), 5);

        pattern.remove_file = true;
        pattern.effective_eps = 2;
        emit(&pattern, &mut rng, EmitOptions { progress: true })
            .await
            .unwrap();
        assert_eq!(read_lines(&path), vec!["new", "new"]);
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/fresh.log");
        let mut pattern = raw_pattern(&path, &["x"], 1, 1);
        pattern.remove_file = true;
        let mut rng = StdRng::seed_from_u64(0);

        let count = emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(read_lines(&path), vec!["x"]);
    }

    #[tokio::test]
    async fn test_io_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // The output path is an existing directory
        let pattern = raw_pattern(dir.path(), &["x"], 1, 1);
        let mut rng = StdRng::seed_from_u64(0);

        let err = emit(&pattern, &mut rng, EmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Io { .. }));
    }

    #[tokio::test]
    async fn test_pacing_holds_average_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rate.log");
        let pattern = raw_pattern(&path, &["tick"], 50, 1);
        let mut rng = StdRng::seed_from_u64(0);

        let started = Instant::now();
        let count = emit(&pattern, &mut rng, EmitOptions::default()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(count, 50);
        // 50 lines at 50/s should take about a second
        assert!(elapsed >= Duration::from_millis(800), "too fast: {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(3), "too slow: {:?}", elapsed);
    }
}
