//! Pattern configuration and validation.
//!
//! A pattern describes one synthetic log stream: where it goes, how fast, for
//! how long, and how each line is built. Pattern files are decoded into the
//! loosely typed [`PatternConfig`] and then validated into a [`Pattern`], in
//! which the `template`/`raw` split is a type rather than a convention.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::GeneratorError;
use crate::field::FieldSet;
use crate::registry::Registry;
use crate::template::Template;

/// Default target events per second.
pub const DEFAULT_EPS: u64 = 1;

/// Default run time in seconds.
pub const DEFAULT_TIME_PERIOD: u64 = 60;

/// Default EPS correction percentage.
pub const DEFAULT_CORRECTION: f64 = 1.12;

/// Extension of pattern files in a patterns directory.
pub const PATTERN_EXTENSION: &str = "yml";

fn default_eps() -> u64 {
    DEFAULT_EPS
}

fn default_time_period() -> u64 {
    DEFAULT_TIME_PERIOD
}

fn default_generator_type() -> String {
    "raw".to_string()
}

fn default_correction() -> f64 {
    DEFAULT_CORRECTION
}

/// A pattern as decoded from YAML, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// Display name; the file identifier is used when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Output file
    pub path: PathBuf,

    /// Target events per second before correction
    #[serde(default = "default_eps")]
    pub eps: u64,

    /// Seconds to run
    #[serde(default = "default_time_period")]
    pub time_period: u64,

    /// `template` or `raw`
    #[serde(default = "default_generator_type")]
    pub generator_type: String,

    /// Field specifications (template patterns)
    #[serde(default)]
    pub fields: Option<BTreeMap<String, serde_yaml::Value>>,

    /// Template strings (template patterns); kept loose so a non-list is
    /// reported as a configuration error rather than a decode error
    #[serde(default)]
    pub template: Option<serde_yaml::Value>,

    /// Literal lines (raw patterns)
    #[serde(default)]
    pub examples: Option<Vec<String>>,

    /// Delete the output file before writing
    #[serde(default)]
    pub remove_file: bool,

    /// EPS correction percentage
    #[serde(default = "default_correction")]
    pub correction: f64,

    /// Disabled patterns are skipped
    #[serde(default)]
    pub enabled: bool,
}

impl PatternConfig {
    /// Create an enabled raw pattern with default rate settings.
    pub fn raw(path: impl Into<PathBuf>, examples: Vec<String>) -> Self {
        Self {
            name: None,
            path: path.into(),
            eps: DEFAULT_EPS,
            time_period: DEFAULT_TIME_PERIOD,
            generator_type: "raw".to_string(),
            fields: None,
            template: None,
            examples: Some(examples),
            remove_file: false,
            correction: DEFAULT_CORRECTION,
            enabled: true,
        }
    }

    /// Decode a pattern from YAML text.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Validate into a [`Pattern`], compiling fields and templates.
    ///
    /// `id` names the pattern in errors when the config has no `name`.
    ///
    /// # Errors
    ///
    /// Any configuration problem: unknown generator type, missing examples,
    /// missing or non-list templates, bad field specifications, unknown
    /// functions, or an effective rate below one event per second.
    pub fn validate(self, id: &str, registry: &Registry) -> Result<Pattern, GeneratorError> {
        let name = self.name.clone().unwrap_or_else(|| id.to_string());

        let content = match self.generator_type.as_str() {
            "template" => self.template_content(&name, registry)?,
            "raw" => match self.examples {
                Some(ref examples) if !examples.is_empty() => Content::Raw {
                    examples: examples.clone(),
                },
                _ => return Err(GeneratorError::MissingExamples { pattern: name }),
            },
            other => {
                return Err(GeneratorError::InvalidGeneratorType {
                    pattern: name,
                    value: other.to_string(),
                })
            }
        };

        let effective_eps = effective_eps(self.eps, self.correction).ok_or_else(|| {
            GeneratorError::InvalidRate {
                pattern: name.clone(),
                eps: self.eps,
                correction: self.correction,
            }
        })?;

        Ok(Pattern {
            name,
            path: self.path,
            eps: self.eps,
            effective_eps,
            time_period: self.time_period,
            correction: self.correction,
            remove_file: self.remove_file,
            content,
        })
    }

    fn template_content(&self, name: &str, registry: &Registry) -> Result<Content, GeneratorError> {
        let sources = match &self.template {
            None => {
                return Err(GeneratorError::MissingTemplates {
                    pattern: name.to_string(),
                })
            }
            Some(serde_yaml::Value::Sequence(items)) => items,
            Some(_) => {
                return Err(GeneratorError::TemplateNotList {
                    pattern: name.to_string(),
                })
            }
        };
        if sources.is_empty() {
            return Err(GeneratorError::MissingTemplates {
                pattern: name.to_string(),
            });
        }

        let raw_fields = self.fields.as_ref().ok_or_else(|| GeneratorError::MissingFields {
            pattern: name.to_string(),
        })?;
        let fields = FieldSet::compile(name, raw_fields, registry)?;

        let templates = sources
            .iter()
            .map(|source| match source {
                serde_yaml::Value::String(s) => Template::compile(s, &fields),
                other => Err(GeneratorError::InvalidTemplate {
                    template: format!("{:?}", other),
                    reason: "template entries must be strings".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Content::Template { templates, fields })
    }
}

/// How lines of a pattern are produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Render a randomly chosen template with fresh field values.
    Template {
        templates: Vec<Template>,
        fields: FieldSet,
    },
    /// Pick a random literal line.
    Raw { examples: Vec<String> },
}

impl Content {
    /// `template` or `raw`.
    pub fn generator_type(&self) -> &'static str {
        match self {
            Content::Template { .. } => "template",
            Content::Raw { .. } => "raw",
        }
    }
}

/// A validated pattern, ready to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub path: PathBuf,
    pub eps: u64,
    pub effective_eps: u64,
    pub time_period: u64,
    pub correction: f64,
    pub remove_file: bool,
    pub content: Content,
}

impl Pattern {
    /// Number of lines a full run writes.
    pub fn total_lines(&self) -> u64 {
        self.effective_eps.saturating_mul(self.time_period)
    }

    /// Ideal gap between two emissions.
    pub fn target_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.effective_eps as f64)
    }
}

/// Apply the correction percentage: `round(eps * (1 + correction / 100))`.
///
/// Rounding is half-to-even. Returns `None` when the result is below 1, which
/// would make the emission interval undefined.
pub fn effective_eps(eps: u64, correction: f64) -> Option<u64> {
    let corrected = (eps as f64 * (1.0 + correction / 100.0)).round_ties_even();
    if corrected.is_finite() && corrected >= 1.0 {
        Some(corrected as u64)
    } else {
        None
    }
}

/// Validate a set of decoded patterns.
///
/// Every pattern is validated before any is returned, and two patterns
/// writing to the same path are rejected.
pub fn validate_patterns(
    configs: Vec<(String, PatternConfig)>,
    registry: &Registry,
) -> Result<Vec<Pattern>, GeneratorError> {
    let mut seen: HashMap<PathBuf, String> = HashMap::new();
    let mut patterns = Vec::with_capacity(configs.len());

    for (id, config) in configs {
        let pattern = config.validate(&id, registry)?;
        debug!(
            pattern = %pattern.name,
            path = %pattern.path.display(),
            generator_type = pattern.content.generator_type(),
            effective_eps = pattern.effective_eps,
            total_lines = pattern.total_lines(),
            "Pattern validated"
        );

        if let Some(first) = seen.insert(pattern.path.clone(), pattern.name.clone()) {
            return Err(GeneratorError::DuplicatePath {
                path: pattern.path,
                first,
                second: pattern.name,
            });
        }
        patterns.push(pattern);
    }

    Ok(patterns)
}

/// Load every `*.yml` pattern file in `dir`, keyed by file name.
///
/// # Errors
///
/// Returns `GeneratorError::Io` if the directory or a file cannot be read and
/// `GeneratorError::Yaml` if a file does not decode.
pub fn load_patterns(dir: &Path) -> Result<BTreeMap<String, PatternConfig>, GeneratorError> {
    let entries = fs::read_dir(dir).map_err(|e| GeneratorError::io(dir, e))?;
    let mut patterns = BTreeMap::new();

    for entry in entries {
        let path = entry.map_err(|e| GeneratorError::io(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PATTERN_EXTENSION) {
            continue;
        }

        debug!(file = %path.display(), "Loading pattern file");
        let source = fs::read_to_string(&path).map_err(|e| GeneratorError::io(&path, e))?;
        let config = PatternConfig::from_yaml(&source).map_err(|e| GeneratorError::Yaml {
            path: path.clone(),
            source: e,
        })?;

        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        patterns.insert(id, config);
    }

    info!(directory = %dir.display(), count = patterns.len(), "Loaded pattern files");
    Ok(patterns)
}

/// Keep only enabled patterns.
pub fn enabled(patterns: BTreeMap<String, PatternConfig>) -> Vec<(String, PatternConfig)> {
    patterns
        .into_iter()
        .filter(|(_, config)| config.enabled)
        .collect()
}

/// Reject output paths outside the allowed directories.
///
/// Relative paths are resolved against the current directory and `.`/`..`
/// components are folded before comparing. The check is lexical and
/// compares whole path components.
pub fn validate_path(path: &Path, allowed: &[PathBuf]) -> Result<(), GeneratorError> {
    let absolute = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(
            &std::env::current_dir()
                .map_err(|e| GeneratorError::io(path, e))?
                .join(path),
        )
    };

    if allowed.iter().any(|dir| absolute.starts_with(normalize(dir))) {
        Ok(())
    } else {
        Err(GeneratorError::PathNotAllowed { path: absolute })
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_)) | None
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
