//! Error types for pattern validation and log generation.
//!
//! Every failure the engine can report is a [`GeneratorError`]. Callers that
//! need to pick a coarse reaction (exit code, retry the whole run, treat as a
//! clean stop) should match on [`GeneratorError::kind`] instead of on the
//! individual variants.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`GeneratorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A pattern or field specification is invalid.
    Configuration,
    /// A function name could not be resolved by the registry.
    Lookup,
    /// Creating, writing or removing an output file failed.
    Io,
    /// The run was stopped by an external interrupt.
    Interrupt,
    /// A worker task died without reporting a result.
    Internal,
}

/// Errors that can occur while validating patterns or generating logs.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("[{pattern}] - Generator type {value} doesn't exist (expected 'template' or 'raw')")]
    InvalidGeneratorType { pattern: String, value: String },

    #[error("[{pattern}] - Generator type 'raw' requires 'examples' field with sample logs")]
    MissingExamples { pattern: String },

    #[error("[{pattern}] - Generator type 'template' requires a non-empty 'template' list")]
    MissingTemplates { pattern: String },

    #[error("[{pattern}] - template must be a list of templates")]
    TemplateNotList { pattern: String },

    #[error("[{pattern}] - Generator type 'template' requires a 'fields' mapping")]
    MissingFields { pattern: String },

    #[error("[{pattern}] - invalid value for field '{field}': {value} (field value can be a string or a list)")]
    InvalidFieldValue {
        pattern: String,
        field: String,
        value: String,
    },

    #[error("invalid arguments for function '{function}': {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("template '{template}' references unknown field '{name}'")]
    UnknownPlaceholder { template: String, name: String },

    #[error("[{pattern}] - eps {eps} with correction {correction}% gives an effective rate below 1 event per second")]
    InvalidRate {
        pattern: String,
        eps: u64,
        correction: f64,
    },

    #[error("patterns '{first}' and '{second}' both write to {}", path.display())]
    DuplicatePath {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("path {} is not in an allowed directory", path.display())]
    PathNotAllowed { path: PathBuf },

    #[error("function '{name}' not found (available: {})", available.join(", "))]
    UnknownFunction {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("failed to decode pattern file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("generation interrupted after {lines_completed} completed lines")]
    Interrupted { lines_completed: u64 },

    #[error("worker task failed: {0}")]
    WorkerPanic(String),
}

impl GeneratorError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeneratorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeneratorError::UnknownFunction { .. } => ErrorKind::Lookup,
            GeneratorError::Io { .. } => ErrorKind::Io,
            GeneratorError::Interrupted { .. } => ErrorKind::Interrupt,
            GeneratorError::WorkerPanic(_) => ErrorKind::Internal,
            _ => ErrorKind::Configuration,
        }
    }
}
