//! synth-logs Library
//!
//! This library generates synthetic log streams at a controlled rate, for
//! feeding test traffic into log pipelines:
//!
//! - **config**: Environment-based process settings
//! - **pattern**: Pattern files, validation, and the output path guard
//! - **producers** / **registry**: Named random-value producers and their lookup
//! - **field** / **template**: Field resolution and line rendering
//! - **emitter**: Drift-compensated emission of one pattern
//! - **orchestrator**: Bounded concurrent run over all enabled patterns
//!
//! # Example
//!
//! ```no_run
//! use synth_logs::{run, GeneratorContext, PatternConfig, RunOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut pattern = PatternConfig::raw("/tmp/app.log", vec!["hello".to_string()]);
//!     pattern.eps = 5;
//!     pattern.time_period = 10;
//!
//!     let ctx = GeneratorContext::new();
//!     let total = run(vec![("app.yml".to_string(), pattern)], &ctx, RunOptions::default())
//!         .await
//!         .expect("generation failed");
//!     println!("Generated {} logs", total);
//! }
//! ```

// Module declarations
pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod field;
pub mod orchestrator;
pub mod pattern;
pub mod producers;
pub mod registry;
pub mod template;

// Re-export commonly used types at crate root for convenience
pub use config::{Config, ConfigError};
pub use context::GeneratorContext;
pub use emitter::{emit, EmitOptions, Pacer};
pub use error::{ErrorKind, GeneratorError};
pub use field::{resolve_field, FieldSet, FieldSpec};
pub use orchestrator::{run, run_until, RunOptions, MAX_CONCURRENCY};
pub use pattern::{load_patterns, validate_path, Content, Pattern, PatternConfig};
pub use producers::{Producer, ProducerKind, Value};
pub use registry::Registry;
pub use template::{render_template, Template};
