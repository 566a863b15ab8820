//! Function registry mapping dispatch names to producers.
//!
//! A name is resolved in three steps:
//!
//! 1. a `func_` prefix marks an explicit reference; the remainder must match
//!    a producer name exactly
//! 2. otherwise the whole name is tried as a producer name
//! 3. otherwise the name is split on `_` and the second token is tried
//!
//! Successful resolutions are cached for the lifetime of the registry. Each
//! key is written at most once and resolution is idempotent, so concurrent
//! readers racing on the same missing key simply store the same answer.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, error};

use crate::error::GeneratorError;
use crate::producers::ProducerKind;

/// Prefix marking a string as a dispatch string rather than a literal.
pub const DISPATCH_PREFIX: &str = "func_";

/// Name to producer lookup with a resolution cache.
#[derive(Debug, Default)]
pub struct Registry {
    cache: RwLock<HashMap<String, ProducerKind>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a string is an explicit dispatch reference (`func_...`).
    pub fn is_dispatch(value: &str) -> bool {
        value.starts_with(DISPATCH_PREFIX)
    }

    /// Resolve a function name to a producer kind.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::UnknownFunction` if no resolution step matches.
    /// The error carries every name the registry knows.
    pub fn lookup(&self, name: &str) -> Result<ProducerKind, GeneratorError> {
        if let Some(kind) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(*kind);
        }

        debug!(function = %name, "Looking up function");

        match Self::resolve(name) {
            Some(kind) => {
                self.cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(name.to_string())
                    .or_insert(kind);
                Ok(kind)
            }
            None => {
                let available = ProducerKind::known_names();
                error!(function = %name, "Error finding function");
                debug!(available = ?available, "Available functions");
                Err(GeneratorError::UnknownFunction {
                    name: name.to_string(),
                    available,
                })
            }
        }
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn resolve(name: &str) -> Option<ProducerKind> {
        if let Some(stripped) = name.strip_prefix(DISPATCH_PREFIX) {
            debug!(function = %stripped, "Extracted function name");
            return ProducerKind::from_name(stripped);
        }

        if let Some(kind) = ProducerKind::from_name(name) {
            debug!(function = %name, "Direct lookup succeeded");
            return Some(kind);
        }

        // Compatibility fallback: second underscore-separated token
        let fallback = name.split('_').nth(1)?;
        debug!(function = %fallback, "Fallback extraction");
        ProducerKind::from_name(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::Sampler;

    #[test]
    fn test_prefixed_lookup() {
        let registry = Registry::new();
        assert_eq!(registry.lookup("func_randint").unwrap(), ProducerKind::RandInt);
        assert_eq!(
            registry.lookup("func_fake_ip").unwrap(),
            ProducerKind::Sample(Sampler::Ip)
        );
        assert_eq!(
            registry.lookup("func_faker_ip").unwrap(),
            ProducerKind::Sample(Sampler::Ip)
        );
    }

    #[test]
    fn test_direct_lookup() {
        let registry = Registry::new();
        assert_eq!(
            registry.lookup("fake_log_level").unwrap(),
            ProducerKind::Sample(Sampler::LogLevel)
        );
        assert_eq!(registry.lookup("format_date").unwrap(), ProducerKind::FormatDate);
    }

    #[test]
    fn test_underscore_fallback() {
        let registry = Registry::new();
        assert_eq!(registry.lookup("my_randint").unwrap(), ProducerKind::RandInt);
        assert_eq!(
            registry.lookup("legacy_randip_v1").unwrap(),
            ProducerKind::Sample(Sampler::LegacyIp)
        );
    }

    #[test]
    fn test_prefixed_lookup_does_not_fall_back() {
        let registry = Registry::new();
        // After stripping the prefix only an exact match counts
        assert!(registry.lookup("func_x_randint").is_err());
    }

    #[test]
    fn test_unknown_function() {
        let registry = Registry::new();
        let err = registry.lookup("func_does_not_exist").unwrap_err();
        match err {
            GeneratorError::UnknownFunction { name, available } => {
                assert_eq!(name, "func_does_not_exist");
                assert!(available.contains(&"randint"));
            }
            other => panic!("Expected UnknownFunction, got {:?}", other),
        }
        assert!(registry.lookup("nounderscore").is_err());
        assert_eq!(registry.cached(), 0);
    }

    #[test]
    fn test_lookup_is_cached_and_idempotent() {
        let registry = Registry::new();
        let first = registry.lookup("func_fake_uuid").unwrap();
        let second = registry.lookup("func_fake_uuid").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.cached(), 1);

        registry.lookup("fake_uuid").unwrap();
        assert_eq!(registry.cached(), 2);
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = std::sync::Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.lookup("func_randint").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), ProducerKind::RandInt);
        }
        assert_eq!(registry.cached(), 1);
    }

    #[test]
    fn test_is_dispatch() {
        assert!(Registry::is_dispatch("func_randint 1 10"));
        assert!(!Registry::is_dispatch("alice"));
    }
}
