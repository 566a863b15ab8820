//! Field specifications and value resolution.
//!
//! A field is declared in a pattern either as a single dispatch string
//! (`"func_randint 1 10"`) or as a list of choices. List elements are
//! literals, or dispatch strings when they start with `func_`. Specifications
//! are compiled once when a pattern is validated, so unknown functions and
//! bad arguments surface before any line is written. Values are resolved
//! fresh for every line.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::GeneratorError;
use crate::producers::{Producer, Value};
use crate::registry::Registry;

/// A compiled dispatch string: producer plus bound arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    producer: Producer,
}

impl Dispatch {
    /// Parse `"<function-name> [args...]"`.
    ///
    /// Tokens are split on whitespace; the first names the function and the
    /// rest are passed as positional string arguments.
    pub fn parse(source: &str, registry: &Registry) -> Result<Self, GeneratorError> {
        let mut tokens = source.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let kind = registry.lookup(name)?;
        let args: Vec<String> = tokens.map(str::to_string).collect();
        let producer = kind.bind(&args)?;

        Ok(Self { producer })
    }

    /// Invoke the producer.
    pub fn call<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        self.producer.produce(rng)
    }
}

/// One element of a choice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Literal(Value),
    Dispatch(Dispatch),
}

/// A compiled field specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Invoke a producer on every line.
    Dispatch(Dispatch),
    /// Pick one element uniformly at random on every line.
    Choices(Vec<Choice>),
}

impl FieldSpec {
    /// Compile the decoded YAML value of field `field` in pattern `pattern`.
    ///
    /// # Errors
    ///
    /// - `InvalidFieldValue` if the value is neither a string nor a non-empty
    ///   list of scalars
    /// - `UnknownFunction` / `InvalidArguments` from dispatch strings
    pub fn compile(
        pattern: &str,
        field: &str,
        raw: &serde_yaml::Value,
        registry: &Registry,
    ) -> Result<Self, GeneratorError> {
        let invalid = || GeneratorError::InvalidFieldValue {
            pattern: pattern.to_string(),
            field: field.to_string(),
            value: describe(raw),
        };

        match raw {
            serde_yaml::Value::String(source) => Ok(FieldSpec::Dispatch(Dispatch::parse(
                source, registry,
            )?)),
            serde_yaml::Value::Sequence(items) if !items.is_empty() => {
                let choices = items
                    .iter()
                    .map(|item| match item {
                        serde_yaml::Value::String(s) if Registry::is_dispatch(s) => {
                            Dispatch::parse(s, registry).map(Choice::Dispatch)
                        }
                        other => literal(other).map(Choice::Literal).ok_or_else(invalid),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FieldSpec::Choices(choices))
            }
            _ => Err(invalid()),
        }
    }
}

/// Resolve a field specification into a concrete value.
///
/// A list picks one element uniformly; a picked dispatch string is invoked.
/// List elements are never lists themselves, so resolution is one level deep.
pub fn resolve_field<R: Rng + ?Sized>(spec: &FieldSpec, rng: &mut R) -> Value {
    match spec {
        FieldSpec::Dispatch(dispatch) => dispatch.call(rng),
        FieldSpec::Choices(choices) => match choices.choose(rng) {
            Some(Choice::Literal(value)) => value.clone(),
            Some(Choice::Dispatch(dispatch)) => dispatch.call(rng),
            // Compiled lists are never empty
            None => Value::Text(String::new()),
        },
    }
}

/// Named field specifications of one pattern, in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    names: Vec<String>,
    specs: Vec<FieldSpec>,
}

impl FieldSet {
    /// Compile every field of a pattern.
    pub fn compile(
        pattern: &str,
        raw: &BTreeMap<String, serde_yaml::Value>,
        registry: &Registry,
    ) -> Result<Self, GeneratorError> {
        let mut set = FieldSet::default();
        for (name, value) in raw {
            let spec = FieldSpec::compile(pattern, name, value, registry)?;
            set.insert(name.clone(), spec);
        }
        Ok(set)
    }

    /// Add or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        let name = name.into();
        match self.index_of(&name) {
            Some(i) => self.specs[i] = spec,
            None => {
                self.names.push(name);
                self.specs.push(spec);
            }
        }
    }

    /// Position of a field, used by compiled templates.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Field names in resolution order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolve every field, in order.
    pub fn resolve_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Value> {
        self.specs.iter().map(|spec| resolve_field(spec, rng)).collect()
    }
}

fn literal(raw: &serde_yaml::Value) -> Option<Value> {
    match raw {
        serde_yaml::Value::String(s) => Some(Value::Text(s.clone())),
        serde_yaml::Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Text(n.to_string()),
        }),
        serde_yaml::Value::Bool(b) => Some(Value::from(if *b { "True" } else { "False" })),
        _ => None,
    }
}

fn describe(raw: &serde_yaml::Value) -> String {
    serde_yaml::to_string(raw)
        .map(|s| s.trim_end().replace('\n', " "))
        .unwrap_or_else(|_| format!("{:?}", raw))
}
