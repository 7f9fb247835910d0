// crates/form-rules-expr/src/context.rs
// ============================================================================
// Module: Evaluation Context
// Description: Name-to-value bindings visible to a single evaluation.
// Purpose: Be the only environment a condition can observe.
// Dependencies: serde_json, crate::value
// ============================================================================

//! ## Overview
//! The context is the entire world of a condition: name lookups that miss it
//! fail, and there is no fallback to process state. Contexts are cheap to
//! build and are meant to be discarded after one validation pass.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::value::Value;

/// Variables available to a condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    /// Bound names.
    names: BTreeMap<String, Value>,
}

impl EvaluationContext {
    /// Creates an empty context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    /// Binds `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.names.insert(name.into(), value.into())
    }

    /// Builder-style [`EvaluationContext::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Binds `name` to a JSON value.
    pub fn insert_json(&mut self, name: impl Into<String>, value: &JsonValue) -> Option<Value> {
        self.names.insert(name.into(), Value::from(value))
    }

    /// Looks up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names.get(name)
    }

    /// Returns true when `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for EvaluationContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(|(name, value)| (name.into(), value)).collect(),
        }
    }
}
