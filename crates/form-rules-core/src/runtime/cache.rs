// crates/form-rules-core/src/runtime/cache.rs
// ============================================================================
// Module: Compiled Rule Cache
// Description: Generation-tagged cache of compiled validators.
// Purpose: Compile each rule group once per configuration generation.
// Dependencies: crate::runtime::compiler
// ============================================================================

//! ## Overview
//! Validators are immutable once compiled, so every form instance constructed
//! under the same configuration generation shares one `Arc` per
//! `(form, rule group)`. Observing a newer generation clears the cache;
//! requests tagged with an older generation compile without caching.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::runtime::compiler::FieldValidator;
use crate::runtime::compiler::FormValidator;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cache contents for one generation.
#[derive(Debug, Default)]
struct CacheState {
    /// Generation the entries were compiled for.
    generation: u64,
    /// Whole-form validators keyed by form.
    forms: BTreeMap<String, Arc<FormValidator>>,
    /// Field validators keyed by form and field.
    fields: BTreeMap<(String, String), Arc<FieldValidator>>,
}

impl CacheState {
    /// Moves to `generation`; returns false when `generation` is stale.
    fn advance(&mut self, generation: u64) -> bool {
        if generation < self.generation {
            return false;
        }
        if generation > self.generation {
            self.forms.clear();
            self.fields.clear();
            self.generation = generation;
        }
        true
    }
}

/// Shared cache of compiled validators.
#[derive(Debug, Default)]
pub struct CompiledRuleCache {
    /// Guarded cache state.
    state: RwLock<CacheState>,
}

impl CompiledRuleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached whole-form validator, compiling it on a miss.
    pub fn form_validator(
        &self,
        generation: u64,
        form_id: &str,
        compile: impl FnOnce() -> FormValidator,
    ) -> Arc<FormValidator> {
        {
            let state = self.read();
            if state.generation == generation
                && let Some(hit) = state.forms.get(form_id)
            {
                return Arc::clone(hit);
            }
        }
        let compiled = Arc::new(compile());
        let mut state = self.write();
        if !state.advance(generation) {
            return compiled;
        }
        Arc::clone(state.forms.entry(form_id.to_string()).or_insert(compiled))
    }

    /// Cached field validator, compiling it on a miss.
    pub fn field_validator(
        &self,
        generation: u64,
        form_id: &str,
        field: &str,
        compile: impl FnOnce() -> FieldValidator,
    ) -> Arc<FieldValidator> {
        let key = (form_id.to_string(), field.to_string());
        {
            let state = self.read();
            if state.generation == generation
                && let Some(hit) = state.fields.get(&key)
            {
                return Arc::clone(hit);
            }
        }
        let compiled = Arc::new(compile());
        let mut state = self.write();
        if !state.advance(generation) {
            return compiled;
        }
        Arc::clone(state.fields.entry(key).or_insert(compiled))
    }

    /// Generation of the cached entries.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Number of cached validators.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.read();
        state.forms.len() + state.fields.len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached validator.
    pub fn clear(&self) {
        let mut state = self.write();
        state.forms.clear();
        state.fields.clear();
    }

    /// Read access; a poisoned lock still holds a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access; a poisoned lock still holds a consistent map.
    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
