// crates/form-rules-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Rule Source
// Description: Rule source backed by a document held in memory.
// Purpose: Provide a deterministic rule source for tests and embedded hosts.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryRuleSource`] serves a [`RuleDocument`] supplied by the caller.
//! Each [`InMemoryRuleSource::replace`] bumps the generation, exactly as a
//! successful reload of an on-disk source would.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::core::FormRuleConfig;
use crate::core::RuleDocument;
use crate::interfaces::RuleSource;

// ============================================================================
// SECTION: In-Memory Source
// ============================================================================

/// Current document and its generation.
#[derive(Debug, Default)]
struct Snapshot {
    /// Served document.
    document: Arc<RuleDocument>,
    /// Number of replacements so far.
    generation: u64,
}

/// In-memory rule source for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct InMemoryRuleSource {
    /// Snapshot guarded for atomic replacement.
    snapshot: RwLock<Snapshot>,
}

impl InMemoryRuleSource {
    /// Creates a source serving `document` at generation 1.
    #[must_use]
    pub fn new(document: RuleDocument) -> Self {
        Self {
            snapshot: RwLock::new(Snapshot {
                document: Arc::new(document),
                generation: 1,
            }),
        }
    }

    /// Replaces the document and bumps the generation.
    pub fn replace(&self, document: RuleDocument) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.document = Arc::new(document);
        snapshot.generation = snapshot.generation.saturating_add(1);
    }

    /// Currently served document.
    #[must_use]
    pub fn document(&self) -> Arc<RuleDocument> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner).document)
    }
}

impl RuleSource for InMemoryRuleSource {
    fn form_config(&self, form_id: &str) -> Arc<FormRuleConfig> {
        self.form_config_at_generation(form_id).0
    }

    fn generation(&self) -> u64 {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    fn form_config_at_generation(&self, form_id: &str) -> (Arc<FormRuleConfig>, u64) {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        (snapshot.document.form_config(form_id), snapshot.generation)
    }
}
