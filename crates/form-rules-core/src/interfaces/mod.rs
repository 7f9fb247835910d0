// crates/form-rules-core/src/interfaces/mod.rs
// ============================================================================
// Module: Form Rules Interfaces
// Description: Host-framework and rule-source contracts.
// Purpose: Define the surfaces the engine needs from the embedding form system.
// Dependencies: serde_json, crate::core
// ============================================================================

//! ## Overview
//! The engine never reaches into a host form framework directly. Hosts expose
//! cleaned data and error registration through [`FormHost`], declare which
//! validation hooks their classes author by hand through [`FormClass`] and
//! [`ExplicitHooks`], and supply configuration through a [`RuleSource`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::core::FormRuleConfig;

// ============================================================================
// SECTION: Host Form
// ============================================================================

/// Cleaned field values produced by the host's baseline validation.
pub type CleanedData = BTreeMap<String, Value>;

/// A form instance being validated.
pub trait FormHost {
    /// Cleaned values after the host's own field validation has run.
    fn cleaned_data(&self) -> &CleanedData;

    /// Returns true when the form declares `name`.
    fn has_field(&self, name: &str) -> bool;

    /// Registers an error against `field`, or against the form when `None`.
    fn add_error(&mut self, field: Option<&str>, message: &str);
}

// ============================================================================
// SECTION: Form Class
// ============================================================================

/// Hooks a form class authors explicitly.
///
/// # Invariants
/// - Populated once when the class is defined; never changed per instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitHooks {
    /// Whole-form validation is hand-written.
    form: bool,
    /// Fields with hand-written validation.
    fields: BTreeSet<String>,
}

impl ExplicitHooks {
    /// A class with no hand-written hooks.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            form: false,
            fields: BTreeSet::new(),
        }
    }

    /// Marks whole-form validation as hand-written.
    #[must_use]
    pub fn with_form_clean(mut self) -> Self {
        self.form = true;
        self
    }

    /// Marks validation of `field` as hand-written.
    #[must_use]
    pub fn with_field_clean(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into());
        self
    }

    /// Returns true when whole-form validation is hand-written.
    #[must_use]
    pub const fn overrides_form(&self) -> bool {
        self.form
    }

    /// Returns true when validation of `field` is hand-written.
    #[must_use]
    pub fn overrides_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Static description of a form class.
pub trait FormClass {
    /// Identifier used to look up configuration.
    fn form_id(&self) -> &str;

    /// Hooks this class defines by hand.
    fn explicit_hooks(&self) -> &ExplicitHooks;
}

// ============================================================================
// SECTION: Rule Source
// ============================================================================

/// Supplier of rule configuration.
pub trait RuleSource: Send + Sync {
    /// Current configuration for `form_id`; empty when none is configured.
    fn form_config(&self, form_id: &str) -> Arc<FormRuleConfig>;

    /// Counter that changes whenever the underlying document is replaced.
    fn generation(&self) -> u64;

    /// Configuration and the generation it belongs to, observed together.
    fn form_config_at_generation(&self, form_id: &str) -> (Arc<FormRuleConfig>, u64) {
        let config = self.form_config(form_id);
        (config, self.generation())
    }
}
