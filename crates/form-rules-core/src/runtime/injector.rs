// crates/form-rules-core/src/runtime/injector.rs
// ============================================================================
// Module: Behavior Injector
// Description: Installs compiled validators into per-instance hook slots.
// Purpose: Fill validation gaps a form class leaves without overriding it.
// Dependencies: form-rules-expr, serde_json, crate::{core, diagnostics, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Each form instance owns a [`DynamicHooks`] value with one whole-form slot
//! and one slot per field. The host calls [`DynamicHooks::run_form`] and
//! [`DynamicHooks::run_field`] from its validation hooks; empty slots behave
//! as "no dynamic rule".
//!
//! [`BehaviorInjector::attach`] fills those slots at construction time.
//! Precedence is fixed:
//! - hooks the class authors by hand ([`crate::ExplicitHooks`]) always win,
//! - slots that are already filled are left alone, so attaching twice is a
//!   no-op,
//! - field groups naming a field the form does not declare are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use form_rules_expr::TimeHandle;
use serde_json::Value as JsonValue;

use crate::core::RuleGroupKey;
use crate::diagnostics::DiagnosticSink;
use crate::interfaces::FormClass;
use crate::interfaces::FormHost;
use crate::interfaces::RuleSource;
use crate::runtime::cache::CompiledRuleCache;
use crate::runtime::compiler::FieldValidator;
use crate::runtime::compiler::FormValidator;
use crate::runtime::compiler::ValidationFailure;
use crate::runtime::compiler::ValidationOutcome;
use crate::runtime::compiler::compile_field_validator;
use crate::runtime::compiler::compile_form_validator;

// ============================================================================
// SECTION: Hook Slots
// ============================================================================

/// Per-instance validation hook slots.
#[derive(Debug, Clone, Default)]
pub struct DynamicHooks {
    /// Whole-form validator.
    form: Option<Arc<FormValidator>>,
    /// Field validators by field name.
    fields: BTreeMap<String, Arc<FieldValidator>>,
}

impl DynamicHooks {
    /// Creates empty slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            form: None,
            fields: BTreeMap::new(),
        }
    }

    /// Returns true when a whole-form validator is installed.
    #[must_use]
    pub const fn has_form_hook(&self) -> bool {
        self.form.is_some()
    }

    /// Returns true when a validator is installed for `field`.
    #[must_use]
    pub fn has_field_hook(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Fields with an installed validator.
    pub fn installed_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Installs the whole-form validator if the slot is empty.
    pub fn install_form(&mut self, validator: Arc<FormValidator>) -> bool {
        if self.form.is_some() {
            return false;
        }
        self.form = Some(validator);
        true
    }

    /// Installs a field validator if its slot is empty.
    pub fn install_field(&mut self, validator: Arc<FieldValidator>) -> bool {
        if self.fields.contains_key(validator.field()) {
            return false;
        }
        self.fields.insert(validator.field().to_string(), validator);
        true
    }

    /// Whole-form hook using the current time.
    pub fn run_form(&self, host: &mut dyn FormHost) -> ValidationOutcome {
        self.run_form_at(host, TimeHandle::system())
    }

    /// Whole-form hook with an explicit clock; returns cleaned data unchanged
    /// when nothing is installed.
    pub fn run_form_at(&self, host: &mut dyn FormHost, clock: TimeHandle) -> ValidationOutcome {
        match &self.form {
            Some(validator) => validator.run(host, clock),
            None => ValidationOutcome::unchanged(host.cleaned_data().clone()),
        }
    }

    /// Field hook using the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] when an installed rule fires.
    pub fn run_field(&self, field: &str, host: &dyn FormHost) -> Result<JsonValue, ValidationFailure> {
        self.run_field_at(field, host, TimeHandle::system())
    }

    /// Field hook with an explicit clock; returns the cleaned value unchanged
    /// when nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] when an installed rule fires.
    pub fn run_field_at(
        &self,
        field: &str,
        host: &dyn FormHost,
        clock: TimeHandle,
    ) -> Result<JsonValue, ValidationFailure> {
        match self.fields.get(field) {
            Some(validator) => validator.run(host, clock),
            None => Ok(host.cleaned_data().get(field).cloned().unwrap_or(JsonValue::Null)),
        }
    }
}

// ============================================================================
// SECTION: Attach Report
// ============================================================================

/// Why a configured group was not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The class authors this hook by hand.
    ExplicitOverride,
    /// The instance slot was already filled.
    AlreadyInstalled,
    /// The form does not declare the field.
    UnknownField,
}

/// What one [`BehaviorInjector::attach`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachReport {
    /// Groups installed, in the order they were processed.
    pub installed: Vec<RuleGroupKey>,
    /// Groups left out and why.
    pub skipped: Vec<(RuleGroupKey, SkipReason)>,
}

impl AttachReport {
    /// Returns true when nothing was installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    /// Skip reason recorded for `key`, if any.
    #[must_use]
    pub fn skip_reason(&self, key: &RuleGroupKey) -> Option<SkipReason> {
        self.skipped.iter().find(|(skipped, _)| skipped == key).map(|(_, reason)| *reason)
    }
}

// ============================================================================
// SECTION: Injector
// ============================================================================

/// Installs rule-driven validators on form instances.
pub struct BehaviorInjector {
    /// Configuration supplier.
    source: Arc<dyn RuleSource>,
    /// Compiled validators shared across instances.
    cache: CompiledRuleCache,
    /// Destination for compile and execution diagnostics.
    sink: Arc<dyn DiagnosticSink>,
}

impl BehaviorInjector {
    /// Creates an injector over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn RuleSource>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            source,
            cache: CompiledRuleCache::new(),
            sink,
        }
    }

    /// Shared compiled-validator cache.
    #[must_use]
    pub const fn cache(&self) -> &CompiledRuleCache {
        &self.cache
    }

    /// Fills empty hook slots of one instance from configuration.
    pub fn attach(
        &self,
        hooks: &mut DynamicHooks,
        class: &dyn FormClass,
        available_fields: &BTreeSet<String>,
    ) -> AttachReport {
        let form_id = class.form_id();
        let (config, generation) = self.source.form_config_at_generation(form_id);
        let mut report = AttachReport::default();
        if config.is_empty() {
            return report;
        }
        let explicit = class.explicit_hooks();

        if let Some(rules) = config.form_rules() {
            if explicit.overrides_form() {
                report.skipped.push((RuleGroupKey::Form, SkipReason::ExplicitOverride));
            } else if hooks.has_form_hook() {
                report.skipped.push((RuleGroupKey::Form, SkipReason::AlreadyInstalled));
            } else {
                let validator = self.cache.form_validator(generation, form_id, || {
                    compile_form_validator(form_id, rules, Arc::clone(&self.sink))
                });
                hooks.install_form(validator);
                report.installed.push(RuleGroupKey::Form);
            }
        }

        for (field, rules) in config.field_groups() {
            let reason = if !available_fields.contains(&field) {
                Some(SkipReason::UnknownField)
            } else if explicit.overrides_field(&field) {
                Some(SkipReason::ExplicitOverride)
            } else if hooks.has_field_hook(&field) {
                Some(SkipReason::AlreadyInstalled)
            } else {
                None
            };
            if let Some(reason) = reason {
                report.skipped.push((RuleGroupKey::Field(field), reason));
                continue;
            }
            let validator = self.cache.field_validator(generation, form_id, &field, || {
                compile_field_validator(form_id, &field, rules, Arc::clone(&self.sink))
            });
            hooks.install_field(validator);
            report.installed.push(RuleGroupKey::Field(field));
        }
        report
    }
}
