// crates/form-rules-core/src/runtime/compiler.rs
// ============================================================================
// Module: Rule Compiler
// Description: Turns rule groups into executable form and field validators.
// Purpose: Parse conditions once and run them per validation pass.
// Dependencies: form-rules-expr, serde_json, thiserror, crate::{core, diagnostics, interfaces}
// ============================================================================

//! ## Overview
//! Compilation parses every condition up front. A condition that does not
//! parse is reported once and then never fires. A malformed rule or one
//! missing its condition is reported each time it runs and is skipped; a
//! missing message is only reported when the condition fires.
//!
//! The two validator kinds differ on purpose:
//! - [`FormValidator`] evaluates every rule and attaches every error that
//!   fires.
//! - [`FieldValidator`] stops at the first rule that fires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use form_rules_expr::EvaluationContext;
use form_rules_expr::Expression;
use form_rules_expr::TimeHandle;
use form_rules_expr::Value;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::RuleDescriptor;
use crate::core::RuleGroupKey;
use crate::diagnostics::DiagnosticKind;
use crate::diagnostics::DiagnosticSink;
use crate::diagnostics::EngineDiagnostic;
use crate::interfaces::CleanedData;
use crate::interfaces::FormHost;

// ============================================================================
// SECTION: Errors and Outcomes
// ============================================================================

/// Field validation failure surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationFailure {
    /// Field that failed.
    pub field: String,
    /// Configured message.
    pub message: String,
}

/// A rule that could not run.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleExecutionError {
    /// Rule has no `condition`.
    #[error("rule has no condition")]
    MissingCondition,
    /// Rule has no `error`.
    #[error("rule has no error message")]
    MissingError,
    /// Rule targets a field the form does not declare.
    #[error("field `{0}` is not declared on the form")]
    UnknownField(String),
    /// Rule entry has the wrong shape.
    #[error("malformed rule: {0}")]
    MalformedDescriptor(String),
}

/// A rule whose condition was true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRule {
    /// Position within the rule group.
    pub index: usize,
    /// Field the error was attached to; `None` for form-level errors.
    pub field: Option<String>,
    /// Attached message.
    pub message: String,
}

/// A rule skipped because it could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    /// Position within the rule group.
    pub index: usize,
    /// Why the rule was skipped.
    pub error: RuleExecutionError,
}

/// Result of one whole-form validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    /// Cleaned data, returned unchanged.
    pub cleaned_data: CleanedData,
    /// Rules that attached an error, in rule order.
    pub fired: Vec<FiredRule>,
    /// Rules that could not run, in rule order.
    pub skipped: Vec<SkippedRule>,
}

impl ValidationOutcome {
    /// Outcome of a pass with no dynamic rules.
    #[must_use]
    pub fn unchanged(cleaned_data: CleanedData) -> Self {
        Self {
            cleaned_data,
            fired: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Returns true when no rule attached an error.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.fired.is_empty()
    }
}

// ============================================================================
// SECTION: Compiled Rules
// ============================================================================

/// Condition after compilation.
#[derive(Debug)]
enum CompiledCondition {
    /// Descriptor could not be read.
    Malformed(String),
    /// Descriptor has no condition.
    Missing,
    /// Condition did not parse; never fires.
    Invalid,
    /// Parsed condition.
    Parsed(Expression),
}

/// One compiled rule.
#[derive(Debug)]
struct CompiledRule {
    /// Position within the group.
    index: usize,
    /// Target field.
    field: Option<String>,
    /// Compiled condition.
    condition: CompiledCondition,
    /// Configured message.
    error: Option<String>,
}

impl CompiledRule {
    /// Returns the message to attach when the rule fires.
    fn fires(&self, context: &EvaluationContext) -> Result<Option<&str>, RuleExecutionError> {
        let fired = match &self.condition {
            CompiledCondition::Malformed(reason) => {
                return Err(RuleExecutionError::MalformedDescriptor(reason.clone()));
            }
            CompiledCondition::Missing => return Err(RuleExecutionError::MissingCondition),
            CompiledCondition::Invalid => false,
            CompiledCondition::Parsed(expression) => expression.test(context),
        };
        if !fired {
            return Ok(None);
        }
        self.error.as_deref().map(Some).ok_or(RuleExecutionError::MissingError)
    }
}

/// Ordered compiled rules for one group.
struct CompiledRules {
    /// Owning form.
    form_id: String,
    /// Group the rules came from.
    group: RuleGroupKey,
    /// Rules in configuration order.
    rules: Vec<CompiledRule>,
    /// Destination for execution diagnostics.
    sink: Arc<dyn DiagnosticSink>,
}

impl CompiledRules {
    /// Compiles `rules`, reporting conditions that do not parse.
    fn compile(
        form_id: &str,
        group: RuleGroupKey,
        rules: &[RuleDescriptor],
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let condition = match (&rule.malformed, rule.condition.as_deref()) {
                    (Some(reason), _) => CompiledCondition::Malformed(reason.clone()),
                    (None, None) => CompiledCondition::Missing,
                    (None, Some(source)) => match Expression::parse(source) {
                        Ok(expression) => CompiledCondition::Parsed(expression),
                        Err(err) => {
                            sink.record(
                                &EngineDiagnostic::new(
                                    DiagnosticKind::ExpressionError,
                                    format!("condition `{source}` does not parse: {err}"),
                                )
                                .with_form(form_id)
                                .with_rule(group.to_string(), Some(index)),
                            );
                            CompiledCondition::Invalid
                        }
                    },
                };
                CompiledRule {
                    index,
                    field: rule.field.clone(),
                    condition,
                    error: rule.error.clone(),
                }
            })
            .collect();
        Self {
            form_id: form_id.to_string(),
            group,
            rules,
            sink,
        }
    }

    /// Reports a rule that could not run.
    fn report(&self, index: usize, error: &RuleExecutionError) {
        self.sink.record(
            &EngineDiagnostic::new(DiagnosticKind::RuleExecutionError, error.to_string())
                .with_form(self.form_id.as_str())
                .with_rule(self.group.to_string(), Some(index)),
        );
    }
}

impl fmt::Debug for CompiledRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRules")
            .field("form_id", &self.form_id)
            .field("group", &self.group)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

/// Converts cleaned data to a map value.
fn cleaned_map(cleaned: &CleanedData) -> Value {
    Value::Map(cleaned.iter().map(|(name, value)| (name.clone(), Value::from(value))).collect())
}

// ============================================================================
// SECTION: Form Validator
// ============================================================================

/// Whole-form validator for a `clean` group.
#[derive(Debug)]
pub struct FormValidator {
    /// Compiled rules.
    compiled: CompiledRules,
}

impl FormValidator {
    /// Form this validator belongs to.
    #[must_use]
    pub fn form_id(&self) -> &str {
        &self.compiled.form_id
    }

    /// Number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.compiled.rules.len()
    }

    /// Runs every rule against the host's cleaned data, attaching each error
    /// that fires.
    pub fn run(&self, host: &mut dyn FormHost, clock: TimeHandle) -> ValidationOutcome {
        let cleaned = host.cleaned_data().clone();
        let mut context: EvaluationContext =
            cleaned.iter().map(|(name, value)| (name.as_str(), Value::from(value))).collect();
        context.insert("cleaned_data", cleaned_map(&cleaned));
        context.insert("timezone", clock);

        let mut fired = Vec::new();
        let mut skipped = Vec::new();
        for rule in &self.compiled.rules {
            if let Some(field) = &rule.field {
                context.insert(field.as_str(), cleaned.get(field).map_or(Value::Null, Value::from));
            }
            let result = rule.fires(&context).and_then(|message| match (message, &rule.field) {
                (Some(_), Some(field)) if !host.has_field(field) => {
                    Err(RuleExecutionError::UnknownField(field.clone()))
                }
                _ => Ok(message),
            });
            match result {
                Ok(None) => {}
                Ok(Some(message)) => {
                    host.add_error(rule.field.as_deref(), message);
                    fired.push(FiredRule {
                        index: rule.index,
                        field: rule.field.clone(),
                        message: message.to_string(),
                    });
                }
                Err(error) => {
                    self.compiled.report(rule.index, &error);
                    skipped.push(SkippedRule {
                        index: rule.index,
                        error,
                    });
                }
            }
        }
        ValidationOutcome {
            cleaned_data: cleaned,
            fired,
            skipped,
        }
    }
}

/// Compiles a whole-form validator.
#[must_use]
pub fn compile_form_validator(
    form_id: &str,
    rules: &[RuleDescriptor],
    sink: Arc<dyn DiagnosticSink>,
) -> FormValidator {
    FormValidator {
        compiled: CompiledRules::compile(form_id, RuleGroupKey::Form, rules, sink),
    }
}

// ============================================================================
// SECTION: Field Validator
// ============================================================================

/// Field validator for a `clean_<field>` group.
#[derive(Debug)]
pub struct FieldValidator {
    /// Validated field.
    field: String,
    /// Compiled rules.
    compiled: CompiledRules,
}

impl FieldValidator {
    /// Form this validator belongs to.
    #[must_use]
    pub fn form_id(&self) -> &str {
        &self.compiled.form_id
    }

    /// Validated field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.compiled.rules.len()
    }

    /// Runs rules in order; the first that fires fails the field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] carrying the first fired rule's message.
    pub fn run(&self, host: &dyn FormHost, clock: TimeHandle) -> Result<JsonValue, ValidationFailure> {
        let cleaned = host.cleaned_data();
        let value = cleaned.get(&self.field).cloned().unwrap_or(JsonValue::Null);
        let context = EvaluationContext::new()
            .with("value", Value::from(&value))
            .with("cleaned_data", cleaned_map(cleaned))
            .with("timezone", clock);

        for rule in &self.compiled.rules {
            match rule.fires(&context) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    return Err(ValidationFailure {
                        field: self.field.clone(),
                        message: message.to_string(),
                    });
                }
                Err(error) => self.compiled.report(rule.index, &error),
            }
        }
        Ok(value)
    }
}

/// Compiles a field validator for `field`.
#[must_use]
pub fn compile_field_validator(
    form_id: &str,
    field: &str,
    rules: &[RuleDescriptor],
    sink: Arc<dyn DiagnosticSink>,
) -> FieldValidator {
    FieldValidator {
        field: field.to_string(),
        compiled: CompiledRules::compile(form_id, RuleGroupKey::field(field), rules, sink),
    }
}
