// crates/form-rules-core/src/lib.rs
// ============================================================================
// Module: Form Rules Core Library
// Description: Public API surface for the form rule engine.
// Purpose: Expose the rule model, host interfaces, diagnostics, and runtime.
// Dependencies: crate::{core, diagnostics, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Form rules core attaches configuration-driven validation to form
//! instances. A [`BehaviorInjector`] reads rule groups from a [`RuleSource`],
//! compiles them once per configuration generation, and installs them into
//! an instance's [`DynamicHooks`] wherever the form class has not authored
//! the hook itself. Conditions are evaluated by `form-rules-expr` and fail
//! closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod diagnostics;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use diagnostics::DiagnosticKind;
pub use diagnostics::DiagnosticSink;
pub use diagnostics::EngineDiagnostic;
pub use diagnostics::FileDiagnosticSink;
pub use diagnostics::MemoryDiagnosticSink;
pub use diagnostics::NoopDiagnosticSink;
pub use diagnostics::StderrDiagnosticSink;
pub use form_rules_expr::TimeHandle;
pub use interfaces::CleanedData;
pub use interfaces::ExplicitHooks;
pub use interfaces::FormClass;
pub use interfaces::FormHost;
pub use interfaces::RuleSource;
pub use runtime::AttachReport;
pub use runtime::BehaviorInjector;
pub use runtime::CompiledRuleCache;
pub use runtime::DynamicHooks;
pub use runtime::FieldValidator;
pub use runtime::FiredRule;
pub use runtime::FormValidator;
pub use runtime::InMemoryRuleSource;
pub use runtime::RuleExecutionError;
pub use runtime::SkipReason;
pub use runtime::SkippedRule;
pub use runtime::ValidationFailure;
pub use runtime::ValidationOutcome;
pub use runtime::compile_field_validator;
pub use runtime::compile_form_validator;
