// crates/form-rules-core/src/runtime/mod.rs
// ============================================================================
// Module: Form Rules Runtime
// Description: Rule compilation, compiled-validator caching, and injection.
// Purpose: Turn configuration into validators installed on form instances.
// Dependencies: form-rules-expr, crate::{core, diagnostics, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules compile rule groups into validators, share them across
//! instances per configuration generation, and install them into hook slots.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cache;
pub mod compiler;
pub mod injector;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CompiledRuleCache;
pub use compiler::FieldValidator;
pub use compiler::FiredRule;
pub use compiler::FormValidator;
pub use compiler::RuleExecutionError;
pub use compiler::SkippedRule;
pub use compiler::ValidationFailure;
pub use compiler::ValidationOutcome;
pub use compiler::compile_field_validator;
pub use compiler::compile_form_validator;
pub use injector::AttachReport;
pub use injector::BehaviorInjector;
pub use injector::DynamicHooks;
pub use injector::SkipReason;
pub use store::InMemoryRuleSource;
