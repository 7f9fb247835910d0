// crates/form-rules-core/src/core/mod.rs
// ============================================================================
// Module: Form Rules Core Types
// Description: Declarative rule model shared by the store, compiler, and injector.
// Purpose: Group the serializable configuration types.
// Dependencies: crate::core::rules
// ============================================================================

//! ## Overview
//! Core types describe rule configuration exactly as it is written on disk.
//! They carry no behavior beyond lookup and advisory linting.

pub mod rules;

pub use rules::FIELD_GROUP_PREFIX;
pub use rules::FORM_GROUP_KEY;
pub use rules::FormRuleConfig;
pub use rules::RuleDescriptor;
pub use rules::RuleDocument;
pub use rules::RuleGroupKey;
pub use rules::RuleIssue;
pub use rules::RuleIssueKind;
