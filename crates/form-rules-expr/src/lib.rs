// crates/form-rules-expr/src/lib.rs
// ============================================================================
// Module: Form Rules Expression Root
// Description: Public API surface for the condition language.
// Purpose: Wire together the parser, value model, clock, and interpreter.
// Dependencies: crate::{ast, clock, context, error, interpreter, parser, value}
// ============================================================================

//! ## Overview
//! `form-rules-expr` evaluates declarative rule conditions such as
//! `value.endswith('@banned.com')` or
//! `cleaned_data['end_date'] < cleaned_data['start_date']` against an explicit
//! [`EvaluationContext`]. Conditions are parsed into a restricted tree and
//! interpreted without access to anything outside the context.
//!
//! Failures never escape [`evaluate`]: a broken condition is simply false.
//!
//! ```
//! use form_rules_expr::EvaluationContext;
//! use form_rules_expr::evaluate;
//!
//! let context = EvaluationContext::new().with("value", "x@banned.com");
//! assert!(evaluate("value.endswith('@banned.com')", &context));
//! assert!(!evaluate("undefined_name > 3", &context));
//! ```

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ast;
pub mod clock;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::TimeHandle;
pub use context::EvaluationContext;
pub use error::ExprError;
pub use interpreter::Expression;
pub use interpreter::evaluate;
pub use interpreter::try_evaluate;
pub use parser::MAX_EXPRESSION_BYTES;
pub use parser::MAX_EXPRESSION_NESTING;
pub use parser::parse_expression;
pub use value::Value;
