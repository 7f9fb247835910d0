// crates/form-rules-expr/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared result helpers for expression integration tests.
// ============================================================================
//! ## Overview
//! Shared test helpers for consistent Result-based assertions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every suite uses every helper."
)]

use std::error::Error;
use std::fmt;

use form_rules_expr::EvaluationContext;
use form_rules_expr::TimeHandle;
use form_rules_expr::Value;
use serde_json::json;
use time::macros::datetime;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across expression integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Fixtures
// ========================================================================

/// Clock pinned to 2024-06-15T12:00:00Z.
pub fn fixed_clock() -> TimeHandle {
    TimeHandle::fixed(datetime!(2024-06-15 12:00:00 UTC))
}

/// Context resembling a whole-form validation pass.
pub fn form_context() -> EvaluationContext {
    let cleaned = json!({
        "email": "someone@example.com",
        "age": 17,
        "score": 4.5,
        "start_date": "2024-07-01",
        "end_date": "2024-06-20",
        "tags": ["alpha", "beta"],
        "nickname": null
    });
    let mut context = EvaluationContext::new();
    if let serde_json::Value::Object(fields) = &cleaned {
        for (name, value) in fields {
            context.insert_json(name.clone(), value);
        }
    }
    context.insert_json("cleaned_data", &cleaned);
    context.insert("timezone", Value::Clock(fixed_clock()));
    context
}
