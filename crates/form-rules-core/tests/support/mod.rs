// crates/form-rules-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Result helpers and a minimal host form for engine tests.
// ============================================================================
//! ## Overview
//! Shared helpers: `TestResult`/`ensure`, a recording [`TestForm`] host, a
//! [`TestClass`] description, and a pinned clock.

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

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use form_rules_core::CleanedData;
use form_rules_core::ExplicitHooks;
use form_rules_core::FormClass;
use form_rules_core::FormHost;
use form_rules_core::TimeHandle;
use serde_json::Value;
use time::macros::datetime;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across engine integration tests.
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
// Host Fixtures
// ========================================================================

/// Clock pinned to 2024-06-15T12:00:00Z.
pub fn fixed_clock() -> TimeHandle {
    TimeHandle::fixed(datetime!(2024-06-15 12:00:00 UTC))
}

/// Host form that records attached errors.
#[derive(Debug, Default)]
pub struct TestForm {
    /// Declared fields.
    pub fields: BTreeSet<String>,
    /// Cleaned values.
    pub cleaned: CleanedData,
    /// Attached errors as `(field, message)`.
    pub errors: Vec<(Option<String>, String)>,
}

impl TestForm {
    /// Declares `fields` with no cleaned data.
    pub fn with_fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Sets a cleaned value.
    pub fn clean(mut self, field: &str, value: Value) -> Self {
        self.cleaned.insert(field.to_string(), value);
        self
    }

    /// Messages attached to `field` (`None` for form-level).
    pub fn errors_for(&self, field: Option<&str>) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|(target, _)| target.as_deref() == field)
            .map(|(_, message)| message.as_str())
            .collect()
    }
}

impl FormHost for TestForm {
    fn cleaned_data(&self) -> &CleanedData {
        &self.cleaned
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    fn add_error(&mut self, field: Option<&str>, message: &str) {
        self.errors.push((field.map(ToString::to_string), message.to_string()));
    }
}

/// Form class description.
#[derive(Debug, Clone)]
pub struct TestClass {
    /// Form identifier.
    pub form_id: String,
    /// Hand-written hooks.
    pub hooks: ExplicitHooks,
}

impl TestClass {
    /// Class with no hand-written hooks.
    pub fn plain(form_id: &str) -> Self {
        Self {
            form_id: form_id.to_string(),
            hooks: ExplicitHooks::none(),
        }
    }

    /// Class with the given hand-written hooks.
    pub fn with_hooks(form_id: &str, hooks: ExplicitHooks) -> Self {
        Self {
            form_id: form_id.to_string(),
            hooks,
        }
    }
}

impl FormClass for TestClass {
    fn form_id(&self) -> &str {
        &self.form_id
    }

    fn explicit_hooks(&self) -> &ExplicitHooks {
        &self.hooks
    }
}
