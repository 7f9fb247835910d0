// crates/form-rules-core/tests/injector.rs
// ============================================================================
// Module: Behavior Injector Tests
// Description: Hook installation precedence, idempotency, and caching.
// ============================================================================
//! ## Overview
//! Attaches configuration to test form instances and drives the installed
//! hooks the way a host framework would.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use form_rules_core::BehaviorInjector;
use form_rules_core::DynamicHooks;
use form_rules_core::ExplicitHooks;
use form_rules_core::FormRuleConfig;
use form_rules_core::InMemoryRuleSource;
use form_rules_core::NoopDiagnosticSink;
use form_rules_core::RuleDescriptor;
use form_rules_core::RuleDocument;
use form_rules_core::RuleGroupKey;
use form_rules_core::SkipReason;
use serde_json::json;
use support::TestClass;
use support::TestForm;
use support::TestResult;
use support::ensure;
use support::fixed_clock;

/// Signup form configuration used across tests.
fn signup_document() -> RuleDocument {
    RuleDocument::empty().with_form(
        "SignupForm",
        FormRuleConfig::new()
            .with_group(
                &RuleGroupKey::Form,
                vec![RuleDescriptor::new("password != confirm", "Passwords differ").on_field("confirm")],
            )
            .with_group(
                &RuleGroupKey::field("email"),
                vec![RuleDescriptor::new("value.endswith('@banned.com')", "Banned")],
            )
            .with_group(&RuleGroupKey::field("nickname"), vec![RuleDescriptor::new("true", "Nope")]),
    )
}

/// Injector over an in-memory source.
fn injector(source: &Arc<InMemoryRuleSource>) -> BehaviorInjector {
    BehaviorInjector::new(source.clone(), Arc::new(NoopDiagnosticSink))
}

/// Declared field set.
fn fields(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}

/// Tests the full signup scenario through installed hooks.
#[test]
fn installs_and_runs_configured_hooks() -> TestResult {
    let source = Arc::new(InMemoryRuleSource::new(signup_document()));
    let injector = injector(&source);
    let class = TestClass::plain("SignupForm");
    let mut hooks = DynamicHooks::new();
    let report = injector.attach(&mut hooks, &class, &fields(&["email", "password", "confirm"]));

    ensure(
        report.installed == vec![RuleGroupKey::Form, RuleGroupKey::field("email")],
        format!("unexpected installs: {:?}", report.installed),
    )?;
    ensure(report.skip_reason(&RuleGroupKey::field("nickname")) == Some(SkipReason::UnknownField), "nickname ignored")?;

    let mut form = TestForm::with_fields(&["email", "password", "confirm"])
        .clean("email", json!("x@banned.com"))
        .clean("password", json!("a"))
        .clean("confirm", json!("b"));
    let failure = hooks.run_field_at("email", &form, fixed_clock()).err().ok_or("email should fail")?;
    ensure(failure.message == "Banned", "banned domain rejected")?;
    hooks.run_form_at(&mut form, fixed_clock());
    ensure(form.errors_for(Some("confirm")) == vec!["Passwords differ"], "form rule attached")?;
    Ok(())
}

/// Tests that hand-written hooks always win.
#[test]
fn explicit_hooks_take_precedence() -> TestResult {
    let source = Arc::new(InMemoryRuleSource::new(signup_document()));
    let injector = injector(&source);
    let class = TestClass::with_hooks(
        "SignupForm",
        ExplicitHooks::none().with_form_clean().with_field_clean("email"),
    );
    let mut hooks = DynamicHooks::new();
    let report = injector.attach(&mut hooks, &class, &fields(&["email", "password", "confirm"]));

    ensure(report.is_empty(), "nothing should be installed")?;
    ensure(!hooks.has_form_hook() && !hooks.has_field_hook("email"), "slots stay empty")?;
    ensure(report.skip_reason(&RuleGroupKey::Form) == Some(SkipReason::ExplicitOverride), "form skipped")?;
    ensure(
        report.skip_reason(&RuleGroupKey::field("email")) == Some(SkipReason::ExplicitOverride),
        "email skipped",
    )?;

    let mut form = TestForm::with_fields(&["email"]).clean("email", json!("x@banned.com"));
    ensure(hooks.run_field_at("email", &form, fixed_clock()) == Ok(json!("x@banned.com")), "no-op field hook")?;
    let outcome = hooks.run_form_at(&mut form, fixed_clock());
    ensure(outcome.passed() && form.errors.is_empty(), "no-op form hook")?;
    Ok(())
}

/// Tests that attaching twice never double-installs.
#[test]
fn attach_is_idempotent() -> TestResult {
    let source = Arc::new(InMemoryRuleSource::new(signup_document()));
    let injector = injector(&source);
    let class = TestClass::plain("SignupForm");
    let available = fields(&["email", "password", "confirm"]);
    let mut hooks = DynamicHooks::new();
    injector.attach(&mut hooks, &class, &available);
    let second = injector.attach(&mut hooks, &class, &available);

    ensure(second.is_empty(), "second attach installs nothing")?;
    ensure(second.skip_reason(&RuleGroupKey::Form) == Some(SkipReason::AlreadyInstalled), "form already set")?;
    let installed: Vec<&str> = hooks.installed_fields().collect();
    ensure(installed == vec!["email"], format!("unexpected fields: {installed:?}"))?;

    let mut form = TestForm::with_fields(&["email", "password", "confirm"])
        .clean("password", json!("a"))
        .clean("confirm", json!("b"));
    hooks.run_form_at(&mut form, fixed_clock());
    ensure(form.errors.len() == 1, "form rule runs once")?;
    Ok(())
}

/// Tests that unconfigured forms are left untouched.
#[test]
fn unconfigured_form_is_noop() -> TestResult {
    let source = Arc::new(InMemoryRuleSource::new(signup_document()));
    let injector = injector(&source);
    let mut hooks = DynamicHooks::new();
    let report = injector.attach(&mut hooks, &TestClass::plain("ContactForm"), &fields(&["email"]));
    ensure(report.is_empty() && report.skipped.is_empty(), "nothing to do")?;
    ensure(injector.cache().is_empty(), "nothing compiled")?;
    Ok(())
}

/// Tests that instances share compiled validators within a generation.
#[test]
fn compiled_validators_are_shared_per_generation() -> TestResult {
    let source = Arc::new(InMemoryRuleSource::new(signup_document()));
    let injector = injector(&source);
    let class = TestClass::plain("SignupForm");
    let available = fields(&["email", "password", "confirm"]);

    let mut first = DynamicHooks::new();
    let mut second = DynamicHooks::new();
    injector.attach(&mut first, &class, &available);
    injector.attach(&mut second, &class, &available);
    ensure(injector.cache().len() == 2, "one form and one field validator cached")?;
    ensure(injector.cache().generation() == 1, "cache tagged with generation 1")?;

    source.replace(RuleDocument::empty().with_form(
        "SignupForm",
        FormRuleConfig::new().with_group(
            &RuleGroupKey::field("email"),
            vec![RuleDescriptor::new("value.endswith('@other.com')", "Other")],
        ),
    ));
    let mut third = DynamicHooks::new();
    let report = injector.attach(&mut third, &class, &available);
    ensure(report.installed == vec![RuleGroupKey::field("email")], "new configuration applied")?;
    ensure(injector.cache().generation() == 2, "cache moved to generation 2")?;
    ensure(injector.cache().len() == 1, "stale entries dropped")?;

    let form = TestForm::with_fields(&["email"]).clean("email", json!("x@other.com"));
    let failure = third.run_field_at("email", &form, fixed_clock()).err().ok_or("should fail")?;
    ensure(failure.message == "Other", "recompiled rules in effect")?;
    ensure(first.run_field_at("email", &form, fixed_clock()).is_ok(), "earlier instance keeps old rules")?;
    Ok(())
}
