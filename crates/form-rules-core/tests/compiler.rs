// crates/form-rules-core/tests/compiler.rs
// ============================================================================
// Module: Rule Compiler Tests
// Description: Whole-form and field validator behavior.
// ============================================================================
//! ## Overview
//! Runs compiled validators against a recording host form and checks error
//! attachment, rule ordering, context binding, and fault handling.

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

use std::sync::Arc;

use form_rules_core::DiagnosticKind;
use form_rules_core::MemoryDiagnosticSink;
use form_rules_core::RuleDescriptor;
use form_rules_core::RuleExecutionError;
use form_rules_core::ValidationFailure;
use form_rules_core::compile_field_validator;
use form_rules_core::compile_form_validator;
use serde_json::json;
use support::TestForm;
use support::TestResult;
use support::ensure;
use support::fixed_clock;

/// Fresh in-memory sink.
fn sink() -> Arc<MemoryDiagnosticSink> {
    Arc::new(MemoryDiagnosticSink::new())
}

// ============================================================================
// SECTION: Whole-Form Validator
// ============================================================================

/// Tests that every firing rule attaches its error.
#[test]
fn form_validator_runs_every_rule() -> TestResult {
    let rules = vec![
        RuleDescriptor::new("true", "E1").on_field("a"),
        RuleDescriptor::new("true", "E2").on_field("b"),
    ];
    let validator = compile_form_validator("TestForm", &rules, sink());
    let mut form = TestForm::with_fields(&["a", "b"]).clean("a", json!(1)).clean("b", json!(2));
    let outcome = validator.run(&mut form, fixed_clock());

    ensure(form.errors_for(Some("a")) == vec!["E1"], "E1 should be on a")?;
    ensure(form.errors_for(Some("b")) == vec!["E2"], "E2 should be on b")?;
    ensure(outcome.fired.len() == 2, "both rules should fire")?;
    ensure(outcome.cleaned_data == form.cleaned, "cleaned data is returned unchanged")?;
    Ok(())
}

/// Tests the end-before-start date rule.
#[test]
fn form_validator_compares_dates() -> TestResult {
    let rules = vec![
        RuleDescriptor::new("cleaned_data['end_date'] < cleaned_data['start_date']", "End before start")
            .on_field("end_date"),
    ];
    let validator = compile_form_validator("BookingForm", &rules, sink());

    let mut bad = TestForm::with_fields(&["start_date", "end_date"])
        .clean("start_date", json!("2024-07-01"))
        .clean("end_date", json!("2024-06-20"));
    validator.run(&mut bad, fixed_clock());
    ensure(bad.errors_for(Some("end_date")) == vec!["End before start"], "rule should fire")?;

    let mut good = TestForm::with_fields(&["start_date", "end_date"])
        .clean("start_date", json!("2024-07-01"))
        .clean("end_date", json!("2024-07-20"));
    let outcome = validator.run(&mut good, fixed_clock());
    ensure(good.errors.is_empty() && outcome.passed(), "rule should not fire")?;
    Ok(())
}

/// Tests that a rule without a field attaches a form-level error.
#[test]
fn form_validator_attaches_form_level_errors() -> TestResult {
    let rules = vec![RuleDescriptor::new("password != confirm", "Passwords differ")];
    let validator = compile_form_validator("SignupForm", &rules, sink());
    let mut form = TestForm::with_fields(&["password", "confirm"])
        .clean("password", json!("a"))
        .clean("confirm", json!("b"));
    validator.run(&mut form, fixed_clock());
    ensure(form.errors_for(None) == vec!["Passwords differ"], "error should be form-level")?;
    Ok(())
}

/// Tests that the rule's field is bound even when it has no cleaned value.
#[test]
fn form_validator_binds_missing_field_as_none() -> TestResult {
    let rules = vec![RuleDescriptor::new("nickname is None", "Nickname required").on_field("nickname")];
    let validator = compile_form_validator("ProfileForm", &rules, sink());
    let mut form = TestForm::with_fields(&["nickname"]);
    validator.run(&mut form, fixed_clock());
    ensure(form.errors_for(Some("nickname")) == vec!["Nickname required"], "None should be bound")?;
    Ok(())
}

/// Tests that the time handle is available to whole-form rules.
#[test]
fn form_validator_exposes_time_handle() -> TestResult {
    let rules = vec![
        RuleDescriptor::new("start_date < timezone.localdate()", "Start in the past").on_field("start_date"),
    ];
    let validator = compile_form_validator("BookingForm", &rules, sink());
    let mut form = TestForm::with_fields(&["start_date"]).clean("start_date", json!("2024-06-01"));
    validator.run(&mut form, fixed_clock());
    ensure(form.errors_for(Some("start_date")) == vec!["Start in the past"], "rule should fire")?;
    Ok(())
}

/// Tests that broken rules are skipped and later rules still run.
#[test]
fn form_validator_skips_broken_rules() -> TestResult {
    let diagnostics = sink();
    let rules = vec![
        RuleDescriptor {
            field: Some("a".to_string()),
            condition: None,
            error: Some("never".to_string()),
            malformed: None,
        },
        RuleDescriptor {
            field: Some("a".to_string()),
            condition: Some("true".to_string()),
            error: None,
            malformed: None,
        },
        RuleDescriptor::new("true", "ghost").on_field("missing"),
        RuleDescriptor::new("true", "E4").on_field("a"),
    ];
    let validator = compile_form_validator("TestForm", &rules, diagnostics.clone());
    let mut form = TestForm::with_fields(&["a"]).clean("a", json!(1));
    let outcome = validator.run(&mut form, fixed_clock());

    ensure(form.errors == vec![(Some("a".to_string()), "E4".to_string())], "only E4 attaches")?;
    let skipped: Vec<(usize, RuleExecutionError)> =
        outcome.skipped.iter().map(|skip| (skip.index, skip.error.clone())).collect();
    ensure(
        skipped
            == vec![
                (0, RuleExecutionError::MissingCondition),
                (1, RuleExecutionError::MissingError),
                (2, RuleExecutionError::UnknownField("missing".to_string())),
            ],
        format!("unexpected skips: {skipped:?}"),
    )?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 3, "each skip is logged")?;
    Ok(())
}

/// Tests that unparseable conditions are logged once and never fire.
#[test]
fn invalid_conditions_fail_closed() -> TestResult {
    let diagnostics = sink();
    let rules = vec![
        RuleDescriptor::new("value.endswith(", "broken").on_field("a"),
        RuleDescriptor::new("undefined_name > 3", "unknown").on_field("a"),
    ];
    let validator = compile_form_validator("TestForm", &rules, diagnostics.clone());
    ensure(diagnostics.count(DiagnosticKind::ExpressionError) == 1, "parse failure logged")?;

    let mut form = TestForm::with_fields(&["a"]).clean("a", json!("x"));
    validator.run(&mut form, fixed_clock());
    validator.run(&mut form, fixed_clock());
    ensure(form.errors.is_empty(), "neither rule may fire")?;
    ensure(diagnostics.count(DiagnosticKind::ExpressionError) == 1, "logged only at compile")?;
    let event = diagnostics.events().into_iter().next().ok_or("no diagnostic recorded")?;
    ensure(event.form_id.as_deref() == Some("TestForm"), "form id recorded")?;
    ensure(event.rule_group.as_deref() == Some("clean"), "group recorded")?;
    ensure(event.rule_index == Some(0), "rule index recorded")?;
    Ok(())
}

/// Tests that an empty message passes through untouched.
#[test]
fn empty_messages_pass_through() -> TestResult {
    let rules = vec![RuleDescriptor::new("true", "").on_field("a")];
    let validator = compile_form_validator("TestForm", &rules, sink());
    let mut form = TestForm::with_fields(&["a"]);
    validator.run(&mut form, fixed_clock());
    ensure(form.errors_for(Some("a")) == vec![""], "empty message attached as-is")?;
    Ok(())
}

// ============================================================================
// SECTION: Field Validator
// ============================================================================

/// Tests the banned-domain field rule.
#[test]
fn field_validator_rejects_banned_domain() -> TestResult {
    let rules = vec![RuleDescriptor::new("value.endswith('@banned.com')", "Banned")];
    let validator = compile_field_validator("SignupForm", "email", &rules, sink());

    let banned = TestForm::with_fields(&["email"]).clean("email", json!("x@banned.com"));
    let result = validator.run(&banned, fixed_clock());
    ensure(
        result
            == Err(ValidationFailure {
                field: "email".to_string(),
                message: "Banned".to_string(),
            }),
        format!("unexpected result: {result:?}"),
    )?;

    let allowed = TestForm::with_fields(&["email"]).clean("email", json!("x@ok.com"));
    ensure(validator.run(&allowed, fixed_clock()) == Ok(json!("x@ok.com")), "value returned")?;
    Ok(())
}

/// Tests that the first firing rule wins.
#[test]
fn field_validator_stops_at_first_match() -> TestResult {
    let rules = vec![
        RuleDescriptor::new("len(value) < 3", "Too short"),
        RuleDescriptor::new("value.isdigit()", "Digits only"),
        RuleDescriptor::new("true", "Always"),
    ];
    let validator = compile_field_validator("SignupForm", "username", &rules, sink());
    let form = TestForm::with_fields(&["username"]).clean("username", json!("12"));
    let failure = validator.run(&form, fixed_clock()).err().ok_or("expected failure")?;
    ensure(failure.message == "Too short", format!("unexpected message: {}", failure.message))?;
    Ok(())
}

/// Tests that field rules see `cleaned_data` and `timezone`.
#[test]
fn field_validator_context() -> TestResult {
    let rules = vec![
        RuleDescriptor::new("value == cleaned_data['password']", "Same as password"),
        RuleDescriptor::new("timezone.days_until(cleaned_data['deadline']) < 1", "Too late"),
    ];
    let validator = compile_field_validator("SignupForm", "hint", &rules, sink());
    let form = TestForm::with_fields(&["hint", "password", "deadline"])
        .clean("hint", json!("abc"))
        .clean("password", json!("xyz"))
        .clean("deadline", json!("2024-06-15"));
    let failure = validator.run(&form, fixed_clock()).err().ok_or("expected failure")?;
    ensure(failure.message == "Too late", format!("unexpected message: {}", failure.message))?;
    Ok(())
}

/// Tests that a missing field value is `None` and broken rules do not fire.
#[test]
fn field_validator_missing_value_and_broken_rules() -> TestResult {
    let diagnostics = sink();
    let rules = vec![
        RuleDescriptor {
            field: None,
            condition: None,
            error: Some("never".to_string()),
            malformed: None,
        },
        RuleDescriptor::new("value > 3", "type error"),
    ];
    let validator = compile_field_validator("SignupForm", "age", &rules, diagnostics.clone());
    let form = TestForm::with_fields(&["age"]);
    ensure(validator.run(&form, fixed_clock()) == Ok(serde_json::Value::Null), "None passes")?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 1, "missing condition logged")?;
    Ok(())
}

/// Tests that a rule without a message is only reported when it fires.
#[test]
fn missing_message_reported_only_when_fired() -> TestResult {
    let diagnostics = sink();
    let quiet = RuleDescriptor {
        condition: Some("a > 5".to_string()),
        ..RuleDescriptor::default()
    };
    let validator = compile_form_validator("TestForm", &[quiet], diagnostics.clone());
    let mut form = TestForm::with_fields(&["a"]).clean("a", json!(1));
    let outcome = validator.run(&mut form, fixed_clock());
    ensure(outcome.skipped.is_empty(), "false condition is not a skip")?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 0, "nothing logged")?;

    let mut loud = TestForm::with_fields(&["a"]).clean("a", json!(9));
    let outcome = validator.run(&mut loud, fixed_clock());
    let skipped: Vec<RuleExecutionError> =
        outcome.skipped.iter().map(|skip| skip.error.clone()).collect();
    ensure(skipped == vec![RuleExecutionError::MissingError], "firing rule without message is skipped")?;
    ensure(loud.errors.is_empty(), "nothing attached")?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 1, "logged once")?;

    let field_rules = vec![RuleDescriptor {
        condition: Some("value > 5".to_string()),
        ..RuleDescriptor::default()
    }];
    let field_validator = compile_field_validator("TestForm", "a", &field_rules, diagnostics.clone());
    ensure(field_validator.run(&form, fixed_clock()) == Ok(json!(1)), "field passes quietly")?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 1, "still one entry")?;
    Ok(())
}

/// Tests that malformed rules are skipped while their neighbours run.
#[test]
fn malformed_rules_are_skipped() -> TestResult {
    let diagnostics = sink();
    let rules = vec![
        RuleDescriptor::malformed("`field` must be a string, found number"),
        RuleDescriptor::new("a == 1", "E2").on_field("a"),
    ];
    let validator = compile_form_validator("TestForm", &rules, diagnostics.clone());
    let mut form = TestForm::with_fields(&["a"]).clean("a", json!(1));
    let outcome = validator.run(&mut form, fixed_clock());

    ensure(form.errors_for(Some("a")) == vec!["E2"], "later rule still attaches")?;
    ensure(
        matches!(
            outcome.skipped.first().map(|skip| &skip.error),
            Some(RuleExecutionError::MalformedDescriptor(_))
        ),
        "malformed rule skipped",
    )?;

    let field_rules = vec![
        RuleDescriptor::malformed("rule must be an object, found string"),
        RuleDescriptor::new("value == 1", "one"),
    ];
    let field_validator = compile_field_validator("TestForm", "a", &field_rules, diagnostics.clone());
    let failure = field_validator.run(&form, fixed_clock()).err().ok_or("second rule should fire")?;
    ensure(failure.message == "one", "field rule after malformed entry fires")?;
    ensure(diagnostics.count(DiagnosticKind::RuleExecutionError) == 2, "each malformed run logged")?;
    Ok(())
}
