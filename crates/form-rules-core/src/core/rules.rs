// crates/form-rules-core/src/core/rules.rs
// ============================================================================
// Module: Rule Configuration Model
// Description: Rule documents, per-form rule groups, and rule descriptors.
// Purpose: Typed, lenient view of the validation configuration source.
// Dependencies: form-rules-expr, serde
// ============================================================================

//! ## Overview
//! A [`RuleDocument`] maps form identifiers to a [`FormRuleConfig`], which in
//! turn maps rule-group keys to ordered [`RuleDescriptor`] lists:
//!
//! ```json
//! {
//!   "SignupForm": {
//!     "clean": [{ "field": "end", "condition": "end < start", "error": "End before start" }],
//!     "clean_email": [{ "condition": "value.endswith('@banned.com')", "error": "Banned" }]
//!   }
//! }
//! ```
//!
//! Groups and descriptors are deserialized leniently: every key is optional,
//! a `null` group is empty, and an entry of the wrong shape becomes a
//! malformed descriptor. One broken rule is reported when it runs instead of
//! discarding the document. Only a top-level value that is not a map fails
//! to deserialize.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use form_rules_expr::ExprError;
use form_rules_expr::parse_expression;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value as JsonValue;

// ============================================================================
// SECTION: Group Keys
// ============================================================================

/// Key of the whole-form rule group.
pub const FORM_GROUP_KEY: &str = "clean";
/// Prefix of field-scoped rule group keys.
pub const FIELD_GROUP_PREFIX: &str = "clean_";

/// Typed view of a rule-group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleGroupKey {
    /// Whole-form group (`clean`).
    Form,
    /// Field group (`clean_<field>`).
    Field(String),
    /// Unrecognized key; ignored at run time.
    Other(String),
}

impl RuleGroupKey {
    /// Classifies a raw configuration key.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == FORM_GROUP_KEY {
            return Self::Form;
        }
        match raw.strip_prefix(FIELD_GROUP_PREFIX) {
            Some(field) if !field.is_empty() => Self::Field(field.to_string()),
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Field group key for `field`.
    #[must_use]
    pub fn field(field: impl Into<String>) -> Self {
        Self::Field(field.into())
    }

    /// Field name for field groups.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field(field) => Some(field),
            Self::Form | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for RuleGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form => f.write_str(FORM_GROUP_KEY),
            Self::Field(field) => write!(f, "{FIELD_GROUP_PREFIX}{field}"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

// ============================================================================
// SECTION: Rule Descriptor
// ============================================================================

/// One declarative rule.
///
/// # Invariants
/// - Missing keys are preserved as `None` and reported when the rule runs.
/// - `malformed` is set when the raw entry was not an object or a key held a
///   non-string; such a rule never runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleDescriptor {
    /// Target field for whole-form rules; `None` attaches a form-level error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Condition that, when true, raises the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// User-facing message, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the raw entry could not be read as a rule.
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl<'de> Deserialize<'de> for RuleDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

impl RuleDescriptor {
    /// Creates a rule with a condition and an error message.
    #[must_use]
    pub fn new(condition: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: None,
            condition: Some(condition.into()),
            error: Some(error.into()),
            malformed: None,
        }
    }

    /// Rule standing in for an entry that could not be read.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            malformed: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Reads one raw group entry without failing.
    #[must_use]
    pub fn from_raw(raw: &JsonValue) -> Self {
        let JsonValue::Object(entries) = raw else {
            return Self::malformed(format!("rule must be an object, found {}", json_type(raw)));
        };
        let mut problems = Vec::new();
        let field = text_entry(entries, "field", &mut problems);
        let condition = text_entry(entries, "condition", &mut problems);
        let error = text_entry(entries, "error", &mut problems);
        Self {
            field,
            condition,
            error,
            malformed: (!problems.is_empty()).then(|| problems.join("; ")),
        }
    }

    /// Targets the rule at `field`.
    #[must_use]
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

// ============================================================================
// SECTION: Form Rule Config
// ============================================================================

/// Rule groups for one form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormRuleConfig {
    /// Raw group key to ordered rules.
    #[serde(flatten)]
    groups: BTreeMap<String, Vec<RuleDescriptor>>,
    /// Why the form entry was not a map of groups.
    #[serde(skip)]
    malformed: Option<String>,
}

impl<'de> Deserialize<'de> for FormRuleConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

impl FormRuleConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
            malformed: None,
        }
    }

    /// Reads one raw form entry without failing.
    ///
    /// A `null` group is empty; a group that is not a list becomes a single
    /// malformed rule.
    #[must_use]
    pub fn from_raw(raw: &JsonValue) -> Self {
        let JsonValue::Object(entries) = raw else {
            return Self {
                groups: BTreeMap::new(),
                malformed: Some(format!("form rules must be a map, found {}", json_type(raw))),
            };
        };
        let groups = entries
            .iter()
            .map(|(key, group)| {
                let rules = match group {
                    JsonValue::Null => Vec::new(),
                    JsonValue::Array(items) => items.iter().map(RuleDescriptor::from_raw).collect(),
                    other => vec![RuleDescriptor::malformed(format!(
                        "rule group must be a list, found {}",
                        json_type(other)
                    ))],
                };
                (key.clone(), rules)
            })
            .collect();
        Self {
            groups,
            malformed: None,
        }
    }

    /// Why the form entry could not be read, if it could not.
    #[must_use]
    pub fn malformed(&self) -> Option<&str> {
        self.malformed.as_deref()
    }

    /// Builder-style insertion of a group.
    #[must_use]
    pub fn with_group(mut self, key: &RuleGroupKey, rules: Vec<RuleDescriptor>) -> Self {
        self.groups.insert(key.to_string(), rules);
        self
    }

    /// Returns true when no groups are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rules for a group key.
    #[must_use]
    pub fn rules(&self, key: &RuleGroupKey) -> Option<&[RuleDescriptor]> {
        self.groups.get(&key.to_string()).map(Vec::as_slice)
    }

    /// Whole-form rules, if configured.
    #[must_use]
    pub fn form_rules(&self) -> Option<&[RuleDescriptor]> {
        self.groups.get(FORM_GROUP_KEY).map(Vec::as_slice)
    }

    /// Every group with its typed key, in key order.
    pub fn groups(&self) -> impl Iterator<Item = (RuleGroupKey, &[RuleDescriptor])> {
        self.groups.iter().map(|(key, rules)| (RuleGroupKey::parse(key), rules.as_slice()))
    }

    /// Field groups as `(field, rules)` pairs.
    pub fn field_groups(&self) -> impl Iterator<Item = (String, &[RuleDescriptor])> {
        self.groups().filter_map(|(key, rules)| match key {
            RuleGroupKey::Field(field) => Some((field, rules)),
            RuleGroupKey::Form | RuleGroupKey::Other(_) => None,
        })
    }
}

// ============================================================================
// SECTION: Rule Document
// ============================================================================

/// All rule configuration loaded from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, FormRuleConfig>")]
pub struct RuleDocument {
    /// Form identifier to shared configuration.
    forms: BTreeMap<String, Arc<FormRuleConfig>>,
}

impl From<BTreeMap<String, FormRuleConfig>> for RuleDocument {
    fn from(forms: BTreeMap<String, FormRuleConfig>) -> Self {
        Self {
            forms: forms.into_iter().map(|(id, config)| (id, Arc::new(config))).collect(),
        }
    }
}

impl RuleDocument {
    /// Creates an empty document.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            forms: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of a form configuration.
    #[must_use]
    pub fn with_form(mut self, form_id: impl Into<String>, config: FormRuleConfig) -> Self {
        self.forms.insert(form_id.into(), Arc::new(config));
        self
    }

    /// Configuration for `form_id`, if present.
    #[must_use]
    pub fn get(&self, form_id: &str) -> Option<&Arc<FormRuleConfig>> {
        self.forms.get(form_id)
    }

    /// Configuration for `form_id`; empty when absent.
    #[must_use]
    pub fn form_config(&self, form_id: &str) -> Arc<FormRuleConfig> {
        self.forms.get(form_id).cloned().unwrap_or_default()
    }

    /// Configured form identifiers.
    pub fn form_ids(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    /// Number of configured forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forms.len()
    }

    /// Returns true when no forms are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Reports structural problems without rejecting the document.
    #[must_use]
    pub fn lint(&self) -> Vec<RuleIssue> {
        let mut issues = Vec::new();
        for (form_id, config) in &self.forms {
            if let Some(reason) = config.malformed() {
                issues.push(RuleIssue {
                    form_id: form_id.clone(),
                    group: String::new(),
                    rule_index: None,
                    kind: RuleIssueKind::MalformedForm(reason.to_string()),
                });
            }
            for (key, rules) in config.groups() {
                if matches!(key, RuleGroupKey::Other(_)) {
                    issues.push(RuleIssue::new(form_id, &key, None, RuleIssueKind::UnknownGroupKey));
                    continue;
                }
                for (index, rule) in rules.iter().enumerate() {
                    if let Some(reason) = &rule.malformed {
                        issues.push(RuleIssue::new(
                            form_id,
                            &key,
                            Some(index),
                            RuleIssueKind::MalformedDescriptor(reason.clone()),
                        ));
                        continue;
                    }
                    match rule.condition.as_deref() {
                        None => issues.push(RuleIssue::new(
                            form_id,
                            &key,
                            Some(index),
                            RuleIssueKind::MissingCondition,
                        )),
                        Some(condition) => {
                            if let Err(err) = parse_expression(condition) {
                                issues.push(RuleIssue::new(
                                    form_id,
                                    &key,
                                    Some(index),
                                    RuleIssueKind::InvalidCondition(err),
                                ));
                            }
                        }
                    }
                    if rule.error.is_none() {
                        issues.push(RuleIssue::new(
                            form_id,
                            &key,
                            Some(index),
                            RuleIssueKind::MissingError,
                        ));
                    }
                }
            }
        }
        issues
    }
}

// ============================================================================
// SECTION: Lint Issues
// ============================================================================

/// Advisory problem found by [`RuleDocument::lint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIssue {
    /// Form identifier.
    pub form_id: String,
    /// Raw group key.
    pub group: String,
    /// Rule position within the group, when rule-specific.
    pub rule_index: Option<usize>,
    /// Problem classification.
    pub kind: RuleIssueKind,
}

impl RuleIssue {
    /// Builds an issue for a group or rule.
    fn new(form_id: &str, key: &RuleGroupKey, rule_index: Option<usize>, kind: RuleIssueKind) -> Self {
        Self {
            form_id: form_id.to_string(),
            group: key.to_string(),
            rule_index,
            kind,
        }
    }
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.form_id)?;
        if !self.group.is_empty() {
            write!(f, ".{}", self.group)?;
        }
        if let Some(index) = self.rule_index {
            write!(f, "[{index}]")?;
        }
        write!(f, ": {}", self.kind)
    }
}

/// Lint issue classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleIssueKind {
    /// Group key is neither `clean` nor `clean_<field>`.
    UnknownGroupKey,
    /// Rule has no `condition`.
    MissingCondition,
    /// Rule has no `error`.
    MissingError,
    /// Condition does not parse.
    InvalidCondition(ExprError),
    /// Rule entry has the wrong shape.
    MalformedDescriptor(String),
    /// Form entry is not a map of groups.
    MalformedForm(String),
}

impl fmt::Display for RuleIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroupKey => f.write_str("unrecognized rule group key"),
            Self::MissingCondition => f.write_str("rule has no condition"),
            Self::MissingError => f.write_str("rule has no error message"),
            Self::InvalidCondition(err) => write!(f, "condition does not parse: {err}"),
            Self::MalformedDescriptor(reason) => write!(f, "malformed rule: {reason}"),
            Self::MalformedForm(reason) => write!(f, "malformed form entry: {reason}"),
        }
    }
}

// ============================================================================
// SECTION: Raw Entry Helpers
// ============================================================================

/// Reads an optional string key, recording a problem for other types.
fn text_entry(
    entries: &Map<String, JsonValue>,
    key: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match entries.get(key) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(text)) => Some(text.clone()),
        Some(other) => {
            problems.push(format!("`{key}` must be a string, found {}", json_type(other)));
            None
        }
    }
}

/// Type label for a raw JSON value.
const fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "map",
    }
}
