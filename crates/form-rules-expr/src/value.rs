// crates/form-rules-expr/src/value.rs
// ============================================================================
// Module: Expression Values
// Description: Runtime values, truthiness, equality, ordering, membership.
// Purpose: Give conditions predictable semantics over cleaned form data.
// Dependencies: serde_json, time, crate::{clock, error}
// ============================================================================

//! ## Overview
//! Values mirror the shapes a host hands over as cleaned data (JSON scalars,
//! lists and maps) plus calendar values produced by the time handle.
//! Equality across unrelated types is `false`; ordering across unrelated
//! types is an error, so a condition such as `None < 3` fails closed.
//! Dates and date-times compare against ISO-8601 / RFC3339 strings by
//! parsing the string on demand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::num::FpCategory;

use serde_json::Value as JsonValue;
use time::Date;
use time::OffsetDateTime;

use crate::clock::TimeHandle;
use crate::clock::format_datetime;
use crate::clock::parse_date;
use crate::clock::parse_datetime;
use crate::error::ExprError;

// ============================================================================
// SECTION: Value
// ============================================================================

/// A runtime value visible to conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`None`).
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(String),
    /// Ordered list.
    List(Vec<Self>),
    /// String-keyed map.
    Map(BTreeMap<String, Self>),
    /// Calendar date.
    Date(Date),
    /// Date-time with offset.
    DateTime(OffsetDateTime),
    /// The time utility handle.
    Clock(TimeHandle),
}

impl Value {
    /// Type label used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "dict",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Clock(_) => "timezone",
        }
    }

    /// Truthiness: empty, zero and `None` are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Float(value) => value.classify() != FpCategory::Zero,
            Self::Str(value) => !value.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
            Self::Date(_) | Self::DateTime(_) | Self::Clock(_) => true,
        }
    }

    /// Equality with numeric widening and string/date coercion.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                numeric_cmp(self, other) == Some(Ordering::Equal)
            }
            (Self::Date(date), Self::Str(text)) | (Self::Str(text), Self::Date(date)) => {
                parse_date(text).is_some_and(|parsed| parsed == *date)
            }
            (Self::DateTime(moment), Self::Str(text)) | (Self::Str(text), Self::DateTime(moment)) => {
                parse_datetime(text).is_some_and(|parsed| parsed == *moment)
            }
            (Self::List(left), Self::List(right)) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(left, right)| left.loose_eq(right))
            }
            (Self::Map(left), Self::Map(right)) => {
                left.len() == right.len()
                    && left.iter().all(|(key, value)| {
                        right.get(key).is_some_and(|other| value.loose_eq(other))
                    })
            }
            _ => self == other,
        }
    }

    /// Orders two values.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::TypeMismatch`] when the types are not orderable.
    pub fn compare(&self, other: &Self) -> Result<Ordering, ExprError> {
        let ordering = match (self, other) {
            (Self::Int(left), Self::Int(right)) => Some(left.cmp(right)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                numeric_cmp(self, other)
            }
            (Self::Bool(left), Self::Bool(right)) => Some(left.cmp(right)),
            (Self::Str(left), Self::Str(right)) => Some(left.cmp(right)),
            (Self::Date(left), Self::Date(right)) => Some(left.cmp(right)),
            (Self::DateTime(left), Self::DateTime(right)) => Some(left.cmp(right)),
            (Self::Date(left), Self::Str(right)) => parse_date(right).map(|right| left.cmp(&right)),
            (Self::Str(left), Self::Date(right)) => parse_date(left).map(|left| left.cmp(right)),
            (Self::DateTime(left), Self::Str(right)) => {
                parse_datetime(right).map(|right| left.cmp(&right))
            }
            (Self::Str(left), Self::DateTime(right)) => {
                parse_datetime(left).map(|left| left.cmp(right))
            }
            (Self::List(left), Self::List(right)) => return compare_lists(left, right),
            _ => None,
        };
        ordering.ok_or_else(|| self.mismatch("ordering", other))
    }

    /// Membership test: `item in self`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::TypeMismatch`] when `self` is not a container or
    /// a string is searched for a non-string.
    pub fn contains(&self, item: &Self) -> Result<bool, ExprError> {
        match (self, item) {
            (Self::Str(haystack), Self::Str(needle)) => Ok(haystack.contains(needle.as_str())),
            (Self::List(items), _) => Ok(items.iter().any(|candidate| candidate.loose_eq(item))),
            (Self::Map(entries), Self::Str(key)) => Ok(entries.contains_key(key)),
            (Self::Map(_), _) => Ok(false),
            _ => Err(item.mismatch("in", self)),
        }
    }

    /// Builds a type mismatch error for `self <op> other`.
    pub(crate) const fn mismatch(&self, operation: &'static str, other: &Self) -> ExprError {
        ExprError::TypeMismatch {
            operation,
            left: self.type_name(),
            right: other.type_name(),
        }
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(*value),
            JsonValue::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            JsonValue::String(text) => Self::Str(text.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            JsonValue::Object(entries) => Self::Map(
                entries.iter().map(|(key, value)| (key.clone(), Self::from(value))).collect(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Self::from(&value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<TimeHandle> for Value {
    fn from(value: TimeHandle) -> Self {
        Self::Clock(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => {
                if value.is_finite() && value.fract().classify() == FpCategory::Zero {
                    write!(f, "{value:.1}")
                } else {
                    write!(f, "{value}")
                }
            }
            Self::Str(text) => f.write_str(text),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write_repr(f, item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{key}': ")?;
                    write_repr(f, value)?;
                }
                f.write_str("}")
            }
            Self::Date(date) => write!(f, "{date}"),
            Self::DateTime(moment) => f.write_str(&format_datetime(*moment)),
            Self::Clock(_) => f.write_str("<timezone>"),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes a nested value, quoting strings.
fn write_repr(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(text) => write!(f, "'{text}'"),
        other => write!(f, "{other}"),
    }
}

/// Orders numeric values, widening integers to floats when mixed.
#[allow(clippy::cast_precision_loss, reason = "Mixed int/float comparison widens integers to f64.")]
fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(left), Value::Int(right)) => Some(left.cmp(right)),
        (Value::Int(left), Value::Float(right)) => (*left as f64).partial_cmp(right),
        (Value::Float(left), Value::Int(right)) => left.partial_cmp(&(*right as f64)),
        (Value::Float(left), Value::Float(right)) => left.partial_cmp(right),
        _ => None,
    }
}

/// Lexicographic list ordering.
fn compare_lists(left: &[Value], right: &[Value]) -> Result<Ordering, ExprError> {
    for (left, right) in left.iter().zip(right) {
        let ordering = left.compare(right)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(left.len().cmp(&right.len()))
}
