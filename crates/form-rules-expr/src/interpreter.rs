// crates/form-rules-expr/src/interpreter.rs
// ============================================================================
// Module: Condition Interpreter
// Description: Tree-walking evaluation of parsed conditions.
// Purpose: Decide conditions over an explicit context, failing closed.
// Dependencies: crate::{ast, clock, context, error, parser, value}
// ============================================================================

//! ## Overview
//! The interpreter walks an [`Expr`] against an [`EvaluationContext`]. Names
//! resolve only to context bindings and calls dispatch only to the functions
//! and methods listed here, so a condition has no way to reach files,
//! network, processes, or host internals.
//!
//! [`evaluate`] is the fail-closed entry point: parse errors, missing names,
//! type errors and arithmetic faults all produce `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use crate::ast::BinaryOp;
use crate::ast::BoolOp;
use crate::ast::CompareOp;
use crate::ast::Expr;
use crate::ast::UnaryOp;
use crate::clock::TimeHandle;
use crate::clock::parse_date;
use crate::clock::parse_datetime;
use crate::context::EvaluationContext;
use crate::error::ExprError;
use crate::parser::parse_expression;
use crate::value::Value;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// A parsed condition ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Original condition text.
    source: String,
    /// Parsed tree.
    root: Expr,
}

impl Expression {
    /// Parses a condition.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when the condition is not valid syntax.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let root = parse_expression(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Original condition text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree.
    #[must_use]
    pub const fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluates to a value.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] on unknown names, type errors, or arithmetic faults.
    pub fn evaluate(&self, context: &EvaluationContext) -> Result<Value, ExprError> {
        Interpreter {
            context,
        }
        .eval(&self.root)
    }

    /// Evaluates to the truthiness of the result.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when evaluation fails.
    pub fn check(&self, context: &EvaluationContext) -> Result<bool, ExprError> {
        Ok(self.evaluate(context)?.is_truthy())
    }

    /// Fail-closed decision: any error is `false`.
    #[must_use]
    pub fn test(&self, context: &EvaluationContext) -> bool {
        self.check(context).unwrap_or(false)
    }
}

/// Parses and evaluates `expression`, reporting failures.
///
/// # Errors
///
/// Returns [`ExprError`] when parsing or evaluation fails.
pub fn try_evaluate(expression: &str, context: &EvaluationContext) -> Result<bool, ExprError> {
    Expression::parse(expression)?.check(context)
}

/// Parses and evaluates `expression`; any failure yields `false`.
#[must_use]
pub fn evaluate(expression: &str, context: &EvaluationContext) -> bool {
    try_evaluate(expression, context).unwrap_or(false)
}

// ============================================================================
// SECTION: Interpreter
// ============================================================================

/// Evaluation state for one call.
struct Interpreter<'ctx> {
    /// The only names visible to the condition.
    context: &'ctx EvaluationContext,
}

impl Interpreter<'_> {
    /// Evaluates a node.
    fn eval(&self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Name(name) => {
                self.context.get(name).cloned().ok_or_else(|| ExprError::UnknownName(name.clone()))
            }
            Expr::Unary {
                op,
                operand,
            } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => negate(&value),
                }
            }
            Expr::Binary {
                op,
                left,
                right,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                arithmetic(*op, &left, &right)
            }
            Expr::Bool {
                op,
                operands,
            } => self.eval_bool(*op, operands),
            Expr::Compare {
                first,
                rest,
            } => {
                let mut left = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Subscript {
                target,
                index,
            } => subscript(self.eval(target)?, &self.eval(index)?),
            Expr::Attribute {
                target,
                name,
            } => attribute(self.eval(target)?, name),
            Expr::Call {
                function,
                args,
            } => call_function(function, self.eval_all(args)?),
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let receiver = self.eval(target)?;
                call_method(receiver, method, self.eval_all(args)?)
            }
        }
    }

    /// Evaluates a list of nodes in order.
    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>, ExprError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    /// Short-circuit `and`/`or` returning the deciding operand.
    fn eval_bool(&self, op: BoolOp, operands: &[Expr]) -> Result<Value, ExprError> {
        let mut last = Value::Null;
        for operand in operands {
            last = self.eval(operand)?;
            let decided = match op {
                BoolOp::And => !last.is_truthy(),
                BoolOp::Or => last.is_truthy(),
            };
            if decided {
                break;
            }
        }
        Ok(last)
    }
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Applies a comparison operator.
fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::NotEq => !left.loose_eq(right),
        CompareOp::Lt => left.compare(right)? == Ordering::Less,
        CompareOp::LtE => left.compare(right)? != Ordering::Greater,
        CompareOp::Gt => left.compare(right)? == Ordering::Greater,
        CompareOp::GtE => left.compare(right)? != Ordering::Less,
        CompareOp::In => right.contains(left)?,
        CompareOp::NotIn => !right.contains(left)?,
        CompareOp::Is => left == right,
        CompareOp::IsNot => left != right,
    })
}

/// Arithmetic negation.
fn negate(value: &Value) -> Result<Value, ExprError> {
    match value {
        Value::Int(number) => number.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
        Value::Float(number) => Ok(Value::Float(-number)),
        other => Err(ExprError::InvalidArgument(format!(
            "bad operand type for unary -: `{}`",
            other.type_name()
        ))),
    }
}

/// Applies an arithmetic operator.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match (op, left, right) {
        (_, Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Sub, Value::Date(a), Value::Date(b)) => Ok(Value::Int((*a - *b).whole_days())),
        (BinaryOp::Sub, Value::DateTime(a), Value::DateTime(b)) => {
            Ok(Value::Float((*a - *b).as_seconds_f64()))
        }
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => float_arithmetic(op, a, b),
            _ => Err(left.mismatch(op_label(op), right)),
        },
    }
}

/// Integer arithmetic with overflow detection; `/` always yields a float.
fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return float_arithmetic(op, int_to_float(a), int_to_float(b)),
        BinaryOp::Rem => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            a.checked_rem(b).map(|rem| if rem != 0 && (rem < 0) != (b < 0) { rem + b } else { rem })
        }
    };
    result.map(Value::Int).ok_or(ExprError::Overflow)
}

/// Float arithmetic; remainder follows the sign of the divisor.
fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => {
            let rem = a % b;
            if rem != 0.0 && (rem < 0.0) != (b < 0.0) { rem + b } else { rem }
        }
    };
    Ok(Value::Float(result))
}

/// Operator label for diagnostics.
const fn op_label(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
    }
}

/// Widens numeric values to `f64`.
fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(number) => Some(int_to_float(*number)),
        Value::Float(number) => Some(*number),
        _ => None,
    }
}

/// Converts an integer to a float.
#[allow(clippy::cast_precision_loss, reason = "Numeric widening matches host-language semantics.")]
const fn int_to_float(value: i64) -> f64 {
    value as f64
}

// ============================================================================
// SECTION: Access
// ============================================================================

/// Evaluates `target[index]`.
fn subscript(target: Value, index: &Value) -> Result<Value, ExprError> {
    match (target, index) {
        (Value::Map(mut entries), Value::Str(key)) => {
            entries.remove(key).ok_or_else(|| ExprError::KeyNotFound(key.clone()))
        }
        (Value::List(mut items), Value::Int(position)) => {
            let slot = normalize_index(*position, items.len())?;
            Ok(items.swap_remove(slot))
        }
        (Value::Str(text), Value::Int(position)) => {
            let chars: Vec<char> = text.chars().collect();
            let slot = normalize_index(*position, chars.len())?;
            Ok(Value::Str(chars[slot].to_string()))
        }
        (target, index) => Err(target.mismatch("subscript", index)),
    }
}

/// Resolves a possibly negative index against `len`.
fn normalize_index(position: i64, len: usize) -> Result<usize, ExprError> {
    let len_i64 = i64::try_from(len).map_err(|_| ExprError::Overflow)?;
    let resolved = if position < 0 { len_i64 + position } else { position };
    if (0 .. len_i64).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| ExprError::IndexOutOfRange(position))
    } else {
        Err(ExprError::IndexOutOfRange(position))
    }
}

/// Evaluates `target.name`.
fn attribute(target: Value, name: &str) -> Result<Value, ExprError> {
    match (&target, name) {
        (Value::Map(entries), _) => {
            entries.get(name).cloned().ok_or_else(|| ExprError::KeyNotFound(name.to_string()))
        }
        (Value::Date(date), "year") => Ok(Value::Int(i64::from(date.year()))),
        (Value::Date(date), "month") => Ok(Value::Int(i64::from(u8::from(date.month())))),
        (Value::Date(date), "day") => Ok(Value::Int(i64::from(date.day()))),
        (Value::DateTime(moment), "year") => Ok(Value::Int(i64::from(moment.year()))),
        (Value::DateTime(moment), "month") => Ok(Value::Int(i64::from(u8::from(moment.month())))),
        (Value::DateTime(moment), "day") => Ok(Value::Int(i64::from(moment.day()))),
        (Value::DateTime(moment), "hour") => Ok(Value::Int(i64::from(moment.hour()))),
        (Value::DateTime(moment), "minute") => Ok(Value::Int(i64::from(moment.minute()))),
        _ => Err(ExprError::UnknownMethod {
            type_name: target.type_name(),
            method: name.to_string(),
        }),
    }
}

// ============================================================================
// SECTION: Functions
// ============================================================================

/// Dispatches a whitelisted free function.
fn call_function(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match name {
        "len" => {
            let [value] = take_args::<1>(name, args)?;
            let len = match &value {
                Value::Str(text) => text.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(ExprError::InvalidArgument(format!(
                        "object of type `{}` has no len()",
                        other.type_name()
                    )));
                }
            };
            i64::try_from(len).map(Value::Int).map_err(|_| ExprError::Overflow)
        }
        "int" => {
            let [value] = take_args::<1>(name, args)?;
            to_int(&value).map(Value::Int)
        }
        "float" => {
            let [value] = take_args::<1>(name, args)?;
            match &value {
                Value::Str(text) => text.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    ExprError::InvalidArgument(format!("could not convert `{text}` to float"))
                }),
                other => as_float(other).map(Value::Float).ok_or_else(|| {
                    ExprError::InvalidArgument(format!("float() of `{}`", other.type_name()))
                }),
            }
        }
        "str" => {
            let [value] = take_args::<1>(name, args)?;
            Ok(Value::Str(value.to_string()))
        }
        "bool" => {
            let [value] = take_args::<1>(name, args)?;
            Ok(Value::Bool(value.is_truthy()))
        }
        "abs" => {
            let [value] = take_args::<1>(name, args)?;
            match value {
                Value::Int(number) => {
                    number.checked_abs().map(Value::Int).ok_or(ExprError::Overflow)
                }
                Value::Float(number) => Ok(Value::Float(number.abs())),
                other => Err(ExprError::InvalidArgument(format!(
                    "bad operand type for abs(): `{}`",
                    other.type_name()
                ))),
            }
        }
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

/// Converts a value to an integer, truncating floats.
#[allow(clippy::cast_possible_truncation, reason = "Float is range-checked before truncation.")]
fn to_int(value: &Value) -> Result<i64, ExprError> {
    match value {
        Value::Int(number) => Ok(*number),
        Value::Bool(flag) => Ok(i64::from(*flag)),
        Value::Float(number) => {
            let truncated = number.trunc();
            if truncated.is_finite()
                && truncated >= int_to_float(i64::MIN)
                && truncated < int_to_float(i64::MAX)
            {
                Ok(truncated as i64)
            } else {
                Err(ExprError::Overflow)
            }
        }
        Value::Str(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| ExprError::InvalidArgument(format!("invalid literal for int(): `{text}`"))),
        other => {
            Err(ExprError::InvalidArgument(format!("int() of `{}`", other.type_name())))
        }
    }
}

/// Implements `min`/`max` over arguments or a single list argument.
fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> Result<Value, ExprError> {
    let candidates = match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    };
    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(ExprError::InvalidArgument(format!("{name}() arg is an empty sequence")));
    };
    for candidate in iter {
        if candidate.compare(&best)? == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

// ============================================================================
// SECTION: Methods
// ============================================================================

/// Dispatches a whitelisted method on `receiver`.
fn call_method(receiver: Value, method: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match receiver {
        Value::Str(text) => string_method(&text, method, args),
        Value::Map(entries) => match method {
            "get" => {
                let (key, default) = match <[Value; 2]>::try_from(args) {
                    Ok([key, default]) => (key, default),
                    Err(args) => {
                        let [key] = take_args::<1>(method, args)?;
                        (key, Value::Null)
                    }
                };
                let Value::Str(key) = key else {
                    return Ok(default);
                };
                Ok(entries.get(&key).cloned().unwrap_or(default))
            }
            "keys" => {
                take_args::<0>(method, args)?;
                Ok(Value::List(entries.into_keys().map(Value::Str).collect()))
            }
            "values" => {
                take_args::<0>(method, args)?;
                Ok(Value::List(entries.into_values().collect()))
            }
            _ => Err(unknown_method("dict", method)),
        },
        Value::Date(date) => match method {
            "isoformat" => {
                take_args::<0>(method, args)?;
                Ok(Value::Str(date.to_string()))
            }
            _ => Err(unknown_method("date", method)),
        },
        Value::DateTime(moment) => match method {
            "date" => {
                take_args::<0>(method, args)?;
                Ok(Value::Date(moment.date()))
            }
            "isoformat" => {
                take_args::<0>(method, args)?;
                Ok(Value::Str(Value::DateTime(moment).to_string()))
            }
            _ => Err(unknown_method("datetime", method)),
        },
        Value::Clock(handle) => clock_method(handle, method, args),
        other => Err(unknown_method(other.type_name(), method)),
    }
}

/// String methods.
fn string_method(text: &str, method: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match method {
        "startswith" | "endswith" => {
            let [pattern] = take_args::<1>(method, args)?;
            let check = |candidate: &str| {
                if method == "startswith" {
                    text.starts_with(candidate)
                } else {
                    text.ends_with(candidate)
                }
            };
            match pattern {
                Value::Str(candidate) => Ok(Value::Bool(check(&candidate))),
                Value::List(candidates) => {
                    let mut matched = false;
                    for candidate in candidates {
                        let Value::Str(candidate) = candidate else {
                            return Err(ExprError::InvalidArgument(format!(
                                "{method}() candidates must be strings"
                            )));
                        };
                        matched |= check(&candidate);
                    }
                    Ok(Value::Bool(matched))
                }
                other => Err(ExprError::InvalidArgument(format!(
                    "{method}() argument must be str, not `{}`",
                    other.type_name()
                ))),
            }
        }
        "contains" => {
            let [needle] = take_args::<1>(method, args)?;
            Value::Str(text.to_string()).contains(&needle).map(Value::Bool)
        }
        "lower" => {
            take_args::<0>(method, args)?;
            Ok(Value::Str(text.to_lowercase()))
        }
        "upper" => {
            take_args::<0>(method, args)?;
            Ok(Value::Str(text.to_uppercase()))
        }
        "strip" => {
            take_args::<0>(method, args)?;
            Ok(Value::Str(text.trim().to_string()))
        }
        "isdigit" => {
            take_args::<0>(method, args)?;
            Ok(Value::Bool(!text.is_empty() && text.chars().all(|c| c.is_ascii_digit())))
        }
        _ => Err(unknown_method("str", method)),
    }
}

/// Time handle methods.
fn clock_method(handle: TimeHandle, method: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match method {
        "now" => {
            take_args::<0>(method, args)?;
            Ok(Value::DateTime(handle.now()))
        }
        "localdate" | "today" => {
            take_args::<0>(method, args)?;
            Ok(Value::Date(handle.localdate()))
        }
        "parse_date" => {
            let [value] = take_args::<1>(method, args)?;
            as_date(&value).map(Value::Date)
        }
        "parse_datetime" => {
            let [value] = take_args::<1>(method, args)?;
            match &value {
                Value::DateTime(moment) => Ok(Value::DateTime(*moment)),
                Value::Str(text) => parse_datetime(text).map(Value::DateTime).ok_or_else(|| {
                    ExprError::InvalidArgument(format!("invalid datetime `{text}`"))
                }),
                other => Err(ExprError::InvalidArgument(format!(
                    "parse_datetime() of `{}`",
                    other.type_name()
                ))),
            }
        }
        "days_until" => {
            let [value] = take_args::<1>(method, args)?;
            Ok(Value::Int(handle.days_until(as_date(&value)?)))
        }
        _ => Err(unknown_method("timezone", method)),
    }
}

/// Coerces a date, date-time, or ISO date string to a date.
fn as_date(value: &Value) -> Result<time::Date, ExprError> {
    match value {
        Value::Date(date) => Ok(*date),
        Value::DateTime(moment) => Ok(moment.date()),
        Value::Str(text) => parse_date(text)
            .or_else(|| parse_datetime(text).map(|moment| moment.date()))
            .ok_or_else(|| ExprError::InvalidArgument(format!("invalid date `{text}`"))),
        other => Err(ExprError::InvalidArgument(format!("expected a date, got `{}`", other.type_name()))),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Enforces an exact argument count.
fn take_args<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ExprError> {
    let count = args.len();
    <[Value; N]>::try_from(args).map_err(|_| {
        ExprError::InvalidArgument(format!("{name}() takes {N} argument(s), got {count}"))
    })
}

/// Builds an unknown-method error.
fn unknown_method(type_name: &'static str, method: &str) -> ExprError {
    ExprError::UnknownMethod {
        type_name,
        method: method.to_string(),
    }
}
