// crates/form-rules-expr/src/error.rs
// ============================================================================
// Module: Expression Errors
// Description: Structured parse and evaluation failures for conditions.
// Purpose: Give callers positional diagnostics before failing closed.
// Dependencies: std::fmt
// ============================================================================

//! ## Overview
//! Every way a condition can fail is a variant of [`ExprError`]. The
//! interpreter never panics; callers that only need a decision use
//! [`crate::evaluate`], which maps any error to `false`.

use std::fmt;

/// Errors that can occur while parsing or evaluating a condition.
///
/// # Invariants
/// - Parse variants carry byte offsets into the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Input was empty or contained only whitespace.
    EmptyInput,
    /// Input exceeded the configured size limit.
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded the configured nesting depth.
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected token encountered during parsing.
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// String literal was not closed before end of input.
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Numeric literal failed to parse or overflowed.
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Unexpected trailing input after a complete expression.
    TrailingInput {
        /// Byte offset where unexpected input begins.
        position: usize,
    },
    /// A name was not present in the evaluation context.
    UnknownName(String),
    /// A free function is not on the whitelist.
    UnknownFunction(String),
    /// A method is not available on the receiver type.
    UnknownMethod {
        /// Receiver type name.
        type_name: &'static str,
        /// Requested method.
        method: String,
    },
    /// Operand types do not support the operation.
    TypeMismatch {
        /// Operation label.
        operation: &'static str,
        /// Left operand type name.
        left: &'static str,
        /// Right operand type name.
        right: &'static str,
    },
    /// A function or method received the wrong arguments.
    InvalidArgument(String),
    /// Map subscript referenced a missing key.
    KeyNotFound(String),
    /// List subscript was out of range.
    IndexOutOfRange(i64),
    /// Division or modulo by zero.
    DivisionByZero,
    /// Integer arithmetic overflowed.
    Overflow,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "condition is empty"),
            Self::InputTooLarge {
                max_bytes,
                actual_bytes,
            } => {
                write!(f, "condition exceeds size limit: {actual_bytes} bytes (max {max_bytes})")
            }
            Self::NestingTooDeep {
                max_depth,
                position,
            } => write!(f, "condition nesting exceeds limit {max_depth} at {position}"),
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => {
                write!(f, "unexpected token `{found}` at {position}, expected {expected}")
            }
            Self::UnterminatedString {
                position,
            } => write!(f, "unterminated string literal starting at {position}"),
            Self::InvalidNumber {
                raw,
                position,
            } => write!(f, "invalid number `{raw}` at {position}"),
            Self::TrailingInput {
                position,
            } => write!(f, "unexpected trailing input at {position}"),
            Self::UnknownName(name) => write!(f, "name `{name}` is not defined"),
            Self::UnknownFunction(name) => write!(f, "function `{name}` is not available"),
            Self::UnknownMethod {
                type_name,
                method,
            } => write!(f, "`{type_name}` has no method `{method}`"),
            Self::TypeMismatch {
                operation,
                left,
                right,
            } => write!(f, "unsupported operand types for {operation}: `{left}` and `{right}`"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::KeyNotFound(key) => write!(f, "key `{key}` not found"),
            Self::IndexOutOfRange(index) => write!(f, "index {index} out of range"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::Overflow => write!(f, "integer overflow"),
        }
    }
}

impl std::error::Error for ExprError {}

impl ExprError {
    /// Returns true when the error was raised while parsing.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::InputTooLarge { .. }
                | Self::NestingTooDeep { .. }
                | Self::UnexpectedToken { .. }
                | Self::UnterminatedString { .. }
                | Self::InvalidNumber { .. }
                | Self::TrailingInput { .. }
        )
    }
}
