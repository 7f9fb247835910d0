// crates/form-rules-expr/src/ast.rs
// ============================================================================
// Module: Expression Tree
// Description: Parsed representation of a condition.
// Purpose: Restrict conditions to literals, names, operators and whitelisted calls.
// Dependencies: crate::value
// ============================================================================

//! ## Overview
//! The tree has no node that can reach outside the evaluation context: names
//! resolve only against bindings and calls dispatch only to a fixed set of
//! functions and methods.

use crate::value::Value;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Boolean negation (`not`).
    Not,
    /// Arithmetic negation (`-`).
    Neg,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// Short-circuit boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

/// Condition syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Scalar literal.
    Literal(Value),
    /// List literal.
    List(Vec<Self>),
    /// Context name lookup.
    Name(String),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Self>,
    },
    /// Arithmetic operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Self>,
        /// Right operand.
        right: Box<Self>,
    },
    /// `and` / `or` chain.
    Bool {
        /// Connective.
        op: BoolOp,
        /// Operands, at least two.
        operands: Vec<Self>,
    },
    /// Comparison chain (`a < b <= c`).
    Compare {
        /// Leftmost operand.
        first: Box<Self>,
        /// Operator/operand pairs applied left to right.
        rest: Vec<(CompareOp, Self)>,
    },
    /// Subscript (`target[index]`).
    Subscript {
        /// Container.
        target: Box<Self>,
        /// Key or index.
        index: Box<Self>,
    },
    /// Attribute read (`target.name`).
    Attribute {
        /// Receiver.
        target: Box<Self>,
        /// Attribute name.
        name: String,
    },
    /// Whitelisted free function call.
    Call {
        /// Function name.
        function: String,
        /// Arguments.
        args: Vec<Self>,
    },
    /// Whitelisted method call.
    MethodCall {
        /// Receiver.
        target: Box<Self>,
        /// Method name.
        method: String,
        /// Arguments.
        args: Vec<Self>,
    },
}
