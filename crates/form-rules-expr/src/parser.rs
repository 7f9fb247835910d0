// crates/form-rules-expr/src/parser.rs
// ============================================================================
// Module: Condition Parser
// Description: Lexer and recursive-descent parser for rule conditions.
// Purpose: Turn configuration condition strings into a restricted syntax tree.
// Dependencies: crate::{ast, error, value}
// ============================================================================

//! ## Overview
//!
//! Conditions use a small expression syntax familiar to form authors:
//!
//! - **Literals**: `42`, `1.5`, `'text'`, `"text"`, `True`, `False`, `None`,
//!   `[1, 2, 3]`
//! - **Boolean operators**: `and`, `or`, `not` (also `&&`, `||`, `!`)
//! - **Comparisons**: `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `not in`,
//!   `is`, `is not`; comparisons chain (`0 < value <= 10`)
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `%`, unary `-`
//! - **Access**: `cleaned_data['email']`, `items[0]`, `data.key`
//! - **Calls**: `len(value)`, `value.endswith('@example.com')`,
//!   `timezone.now()`
//!
//! Input size and nesting depth are bounded so a hostile or broken
//! configuration cannot exhaust the stack.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::ast::BinaryOp;
use crate::ast::BoolOp;
use crate::ast::CompareOp;
use crate::ast::Expr;
use crate::ast::UnaryOp;
use crate::error::ExprError;
use crate::value::Value;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed condition size in bytes.
pub const MAX_EXPRESSION_BYTES: usize = 16 * 1024;
/// Maximum supported nesting depth (groups, calls, unary and chained operators).
pub const MAX_EXPRESSION_NESTING: usize = 64;

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parses a condition into a syntax tree.
///
/// # Errors
///
/// Returns [`ExprError`] for empty or oversized input, lexical errors,
/// unexpected tokens, excessive nesting, or trailing input.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    if input.len() > MAX_EXPRESSION_BYTES {
        return Err(ExprError::InputTooLarge {
            max_bytes: MAX_EXPRESSION_BYTES,
            actual_bytes: input.len(),
        });
    }
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token produced from the condition input.
#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    /// Identifier.
    Ident(&'a str),
    /// Integer literal text.
    Int(&'a str),
    /// Float literal text.
    Float(&'a str),
    /// Unescaped string literal.
    Str(String),
    /// `and` / `&&`
    And,
    /// `or` / `||`
    Or,
    /// `not` / `!`
    Not,
    /// `in`
    In,
    /// `is`
    Is,
    /// `True` / `true`
    True,
    /// `False` / `false`
    False,
    /// `None` / `null`
    None,
    /// `==`
    EqEq,
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
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer for condition strings.
struct Lexer<'a> {
    /// Source input being tokenized.
    input: &'a str,
    /// Current byte offset into the input.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the input into a sequence of tokens.
    fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, ExprError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while let Some(&ch) = bytes.get(self.offset) {
            let start = self.offset;
            let token = match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                    continue;
                }
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'[' => self.single(Token::LBracket),
                b']' => self.single(Token::RBracket),
                b',' => self.single(Token::Comma),
                b'.' => self.single(Token::Dot),
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'*' => self.single(Token::Star),
                b'/' => self.single(Token::Slash),
                b'%' => self.single(Token::Percent),
                b'=' => self.paired(bytes, b'=', Token::EqEq, "==")?,
                b'&' => self.paired(bytes, b'&', Token::And, "&&")?,
                b'|' => self.paired(bytes, b'|', Token::Or, "||")?,
                b'!' => self.either(bytes, Token::NotEq, Token::Not),
                b'<' => self.either(bytes, Token::LtE, Token::Lt),
                b'>' => self.either(bytes, Token::GtE, Token::Gt),
                b'\'' | b'"' => self.string(bytes, ch)?,
                b'0' ..= b'9' => self.number(bytes),
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' => {
                    self.consume_while(bytes, |b| b.is_ascii_alphanumeric() || b == b'_');
                    Self::keyword_or_ident(&self.input[start .. self.offset])
                }
                _ => {
                    let found = self.input[start ..].chars().next().map_or_else(
                        || char::from(ch).to_string(),
                        |c| c.to_string(),
                    );
                    return Err(ExprError::UnexpectedToken {
                        expected: "identifier, literal, or operator",
                        found,
                        position: start,
                    });
                }
            };
            tokens.push(SpannedToken {
                token,
                position: start,
            });
        }

        if tokens.is_empty() {
            return Err(ExprError::EmptyInput);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Consumes one byte and yields `token`.
    fn single(&mut self, token: Token<'a>) -> Token<'a> {
        self.offset += 1;
        token
    }

    /// Consumes a two-byte operator whose second byte must be `second`.
    fn paired(
        &mut self,
        bytes: &[u8],
        second: u8,
        token: Token<'a>,
        expected: &'static str,
    ) -> Result<Token<'a>, ExprError> {
        if bytes.get(self.offset + 1) == Some(&second) {
            self.offset += 2;
            Ok(token)
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: char::from(bytes[self.offset]).to_string(),
                position: self.offset,
            })
        }
    }

    /// Consumes `X=` as `with_eq` or a lone `X` as `alone`.
    fn either(&mut self, bytes: &[u8], with_eq: Token<'a>, alone: Token<'a>) -> Token<'a> {
        if bytes.get(self.offset + 1) == Some(&b'=') {
            self.offset += 2;
            with_eq
        } else {
            self.offset += 1;
            alone
        }
    }

    /// Lexes an integer or decimal literal.
    fn number(&mut self, bytes: &[u8]) -> Token<'a> {
        let start = self.offset;
        self.consume_while(bytes, |b| b.is_ascii_digit());
        let is_fraction = bytes.get(self.offset) == Some(&b'.')
            && bytes.get(self.offset + 1).is_some_and(u8::is_ascii_digit);
        if is_fraction {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
            Token::Float(&self.input[start .. self.offset])
        } else {
            Token::Int(&self.input[start .. self.offset])
        }
    }

    /// Lexes a quoted string literal, resolving escapes.
    fn string(&mut self, bytes: &[u8], quote: u8) -> Result<Token<'a>, ExprError> {
        let start = self.offset;
        self.offset += 1;
        let mut text = String::new();
        let mut segment = self.offset;
        loop {
            let Some(&byte) = bytes.get(self.offset) else {
                return Err(ExprError::UnterminatedString {
                    position: start,
                });
            };
            if byte == quote {
                text.push_str(&self.input[segment .. self.offset]);
                self.offset += 1;
                return Ok(Token::Str(text));
            }
            if byte == b'\\' {
                text.push_str(&self.input[segment .. self.offset]);
                let Some(&escaped) = bytes.get(self.offset + 1) else {
                    return Err(ExprError::UnterminatedString {
                        position: start,
                    });
                };
                match escaped {
                    b'n' => text.push('\n'),
                    b't' => text.push('\t'),
                    b'\\' | b'\'' | b'"' => text.push(char::from(escaped)),
                    _ => {
                        text.push('\\');
                        self.offset += 1;
                        segment = self.offset;
                        continue;
                    }
                }
                self.offset += 2;
                segment = self.offset;
                continue;
            }
            self.offset += 1;
        }
    }

    /// Advances while the condition matches the current byte.
    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }

    /// Maps a slice to a keyword token or identifier token.
    fn keyword_or_ident(slice: &'a str) -> Token<'a> {
        match slice {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "True" | "true" => Token::True,
            "False" | "false" => Token::False,
            "None" | "null" => Token::None,
            _ => Token::Ident(slice),
        }
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over the token stream.
struct Parser<'input> {
    /// Token stream with source positions; always ends with `Eof`.
    tokens: Vec<SpannedToken<'input>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth.
    nesting: usize,
}

impl<'input> Parser<'input> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'input>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses a full expression.
    fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    /// Parses OR chains.
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut operands = vec![self.parse_and()?];
        while self.matches(&Token::Or) {
            operands.push(self.parse_and()?);
        }
        Ok(Self::bool_chain(BoolOp::Or, operands))
    }

    /// Parses AND chains.
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut operands = vec![self.parse_not()?];
        while self.matches(&Token::And) {
            operands.push(self.parse_not()?);
        }
        Ok(Self::bool_chain(BoolOp::And, operands))
    }

    /// Collapses single-operand chains.
    fn bool_chain(op: BoolOp, mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Bool {
                op,
                operands,
            }
        }
    }

    /// Parses boolean negation.
    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        let position = self.current().position;
        if self.matches(&Token::Not) {
            let operand = self.with_nesting(position, Self::parse_not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// Parses a comparison chain.
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_operator() {
            rest.push((op, self.parse_arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    /// Consumes a comparison operator if one is next.
    fn comparison_operator(&mut self) -> Option<CompareOp> {
        let op = match self.current().token {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::LtE => CompareOp::LtE,
            Token::Gt => CompareOp::Gt,
            Token::GtE => CompareOp::GtE,
            Token::In => CompareOp::In,
            Token::Is => {
                self.advance();
                return Some(if self.matches(&Token::Not) {
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                });
            }
            Token::Not if self.peek_is(&Token::In) => {
                self.advance();
                CompareOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Parses additive arithmetic.
    fn parse_arith(&mut self) -> Result<Expr, ExprError> {
        let base = self.nesting;
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            let position = self.current().position;
            self.advance();
            self.descend(position)?;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.nesting = base;
        Ok(left)
    }

    /// Parses multiplicative arithmetic.
    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let base = self.nesting;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            let position = self.current().position;
            self.advance();
            self.descend(position)?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.nesting = base;
        Ok(left)
    }

    /// Parses unary plus and minus.
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let position = self.current().position;
        if self.matches(&Token::Minus) {
            let operand = self.with_nesting(position, Self::parse_unary)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.matches(&Token::Plus) {
            return self.with_nesting(position, Self::parse_unary);
        }
        self.parse_postfix()
    }

    /// Parses subscripts, attributes, and method calls.
    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let base = self.nesting;
        let mut expr = self.parse_primary()?;
        loop {
            let position = self.current().position;
            if matches!(self.current().token, Token::LBracket | Token::Dot) {
                self.descend(position)?;
            }
            if self.matches(&Token::LBracket) {
                let index = self.with_nesting(position, |parser| {
                    let index = parser.parse_expression()?;
                    parser.expect(&Token::RBracket, "`]`")?;
                    Ok(index)
                })?;
                expr = Expr::Subscript {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.matches(&Token::Dot) {
                let name = self.expect_ident("attribute or method name")?;
                if self.matches(&Token::LParen) {
                    let args = self.with_nesting(position, Self::parse_arguments)?;
                    expr = Expr::MethodCall {
                        target: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Attribute {
                        target: Box::new(expr),
                        name,
                    };
                }
            } else {
                self.nesting = base;
                return Ok(expr);
            }
        }
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Int(raw) => {
                self.advance();
                raw.parse::<i64>().map(|value| Expr::Literal(Value::Int(value))).map_err(|_| {
                    ExprError::InvalidNumber {
                        raw: raw.to_string(),
                        position,
                    }
                })
            }
            Token::Float(raw) => {
                self.advance();
                raw.parse::<f64>().map(|value| Expr::Literal(Value::Float(value))).map_err(|_| {
                    ExprError::InvalidNumber {
                        raw: raw.to_string(),
                        position,
                    }
                })
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(text)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::None => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Ident(name) => {
                self.advance();
                if self.matches(&Token::LParen) {
                    let args = self.with_nesting(position, Self::parse_arguments)?;
                    Ok(Expr::Call {
                        function: name.to_string(),
                        args,
                    })
                } else {
                    Ok(Expr::Name(name.to_string()))
                }
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_expression()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            Token::LBracket => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let items = parser.parse_sequence(&Token::RBracket, "`]` after list items")?;
                    Ok(Expr::List(items))
                })
            }
            _ => Err(ExprError::UnexpectedToken {
                expected: "literal, name, or expression",
                found: self.describe_current(),
                position,
            }),
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        self.parse_sequence(&Token::RParen, "`)` after arguments")
    }

    /// Parses a comma-separated sequence terminated by `close`.
    fn parse_sequence(
        &mut self,
        close: &Token<'_>,
        expected: &'static str,
    ) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.matches(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.matches(&Token::Comma) {
                if self.matches(close) {
                    break;
                }
                continue;
            }
            self.expect(close, expected)?;
            break;
        }
        Ok(items)
    }

    /// Deepens the current nesting level; the caller restores it.
    fn descend(&mut self, position: usize) -> Result<(), ExprError> {
        if self.nesting + 1 > MAX_EXPRESSION_NESTING {
            return Err(ExprError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_NESTING,
                position,
            });
        }
        self.nesting += 1;
        Ok(())
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPRESSION_NESTING {
            return Err(ExprError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_NESTING,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes an identifier token.
    fn expect_ident(&mut self, expected: &'static str) -> Result<String, ExprError> {
        if let Token::Ident(name) = self.current().token {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), ExprError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), ExprError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(ExprError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the token if it matches the expected kind.
    fn matches(&mut self, kind: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns true when the token after the current one has the given kind.
    fn peek_is(&self, kind: &Token<'_>) -> bool {
        self.tokens
            .get(self.index + 1)
            .is_some_and(|next| std::mem::discriminant(&next.token) == std::mem::discriminant(kind))
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'input> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    /// Advances to the next token.
    const fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    /// Formats the current token for diagnostics.
    fn describe_current(&self) -> String {
        let text = match &self.current().token {
            Token::Ident(raw) | Token::Int(raw) | Token::Float(raw) => return (*raw).to_string(),
            Token::Str(text) => return format!("'{text}'"),
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::In => "in",
            Token::Is => "is",
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtE => "<=",
            Token::Gt => ">",
            Token::GtE => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Eof => "end of input",
        };
        text.to_string()
    }
}
