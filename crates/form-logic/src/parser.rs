// crates/form-logic/src/parser.rs
// ============================================================================
// Module: Expression Parser
// Description: Lexer and recursive-descent parser for form expressions.
// Purpose: Turn XPath-flavoured expression text into `Expr<PathRef>` trees
//          with positioned, bounded error reporting.
// Dependencies: crate::ast, crate::value
// ============================================================================

//! ## Overview
//!
//! Form expressions are author-supplied text attached to bindings. The parser
//! enforces an input size limit and a nesting limit before building the tree,
//! and every error carries the byte offset where it was detected.
//!
//! ### Grammar (informal)
//! - **Literals**: `12`, `1.5`, `'text'`, `"text"`
//! - **Paths**: `/data/group/field`, `/data/rep[2]/field`, `.`, `..`,
//!   `../sibling`, `name`
//! - **Operators** (loosest first): `or`; `and`; `=` `!=`; `<` `<=` `>` `>=`;
//!   `+` `-`; `*` `div` `mod`; unary `-`
//! - **Calls**: `name(arg, ...)`; names are not checked here
//!
//! ### Example
//!
//! ```
//! use form_logic::parser::parse_expression;
//!
//! let expr = parse_expression("if(../age >= 18, 'adult', 'minor')").unwrap();
//! assert_eq!(expr.references().len(), 1);
//! ```

use std::fmt;

use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::PathAnchor;
use crate::ast::PathRef;
use crate::ast::PathStep;
use crate::ast::Steps;
use crate::ast::UnaryOp;
use crate::value::Value;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum expression input size in bytes.
pub const DEFAULT_MAX_EXPRESSION_BYTES: usize = 64 * 1024;
/// Default maximum nesting depth for parenthesised, call, and unary forms.
pub const DEFAULT_MAX_EXPRESSION_NESTING: usize = 32;

/// Parser limits applied to untrusted expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum input size in bytes.
    pub max_input_bytes: usize,
    /// Maximum nesting depth.
    pub max_nesting: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_EXPRESSION_BYTES,
            max_nesting: DEFAULT_MAX_EXPRESSION_NESTING,
        }
    }
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Errors that can occur while parsing an expression or template.
///
/// # Invariants
/// - Positions are byte offsets into the text handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
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
        /// Depth reached when the error occurred.
        actual_depth: usize,
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
    /// A quoted string literal was not closed.
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// A template interpolation `{` was not closed.
    UnterminatedInterpolation {
        /// Byte offset of the opening brace.
        position: usize,
    },
    /// Numeric literal or index failed to parse.
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
}

impl ParseError {
    /// Shifts every position by `offset` bytes.
    ///
    /// Used when an expression is parsed out of a larger template.
    #[must_use]
    pub fn offset_by(self, offset: usize) -> Self {
        match self {
            Self::NestingTooDeep {
                max_depth,
                actual_depth,
                position,
            } => Self::NestingTooDeep {
                max_depth,
                actual_depth,
                position: position + offset,
            },
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => Self::UnexpectedToken {
                expected,
                found,
                position: position + offset,
            },
            Self::UnterminatedString {
                position,
            } => Self::UnterminatedString {
                position: position + offset,
            },
            Self::UnterminatedInterpolation {
                position,
            } => Self::UnterminatedInterpolation {
                position: position + offset,
            },
            Self::InvalidNumber {
                raw,
                position,
            } => Self::InvalidNumber {
                raw,
                position: position + offset,
            },
            Self::TrailingInput {
                position,
            } => Self::TrailingInput {
                position: position + offset,
            },
            other @ (Self::EmptyInput | Self::InputTooLarge { .. }) => other,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "expression is empty"),
            Self::InputTooLarge {
                max_bytes,
                actual_bytes,
            } => {
                write!(f, "expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})")
            }
            Self::NestingTooDeep {
                max_depth,
                actual_depth,
                position,
            } => write!(
                f,
                "expression nesting exceeds limit: depth {actual_depth} (max {max_depth}) at \
                 {position}"
            ),
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
            Self::UnterminatedInterpolation {
                position,
            } => write!(f, "unterminated `{{` interpolation starting at {position}"),
            Self::InvalidNumber {
                raw,
                position,
            } => {
                write!(f, "invalid number `{raw}` at {position}")
            }
            Self::TrailingInput {
                position,
            } => {
                write!(f, "unexpected trailing input at {position}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses an expression with the default limits.
///
/// # Errors
/// Returns [`ParseError`] for syntax issues, limit violations, invalid numbers,
/// or trailing input.
pub fn parse_expression(input: &str) -> Result<Expr<PathRef>, ParseError> {
    parse_expression_with_limits(input, ParseLimits::default())
}

/// Parses an expression under explicit limits.
///
/// # Errors
/// Returns [`ParseError`] for syntax issues, limit violations, invalid numbers,
/// or trailing input.
pub fn parse_expression_with_limits(
    input: &str,
    limits: ParseLimits,
) -> Result<Expr<PathRef>, ParseError> {
    if input.len() > limits.max_input_bytes {
        return Err(ParseError::InputTooLarge {
            max_bytes: limits.max_input_bytes,
            actual_bytes: input.len(),
        });
    }
    let mut lexer = Lexer::new(input);
    let tokens = lexer.lex()?;

    let mut parser = Parser::new(tokens, limits.max_nesting);
    let expr = parser.parse_expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token produced from expression input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Name token (element names, function names, word operators).
    Name(&'a str),
    /// Numeric literal token.
    Number(&'a str),
    /// String literal contents without quotes.
    Str(&'a str),
    /// `/`
    Slash,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, Copy)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer for form expressions.
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
    fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, ParseError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while self.offset < bytes.len() {
            let ch = bytes[self.offset];
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                }
                b'(' => self.single(&mut tokens, Token::LParen),
                b')' => self.single(&mut tokens, Token::RParen),
                b'[' => self.single(&mut tokens, Token::LBracket),
                b']' => self.single(&mut tokens, Token::RBracket),
                b',' => self.single(&mut tokens, Token::Comma),
                b'+' => self.single(&mut tokens, Token::Plus),
                b'-' => self.single(&mut tokens, Token::Minus),
                b'*' => self.single(&mut tokens, Token::Star),
                b'/' => self.single(&mut tokens, Token::Slash),
                b'=' => self.single(&mut tokens, Token::Eq),
                b'!' => {
                    if self.peek_char(bytes) == Some(b'=') {
                        tokens.push(self.simple(Token::NotEq));
                        self.offset += 2;
                    } else {
                        return Err(ParseError::UnexpectedToken {
                            expected: "!=",
                            found: "!".to_string(),
                            position: self.offset,
                        });
                    }
                }
                b'<' => self.with_optional_eq(&mut tokens, bytes, Token::Lt, Token::Le),
                b'>' => self.with_optional_eq(&mut tokens, bytes, Token::Gt, Token::Ge),
                b'.' => match self.peek_char(bytes) {
                    Some(b'.') => {
                        tokens.push(self.simple(Token::DotDot));
                        self.offset += 2;
                    }
                    Some(b'0' ..= b'9') => tokens.push(self.number(bytes)),
                    _ => self.single(&mut tokens, Token::Dot),
                },
                b'\'' | b'"' => tokens.push(self.string(bytes, ch)?),
                b'0' ..= b'9' => tokens.push(self.number(bytes)),
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' => {
                    let start = self.offset;
                    self.consume_while(bytes, |b| {
                        b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
                    });
                    tokens.push(SpannedToken {
                        token: Token::Name(&self.input[start .. self.offset]),
                        position: start,
                    });
                }
                _ => {
                    let found = self.input[self.offset ..].chars().next().unwrap_or('?');
                    return Err(ParseError::UnexpectedToken {
                        expected: "name, literal, or operator",
                        found: found.to_string(),
                        position: self.offset,
                    });
                }
            }
        }

        if tokens.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Pushes a one-byte token and advances past it.
    fn single(&mut self, tokens: &mut Vec<SpannedToken<'a>>, token: Token<'a>) {
        tokens.push(self.simple(token));
        self.offset += 1;
    }

    /// Pushes `short` or, when followed by `=`, `long`.
    fn with_optional_eq(
        &mut self,
        tokens: &mut Vec<SpannedToken<'a>>,
        bytes: &[u8],
        short: Token<'a>,
        long: Token<'a>,
    ) {
        if self.peek_char(bytes) == Some(b'=') {
            tokens.push(self.simple(long));
            self.offset += 2;
        } else {
            self.single(tokens, short);
        }
    }

    /// Lexes a numeric literal (`12`, `1.5`, `.5`).
    fn number(&mut self, bytes: &[u8]) -> SpannedToken<'a> {
        let start = self.offset;
        self.consume_while(bytes, |b| b.is_ascii_digit());
        if bytes.get(self.offset) == Some(&b'.')
            && bytes.get(self.offset + 1).is_some_and(u8::is_ascii_digit)
        {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
        } else if start == self.offset && bytes.get(self.offset) == Some(&b'.') {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
        }
        SpannedToken {
            token: Token::Number(&self.input[start .. self.offset]),
            position: start,
        }
    }

    /// Lexes a quoted string literal.
    fn string(&mut self, bytes: &[u8], quote: u8) -> Result<SpannedToken<'a>, ParseError> {
        let start = self.offset;
        self.offset += 1;
        self.consume_while(bytes, |b| b != quote);
        if self.offset >= bytes.len() {
            return Err(ParseError::UnterminatedString {
                position: start,
            });
        }
        let contents = &self.input[start + 1 .. self.offset];
        self.offset += 1;
        Ok(SpannedToken {
            token: Token::Str(contents),
            position: start,
        })
    }

    /// Builds a token at the current offset.
    const fn simple(&self, token: Token<'a>) -> SpannedToken<'a> {
        SpannedToken {
            token,
            position: self.offset,
        }
    }

    /// Returns the next byte without advancing.
    fn peek_char(&self, bytes: &[u8]) -> Option<u8> {
        bytes.get(self.offset + 1).copied()
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
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser for form expressions.
struct Parser<'input> {
    /// Token stream with source positions.
    tokens: Vec<SpannedToken<'input>>,
    /// Current token index.
    index: usize,
    /// Current nesting depth.
    nesting: usize,
    /// Maximum nesting depth.
    max_nesting: usize,
}

impl<'input> Parser<'input> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'input>>, max_nesting: usize) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
            max_nesting,
        }
    }

    /// Parses a full expression.
    fn parse_expression(&mut self) -> Result<Expr<PathRef>, ParseError> {
        self.parse_or()
    }

    /// Parses `or` chains.
    fn parse_or(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.matches_word("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses `and` chains.
    fn parse_and(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.matches_word("and") {
            let rhs = self.parse_equality()?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses `=` and `!=` chains.
    fn parse_equality(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.matches(Token::Eq) {
                BinaryOp::Eq
            } else if self.matches(Token::NotEq) {
                BinaryOp::NotEq
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses relational chains.
    fn parse_relational(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current().token {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses `+` and `-` chains.
    fn parse_additive(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.matches(Token::Plus) {
                BinaryOp::Add
            } else if self.matches(Token::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses `*`, `div`, and `mod` chains.
    fn parse_multiplicative(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.matches(Token::Star) {
                BinaryOp::Mul
            } else if self.matches_word("div") {
                BinaryOp::Div
            } else if self.matches_word("mod") {
                BinaryOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Parses unary minus.
    fn parse_unary(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let position = self.current().position;
        if self.matches(Token::Minus) {
            return self.with_nesting(position, |parser| {
                let operand = parser.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            });
        }
        self.parse_primary()
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr<PathRef>, ParseError> {
        let SpannedToken {
            token,
            position,
        } = *self.current();
        match token {
            Token::Number(raw) => {
                self.advance();
                let number: f64 = raw.parse().map_err(|_| ParseError::InvalidNumber {
                    raw: raw.to_string(),
                    position,
                })?;
                Ok(Expr::Literal(Value::Number(number)))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Value::text(text)))
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_expression()?;
                    parser.expect(Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            Token::Name(name) if matches!(self.peek().token, Token::LParen) => {
                self.advance();
                self.advance();
                self.with_nesting(position, |parser| {
                    let args = parser.parse_argument_list()?;
                    Ok(Expr::call(name, args))
                })
            }
            Token::Slash => {
                self.advance();
                self.parse_path(PathAnchor::Absolute, position)
            }
            Token::Name(_) | Token::Dot | Token::DotDot => {
                self.parse_path(
                    PathAnchor::Relative {
                        up: 0,
                    },
                    position,
                )
            }
            Token::LBracket
            | Token::RBracket
            | Token::RParen
            | Token::Comma
            | Token::Plus
            | Token::Minus
            | Token::Star
            | Token::Eq
            | Token::NotEq
            | Token::Lt
            | Token::Le
            | Token::Gt
            | Token::Ge
            | Token::Eof => Err(ParseError::UnexpectedToken {
                expected: "literal, path, function call, or `(`",
                found: self.describe_current(),
                position,
            }),
        }
    }

    /// Parses path steps after the anchor has been consumed.
    fn parse_path(
        &mut self,
        anchor: PathAnchor,
        start: usize,
    ) -> Result<Expr<PathRef>, ParseError> {
        let mut up = 0usize;
        let mut steps = Steps::new();
        loop {
            let SpannedToken {
                token,
                position,
            } = *self.current();
            match token {
                Token::Dot => self.advance(),
                Token::DotDot => {
                    self.advance();
                    if steps.pop().is_none() {
                        if anchor == PathAnchor::Absolute {
                            return Err(ParseError::UnexpectedToken {
                                expected: "element name",
                                found: "..".to_string(),
                                position,
                            });
                        }
                        up += 1;
                    }
                }
                Token::Name(name) => {
                    self.advance();
                    let index = self.parse_index()?;
                    steps.push(PathStep {
                        name: name.to_string(),
                        index,
                    });
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "path step",
                        found: self.describe_current(),
                        position,
                    });
                }
            }
            if !self.matches(Token::Slash) {
                break;
            }
        }
        if anchor == PathAnchor::Absolute && steps.is_empty() {
            return Err(ParseError::UnexpectedToken {
                expected: "element name after `/`",
                found: self.describe_current(),
                position: start,
            });
        }
        let anchor = match anchor {
            PathAnchor::Absolute => PathAnchor::Absolute,
            PathAnchor::Relative {
                ..
            } => PathAnchor::Relative {
                up,
            },
        };
        Ok(Expr::Reference(PathRef {
            anchor,
            steps,
        }))
    }

    /// Parses an optional `[n]` instance predicate.
    fn parse_index(&mut self) -> Result<Option<u32>, ParseError> {
        if !self.matches(Token::LBracket) {
            return Ok(None);
        }
        let SpannedToken {
            token,
            position,
        } = *self.current();
        let Token::Number(raw) = token else {
            return Err(ParseError::UnexpectedToken {
                expected: "integer index",
                found: self.describe_current(),
                position,
            });
        };
        self.advance();
        let index: u32 = raw.parse().map_err(|_| ParseError::InvalidNumber {
            raw: raw.to_string(),
            position,
        })?;
        if index == 0 {
            return Err(ParseError::InvalidNumber {
                raw: raw.to_string(),
                position,
            });
        }
        self.expect(Token::RBracket, "`]`")?;
        Ok(Some(index))
    }

    /// Parses a comma-separated argument list after `(`.
    fn parse_argument_list(&mut self) -> Result<Vec<Expr<PathRef>>, ParseError> {
        let mut args = Vec::new();
        if self.matches(Token::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            if self.matches(Token::Comma) {
                continue;
            }
            self.expect(Token::RParen, "`)` after arguments")?;
            break;
        }
        Ok(args)
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let next_depth = self.nesting + 1;
        if next_depth > self.max_nesting {
            return Err(ParseError::NestingTooDeep {
                max_depth: self.max_nesting,
                actual_depth: next_depth,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: Token<'_>, expected: &'static str) -> Result<(), ParseError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected,
                found: self.describe_current(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(ParseError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the token if it matches the expected kind.
    fn matches(&mut self, kind: Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a word operator such as `and` or `div`.
    fn matches_word(&mut self, word: &str) -> bool {
        if self.current().token == Token::Name(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'input> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    /// Returns the token after the current one (or the end marker).
    fn peek(&self) -> &SpannedToken<'input> {
        let next = (self.index + 1).min(self.tokens.len() - 1);
        &self.tokens[next]
    }

    /// Advances to the next token.
    const fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    /// Formats the current token for diagnostics.
    fn describe_current(&self) -> String {
        match &self.current().token {
            Token::Name(text) | Token::Number(text) => (*text).to_string(),
            Token::Str(text) => format!("'{text}'"),
            Token::Slash => "/".to_string(),
            Token::Dot => ".".to_string(),
            Token::DotDot => "..".to_string(),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Eq => "=".to_string(),
            Token::NotEq => "!=".to_string(),
            Token::Lt => "<".to_string(),
            Token::Le => "<=".to_string(),
            Token::Gt => ">".to_string(),
            Token::Ge => ">=".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}
