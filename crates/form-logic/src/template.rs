// crates/form-logic/src/template.rs
// ============================================================================
// Module: Label Templates
// Description: Literal text with `{expr}` interpolation points.
// Purpose: Compile label and hint text into static strings or `concat` calls.
// Dependencies: crate::ast, crate::parser
// ============================================================================

//! ## Overview
//! Labels and hints may embed expressions: `Hello, {/data/name}!`. Braces are
//! escaped by doubling them (`{{`, `}}`). A template without interpolation
//! stays static text; otherwise [`Template::into_expr`] yields the equivalent
//! `concat(...)` expression so the engine can treat it like any binding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::ast::Expr;
use crate::ast::PathRef;
use crate::parser::ParseError;
use crate::parser::ParseLimits;
use crate::parser::parse_expression_with_limits;
use crate::value::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One piece of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text with escapes already resolved.
    Text(String),
    /// Interpolated expression.
    Expr(Expr<PathRef>),
}

/// Parsed label or hint template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    /// Parts in source order; adjacent text parts are merged.
    pub parts: Vec<TemplatePart>,
}

impl Template {
    /// Returns true when the template has no interpolation points.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|part| matches!(part, TemplatePart::Text(_)))
    }

    /// Returns the literal text of a static template.
    #[must_use]
    pub fn static_text(&self) -> Option<String> {
        if !self.is_static() {
            return None;
        }
        Some(
            self.parts
                .iter()
                .filter_map(|part| match part {
                    TemplatePart::Text(text) => Some(text.as_str()),
                    TemplatePart::Expr(_) => None,
                })
                .collect(),
        )
    }

    /// Converts the template into a single expression.
    ///
    /// Static templates become a text literal; everything else becomes a
    /// `concat` call over the parts.
    #[must_use]
    pub fn into_expr(self) -> Expr<PathRef> {
        if let Some(text) = self.static_text() {
            return Expr::Literal(Value::Text(text));
        }
        Expr::call(
            "concat",
            self.parts.into_iter().map(|part| match part {
                TemplatePart::Text(text) => Expr::Literal(Value::Text(text)),
                TemplatePart::Expr(expr) => expr,
            }),
        )
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a template under explicit expression limits.
///
/// # Errors
/// Returns [`ParseError::UnterminatedInterpolation`] for an unclosed `{`,
/// [`ParseError::UnexpectedToken`] for a stray `}`, or any error raised while
/// parsing an interpolated expression (positions relative to the template).
pub fn parse_template(input: &str, limits: ParseLimits) -> Result<Template, ParseError> {
    if input.len() > limits.max_input_bytes {
        return Err(ParseError::InputTooLarge {
            max_bytes: limits.max_input_bytes,
            actual_bytes: input.len(),
        });
    }
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let start = position + 1;
                let end = find_closing_brace(input, start).ok_or(
                    ParseError::UnterminatedInterpolation {
                        position,
                    },
                )?;
                let source = &input[start .. end];
                let expr = parse_expression_with_limits(source, limits)
                    .map_err(|err| err.offset_by(start))?;
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                parts.push(TemplatePart::Expr(expr));
                while chars.peek().is_some_and(|(offset, _)| *offset <= end) {
                    chars.next();
                }
            }
            '}' => {
                return Err(ParseError::UnexpectedToken {
                    expected: "`}}` escape",
                    found: "}".to_string(),
                    position,
                });
            }
            other => text.push(other),
        }
    }
    if !text.is_empty() {
        parts.push(TemplatePart::Text(text));
    }
    Ok(Template {
        parts,
    })
}

/// Finds the `}` closing an interpolation, skipping quoted strings.
fn find_closing_brace(input: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, ch) in input[start ..].char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '}') => return Some(start + offset),
            (None, _) => {}
        }
    }
    None
}
