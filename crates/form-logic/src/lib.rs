// crates/form-logic/src/lib.rs
// ============================================================================
// Module: Form Logic Root
// Description: Public API surface for the form expression language.
// Purpose: Wire together values, the AST, the parser, templates, and the
//          evaluator.
// Dependencies: crate::{ast, eval, functions, parser, template, value}
// ============================================================================

//! ## Overview
//! This crate knows nothing about forms. It provides the value model, an
//! expression tree generic over its reference type, a bounded parser for
//! XPath-flavoured expression text, label templates, and a pure evaluator.
//! Domains plug in by implementing [`ReferenceEval`] for their resolved
//! reference type.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod ast;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod template;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ast::BinaryOp;
pub use ast::Expr;
pub use ast::PathAnchor;
pub use ast::PathRef;
pub use ast::PathStep;
pub use ast::UnaryOp;
pub use eval::EvalError;
pub use eval::ReferenceEval;
pub use functions::FUNCTION_NAMES;
pub use parser::ParseError;
pub use parser::ParseLimits;
pub use parser::parse_expression;
pub use parser::parse_expression_with_limits;
pub use template::Template;
pub use template::TemplatePart;
pub use template::parse_template;
pub use value::Value;
