// crates/form-logic/src/eval.rs
// ============================================================================
// Module: Expression Evaluator
// Description: Deterministic evaluation of expression trees.
// Purpose: Evaluate `Expr<R>` against a caller-supplied reference context.
// Dependencies: crate::ast, crate::value
// ============================================================================

//! ## Overview
//! Evaluation is pure: references are resolved through [`ReferenceEval`],
//! which borrows whatever context the domain needs (a data tree, a choice
//! item, a plain map). Coercions never fail; only unknown functions, wrong
//! argument counts, and explicit conversions that cannot succeed produce an
//! [`EvalError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::PathRef;
use crate::ast::UnaryOp;
use crate::value::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runtime evaluation failures.
///
/// # Invariants
/// - Errors are non-fatal for the engine; the caller keeps its previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Function name is not part of the language.
    UnknownFunction {
        /// Function name as written.
        name: String,
    },
    /// Function called with the wrong number of arguments.
    Arity {
        /// Function name.
        function: &'static str,
        /// Accepted argument counts, for messages.
        expected: &'static str,
        /// Argument count supplied.
        found: usize,
    },
    /// An explicit conversion could not produce the requested type.
    TypeMismatch {
        /// Function or operation that failed.
        function: &'static str,
        /// Requested type.
        expected: &'static str,
        /// Rendered offending value.
        found: String,
    },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFunction {
                name,
            } => write!(f, "unknown function `{name}`"),
            Self::Arity {
                function,
                expected,
                found,
            } => write!(f, "`{function}` expects {expected} arguments, got {found}"),
            Self::TypeMismatch {
                function,
                expected,
                found,
            } => write!(f, "`{function}` expects {expected}, got `{found}`"),
        }
    }
}

impl std::error::Error for EvalError {}

// ============================================================================
// SECTION: Reference Resolution
// ============================================================================

/// Resolves a reference to its current value.
///
/// The generic associated type lets each reference type borrow its own
/// context without forcing a shared trait object.
pub trait ReferenceEval {
    /// Context borrowed during evaluation.
    type Context<'a>;

    /// Returns the current value behind this reference.
    fn resolve(&self, context: &Self::Context<'_>) -> Value;
}

/// Path references resolve through a map keyed by their rendered form.
///
/// Missing paths resolve to [`Value::Empty`].
impl ReferenceEval for PathRef {
    type Context<'a> = BTreeMap<String, Value>;

    fn resolve(&self, context: &Self::Context<'_>) -> Value {
        context.get(&self.to_string()).cloned().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

impl<R: ReferenceEval> Expr<R> {
    /// Evaluates the expression against `context`.
    ///
    /// # Errors
    /// Returns [`EvalError`] for unknown functions, arity mismatches, or failed
    /// explicit conversions.
    pub fn evaluate(&self, context: &R::Context<'_>) -> Result<Value, EvalError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Reference(reference) => Ok(reference.resolve(context)),
            Self::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(Value::Number(-operand.evaluate(context)?.to_number())),
            Self::Binary {
                op,
                lhs,
                rhs,
            } => evaluate_binary(*op, lhs, rhs, context),
            Self::Call {
                name,
                args,
            } => evaluate_call(name, args, context),
        }
    }
}

/// Evaluates an infix operation.
fn evaluate_binary<R: ReferenceEval>(
    op: BinaryOp,
    lhs: &Expr<R>,
    rhs: &Expr<R>,
    context: &R::Context<'_>,
) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Or => {
            if lhs.evaluate(context)?.to_boolean() {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(rhs.evaluate(context)?.to_boolean()))
        }
        BinaryOp::And => {
            if !lhs.evaluate(context)?.to_boolean() {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(rhs.evaluate(context)?.to_boolean()))
        }
        _ => {
            let left = lhs.evaluate(context)?;
            let right = rhs.evaluate(context)?;
            Ok(apply_binary(op, &left, &right))
        }
    }
}

/// Applies a non-short-circuit operator to evaluated operands.
fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering;

    let ordering = || left.loose_cmp(right);
    match op {
        BinaryOp::Eq => Value::Boolean(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Boolean(!left.loose_eq(right)),
        BinaryOp::Lt => Value::Boolean(ordering() == Some(Ordering::Less)),
        BinaryOp::Le => {
            Value::Boolean(matches!(ordering(), Some(Ordering::Less | Ordering::Equal)))
        }
        BinaryOp::Gt => Value::Boolean(ordering() == Some(Ordering::Greater)),
        BinaryOp::Ge => {
            Value::Boolean(matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)))
        }
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Or => Value::Boolean(left.to_boolean() || right.to_boolean()),
        BinaryOp::And => Value::Boolean(left.to_boolean() && right.to_boolean()),
    }
}

/// Evaluates a function call.
fn evaluate_call<R: ReferenceEval>(
    name: &str,
    args: &[Expr<R>],
    context: &R::Context<'_>,
) -> Result<Value, EvalError> {
    // `if` evaluates only the branch it takes.
    if name == "if" {
        let [condition, then, otherwise] = args else {
            return Err(arity("if", "3", args.len()));
        };
        return if condition.evaluate(context)?.to_boolean() {
            then.evaluate(context)
        } else {
            otherwise.evaluate(context)
        };
    }
    let Some(function) = crate::functions::lookup(name) else {
        return Err(EvalError::UnknownFunction {
            name: name.to_string(),
        });
    };
    let values = args.iter().map(|arg| arg.evaluate(context)).collect::<Result<Vec<_>, _>>()?;
    function(&values)
}

/// Builds an arity error.
pub(crate) const fn arity(function: &'static str, expected: &'static str, found: usize) -> EvalError {
    EvalError::Arity {
        function,
        expected,
        found,
    }
}
