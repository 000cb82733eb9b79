// crates/form-logic/src/ast.rs
// ============================================================================
// Module: Expression AST
// Description: Immutable expression tree generic over its reference type.
// Purpose: Share one tree shape between parsed paths and resolved node handles.
// Dependencies: crate::value, serde, smallvec
// ============================================================================

//! ## Overview
//! [`Expr<R>`] is produced by the parser with `R = PathRef` and rewritten by
//! the form compiler into an expression over resolved handles through
//! [`Expr::try_map_references`]. The tree is never mutated after compilation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::value::Value;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Numeric negation.
    Neg,
}

/// Infix operators in increasing precedence groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Logical `or` (short-circuit).
    Or,
    /// Logical `and` (short-circuit).
    And,
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
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `div`
    Div,
    /// `mod`
    Mod,
}

impl BinaryOp {
    /// Returns the operator spelling used in source text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }
}

// ============================================================================
// SECTION: Expression
// ============================================================================

/// Argument list storage.
pub type Args<R> = Vec<Expr<R>>;

/// Compiled expression tree.
///
/// # Invariants
/// - Function names are stored as written; unknown names surface at
///   evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr<R> {
    /// Constant value.
    Literal(Value),
    /// Reference to a node or choice attribute.
    Reference(R),
    /// Prefix operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand expression.
        operand: Box<Self>,
    },
    /// Infix operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Self>,
        /// Right operand.
        rhs: Box<Self>,
    },
    /// Function call.
    Call {
        /// Function name as written.
        name: String,
        /// Argument expressions.
        args: Args<R>,
    },
}

impl<R> Expr<R> {
    /// Builds a literal expression.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Builds a binary expression.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Builds a function call.
    #[must_use]
    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::Call {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Returns every reference in left-to-right source order.
    #[must_use]
    pub fn references(&self) -> Vec<&R> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    /// Appends references to `out` in source order.
    fn collect_references<'a>(&'a self, out: &mut Vec<&'a R>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(reference) => out.push(reference),
            Self::Unary {
                operand, ..
            } => operand.collect_references(out),
            Self::Binary {
                lhs,
                rhs,
                ..
            } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Self::Call {
                args, ..
            } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }

    /// Rewrites every reference, failing on the first error.
    ///
    /// # Errors
    /// Returns the first error produced by `map`.
    pub fn try_map_references<S, E, F>(&self, map: &mut F) -> Result<Expr<S>, E>
    where
        F: FnMut(&R) -> Result<S, E>,
    {
        Ok(match self {
            Self::Literal(value) => Expr::Literal(value.clone()),
            Self::Reference(reference) => Expr::Reference(map(reference)?),
            Self::Unary {
                op,
                operand,
            } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.try_map_references(map)?),
            },
            Self::Binary {
                op,
                lhs,
                rhs,
            } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.try_map_references(map)?),
                rhs: Box::new(rhs.try_map_references(map)?),
            },
            Self::Call {
                name,
                args,
            } => {
                let mut mapped = Args::new();
                for arg in args {
                    mapped.push(arg.try_map_references(map)?);
                }
                Expr::Call {
                    name: name.clone(),
                    args: mapped,
                }
            }
        })
    }

    /// Returns true when the expression contains no references.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.references().is_empty()
    }
}

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Where a path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAnchor {
    /// Starts at the document root (`/data/...`).
    Absolute,
    /// Starts at the bound node, climbing `up` parents first.
    Relative {
        /// Number of `..` steps before the first named step.
        up: usize,
    },
}

/// One named step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    /// Element name.
    pub name: String,
    /// Explicit 1-based instance index, if written.
    pub index: Option<u32>,
}

/// Path step storage; form paths are rarely deeper than four steps.
pub type Steps = SmallVec<[PathStep; 4]>;

/// Syntactic path reference as written in an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRef {
    /// Path anchor.
    pub anchor: PathAnchor,
    /// Named steps after the anchor.
    pub steps: Steps,
}

impl PathRef {
    /// Returns the single step name when the path is a bare identifier.
    ///
    /// Bare names inside choice filters address choice attributes.
    #[must_use]
    pub fn bare_name(&self) -> Option<&str> {
        match (self.anchor, self.steps.as_slice()) {
            (
                PathAnchor::Relative {
                    up: 0,
                },
                [step],
            ) if step.index.is_none() => Some(step.name.as_str()),
            _ => None,
        }
    }

    /// Returns true for the current-node path `.`.
    #[must_use]
    pub fn is_current(&self) -> bool {
        matches!(
            self.anchor,
            PathAnchor::Relative {
                up: 0,
            }
        ) && self.steps.is_empty()
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        match self.anchor {
            PathAnchor::Absolute => {}
            PathAnchor::Relative {
                up,
            } => {
                if up == 0 && self.steps.is_empty() {
                    return f.write_str(".");
                }
                for _ in 0 .. up {
                    if !first {
                        f.write_str("/")?;
                    }
                    f.write_str("..")?;
                    first = false;
                }
            }
        }
        for step in &self.steps {
            if !first || self.anchor == PathAnchor::Absolute {
                f.write_str("/")?;
            }
            f.write_str(&step.name)?;
            if let Some(index) = step.index {
                write!(f, "[{index}]")?;
            }
            first = false;
        }
        Ok(())
    }
}
