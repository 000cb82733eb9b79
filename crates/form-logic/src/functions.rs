// crates/form-logic/src/functions.rs
// ============================================================================
// Module: Function Library
// Description: Built-in functions of the expression language.
// Purpose: Map function names onto pure implementations over evaluated values.
// Dependencies: crate::eval, crate::value
// ============================================================================

//! ## Overview
//! Every function receives its arguments already evaluated, except `if`,
//! which the evaluator handles itself so only the taken branch runs.
//! Indices taken by `substr` and `selected-at` are 0-based.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::eval::EvalError;
use crate::eval::arity;
use crate::value::Value;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Signature shared by every eager built-in.
type Builtin = fn(&[Value]) -> Result<Value, EvalError>;

/// Names accepted by the evaluator, including the lazily evaluated `if`.
pub const FUNCTION_NAMES: &[&str] = &[
    "boolean",
    "coalesce",
    "concat",
    "contains",
    "count-selected",
    "date",
    "ends-with",
    "false",
    "if",
    "int",
    "join",
    "not",
    "number",
    "round",
    "selected",
    "selected-at",
    "starts-with",
    "string",
    "string-length",
    "substr",
    "true",
];

/// Returns the implementation for an eager built-in.
pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let function: Builtin = match name {
        "boolean" => boolean,
        "coalesce" => coalesce,
        "concat" => concat,
        "contains" => contains,
        "count-selected" => count_selected,
        "date" => date,
        "ends-with" => ends_with,
        "false" => constant_false,
        "int" => int,
        "join" => join,
        "not" => not,
        "number" => number,
        "round" => round,
        "selected" => selected,
        "selected-at" => selected_at,
        "starts-with" => starts_with,
        "string" => string,
        "string-length" => string_length,
        "substr" => substr,
        "true" => constant_true,
        _ => return None,
    };
    Some(function)
}

// ============================================================================
// SECTION: Argument Helpers
// ============================================================================

/// Destructures exactly one argument.
fn one<'a>(name: &'static str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    match args {
        [value] => Ok(value),
        _ => Err(arity(name, "1", args.len())),
    }
}

/// Destructures exactly two arguments.
fn two<'a>(name: &'static str, args: &'a [Value]) -> Result<(&'a Value, &'a Value), EvalError> {
    match args {
        [first, second] => Ok((first, second)),
        _ => Err(arity(name, "2", args.len())),
    }
}

/// Converts a count to a number value.
fn count(len: usize) -> Value {
    Value::Number(u32::try_from(len).map_or(f64::from(u32::MAX), f64::from))
}

/// Converts a numeric argument into a 0-based index.
///
/// Negative, `NaN`, and infinite inputs have no index.
fn to_index(number: f64) -> Option<usize> {
    if !number.is_finite() || number < 0.0 || number > f64::from(u32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, reason = "range checked against u32 bounds above")]
    #[allow(clippy::cast_sign_loss, reason = "negative inputs rejected above")]
    let index = number.trunc() as u32;
    usize::try_from(index).ok()
}

// ============================================================================
// SECTION: Text Functions
// ============================================================================

/// `concat(a, b, ...)`: joins the text of every argument.
fn concat(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Text(args.iter().map(Value::to_text).collect()))
}

/// `string-length(s)`: character count.
fn string_length(args: &[Value]) -> Result<Value, EvalError> {
    let value = one("string-length", args)?;
    Ok(count(value.to_text().chars().count()))
}

/// `string(v)`: text coercion.
fn string(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Text(one("string", args)?.to_text()))
}

/// `substr(s, start[, end])`: 0-based slice, end exclusive.
fn substr(args: &[Value]) -> Result<Value, EvalError> {
    let (text, start, end) = match args {
        [text, start] => (text, start, None),
        [text, start, end] => (text, start, Some(end)),
        _ => return Err(arity("substr", "2 or 3", args.len())),
    };
    let chars: Vec<char> = text.to_text().chars().collect();
    let start = to_index(start.to_number()).unwrap_or(0).min(chars.len());
    let end = end
        .map_or(Some(chars.len()), |end| to_index(end.to_number()))
        .unwrap_or(0)
        .min(chars.len());
    if start >= end {
        return Ok(Value::Text(String::new()));
    }
    Ok(Value::Text(chars[start .. end].iter().collect()))
}

/// `contains(haystack, needle)`.
fn contains(args: &[Value]) -> Result<Value, EvalError> {
    let (haystack, needle) = two("contains", args)?;
    Ok(Value::Boolean(haystack.to_text().contains(&needle.to_text())))
}

/// `starts-with(text, prefix)`.
fn starts_with(args: &[Value]) -> Result<Value, EvalError> {
    let (text, prefix) = two("starts-with", args)?;
    Ok(Value::Boolean(text.to_text().starts_with(&prefix.to_text())))
}

/// `ends-with(text, suffix)`.
fn ends_with(args: &[Value]) -> Result<Value, EvalError> {
    let (text, suffix) = two("ends-with", args)?;
    Ok(Value::Boolean(text.to_text().ends_with(&suffix.to_text())))
}

/// `join(separator, values...)`: selections contribute each chosen value.
fn join(args: &[Value]) -> Result<Value, EvalError> {
    let Some((separator, values)) = args.split_first() else {
        return Err(arity("join", "at least 1", 0));
    };
    let items: Vec<String> = values
        .iter()
        .flat_map(|value| match value {
            Value::Selection(items) => items.clone(),
            Value::Empty => Vec::new(),
            other => vec![other.to_text()],
        })
        .collect();
    Ok(Value::Text(items.join(&separator.to_text())))
}

// ============================================================================
// SECTION: Logic Functions
// ============================================================================

/// `not(v)`.
fn not(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!one("not", args)?.to_boolean()))
}

/// `boolean(v)`.
fn boolean(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Boolean(one("boolean", args)?.to_boolean()))
}

/// `true()`.
fn constant_true(args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(arity("true", "0", args.len()));
    }
    Ok(Value::Boolean(true))
}

/// `false()`.
fn constant_false(args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(arity("false", "0", args.len()));
    }
    Ok(Value::Boolean(false))
}

/// `coalesce(a, b)`: first non-empty argument.
fn coalesce(args: &[Value]) -> Result<Value, EvalError> {
    let (first, second) = two("coalesce", args)?;
    Ok(if first.is_empty() { second.clone() } else { first.clone() })
}

// ============================================================================
// SECTION: Numeric Functions
// ============================================================================

/// `number(v)`.
fn number(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(one("number", args)?.to_number()))
}

/// `int(v)`: truncates toward zero.
fn int(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(one("int", args)?.to_number().trunc()))
}

/// `round(v[, digits])`: half-up rounding.
fn round(args: &[Value]) -> Result<Value, EvalError> {
    let (value, digits) = match args {
        [value] => (value.to_number(), 0.0),
        [value, digits] => (value.to_number(), digits.to_number().trunc()),
        _ => return Err(arity("round", "1 or 2", args.len())),
    };
    if !value.is_finite() || !digits.is_finite() {
        return Ok(Value::Number(value));
    }
    let scale = 10f64.powf(digits);
    Ok(Value::Number((value * scale + 0.5).floor() / scale))
}

// ============================================================================
// SECTION: Selection Functions
// ============================================================================

/// `selected(selection, value)`.
fn selected(args: &[Value]) -> Result<Value, EvalError> {
    let (selection, value) = two("selected", args)?;
    let wanted = value.to_text();
    Ok(Value::Boolean(selection.selection_values().iter().any(|item| *item == wanted)))
}

/// `count-selected(selection)`.
fn count_selected(args: &[Value]) -> Result<Value, EvalError> {
    Ok(count(one("count-selected", args)?.selection_values().len()))
}

/// `selected-at(selection, index)`: 0-based; out of range yields empty text.
fn selected_at(args: &[Value]) -> Result<Value, EvalError> {
    let (selection, index) = two("selected-at", args)?;
    let values = selection.selection_values();
    let item = to_index(index.to_number()).and_then(|index| values.get(index).cloned());
    Ok(Value::Text(item.unwrap_or_default()))
}

// ============================================================================
// SECTION: Date Functions
// ============================================================================

/// `date(v)`: explicit date conversion; empty input stays empty.
fn date(args: &[Value]) -> Result<Value, EvalError> {
    let value = one("date", args)?;
    if value.is_empty() {
        return Ok(Value::Empty);
    }
    value.to_date().map(Value::Date).ok_or_else(|| EvalError::TypeMismatch {
        function: "date",
        expected: "a date",
        found: value.to_text(),
    })
}
