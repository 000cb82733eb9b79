// crates/form-logic/src/value.rs
// ============================================================================
// Module: Form Values
// Description: Tagged value union with permissive coercion rules.
// Purpose: Give expressions and form fields one typed value model.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`Value`] is the single currency of the expression language and the data
//! tree. Conversions follow spreadsheet/XPath conventions: empty values act as
//! `false`, `NaN`, or `""` depending on context, text is parsed on demand, and
//! dates behave as day counts in arithmetic. Coercions never fail; only
//! explicit conversions such as `date(...)` report type mismatches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Calendar date layout used for parsing and rendering (`YYYY-MM-DD`).
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
/// Largest magnitude rendered without a fractional part.
const MAX_INTEGRAL_RENDER: f64 = 1e15;

// ============================================================================
// SECTION: Value
// ============================================================================

/// Typed value stored in the data tree and produced by expressions.
///
/// # Invariants
/// - `Selection` keeps the order in which values were chosen.
/// - `Number` may hold `NaN`; `NaN` never compares equal to anything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// No answer.
    #[default]
    Empty,
    /// Free text.
    Text(String),
    /// Integer or decimal number.
    Number(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Calendar date.
    Date(#[serde(with = "iso_date")] Date),
    /// Selected choice values.
    Selection(Vec<String>),
}

impl Value {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Creates a selection value from choice values.
    #[must_use]
    pub fn selection<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Selection(values.into_iter().map(Into::into).collect())
    }

    /// Returns true when the value carries no answer.
    ///
    /// Empty text and empty selections count as empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Selection(values) => values.is_empty(),
            Self::Number(_) | Self::Boolean(_) | Self::Date(_) => false,
        }
    }

    /// Coerces the value to a boolean.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Text(text) => !text.is_empty(),
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Boolean(flag) => *flag,
            Self::Date(_) => true,
            Self::Selection(values) => !values.is_empty(),
        }
    }

    /// Coerces the value to a number, yielding `NaN` when no number applies.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Empty => f64::NAN,
            Self::Text(text) => parse_number(text),
            Self::Number(number) => *number,
            Self::Boolean(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Date(date) => f64::from(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY),
            Self::Selection(values) => match values.as_slice() {
                [single] => parse_number(single),
                _ => f64::NAN,
            },
        }
    }

    /// Coerces the value to its display text.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text.clone(),
            Self::Number(number) => format_number(*number),
            Self::Boolean(flag) => flag.to_string(),
            Self::Date(date) => format_date(*date),
            Self::Selection(values) => values.join(" "),
        }
    }

    /// Coerces the value to a date when it carries one.
    ///
    /// Text must use the `YYYY-MM-DD` layout; numbers are day offsets from
    /// 1970-01-01.
    #[must_use]
    pub fn to_date(&self) -> Option<Date> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Text(text) => parse_date(text.trim()),
            Self::Number(number) => date_from_days(*number),
            Self::Empty | Self::Boolean(_) | Self::Selection(_) => None,
        }
    }

    /// Returns the value as a list of selected choice values.
    ///
    /// Text is split on whitespace, mirroring how multi-selects are stored.
    #[must_use]
    pub fn selection_values(&self) -> Vec<String> {
        match self {
            Self::Empty => Vec::new(),
            Self::Selection(values) => values.clone(),
            Self::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            Self::Number(_) | Self::Boolean(_) | Self::Date(_) => vec![self.to_text()],
        }
    }

    /// Compares two values for `=` semantics.
    ///
    /// Booleans win over numbers, numbers over dates, dates over text. Empty
    /// compares equal to empty text.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        if matches!(self, Self::Boolean(_)) || matches!(other, Self::Boolean(_)) {
            return self.to_boolean() == other.to_boolean();
        }
        if matches!(self, Self::Number(_)) || matches!(other, Self::Number(_)) {
            return self.to_number() == other.to_number();
        }
        if matches!(self, Self::Date(_)) || matches!(other, Self::Date(_)) {
            return match (self.to_date(), other.to_date()) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => false,
            };
        }
        self.to_text() == other.to_text()
    }

    /// Orders two values for relational operators.
    ///
    /// Dates compare as dates when both sides convert; everything else
    /// compares numerically. Returns `None` when either side is `NaN`.
    #[must_use]
    pub fn loose_cmp(&self, other: &Self) -> Option<Ordering> {
        if (matches!(self, Self::Date(_)) || matches!(other, Self::Date(_)))
            && let (Some(lhs), Some(rhs)) = (self.to_date(), other.to_date())
        {
            return Some(lhs.cmp(&rhs));
        }
        self.to_number().partial_cmp(&other.to_number())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

// ============================================================================
// SECTION: Conversion Helpers
// ============================================================================

/// Parses trimmed text as a number, returning `NaN` on failure.
fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Renders a number the way form text expects it.
///
/// Integral values drop the fractional part; `NaN` and infinities use their
/// XPath spellings.
#[must_use]
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if number == 0.0 {
        return "0".to_string();
    }
    if number.fract() == 0.0 && number.abs() < MAX_INTEGRAL_RENDER {
        return format!("{number:.0}");
    }
    number.to_string()
}

/// Parses a `YYYY-MM-DD` date.
#[must_use]
pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, DATE_FORMAT).ok()
}

/// Renders a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}

/// Converts a day offset from 1970-01-01 into a date.
fn date_from_days(days: f64) -> Option<Date> {
    if !days.is_finite() {
        return None;
    }
    let floored = days.floor();
    if floored < f64::from(i32::MIN / 2) || floored > f64::from(i32::MAX / 2) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, reason = "range checked against i32 bounds above")]
    let offset = floored as i32;
    Date::from_julian_day(UNIX_EPOCH_JULIAN_DAY + offset).ok()
}

// ============================================================================
// SECTION: Serde Helpers
// ============================================================================

/// Serializes dates as `YYYY-MM-DD` strings.
mod iso_date {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use serde::de::Error as _;
    use time::Date;

    /// Writes a date as `YYYY-MM-DD`.
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    /// Reads a `YYYY-MM-DD` date.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn day_offsets_round_trip_through_dates() {
        let date = parse_date("2019-03-14").unwrap();
        let days = Value::Date(date).to_number();
        assert_eq!(date_from_days(days), Some(date));
    }

    #[test]
    fn non_finite_offsets_have_no_date() {
        assert_eq!(date_from_days(f64::NAN), None);
        assert_eq!(date_from_days(f64::INFINITY), None);
    }
}
