// crates/form-engine-core/src/core/identifiers.rs
// ============================================================================
// Module: Form Engine Identifiers
// Description: Form identifiers, field paths, and arena handles.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`FieldPath`] is the stable, user-facing address of a tree node
//! (`/data/group/field`, `/data/rep[2]/field`). [`NodeId`], [`BindingId`],
//! and [`ScreenId`] are dense arena indices that never leave a compiled form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Form Identifier
// ============================================================================

/// Form definition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(String);

impl FormId {
    /// Creates a new form identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FormId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Arena Handles
// ============================================================================

/// Dense index of a node in the data tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node handle from an arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Dense index of a compiled binding; also its document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(usize);

impl BindingId {
    /// Creates a binding handle from an index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the binding index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Index of a screen in definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(usize);

impl ScreenId {
    /// Creates a screen handle from an index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the screen index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Field Paths
// ============================================================================

/// One `(name, index)` step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathSegment {
    /// Element name.
    pub name: String,
    /// 1-based instance index among same-named siblings.
    pub index: u32,
}

impl PathSegment {
    /// Creates a segment with an explicit instance index.
    #[must_use]
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// Absolute address of a node in the data tree.
///
/// # Invariants
/// - Never empty; the first segment names the document root.
/// - Indices are 1-based; index 1 is omitted from the display form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    /// Segments from the root down.
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Creates the path of a document root.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::new(name, 1)],
        }
    }

    /// Returns the path of a child instance.
    #[must_use]
    pub fn child(&self, name: impl Into<String>, index: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::new(name, index));
        Self {
            segments,
        }
    }

    /// Returns the parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[.. self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the last element name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", |segment| segment.name.as_str())
    }

    /// Returns true when `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Errors raised when parsing a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    /// Path was empty or not absolute.
    #[error("field path must be absolute and non-empty: `{0}`")]
    NotAbsolute(String),
    /// A segment was malformed.
    #[error("invalid field path segment `{segment}` in `{path}`")]
    InvalidSegment {
        /// Full path text.
        path: String,
        /// Offending segment.
        segment: String,
    },
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(FieldPathError::NotAbsolute(raw.to_string()));
        };
        if rest.is_empty() {
            return Err(FieldPathError::NotAbsolute(raw.to_string()));
        }
        let mut segments = Vec::new();
        for part in rest.split('/') {
            segments.push(parse_segment(part).ok_or_else(|| FieldPathError::InvalidSegment {
                path: raw.to_string(),
                segment: part.to_string(),
            })?);
        }
        Ok(Self {
            segments,
        })
    }
}

/// Parses `name` or `name[n]` with `n >= 1`.
fn parse_segment(part: &str) -> Option<PathSegment> {
    let (name, index) = match part.split_once('[') {
        Some((name, tail)) => {
            let digits = tail.strip_suffix(']')?;
            let index: u32 = digits.parse().ok()?;
            (name, index)
        }
        None => (part, 1),
    };
    if index == 0 || !is_valid_name(name) {
        return None;
    }
    Some(PathSegment::new(name, index))
}

/// Returns true for names of the form `[A-Za-z_][A-Za-z0-9_-]*`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'))
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
