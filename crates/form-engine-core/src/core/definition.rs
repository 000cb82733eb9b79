// crates/form-engine-core/src/core/definition.rs
// ============================================================================
// Module: Form Definition
// Description: Serializable form structure with fail-closed validation.
// Purpose: Describe the fields, groups, bindings, and choices of one form.
// Dependencies: crate::core::{hashing, identifiers}, form-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`FormDef`] is the already-structured form handed to the engine by a
//! form parser or loaded from JSON. [`FormDef::validate`] enforces structural
//! invariants (names, choices, defaults, repeat counts, size limits) before
//! any expression is parsed; compilation then parses and resolves
//! expressions and rejects cyclic dependencies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use form_logic::ParseError;
use form_logic::ParseLimits;
use form_logic::Value;
use form_logic::parser::DEFAULT_MAX_EXPRESSION_BYTES;
use form_logic::parser::DEFAULT_MAX_EXPRESSION_NESTING;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::FieldPath;
use crate::core::identifiers::FormId;
use crate::core::identifiers::is_valid_name;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum number of instantiated tree nodes.
pub const DEFAULT_MAX_NODES: usize = 10_000;
/// Default maximum repeat instance count per repeat group.
pub const DEFAULT_MAX_REPEAT_INSTANCES: u32 = 100;
/// Default maximum declared choices per select field.
pub const DEFAULT_MAX_CHOICES: usize = 1_000;

/// Size limits applied to untrusted form definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum expression text size in bytes.
    pub max_expression_bytes: usize,
    /// Maximum expression nesting depth.
    pub max_expression_nesting: usize,
    /// Maximum instantiated node count, repeats included.
    pub max_nodes: usize,
    /// Maximum instance count of a single repeat group.
    pub max_repeat_instances: u32,
    /// Maximum declared choices per select field.
    pub max_choices: usize,
}

impl EngineLimits {
    /// Returns the expression parser limits.
    #[must_use]
    pub const fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_input_bytes: self.max_expression_bytes,
            max_nesting: self.max_expression_nesting,
        }
    }
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_expression_bytes: DEFAULT_MAX_EXPRESSION_BYTES,
            max_expression_nesting: DEFAULT_MAX_EXPRESSION_NESTING,
            max_nodes: DEFAULT_MAX_NODES,
            max_repeat_instances: DEFAULT_MAX_REPEAT_INSTANCES,
            max_choices: DEFAULT_MAX_CHOICES,
        }
    }
}

// ============================================================================
// SECTION: Field Kinds
// ============================================================================

/// Input type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text input.
    Text,
    /// Whole number input.
    Integer,
    /// Decimal number input.
    Decimal,
    /// Calendar date input.
    Date,
    /// Single choice from a list.
    SelectOne,
    /// Multiple choices from a list.
    SelectMultiple,
    /// Captured file reference (image, audio, ...); stored as a file name.
    Binary,
    /// Read-only display text.
    Note,
    /// Calculate-only value without a widget.
    Hidden,
}

impl FieldKind {
    /// Returns true when the field renders a widget.
    #[must_use]
    pub const fn has_widget(self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Returns true for select fields.
    #[must_use]
    pub const fn is_select(self) -> bool {
        matches!(self, Self::SelectOne | Self::SelectMultiple)
    }

    /// Returns true when the user can never edit the field.
    #[must_use]
    pub const fn is_display_only(self) -> bool {
        matches!(self, Self::Note)
    }

    /// Returns the kind name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::SelectOne => "select_one",
            Self::SelectMultiple => "select_multiple",
            Self::Binary => "binary",
            Self::Note => "note",
            Self::Hidden => "hidden",
        }
    }

    /// Coerces a value into this kind's storage form.
    ///
    /// Empty values always coerce to [`Value::Empty`]. Returns `None` when the
    /// value has no representation in this kind.
    #[must_use]
    pub fn coerce(self, value: &Value) -> Option<Value> {
        if value.is_empty() {
            return Some(Value::Empty);
        }
        match self {
            Self::Text | Self::Note | Self::Binary => Some(Value::Text(value.to_text())),
            Self::Hidden => Some(value.clone()),
            Self::Integer => {
                let number = value.to_number();
                (number.is_finite() && number.fract() == 0.0).then_some(Value::Number(number))
            }
            Self::Decimal => {
                let number = value.to_number();
                number.is_finite().then_some(Value::Number(number))
            }
            Self::Date => value.to_date().map(Value::Date),
            Self::SelectOne => {
                let values = value.selection_values();
                (values.len() == 1).then_some(Value::Selection(values))
            }
            Self::SelectMultiple => {
                let mut seen = BTreeSet::new();
                let values: Vec<String> = value
                    .selection_values()
                    .into_iter()
                    .filter(|item| seen.insert(item.clone()))
                    .collect();
                Some(Value::Selection(values))
            }
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Binding Slots
// ============================================================================

/// Expression slot attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSlot {
    /// Node relevance.
    Relevance,
    /// Computed value.
    Calculate,
    /// Rendered label.
    Label,
    /// Rendered hint.
    Hint,
    /// Offered choice subset.
    ChoiceFilter,
    /// Answer validity.
    Constraint,
    /// Required flag.
    Required,
    /// Read-only flag.
    Readonly,
}

impl BindingSlot {
    /// Returns the slot name used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Calculate => "calculate",
            Self::Label => "label",
            Self::Hint => "hint",
            Self::ChoiceFilter => "choice_filter",
            Self::Constraint => "constraint",
            Self::Required => "required",
            Self::Readonly => "readonly",
        }
    }
}

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Definition Types
// ============================================================================

/// Expression attributes bound to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindDef {
    /// Relevance expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    /// Calculate expression; makes the field read-only for edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate: Option<String>,
    /// Required expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    /// Read-only expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<String>,
    /// Constraint expression evaluated against a non-empty answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Choice filter; bare names refer to choice attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_filter: Option<String>,
}

/// Declared choice of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceDef {
    /// Stored value; no whitespace.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Extra attributes visible to choice filters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Element name, unique among siblings.
    pub name: String,
    /// Input type.
    pub kind: FieldKind,
    /// Label template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Hint template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Widget appearance passed through to the renderer (e.g. `minimal`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    /// Expression bindings.
    #[serde(default)]
    pub bind: BindDef,
    /// Declared choices (select fields only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceDef>,
    /// Initial answer in text form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Group presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAppearance {
    /// Structural grouping; every field gets its own screen.
    #[default]
    Plain,
    /// All widget fields share one screen.
    FieldList,
}

/// Repeat declaration with a fixed instance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatDef {
    /// Number of instances created at compile time.
    pub count: u32,
}

/// Group declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDef {
    /// Element name, unique among siblings.
    pub name: String,
    /// Static group label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Presentation.
    #[serde(default)]
    pub appearance: GroupAppearance,
    /// Repeat declaration; absent for a single instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatDef>,
    /// Relevance expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    /// Child declarations in document order.
    pub children: Vec<NodeDef>,
}

/// Field or group declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeDef {
    /// Field declaration.
    Field(FieldDef),
    /// Group declaration.
    Group(GroupDef),
}

impl NodeDef {
    /// Returns the element name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(field) => &field.name,
            Self::Group(group) => &group.name,
        }
    }
}

/// Default document root name.
fn default_root() -> String {
    "data".to_string()
}

/// Complete form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormDef {
    /// Form identifier.
    pub form_id: FormId,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Document root element name.
    #[serde(default = "default_root")]
    pub root: String,
    /// Top-level declarations in document order.
    pub children: Vec<NodeDef>,
}

impl FormDef {
    /// Validates structural invariants with default limits.
    ///
    /// # Errors
    /// Returns [`FormDefinitionError`] when the definition is malformed.
    pub fn validate(&self) -> Result<(), FormDefinitionError> {
        self.validate_with(&EngineLimits::default())
    }

    /// Validates structural invariants under explicit limits.
    ///
    /// # Errors
    /// Returns [`FormDefinitionError`] when the definition is malformed or
    /// exceeds a limit.
    pub fn validate_with(&self, limits: &EngineLimits) -> Result<(), FormDefinitionError> {
        if self.form_id.as_str().trim().is_empty() {
            return Err(FormDefinitionError::InvalidName(self.form_id.to_string()));
        }
        if !is_valid_name(&self.root) {
            return Err(FormDefinitionError::InvalidName(self.root.clone()));
        }
        if self.children.is_empty() {
            return Err(FormDefinitionError::EmptyForm);
        }
        let root = FieldPath::root(&self.root);
        ensure_children(&root, &self.children, limits)?;
        let actual = count_nodes(&self.children).saturating_add(1);
        if actual > limits.max_nodes {
            return Err(FormDefinitionError::TooManyNodes {
                max: limits.max_nodes,
                actual,
            });
        }
        Ok(())
    }

    /// Computes the canonical digest identifying this definition version.
    ///
    /// # Errors
    /// Returns [`HashError`] when canonicalization fails.
    pub fn canonical_hash(&self) -> Result<HashDigest, HashError> {
        hash_canonical_json(DEFAULT_HASH_ALGORITHM, self)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal errors raised while validating or compiling a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormDefinitionError {
    /// Form declares no nodes.
    #[error("form definition must declare at least one node")]
    EmptyForm,
    /// Identifier or element name is malformed.
    #[error("invalid element name: `{0}`")]
    InvalidName(String),
    /// Sibling elements share a name.
    #[error("duplicate element `{name}` under {parent}")]
    DuplicateName {
        /// Parent path.
        parent: String,
        /// Repeated name.
        name: String,
    },
    /// Choices declared on a field that is not a select.
    #[error("choices declared on non-select field {0}")]
    ChoicesOnNonSelect(String),
    /// Choice filter declared on a field that is not a select.
    #[error("choice filter declared on non-select field {0}")]
    ChoiceFilterOnNonSelect(String),
    /// Select field without choices.
    #[error("select field {0} declares no choices")]
    EmptyChoices(String),
    /// Choice value is empty or contains whitespace.
    #[error("invalid choice value `{value}` on {path}")]
    InvalidChoice {
        /// Field path.
        path: String,
        /// Offending value.
        value: String,
    },
    /// Choice value declared twice.
    #[error("duplicate choice value `{value}` on {path}")]
    DuplicateChoice {
        /// Field path.
        path: String,
        /// Repeated value.
        value: String,
    },
    /// Select field exceeds the choice limit.
    #[error("field {path} declares {actual} choices (max {max})")]
    TooManyChoices {
        /// Field path.
        path: String,
        /// Configured maximum.
        max: usize,
        /// Declared count.
        actual: usize,
    },
    /// Default answer does not fit the field kind or choices.
    #[error("invalid default `{value}` on {path}")]
    InvalidDefault {
        /// Field path.
        path: String,
        /// Offending default text.
        value: String,
    },
    /// Repeat count is zero or above the limit.
    #[error("repeat {path} declares {count} instances (allowed 1..={max})")]
    InvalidRepeatCount {
        /// Group path.
        path: String,
        /// Declared count.
        count: u32,
        /// Configured maximum.
        max: u32,
    },
    /// Instantiated tree exceeds the node limit.
    #[error("form instantiates {actual} nodes (max {max})")]
    TooManyNodes {
        /// Configured maximum.
        max: usize,
        /// Instantiated count.
        actual: usize,
    },
    /// Expression or template failed to parse.
    #[error("invalid {slot} expression on {path}: {error}")]
    Expression {
        /// Node path.
        path: String,
        /// Binding slot.
        slot: BindingSlot,
        /// Parse failure.
        error: ParseError,
    },
    /// Expression references a node that does not exist.
    #[error("{slot} expression on {path} references unknown node `{reference}`")]
    UnresolvedReference {
        /// Node path.
        path: String,
        /// Binding slot.
        slot: BindingSlot,
        /// Reference as written.
        reference: String,
    },
    /// Bindings depend on each other in a cycle.
    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency {
        /// Offending chain as `path#slot`, first entry repeated at the end.
        chain: Vec<String>,
    },
    /// Definition digest could not be computed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Validates sibling declarations under `parent`.
fn ensure_children(
    parent: &FieldPath,
    children: &[NodeDef],
    limits: &EngineLimits,
) -> Result<(), FormDefinitionError> {
    let mut seen = BTreeSet::new();
    for child in children {
        let name = child.name();
        if !is_valid_name(name) {
            return Err(FormDefinitionError::InvalidName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(FormDefinitionError::DuplicateName {
                parent: parent.to_string(),
                name: name.to_string(),
            });
        }
        let path = parent.child(name, 1);
        match child {
            NodeDef::Field(field) => ensure_field(&path, field, limits)?,
            NodeDef::Group(group) => {
                if let Some(repeat) = group.repeat
                    && (repeat.count == 0 || repeat.count > limits.max_repeat_instances)
                {
                    return Err(FormDefinitionError::InvalidRepeatCount {
                        path: path.to_string(),
                        count: repeat.count,
                        max: limits.max_repeat_instances,
                    });
                }
                ensure_children(&path, &group.children, limits)?;
            }
        }
    }
    Ok(())
}

/// Validates one field declaration.
fn ensure_field(
    path: &FieldPath,
    field: &FieldDef,
    limits: &EngineLimits,
) -> Result<(), FormDefinitionError> {
    if field.kind.is_select() {
        ensure_choices(path, &field.choices, limits)?;
    } else {
        if !field.choices.is_empty() {
            return Err(FormDefinitionError::ChoicesOnNonSelect(path.to_string()));
        }
        if field.bind.choice_filter.is_some() {
            return Err(FormDefinitionError::ChoiceFilterOnNonSelect(path.to_string()));
        }
    }
    if let Some(raw) = &field.default {
        ensure_default(path, field, raw)?;
    }
    Ok(())
}

/// Validates declared choices of a select field.
fn ensure_choices(
    path: &FieldPath,
    choices: &[ChoiceDef],
    limits: &EngineLimits,
) -> Result<(), FormDefinitionError> {
    if choices.is_empty() {
        return Err(FormDefinitionError::EmptyChoices(path.to_string()));
    }
    if choices.len() > limits.max_choices {
        return Err(FormDefinitionError::TooManyChoices {
            path: path.to_string(),
            max: limits.max_choices,
            actual: choices.len(),
        });
    }
    let mut seen = BTreeSet::new();
    for choice in choices {
        if choice.value.is_empty() || choice.value.chars().any(char::is_whitespace) {
            return Err(FormDefinitionError::InvalidChoice {
                path: path.to_string(),
                value: choice.value.clone(),
            });
        }
        if !seen.insert(choice.value.as_str()) {
            return Err(FormDefinitionError::DuplicateChoice {
                path: path.to_string(),
                value: choice.value.clone(),
            });
        }
    }
    Ok(())
}

/// Validates that a default answer coerces to the field kind.
fn ensure_default(path: &FieldPath, field: &FieldDef, raw: &str) -> Result<(), FormDefinitionError> {
    let invalid = || FormDefinitionError::InvalidDefault {
        path: path.to_string(),
        value: raw.to_string(),
    };
    let value = field.kind.coerce(&Value::text(raw)).ok_or_else(invalid)?;
    if field.kind.is_select() {
        let offered = value
            .selection_values()
            .iter()
            .all(|item| field.choices.iter().any(|choice| choice.value == *item));
        if !offered {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Counts instantiated nodes below a declaration list.
fn count_nodes(children: &[NodeDef]) -> usize {
    children.iter().fold(0usize, |total, child| {
        let nodes = match child {
            NodeDef::Field(_) => 1,
            NodeDef::Group(group) => {
                let instances = group.repeat.map_or(1, |repeat| repeat.count);
                let per_instance = count_nodes(&group.children).saturating_add(1);
                usize::try_from(instances).map_or(usize::MAX, |count| per_instance.saturating_mul(count))
            }
        };
        total.saturating_add(nodes)
    })
}
