use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod canonical;
pub mod document;

/// Stable identifier of a host element, rendered as decimal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub i64);

impl ElementId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElementId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(ElementId)
            .map_err(|_| ParseError::new(format!("invalid element id `{}`", s)))
    }
}

/// Globally unique identifier of a protected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub Uuid);

impl FieldId {
    pub const fn from_u128(value: u128) -> Self {
        FieldId(Uuid::from_u128(value))
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for FieldId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(FieldId)
            .map_err(|_| ParseError::new(format!("invalid field id `{}`", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Number,
    Integer,
    Text,
    ReferenceId,
    None,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Number => "number",
            StorageKind::Integer => "integer",
            StorageKind::Text => "text",
            StorageKind::ReferenceId => "reference_id",
            StorageKind::None => "none",
        }
    }
}

/// A typed field value. The variant is the field's storage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Number(f64),
    Integer(i64),
    Text(String),
    ReferenceId(i64),
    None,
}

impl FieldValue {
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            FieldValue::Number(_) => StorageKind::Number,
            FieldValue::Integer(_) => StorageKind::Integer,
            FieldValue::Text(_) => StorageKind::Text,
            FieldValue::ReferenceId(_) => StorageKind::ReferenceId,
            FieldValue::None => StorageKind::None,
        }
    }

    /// Parses operator input as a value of the given storage kind.
    pub fn parse_as(kind: StorageKind, raw: &str) -> Result<Self, ParseError> {
        match kind {
            StorageKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| ParseError::new(format!("`{}` is not a number", raw))),
            StorageKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| ParseError::new(format!("`{}` is not an integer", raw))),
            StorageKind::Text => Ok(FieldValue::Text(raw.to_string())),
            StorageKind::ReferenceId => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::ReferenceId)
                .map_err(|_| ParseError::new(format!("`{}` is not an element id", raw))),
            StorageKind::None => Ok(FieldValue::None),
        }
    }
}

/// Identifies one monitored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectedFieldRef {
    pub element_id: ElementId,
    pub field_id: FieldId,
    pub storage_kind: StorageKind,
}

/// A protected field as read from the host, with its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedField {
    pub field_id: FieldId,
    pub value: FieldValue,
}

impl ProtectedField {
    pub fn storage_kind(&self) -> StorageKind {
        self.value.storage_kind()
    }

    pub fn reference(&self, element_id: ElementId) -> ProtectedFieldRef {
        ProtectedFieldRef {
            element_id,
            field_id: self.field_id,
            storage_kind: self.storage_kind(),
        }
    }
}

/// An attempted change to one field, delivered before the host commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    pub element_id: ElementId,
    pub field_id: FieldId,
    pub proposed: FieldValue,
}

/// Read access to the host document model.
///
/// Implementations only expose fields the host marks protected/shared; every other
/// field is outside the integrity perimeter and must not be reported.
pub trait Document {
    fn path(&self) -> &Path;

    fn element_ids(&self) -> Vec<ElementId>;

    /// `None` when the element does not resolve in this document.
    fn protected_fields(&self, element_id: ElementId) -> Option<Vec<ProtectedField>>;

    /// Human readable description used in failure reports.
    fn describe(&self, element_id: ElementId) -> Option<String>;
}
