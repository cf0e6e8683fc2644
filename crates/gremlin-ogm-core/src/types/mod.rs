//! # Core Type Definitions
//!
//! This module contains the types shared by every layer of the mapper:
//! - Server identifiers (`ElementId`)
//! - Field values as they travel to and from the server (`WireValue`)
//! - Bound script parameters (`Params`)
//! - Error types (`OgmError`)
//!
//! ## Wire Guarantees
//!
//! - `WireValue` has no null variant; absence is always `Option::None`
//! - Maps use `BTreeMap` so serialized property maps are ordered
//! - Conversions to and from `serde_json::Value` are lossless for every variant

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ELEMENT IDENTIFIERS
// =============================================================================

/// Opaque identifier assigned by the graph server to a vertex or edge.
///
/// Rexster back ends hand out either numeric ids (TinkerGraph, Neo4j) or
/// string ids (Titan with custom id managers), so both shapes are kept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementId {
    /// Numeric server id.
    Int(i64),
    /// String server id.
    Text(String),
}

impl ElementId {
    /// Read an id out of a JSON value (the `_id`, `_inV` and `_outV` keys).
    ///
    /// Returns `None` for nulls, floats, booleans and containers.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert into a JSON value for use as a bound parameter.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ElementId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// =============================================================================
// WIRE VALUES
// =============================================================================

/// A field value in the shape the graph server understands.
///
/// This is the tagged replacement for loosely typed property values. Every
/// field coerces into one of these variants before it is stored in a value
/// container, and every variant maps onto exactly one JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<WireValue>),
    Map(BTreeMap<String, WireValue>),
}

impl WireValue {
    /// Convert a JSON value into a wire value.
    ///
    /// Returns `Ok(None)` for JSON `null` (and nulls are dropped inside
    /// lists and maps). Numbers that fit `i64` become `Int`, all others
    /// become `Float`.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>, OgmError> {
        let converted = match value {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(OgmError::Deserialization(format!(
                        "number {n} is out of range"
                    )));
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(v) = Self::from_json(item)? {
                        out.push(v);
                    }
                }
                Self::List(out)
            }
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    if let Some(v) = Self::from_json(v)? {
                        out.insert(k.clone(), v);
                    }
                }
                Self::Map(out)
            }
        };
        Ok(Some(converted))
    }

    /// Convert into a JSON value for use as a bound parameter.
    ///
    /// Non-finite floats have no JSON form and become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Short name of the variant, used in validation messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for WireValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(value: Vec<WireValue>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, WireValue>> for WireValue {
    fn from(value: BTreeMap<String, WireValue>) -> Self {
        Self::Map(value)
    }
}

// =============================================================================
// SCRIPT PARAMETERS
// =============================================================================

/// Bound parameters sent alongside a script.
///
/// Ordered by insertion (the workspace enables `preserve_order`), which keeps
/// logged parameter lists in the order the script declares them.
pub type Params = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the mapper.
///
/// - Schema-definition errors abort startup
/// - Validation, structural and fetch errors are recoverable by the caller
/// - Binding errors are programmer errors and are never retried
/// - Query and deserialization failures abort the in-flight operation
#[derive(Debug, Error)]
pub enum OgmError {
    /// A model declaration is inconsistent (duplicate wire name, duplicate
    /// discriminator, empty name).
    #[error("Schema definition error: {0}")]
    SchemaDefinition(String),

    /// A value or instance failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An operation was used on an instance in the wrong state.
    #[error("Structural error: {0}")]
    Structural(String),

    /// The requested element does not exist on the server.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An identifier expected to be unique matched more than one element.
    #[error("Multiple objects returned: {0}")]
    MultipleObjects(String),

    /// An embedded script method could not be bound.
    #[error("Binding error: {0}")]
    Binding(String),

    /// More arguments were supplied than the script declares parameters.
    #[error("{method}() takes {expected} arguments, {given} given")]
    Arity {
        method: String,
        expected: usize,
        given: usize,
    },

    /// A named argument does not match any script parameter.
    #[error("{method}() got an unexpected keyword argument '{argument}'")]
    UnknownArgument { method: String, argument: String },

    /// A script parameter received more than one value.
    #[error("{method}() got multiple values for argument '{argument}'")]
    DuplicateArgument { method: String, argument: String },

    /// The server rejected or failed a script.
    #[error("Query failed: {0}")]
    Query(String),

    /// A result row could not be turned into a model instance.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Connection configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl OgmError {
    /// True for failures reported by (or decoded from) the execution boundary.
    #[must_use]
    pub const fn is_query_failure(&self) -> bool {
        matches!(self, Self::Query(_) | Self::Deserialization(_))
    }

    /// True for the binding family: unknown method and argument mapping errors.
    #[must_use]
    pub const fn is_binding_error(&self) -> bool {
        matches!(
            self,
            Self::Binding(_)
                | Self::Arity { .. }
                | Self::UnknownArgument { .. }
                | Self::DuplicateArgument { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
