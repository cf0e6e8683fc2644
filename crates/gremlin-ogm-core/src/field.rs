//! # Field Descriptors
//!
//! Static metadata for one typed attribute of a model.
//!
//! A descriptor is built with the constructor for its semantic kind and
//! refined with builder methods:
//!
//! ```
//! use gremlin_ogm_core::FieldDescriptor;
//!
//! let content = FieldDescriptor::text("content")
//!     .db_field("words_and_whatnot")
//!     .required(true);
//! assert_eq!(content.wire_name(), "words_and_whatnot");
//! ```
//!
//! Once a descriptor is attached to a model schema it is shared behind an
//! `Arc` and never changes.

use crate::{OgmError, WireValue};

// =============================================================================
// FIELD KIND
// =============================================================================

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A UUID, stored as lower-case hyphenated text.
    Uuid,
    /// Free text with optional length bounds (in characters).
    Text {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    /// A signed 64-bit integer.
    Integer,
    /// A 64-bit float.
    Float,
    /// A boolean.
    Boolean,
    /// Seconds since the Unix epoch.
    DateTime,
    /// A string-keyed map.
    Dictionary,
    /// A list of values.
    List,
}

impl FieldKind {
    /// Name used in validation messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Text { .. } => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Dictionary => "dictionary",
            Self::List => "list",
        }
    }
}

// =============================================================================
// DEFAULT VALUE
// =============================================================================

/// Value a field takes when nothing has been assigned.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// A fixed value, visible on read even before validation.
    Value(WireValue),
    /// A value produced once, when the instance is validated for saving.
    Generated(fn() -> WireValue),
}

impl DefaultValue {
    /// Produce the default.
    #[must_use]
    pub fn produce(&self) -> WireValue {
        match self {
            Self::Value(v) => v.clone(),
            Self::Generated(f) => f(),
        }
    }
}

/// Generator for `vid` and other UUID defaults.
#[must_use]
pub fn new_uuid() -> WireValue {
    WireValue::Text(uuid::Uuid::new_v4().to_string())
}

// =============================================================================
// FIELD DESCRIPTOR
// =============================================================================

/// Describes one typed attribute of a model.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    db_field: Option<String>,
    kind: FieldKind,
    position: Option<u32>,
    required: bool,
    default: Option<DefaultValue>,
    can_delete: bool,
}

impl FieldDescriptor {
    /// Create a field of the given kind. Not required, no default, not deletable.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            db_field: None,
            kind,
            position: None,
            required: false,
            default: None,
            can_delete: false,
        }
    }

    /// UUID field with a random default, like the inherited `vid`.
    #[must_use]
    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Uuid).default_with(new_uuid)
    }

    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                min_length: None,
                max_length: None,
            },
        )
    }

    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    #[must_use]
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    #[must_use]
    pub fn dictionary(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Dictionary)
    }

    #[must_use]
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List)
    }

    // -------------------------------------------------------------------------
    // Builder methods
    // -------------------------------------------------------------------------

    /// Store the field under a different name on the server.
    #[must_use]
    pub fn db_field(mut self, db_field: impl Into<String>) -> Self {
        self.db_field = Some(db_field.into());
        self
    }

    /// Explicit ordinal; fields without one keep their declaration order
    /// after all positioned fields.
    #[must_use]
    pub const fn position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<WireValue>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_with(mut self, generator: fn() -> WireValue) -> Self {
        self.default = Some(DefaultValue::Generated(generator));
        self
    }

    #[must_use]
    pub const fn can_delete(mut self, can_delete: bool) -> Self {
        self.can_delete = can_delete;
        self
    }

    /// Length bounds for text fields; ignored for other kinds.
    #[must_use]
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        if let FieldKind::Text {
            min_length,
            max_length,
        } = &mut self.kind
        {
            *min_length = min;
            *max_length = max;
        }
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the property on the server.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.db_field.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub const fn declared_position(&self) -> Option<u32> {
        self.position
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub const fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        self.can_delete
    }

    // -------------------------------------------------------------------------
    // Coercion
    // -------------------------------------------------------------------------

    /// Coerce a value into this field's semantic type.
    ///
    /// Idempotent: coercing an already coerced value returns it unchanged.
    pub fn coerce(&self, value: WireValue) -> Result<WireValue, OgmError> {
        match (&self.kind, value) {
            (FieldKind::Uuid, WireValue::Text(s)) => uuid::Uuid::parse_str(&s)
                .map(|u| WireValue::Text(u.hyphenated().to_string()))
                .map_err(|_| self.invalid(&format!("'{s}' is not a valid uuid"))),

            (
                FieldKind::Text {
                    min_length,
                    max_length,
                },
                WireValue::Text(s),
            ) => {
                let len = s.chars().count();
                if let Some(min) = min_length
                    && len < *min
                {
                    return Err(self.invalid(&format!("length {len} is below minimum {min}")));
                }
                if let Some(max) = max_length
                    && len > *max
                {
                    return Err(self.invalid(&format!("length {len} exceeds maximum {max}")));
                }
                Ok(WireValue::Text(s))
            }

            (FieldKind::Integer, WireValue::Int(i)) => Ok(WireValue::Int(i)),
            (FieldKind::Integer, WireValue::Float(f)) => {
                float_to_int(f, true).ok_or_else(|| self.invalid(&format!("{f} is not an integer")))
            }
            (FieldKind::Integer, WireValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(WireValue::Int)
                .map_err(|_| self.invalid(&format!("'{s}' is not an integer"))),

            (FieldKind::Float, WireValue::Float(f)) if !f.is_finite() => {
                Err(self.invalid(&format!("{f} is not a finite number")))
            }
            (FieldKind::Float, WireValue::Float(f)) => Ok(WireValue::Float(f)),
            (FieldKind::Float, WireValue::Int(i)) => Ok(WireValue::Float(i as f64)),

            (FieldKind::Boolean, WireValue::Bool(b)) => Ok(WireValue::Bool(b)),

            (FieldKind::DateTime, WireValue::Int(i)) => Ok(WireValue::Int(i)),
            (FieldKind::DateTime, WireValue::Float(f)) => float_to_int(f, false)
                .ok_or_else(|| self.invalid(&format!("{f} is not a valid timestamp"))),

            (FieldKind::Dictionary, WireValue::Map(m)) => Ok(WireValue::Map(m)),
            (FieldKind::List, WireValue::List(l)) => Ok(WireValue::List(l)),

            (kind, other) => Err(self.invalid(&format!(
                "expected {}, got {}",
                kind.name(),
                other.type_name()
            ))),
        }
    }

    /// Convert a stored value into its JSON parameter form.
    #[must_use]
    pub fn to_wire(&self, value: Option<&WireValue>) -> serde_json::Value {
        value.map_or(serde_json::Value::Null, WireValue::to_json)
    }

    /// Read a property value from a result row.
    ///
    /// `null` reads as absent; anything else must coerce into this field.
    pub fn from_wire(&self, value: &serde_json::Value) -> Result<Option<WireValue>, OgmError> {
        match WireValue::from_json(value)? {
            None => Ok(None),
            Some(v) => self
                .coerce(v)
                .map(Some)
                .map_err(|e| OgmError::Deserialization(e.to_string())),
        }
    }

    fn invalid(&self, reason: &str) -> OgmError {
        OgmError::Validation(format!("field '{}': {}", self.name, reason))
    }
}

/// Convert a float to an integer value.
///
/// With `exact`, only values without a fractional part convert; otherwise
/// the value is truncated toward zero. Non-finite and out-of-range values
/// never convert.
fn float_to_int(f: f64, exact: bool) -> Option<WireValue> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return None;
    }
    let truncated = f.trunc();
    if exact && truncated != f {
        return None;
    }
    Some(WireValue::Int(truncated as i64))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_name_defaults_to_field_name() {
        let plain = FieldDescriptor::integer("count");
        assert_eq!(plain.wire_name(), "count");

        let renamed = FieldDescriptor::integer("numbers").db_field("integers_etc");
        assert_eq!(renamed.wire_name(), "integers_etc");
        assert_eq!(renamed.name(), "numbers");
    }

    #[test]
    fn integer_coercion() {
        let f = FieldDescriptor::integer("count");
        assert_eq!(f.coerce(WireValue::Int(5)).expect("int"), WireValue::Int(5));
        assert_eq!(
            f.coerce(WireValue::Float(8.0)).expect("whole float"),
            WireValue::Int(8)
        );
        assert_eq!(
            f.coerce(WireValue::Text(" 12 ".into())).expect("numeric text"),
            WireValue::Int(12)
        );
        assert!(f.coerce(WireValue::Float(8.5)).is_err());
        assert!(f.coerce(WireValue::Text("eight".into())).is_err());
        assert!(f.coerce(WireValue::Bool(true)).is_err());
    }

    #[test]
    fn uuid_coercion_normalizes() {
        let f = FieldDescriptor::uuid("vid");
        let upper = "67E55044-10B1-426F-9247-BB680E5FE0C8";
        assert_eq!(
            f.coerce(WireValue::Text(upper.into())).expect("uuid"),
            WireValue::Text(upper.to_lowercase())
        );
        assert!(matches!(
            f.coerce(WireValue::Text("nope".into())),
            Err(OgmError::Validation(_))
        ));
    }

    #[test]
    fn text_length_bounds() {
        let f = FieldDescriptor::text("code").length(Some(2), Some(4));
        assert!(f.coerce(WireValue::Text("a".into())).is_err());
        assert!(f.coerce(WireValue::Text("abc".into())).is_ok());
        assert!(f.coerce(WireValue::Text("abcde".into())).is_err());
        assert!(f.coerce(WireValue::Int(3)).is_err());
    }

    #[test]
    fn float_and_datetime_coercion() {
        let f = FieldDescriptor::float("ratio");
        assert_eq!(f.coerce(WireValue::Int(2)).expect("int"), WireValue::Float(2.0));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                f.coerce(WireValue::Float(bad)),
                Err(OgmError::Validation(_))
            ));
        }

        let dt = FieldDescriptor::datetime("created_at");
        assert_eq!(
            dt.coerce(WireValue::Float(1_356_000_000.75)).expect("truncate"),
            WireValue::Int(1_356_000_000)
        );
        assert!(dt.coerce(WireValue::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn coercion_is_idempotent() {
        let f = FieldDescriptor::uuid("vid");
        let once = f.coerce(new_uuid()).expect("first");
        let twice = f.coerce(once.clone()).expect("second");
        assert_eq!(once, twice);
    }

    #[test]
    fn from_wire_reads_null_as_absent() {
        let f = FieldDescriptor::text("text");
        assert_eq!(f.from_wire(&json!(null)).expect("null"), None);
        assert_eq!(
            f.from_wire(&json!("abc")).expect("text"),
            Some(WireValue::Text("abc".into()))
        );
        assert!(matches!(
            f.from_wire(&json!(12)),
            Err(OgmError::Deserialization(_))
        ));
    }

    #[test]
    fn to_wire_uses_null_for_absent() {
        let f = FieldDescriptor::integer("count");
        assert_eq!(f.to_wire(None), json!(null));
        assert_eq!(f.to_wire(Some(&WireValue::Int(3))), json!(3));
    }

    #[test]
    fn generated_default_produces_fresh_values() {
        let f = FieldDescriptor::uuid("vid");
        let default = f.default().expect("uuid fields have a default");
        assert_ne!(default.produce(), default.produce());
    }
}
