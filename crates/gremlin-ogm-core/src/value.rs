//! # Value Containers
//!
//! One container per (instance, field) pair.
//!
//! - A container is owned by exactly one instance; cloning an instance
//!   clones its containers
//! - Writes coerce through the field descriptor
//! - Required-field checks wait for the whole-instance `validate()` pass, so
//!   half-built instances are allowed to exist
//! - Dirty state compares against the value last known to match the server

use crate::field::{DefaultValue, FieldDescriptor};
use crate::{OgmError, WireValue};
use std::sync::Arc;

/// Live value of one field on one instance.
#[derive(Debug, Clone)]
pub struct ValueContainer {
    descriptor: Arc<FieldDescriptor>,
    value: Option<WireValue>,
    /// Value last synchronized with the server (or given at construction).
    clean: Option<WireValue>,
}

impl ValueContainer {
    /// Create an unset container.
    #[must_use]
    pub fn new(descriptor: Arc<FieldDescriptor>) -> Self {
        Self {
            descriptor,
            value: None,
            clean: None,
        }
    }

    /// Create a container holding a value read from the server.
    ///
    /// The hydrated value counts as clean.
    #[must_use]
    pub fn hydrated(descriptor: Arc<FieldDescriptor>, value: Option<WireValue>) -> Self {
        Self {
            descriptor,
            clean: value.clone(),
            value,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Current value.
    ///
    /// An unset container reads as the field's static default, if it has
    /// one. Generated defaults only appear after `validate()`.
    #[must_use]
    pub fn get(&self) -> Option<WireValue> {
        match (&self.value, self.descriptor.default()) {
            (Some(v), _) => Some(v.clone()),
            (None, Some(DefaultValue::Value(v))) => Some(v.clone()),
            (None, _) => None,
        }
    }

    /// Borrow the stored value without applying defaults.
    #[must_use]
    pub const fn raw(&self) -> Option<&WireValue> {
        self.value.as_ref()
    }

    /// Assign a value after coercing it through the field.
    ///
    /// On error the previous value is kept.
    pub fn set(&mut self, value: impl Into<WireValue>) -> Result<(), OgmError> {
        let coerced = self.descriptor.coerce(value.into())?;
        self.value = Some(coerced);
        Ok(())
    }

    /// Reset to unset. Only deletable fields allow this.
    pub fn delete(&mut self) -> Result<(), OgmError> {
        if !self.descriptor.is_deletable() {
            return Err(OgmError::Structural(format!(
                "field '{}' cannot be deleted",
                self.descriptor.name()
            )));
        }
        self.value = None;
        Ok(())
    }

    /// True when a value has been assigned or hydrated.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// True when the value differs from the last clean value.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.value != self.clean
    }

    /// Record the current value as synchronized with the server.
    pub fn mark_clean(&mut self) {
        self.clean = self.value.clone();
    }

    /// Whole-instance validation step for this field.
    ///
    /// Materializes the default into an unset container (generated defaults
    /// are produced here, exactly once) and enforces `required`.
    pub fn validate(&mut self) -> Result<Option<&WireValue>, OgmError> {
        if self.value.is_none()
            && let Some(default) = self.descriptor.default()
        {
            let produced = self.descriptor.coerce(default.produce())?;
            self.value = Some(produced);
        }
        if self.value.is_none() && self.descriptor.is_required() {
            return Err(OgmError::Validation(format!(
                "field '{}' is required",
                self.descriptor.name()
            )));
        }
        Ok(self.value.as_ref())
    }

    /// JSON form of the current value, for script parameters.
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        self.descriptor.to_wire(self.get().as_ref())
    }
}

// =============================================================================
// TESTS
// =============================================================================
