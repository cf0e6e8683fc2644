//! # Elements
//!
//! Runtime model instances.
//!
//! - `Vertex` and `Edge` hold one value container per schema field
//! - `Element` is the polymorphic result of deserializing a server row
//! - An instance with no server id (`eid`) is new; saving it inserts

use crate::primitives::{
    EDGE_TYPE, ELEMENT_TYPE_KEY, ID_KEY, IN_V_KEY, LABEL_KEY, OUT_V_KEY, TYPE_KEY, VERTEX_TYPE,
    VID_FIELD,
};
use crate::registry::ModelRegistry;
use crate::schema::{ElementKind, ModelSchema};
use crate::value::ValueContainer;
use crate::{ElementId, OgmError, Params, WireValue};
use std::sync::Arc;

// =============================================================================
// MODEL VALUES
// =============================================================================

/// The schema of an instance and its value containers, index-aligned with
/// `schema.fields()`.
#[derive(Debug, Clone)]
pub struct ModelValues {
    schema: Arc<ModelSchema>,
    containers: Vec<ValueContainer>,
}

impl ModelValues {
    fn empty(schema: Arc<ModelSchema>) -> Self {
        let containers = schema
            .fields()
            .iter()
            .map(|f| ValueContainer::new(Arc::clone(f)))
            .collect();
        Self { schema, containers }
    }

    /// Containers filled from a server row, looked up by wire name.
    /// Unknown keys are ignored.
    fn hydrate(
        schema: Arc<ModelSchema>,
        row: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, OgmError> {
        let mut containers = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = match row.get(field.wire_name()) {
                Some(raw) => field.from_wire(raw).map_err(|e| {
                    OgmError::Deserialization(format!("{}.{}: {}", schema.name(), field.name(), e))
                })?,
                None => None,
            };
            containers.push(ValueContainer::hydrated(Arc::clone(field), value));
        }
        Ok(Self { schema, containers })
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn containers(&self) -> impl Iterator<Item = &ValueContainer> {
        self.containers.iter()
    }

    fn container(&self, name: &str) -> Result<&ValueContainer, OgmError> {
        self.schema
            .field_position(name)
            .and_then(|idx| self.containers.get(idx))
            .ok_or_else(|| self.unknown(name))
    }

    fn container_mut(&mut self, name: &str) -> Result<&mut ValueContainer, OgmError> {
        let idx = self
            .schema
            .field_position(name)
            .ok_or_else(|| self.unknown(name))?;
        let unknown = self.unknown(name);
        self.containers.get_mut(idx).ok_or(unknown)
    }

    fn unknown(&self, name: &str) -> OgmError {
        OgmError::Structural(format!("{} has no field '{}'", self.schema.name(), name))
    }
}

// =============================================================================
// MODEL TRAIT
// =============================================================================

/// Field access shared by vertices and edges.
pub trait Model {
    fn values(&self) -> &ModelValues;
    fn values_mut(&mut self) -> &mut ModelValues;

    /// Server id, absent until the first save.
    fn eid(&self) -> Option<&ElementId>;

    /// Instance-level checks run before field validation.
    fn validate_structure(&self) -> Result<(), OgmError> {
        Ok(())
    }

    fn schema(&self) -> &Arc<ModelSchema> {
        self.values().schema()
    }

    fn is_new(&self) -> bool {
        self.eid().is_none()
    }

    /// Read a field. Unset fields read as their static default.
    fn get(&self, name: &str) -> Result<Option<WireValue>, OgmError> {
        Ok(self.values().container(name)?.get())
    }

    /// Write a field, coercing through its descriptor.
    fn set(&mut self, name: &str, value: impl Into<WireValue>) -> Result<(), OgmError>
    where
        Self: Sized,
    {
        self.values_mut().container_mut(name)?.set(value)
    }

    /// Unset a deletable field.
    fn delete_field(&mut self, name: &str) -> Result<(), OgmError> {
        self.values_mut().container_mut(name)?.delete()
    }

    /// Whole-instance validation: materializes defaults and enforces
    /// required fields.
    fn validate(&mut self) -> Result<(), OgmError> {
        self.validate_structure()?;
        for container in &mut self.values_mut().containers {
            container.validate()?;
        }
        Ok(())
    }

    /// Wire name -> JSON value for every field.
    fn as_wire_map(&self) -> Params {
        self.values()
            .containers
            .iter()
            .map(|c| (c.descriptor().wire_name().to_string(), c.to_wire()))
            .collect()
    }

    /// Names of fields changed since construction or the last save.
    fn changed_fields(&self) -> Vec<&str> {
        self.values()
            .containers
            .iter()
            .filter(|c| c.is_dirty())
            .map(|c| c.descriptor().name())
            .collect()
    }

    fn mark_clean(&mut self) {
        for container in &mut self.values_mut().containers {
            container.mark_clean();
        }
    }
}

fn expect_kind(schema: &ModelSchema, kind: ElementKind) -> Result<(), OgmError> {
    if schema.kind() == kind {
        Ok(())
    } else {
        Err(OgmError::Structural(format!(
            "{} is a {} model, not a {} model",
            schema.name(),
            schema.kind(),
            kind
        )))
    }
}

// =============================================================================
// VERTEX
// =============================================================================

/// An instance of a vertex model.
#[derive(Debug, Clone)]
pub struct Vertex {
    values: ModelValues,
    eid: Option<ElementId>,
}

impl Vertex {
    /// A new, unsaved vertex with every field unset.
    pub fn new(schema: &Arc<ModelSchema>) -> Result<Self, OgmError> {
        expect_kind(schema, ElementKind::Vertex)?;
        Ok(Self {
            values: ModelValues::empty(Arc::clone(schema)),
            eid: None,
        })
    }

    /// A new vertex with the given field values.
    pub fn with_values<K, V>(
        schema: &Arc<ModelSchema>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, OgmError>
    where
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let mut vertex = Self::new(schema)?;
        for (name, value) in values {
            vertex.set(name.as_ref(), value)?;
        }
        Ok(vertex)
    }

    #[must_use]
    pub fn element_type(&self) -> &str {
        self.values.schema.discriminator()
    }

    /// The client-generated UUID, once assigned or validated.
    #[must_use]
    pub fn vid(&self) -> Option<String> {
        self.get(VID_FIELD)
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_string))
    }

    pub(crate) fn set_eid(&mut self, eid: Option<ElementId>) {
        self.eid = eid;
    }
}

impl Model for Vertex {
    fn values(&self) -> &ModelValues {
        &self.values
    }

    fn values_mut(&mut self) -> &mut ModelValues {
        &mut self.values
    }

    fn eid(&self) -> Option<&ElementId> {
        self.eid.as_ref()
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// One end of an edge: a bare server id until resolved.
#[derive(Debug, Clone)]
pub enum EndpointRef {
    Unresolved(ElementId),
    Resolved(Box<Vertex>),
}

impl EndpointRef {
    /// Server id of the endpoint, if it has one.
    #[must_use]
    pub fn eid(&self) -> Option<&ElementId> {
        match self {
            Self::Unresolved(id) => Some(id),
            Self::Resolved(vertex) => vertex.eid(),
        }
    }

    #[must_use]
    pub fn vertex(&self) -> Option<&Vertex> {
        match self {
            Self::Unresolved(_) => None,
            Self::Resolved(vertex) => Some(vertex),
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl From<ElementId> for EndpointRef {
    fn from(id: ElementId) -> Self {
        Self::Unresolved(id)
    }
}

impl From<Vertex> for EndpointRef {
    fn from(vertex: Vertex) -> Self {
        Self::Resolved(Box::new(vertex))
    }
}

/// Copies the vertex as it is now. Saving it afterwards does not reach the
/// copy, so save endpoints before building edges from them.
impl From<&Vertex> for EndpointRef {
    fn from(vertex: &Vertex) -> Self {
        Self::Resolved(Box::new(vertex.clone()))
    }
}

/// An instance of an edge model.
#[derive(Debug, Clone)]
pub struct Edge {
    values: ModelValues,
    eid: Option<ElementId>,
    out_v: EndpointRef,
    in_v: EndpointRef,
}

impl Edge {
    /// A new, unsaved edge from `out_v` (source) to `in_v` (target).
    ///
    /// Endpoints are captured by value: a vertex passed here must already be
    /// saved, or `validate` rejects the edge even if the vertex is saved later.
    pub fn new(
        schema: &Arc<ModelSchema>,
        out_v: impl Into<EndpointRef>,
        in_v: impl Into<EndpointRef>,
    ) -> Result<Self, OgmError> {
        expect_kind(schema, ElementKind::Edge)?;
        Ok(Self {
            values: ModelValues::empty(Arc::clone(schema)),
            eid: None,
            out_v: out_v.into(),
            in_v: in_v.into(),
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.values.schema.discriminator()
    }

    /// Source vertex.
    #[must_use]
    pub const fn out_v(&self) -> &EndpointRef {
        &self.out_v
    }

    /// Target vertex.
    #[must_use]
    pub const fn in_v(&self) -> &EndpointRef {
        &self.in_v
    }

    pub(crate) fn out_v_mut(&mut self) -> &mut EndpointRef {
        &mut self.out_v
    }

    pub(crate) fn in_v_mut(&mut self) -> &mut EndpointRef {
        &mut self.in_v
    }

    pub(crate) fn set_eid(&mut self, eid: Option<ElementId>) {
        self.eid = eid;
    }
}

impl Model for Edge {
    fn values(&self) -> &ModelValues {
        &self.values
    }

    fn values_mut(&mut self) -> &mut ModelValues {
        &mut self.values
    }

    fn eid(&self) -> Option<&ElementId> {
        self.eid.as_ref()
    }

    fn validate_structure(&self) -> Result<(), OgmError> {
        if self.eid.is_none() {
            if self.in_v.eid().is_none() {
                return Err(OgmError::Validation(
                    "in vertex must be saved before saving new edges".into(),
                ));
            }
            if self.out_v.eid().is_none() {
                return Err(OgmError::Validation(
                    "out vertex must be saved before saving new edges".into(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// POLYMORPHIC DESERIALIZATION
// =============================================================================

/// A vertex or edge decoded from a server row.
#[derive(Debug, Clone)]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
}

impl Element {
    /// Decode a result row into an instance of its registered model.
    ///
    /// `_type` selects the table; `element_type` (vertices) or `_label`
    /// (edges) selects the model.
    pub fn deserialize(registry: &ModelRegistry, row: &serde_json::Value) -> Result<Self, OgmError> {
        let obj = row.as_object().ok_or_else(|| {
            OgmError::Deserialization(format!("can't deserialize non-object row: {row}"))
        })?;

        let eid = obj.get(ID_KEY).and_then(ElementId::from_json);
        let kind = obj.get(TYPE_KEY).and_then(serde_json::Value::as_str);

        match kind {
            Some(VERTEX_TYPE) => {
                let element_type = discriminator(obj, ELEMENT_TYPE_KEY)?;
                let schema = registry.vertex(element_type).ok_or_else(|| {
                    OgmError::Deserialization(format!("vertex type '{element_type}' is unknown"))
                })?;
                Ok(Self::Vertex(Vertex {
                    values: ModelValues::hydrate(Arc::clone(schema), obj)?,
                    eid,
                }))
            }
            Some(EDGE_TYPE) => {
                let label = discriminator(obj, LABEL_KEY)?;
                let schema = registry.edge(label).ok_or_else(|| {
                    OgmError::Deserialization(format!("edge label '{label}' is unknown"))
                })?;
                Ok(Self::Edge(Edge {
                    values: ModelValues::hydrate(Arc::clone(schema), obj)?,
                    eid,
                    out_v: endpoint(obj, OUT_V_KEY)?,
                    in_v: endpoint(obj, IN_V_KEY)?,
                }))
            }
            other => Err(OgmError::Deserialization(format!(
                "can't deserialize '{}'",
                other.unwrap_or("<missing _type>")
            ))),
        }
    }

    #[must_use]
    pub fn eid(&self) -> Option<&ElementId> {
        match self {
            Self::Vertex(v) => v.eid(),
            Self::Edge(e) => e.eid(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<ModelSchema> {
        match self {
            Self::Vertex(v) => v.schema(),
            Self::Edge(e) => e.schema(),
        }
    }

    #[must_use]
    pub const fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Edge(e) => Some(e),
            Self::Vertex(_) => None,
        }
    }

    /// Unwrap a vertex; an edge is a deserialization error.
    pub fn into_vertex(self) -> Result<Vertex, OgmError> {
        match self {
            Self::Vertex(v) => Ok(v),
            Self::Edge(e) => Err(OgmError::Deserialization(format!(
                "expected a vertex, got a '{}' edge",
                e.label()
            ))),
        }
    }

    /// Unwrap an edge; a vertex is a deserialization error.
    pub fn into_edge(self) -> Result<Edge, OgmError> {
        match self {
            Self::Edge(e) => Ok(e),
            Self::Vertex(v) => Err(OgmError::Deserialization(format!(
                "expected an edge, got a '{}' vertex",
                v.element_type()
            ))),
        }
    }
}

fn discriminator<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str, OgmError> {
    obj.get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| OgmError::Deserialization(format!("row has no string '{key}'")))
}

fn endpoint(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<EndpointRef, OgmError> {
    obj.get(key)
        .and_then(ElementId::from_json)
        .map(EndpointRef::Unresolved)
        .ok_or_else(|| OgmError::Deserialization(format!("edge row has no '{key}'")))
}

// =============================================================================
// TESTS
// =============================================================================
