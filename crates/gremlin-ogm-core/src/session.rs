//! # Session Module
//!
//! The query engine: turns model operations into scripts, hands them to a
//! [`QueryExecutor`] and decodes the rows that come back.
//!
//! - One executor round trip per public operation
//! - The registry is shared read-only
//! - Instances are passed in by `&mut` and updated in place (server id,
//!   clean state, resolved endpoints)

use crate::binder::ScriptArgs;
use crate::element::{Edge, Element, EndpointRef, Model, Vertex};
use crate::primitives::ID_KEY;
use crate::query::{Script, Traversal};
use crate::registry::ModelRegistry;
use crate::schema::ModelSchema;
use crate::{ElementId, OgmError, Params, WireValue};
use indexmap::IndexMap;
use std::sync::Arc;

// =============================================================================
// EXECUTION BOUNDARY
// =============================================================================

/// Runs a script with bound parameters and returns the result rows.
///
/// The only seam between the mapper and the network.
pub trait QueryExecutor {
    fn execute(&self, script: &str, params: &Params) -> Result<Vec<serde_json::Value>, OgmError>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute(&self, script: &str, params: &Params) -> Result<Vec<serde_json::Value>, OgmError> {
        (**self).execute(script, params)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    fn execute(&self, script: &str, params: &Params) -> Result<Vec<serde_json::Value>, OgmError> {
        (**self).execute(script, params)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn execute(&self, script: &str, params: &Params) -> Result<Vec<serde_json::Value>, OgmError> {
        (**self).execute(script, params)
    }
}

/// Result of an embedded script method call.
#[derive(Debug, Clone)]
pub enum MethodOutput {
    /// Raw result rows.
    Rows(Vec<serde_json::Value>),
    /// Rows decoded into model instances.
    Elements(Vec<Element>),
}

// =============================================================================
// SESSION
// =============================================================================

/// Query engine bound to one executor and one registry.
#[derive(Debug)]
pub struct Session<E> {
    executor: E,
    registry: Arc<ModelRegistry>,
}

impl<E: QueryExecutor> Session<E> {
    #[must_use]
    pub fn new(executor: E, registry: Arc<ModelRegistry>) -> Self {
        Self { executor, registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    fn run(&self, script: &Script) -> Result<Vec<serde_json::Value>, OgmError> {
        tracing::debug!(
            script_len = script.text().len(),
            params = ?script.params().keys().collect::<Vec<_>>(),
            "executing script"
        );
        self.executor.execute(script.text(), script.params())
    }

    fn decode(&self, rows: &[serde_json::Value]) -> Result<Vec<Element>, OgmError> {
        rows.iter()
            .map(|row| Element::deserialize(&self.registry, row))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Save / create
    // -------------------------------------------------------------------------

    /// Validate and insert (no eid) or update (eid) a vertex.
    ///
    /// On success the server id is written back and every field is clean.
    pub fn save_vertex(&self, vertex: &mut Vertex) -> Result<(), OgmError> {
        vertex.validate()?;
        let rows = self.run(&Script::save_vertex(vertex))?;
        let eid = single_row_id(&rows, vertex.element_type())?;
        vertex.set_eid(Some(eid));
        vertex.mark_clean();
        Ok(())
    }

    /// Validate and insert (no eid) or update (eid) an edge.
    pub fn save_edge(&self, edge: &mut Edge) -> Result<(), OgmError> {
        edge.validate()?;
        let rows = self.run(&Script::save_edge(edge)?)?;
        let eid = single_row_id(&rows, edge.label())?;
        edge.set_eid(Some(eid));
        edge.mark_clean();
        Ok(())
    }

    /// Build a vertex of the model registered as `element_type` and save it.
    pub fn create_vertex<K, V>(
        &self,
        element_type: &str,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Vertex, OgmError>
    where
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let schema = self.registry.vertex(element_type).ok_or_else(|| {
            OgmError::Structural(format!("vertex type '{element_type}' is not registered"))
        })?;
        let mut vertex = Vertex::with_values(schema, values)?;
        self.save_vertex(&mut vertex)?;
        Ok(vertex)
    }

    /// Build an edge of the model registered as `label` and save it.
    pub fn create_edge<K, V>(
        &self,
        label: &str,
        out_v: impl Into<EndpointRef>,
        in_v: impl Into<EndpointRef>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Edge, OgmError>
    where
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let schema = self.registry.edge(label).ok_or_else(|| {
            OgmError::Structural(format!("edge label '{label}' is not registered"))
        })?;
        let mut edge = Edge::new(schema, out_v, in_v)?;
        for (name, value) in values {
            edge.set(name.as_ref(), value)?;
        }
        self.save_edge(&mut edge)?;
        Ok(edge)
    }

    // -------------------------------------------------------------------------
    // Fetch
    // -------------------------------------------------------------------------

    /// Fetch vertices by `vid`, in request order.
    ///
    /// # Errors
    ///
    /// - `Validation` if a vid is not a UUID
    /// - `NotFound(vid)` if a vid matches nothing
    /// - `MultipleObjects(vid)` if a vid matches more than one vertex
    pub fn fetch_vertices<S: AsRef<str>>(&self, vids: &[S]) -> Result<Vec<Vertex>, OgmError> {
        let vids = vids
            .iter()
            .map(|vid| normalize_vid(vid.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if vids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.run(&Script::fetch_vertices(&vids))?;
        if rows.len() != vids.len() {
            return Err(OgmError::Query(format!(
                "the number of results ({}) doesn't match the number of vids requested ({})",
                rows.len(),
                vids.len()
            )));
        }

        let mut vertices = Vec::with_capacity(vids.len());
        for (vid, row) in vids.iter().zip(&rows) {
            let mut matches = match row {
                serde_json::Value::Array(items) => items.iter().collect::<Vec<_>>(),
                serde_json::Value::Null => Vec::new(),
                single => vec![single],
            };
            match matches.len() {
                0 => return Err(OgmError::NotFound(vid.clone())),
                1 => {}
                n => {
                    tracing::warn!(vid = %vid, matches = n, "vid is not unique");
                    return Err(OgmError::MultipleObjects(vid.clone()));
                }
            }
            let row = matches.remove(0);
            vertices.push(Element::deserialize(&self.registry, row)?.into_vertex()?);
        }
        Ok(vertices)
    }

    /// Fetch vertices by `vid`, keyed by vid in request order.
    pub fn fetch_vertices_by_id<S: AsRef<str>>(
        &self,
        vids: &[S],
    ) -> Result<IndexMap<String, Vertex>, OgmError> {
        let mut keyed = IndexMap::with_capacity(vids.len());
        for vertex in self.fetch_vertices(vids)? {
            let vid = vertex.vid().ok_or_else(|| {
                OgmError::Deserialization(format!(
                    "fetched '{}' vertex has no vid",
                    vertex.element_type()
                ))
            })?;
            keyed.insert(vid, vertex);
        }
        Ok(keyed)
    }

    /// Fetch exactly one vertex by `vid`.
    pub fn get_vertex(&self, vid: &str) -> Result<Vertex, OgmError> {
        self.fetch_vertices(&[vid])?
            .pop()
            .ok_or_else(|| OgmError::NotFound(vid.to_string()))
    }

    /// Fetch a vertex by server id.
    pub fn get_by_eid(&self, eid: &ElementId) -> Result<Vertex, OgmError> {
        let rows = self.run(&Script::vertex_by_eid(eid))?;
        let row = first_row(&rows).ok_or_else(|| OgmError::NotFound(format!("vertex {eid}")))?;
        Element::deserialize(&self.registry, row)?.into_vertex()
    }

    /// Fetch an edge by server id.
    pub fn get_edge_by_eid(&self, eid: &ElementId) -> Result<Edge, OgmError> {
        let rows = self.run(&Script::edge_by_eid(eid))?;
        let row = first_row(&rows).ok_or_else(|| OgmError::NotFound(format!("edge {eid}")))?;
        Element::deserialize(&self.registry, row)?.into_edge()
    }

    // -------------------------------------------------------------------------
    // Delete / reload / update
    // -------------------------------------------------------------------------

    /// Remove a saved vertex. The instance becomes new again.
    pub fn delete_vertex(&self, vertex: &mut Vertex) -> Result<(), OgmError> {
        let eid = saved_eid(vertex, "delete vertices")?;
        self.run(&Script::delete_vertex(&eid))?;
        vertex.set_eid(None);
        Ok(())
    }

    /// Remove a saved edge. The instance becomes new again.
    pub fn delete_edge(&self, edge: &mut Edge) -> Result<(), OgmError> {
        let eid = saved_eid(edge, "delete edges")?;
        self.run(&Script::delete_edge(&eid))?;
        edge.set_eid(None);
        Ok(())
    }

    /// Replace a saved vertex's values with the server's current state.
    pub fn reload_vertex(&self, vertex: &mut Vertex) -> Result<(), OgmError> {
        let eid = saved_eid(vertex, "reload vertices")?;
        *vertex = self.get_by_eid(&eid)?;
        Ok(())
    }

    /// Assign several fields and save.
    ///
    /// Every name is checked before anything is sent; an unknown field is
    /// a `Structural` error.
    pub fn update_vertex<K, V>(
        &self,
        vertex: &mut Vertex,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), OgmError>
    where
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        for (name, value) in values {
            vertex.set(name.as_ref(), value)?;
        }
        self.save_vertex(vertex)
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// One-step traversal from a saved vertex, optionally filtered by label.
    pub fn traverse(
        &self,
        vertex: &Vertex,
        step: Traversal,
        label: Option<&str>,
    ) -> Result<Vec<Element>, OgmError> {
        let eid = saved_eid(vertex, "traverse from vertices")?;
        let rows = self.run(&Script::vertex_traversal(&eid, step, label))?;
        self.decode(&rows)
    }

    pub fn out_v(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::Out, label)
    }

    pub fn in_v(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::In, label)
    }

    pub fn both_v(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::Both, label)
    }

    pub fn out_e(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::OutE, label)
    }

    pub fn in_e(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::InE, label)
    }

    pub fn both_e(&self, vertex: &Vertex, label: Option<&str>) -> Result<Vec<Element>, OgmError> {
        self.traverse(vertex, Traversal::BothE, label)
    }

    // -------------------------------------------------------------------------
    // Endpoint resolution
    // -------------------------------------------------------------------------

    /// The edge's source vertex, fetched on first use.
    pub fn resolve_out_vertex<'a>(&self, edge: &'a mut Edge) -> Result<&'a Vertex, OgmError> {
        self.resolve(edge.out_v_mut())
    }

    /// The edge's target vertex, fetched on first use.
    pub fn resolve_in_vertex<'a>(&self, edge: &'a mut Edge) -> Result<&'a Vertex, OgmError> {
        self.resolve(edge.in_v_mut())
    }

    fn resolve<'a>(&self, endpoint: &'a mut EndpointRef) -> Result<&'a Vertex, OgmError> {
        if let EndpointRef::Unresolved(id) = endpoint {
            let vertex = self.get_by_eid(id)?;
            *endpoint = EndpointRef::Resolved(Box::new(vertex));
        }
        match endpoint {
            EndpointRef::Resolved(vertex) => Ok(&**vertex),
            EndpointRef::Unresolved(id) => Err(OgmError::NotFound(format!("vertex {id}"))),
        }
    }

    // -------------------------------------------------------------------------
    // Embedded script methods
    // -------------------------------------------------------------------------

    /// Call a bound script method of `schema`.
    ///
    /// Instance methods need the owner's server id.
    pub fn call_method(
        &self,
        schema: &ModelSchema,
        method: &str,
        owner: Option<&ElementId>,
        args: ScriptArgs,
    ) -> Result<MethodOutput, OgmError> {
        let bound = schema.method(method).ok_or_else(|| {
            OgmError::Binding(format!("{} has no script method '{}'", schema.name(), method))
        })?;
        let params = bound.prepare(owner, args)?;
        tracing::debug!(
            model = %schema.name(),
            method,
            path = %bound.path().display(),
            "calling script method"
        );
        let rows = self.run(&Script::with_params(bound.body(), params))?;
        if bound.deserializes() {
            Ok(MethodOutput::Elements(self.decode(&rows)?))
        } else {
            Ok(MethodOutput::Rows(rows))
        }
    }

    /// Call a method on a vertex instance.
    pub fn call_vertex_method(
        &self,
        vertex: &Vertex,
        method: &str,
        args: ScriptArgs,
    ) -> Result<MethodOutput, OgmError> {
        self.call_method(vertex.schema(), method, vertex.eid(), args)
    }

    /// Call a method on an edge instance.
    pub fn call_edge_method(
        &self,
        edge: &Edge,
        method: &str,
        args: ScriptArgs,
    ) -> Result<MethodOutput, OgmError> {
        self.call_method(edge.schema(), method, edge.eid(), args)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn normalize_vid(vid: &str) -> Result<String, OgmError> {
    uuid::Uuid::parse_str(vid)
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| OgmError::Validation(format!("'{vid}' is not a valid vid")))
}

fn saved_eid(element: &impl Model, action: &str) -> Result<ElementId, OgmError> {
    element
        .eid()
        .cloned()
        .ok_or_else(|| OgmError::Structural(format!("can't {action} that haven't been saved")))
}

/// First non-null row.
fn first_row(rows: &[serde_json::Value]) -> Option<&serde_json::Value> {
    rows.iter().find(|row| !row.is_null())
}

fn single_row_id(rows: &[serde_json::Value], what: &str) -> Result<ElementId, OgmError> {
    let [row] = rows else {
        return Err(OgmError::Query(format!(
            "saving '{}' returned {} rows, expected exactly one",
            what,
            rows.len()
        )));
    };
    row.get(ID_KEY)
        .and_then(ElementId::from_json)
        .ok_or_else(|| OgmError::Deserialization(format!("saved '{what}' row has no '{ID_KEY}'")))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use crate::schema::SchemaBuilder;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned responses and records every script.
    #[derive(Default)]
    struct Scripted {
        responses: Mutex<Vec<Vec<serde_json::Value>>>,
        calls: Mutex<Vec<(String, Params)>>,
    }

    impl Scripted {
        fn respond(self, rows: Vec<serde_json::Value>) -> Self {
            self.responses.lock().expect("lock").push(rows);
            self
        }

        fn calls(&self) -> Vec<(String, Params)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl QueryExecutor for Scripted {
        fn execute(&self, script: &str, params: &Params) -> Result<Vec<serde_json::Value>, OgmError> {
            self.calls
                .lock()
                .expect("lock")
                .push((script.to_string(), params.clone()));
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                return Ok(Vec::new());
            }
            Ok(responses.remove(0))
        }
    }

    fn registry() -> Arc<ModelRegistry> {
        let mut registry = ModelRegistry::new();
        registry
            .register(SchemaBuilder::vertex("TestModel").field(FieldDescriptor::integer("count")))
            .expect("vertex");
        registry
            .register(SchemaBuilder::edge("TestEdge"))
            .expect("edge");
        Arc::new(registry)
    }

    const VID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn vertex_row(id: i64, count: i64) -> serde_json::Value {
        json!({"_id": id, "_type": "vertex", "element_type": "test_model", "vid": VID, "count": count})
    }

    #[test]
    fn save_writes_back_eid() {
        let executor = Scripted::default().respond(vec![json!({"_id": 5})]);
        let session = Session::new(executor, registry());
        let mut v = session
            .registry()
            .vertex("test_model")
            .map(|s| Vertex::with_values(s, [("count", 2)]))
            .expect("schema")
            .expect("vertex");

        session.save_vertex(&mut v).expect("save");
        assert_eq!(v.eid(), Some(&ElementId::Int(5)));
        assert!(v.changed_fields().is_empty());
    }

    #[test]
    fn save_requires_exactly_one_row() {
        let executor = Scripted::default().respond(vec![json!({"_id": 1}), json!({"_id": 2})]);
        let session = Session::new(executor, registry());
        let result = session.create_vertex("test_model", [("count", 1)]);
        assert!(matches!(result, Err(OgmError::Query(_))));
    }

    #[test]
    fn delete_unsaved_sends_nothing() {
        let session = Session::new(Scripted::default(), registry());
        let schema = Arc::clone(session.registry().vertex("test_model").expect("schema"));
        let mut v = Vertex::new(&schema).expect("vertex");
        assert!(matches!(
            session.delete_vertex(&mut v),
            Err(OgmError::Structural(_))
        ));
        assert!(session.executor().calls().is_empty());
    }

    #[test]
    fn fetch_checks_multiplicity() {
        let executor = Scripted::default()
            .respond(vec![json!([])])
            .respond(vec![json!([vertex_row(1, 1), vertex_row(2, 2)])])
            .respond(vec![json!([vertex_row(1, 1)])]);
        let session = Session::new(executor, registry());

        assert!(matches!(session.get_vertex(VID), Err(OgmError::NotFound(v)) if v == VID));
        assert!(matches!(
            session.get_vertex(VID),
            Err(OgmError::MultipleObjects(v)) if v == VID
        ));
        let v = session.get_vertex(VID).expect("single");
        assert_eq!(v.get("count").expect("count"), Some(WireValue::Int(1)));
    }

    #[test]
    fn invalid_vid_is_validation_error() {
        let session = Session::new(Scripted::default(), registry());
        assert!(matches!(
            session.get_vertex("not-a-uuid"),
            Err(OgmError::Validation(_))
        ));
        assert!(session.executor().calls().is_empty());
    }

    #[test]
    fn endpoint_resolution_is_cached() {
        let executor = Scripted::default().respond(vec![vertex_row(1, 9)]);
        let session = Session::new(executor, registry());
        let schema = Arc::clone(session.registry().edge("test_edge").expect("schema"));
        let mut edge = Edge::new(&schema, ElementId::Int(1), ElementId::Int(2)).expect("edge");

        let count = session
            .resolve_out_vertex(&mut edge)
            .expect("resolve")
            .get("count")
            .expect("count");
        assert_eq!(count, Some(WireValue::Int(9)));
        session.resolve_out_vertex(&mut edge).expect("cached");
        assert_eq!(session.executor().calls().len(), 1);
        assert!(edge.out_v().is_resolved());
        assert!(!edge.in_v().is_resolved());
    }

    #[test]
    fn edge_by_eid_reads_endpoints() {
        let executor = Scripted::default()
            .respond(vec![json!({"_id": 30, "_type": "edge", "_label": "test_edge", "_outV": 1, "_inV": 2})])
            .respond(vec![]);
        let session = Session::new(executor, registry());

        let edge = session.get_edge_by_eid(&ElementId::Int(30)).expect("edge");
        assert_eq!(edge.out_v().eid(), Some(&ElementId::Int(1)));
        assert_eq!(edge.in_v().eid(), Some(&ElementId::Int(2)));
        assert_eq!(session.executor().calls()[0].1["eid"], json!(30));

        assert!(matches!(
            session.get_edge_by_eid(&ElementId::Int(31)),
            Err(OgmError::NotFound(_))
        ));
    }

    #[test]
    fn edge_methods_receive_the_edge_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("gremlin.groovy"),
            "def weight(eid, factor) {\n  g.e(eid).weight * factor\n}\n",
        )
        .expect("write");

        let mut registry = ModelRegistry::new();
        let schema = registry
            .register(
                SchemaBuilder::edge("Rated")
                    .source_dir(dir.path())
                    .script(crate::binder::ScriptMethod::new("weight")),
            )
            .expect("register");
        let executor = Scripted::default().respond(vec![json!(6)]);
        let session = Session::new(executor, Arc::new(registry));

        let mut edge = Edge::new(&schema, ElementId::Int(1), ElementId::Int(2)).expect("edge");
        edge.set_eid(Some(ElementId::Int(44)));
        let output = session
            .call_edge_method(&edge, "weight", ScriptArgs::new().arg(3))
            .expect("call");

        assert!(matches!(output, MethodOutput::Rows(ref rows) if rows == &vec![json!(6)]));
        let (script, params) = session.executor().calls().remove(0);
        assert_eq!(script, "g.e(eid).weight * factor");
        assert_eq!(params["eid"], json!(44));
        assert_eq!(params["factor"], json!(3));
    }
}
