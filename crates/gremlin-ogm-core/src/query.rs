//! # Script Generation
//!
//! Builds the Gremlin scripts the session sends to the server.
//!
//! Only two kinds of text are ever spliced into a script:
//! - wire field names from registered schemas (validated at build time)
//! - traversal verbs from the closed [`Traversal`] enum
//!
//! Every value travels as a bound parameter. Field values are bound as
//! `<field>_val`.

use crate::element::{Edge, Model, Vertex};
use crate::primitives::{COMMIT, ELEMENT_TYPE_KEY, VALUE_PARAM_SUFFIX};
use crate::{ElementId, OgmError, Params};

/// Script text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    text: String,
    params: Params,
}

// =============================================================================
// TRAVERSAL VERBS
// =============================================================================

/// One-step traversals from a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Traversal {
    /// Adjacent vertices over outgoing edges.
    Out,
    /// Adjacent vertices over incoming edges.
    In,
    /// Adjacent vertices in either direction.
    Both,
    /// Outgoing edges.
    OutE,
    /// Incoming edges.
    InE,
    /// Edges in either direction.
    BothE,
}

impl Traversal {
    /// Gremlin step name.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
            Self::Both => "both",
            Self::OutE => "outE",
            Self::InE => "inE",
            Self::BothE => "bothE",
        }
    }
}

// =============================================================================
// SCRIPT CONSTRUCTION
// =============================================================================

impl Script {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    /// Script with pre-built parameters (embedded method calls).
    #[must_use]
    pub fn with_params(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    fn line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    fn bind(&mut self, name: &str, value: serde_json::Value) {
        self.params.insert(name.to_string(), value);
    }

    /// `<target>.setProperty` for every set field; `removeProperty` for unset
    /// fields of existing elements.
    fn field_properties(&mut self, target: &str, element: &impl Model) {
        let existing = !element.is_new();
        for container in element.values().containers() {
            let field = container.descriptor();
            match container.get() {
                Some(value) => {
                    let param = format!("{}{}", field.name(), VALUE_PARAM_SUFFIX);
                    self.line(&format!(
                        "{target}.setProperty(\"{}\", {param})",
                        field.wire_name()
                    ));
                    self.bind(&param, field.to_wire(Some(&value)));
                }
                None if existing => {
                    self.line(&format!("{target}.removeProperty(\"{}\")", field.wire_name()));
                }
                None => {}
            }
        }
    }

    /// Insert or update a validated vertex and return it.
    #[must_use]
    pub fn save_vertex(vertex: &Vertex) -> Self {
        let mut script = Self::new("");
        match vertex.eid() {
            None => script.line("v = g.addVertex()"),
            Some(eid) => {
                script.line("v = g.v(eid)");
                script.bind("eid", eid.to_json());
            }
        }
        script.line(&format!(
            "v.setProperty(\"{ELEMENT_TYPE_KEY}\", {ELEMENT_TYPE_KEY})"
        ));
        script.bind(ELEMENT_TYPE_KEY, vertex.element_type().into());
        script.field_properties("v", vertex);
        script.line(COMMIT);
        script.line("g.getVertex(v)");
        script
    }

    /// Insert or update a validated edge and return it.
    ///
    /// New edges need endpoint ids; call `validate()` first.
    pub fn save_edge(edge: &Edge) -> Result<Self, OgmError> {
        let mut script = Self::new("");
        match edge.eid() {
            None => {
                let out_eid = endpoint_id(edge.out_v().eid(), "out")?;
                let in_eid = endpoint_id(edge.in_v().eid(), "in")?;
                script.line("outV = g.v(out_eid)");
                script.line("inV = g.v(in_eid)");
                script.line("e = g.addEdge(outV, inV, label)");
                script.bind("out_eid", out_eid.to_json());
                script.bind("in_eid", in_eid.to_json());
                script.bind("label", edge.label().into());
            }
            Some(eid) => {
                script.line("e = g.e(eid)");
                script.bind("eid", eid.to_json());
            }
        }
        script.field_properties("e", edge);
        script.line(COMMIT);
        script.line("g.e(e.id)");
        Ok(script)
    }

    /// Batched lookup: one result list per requested vid, in request order.
    #[must_use]
    pub fn fetch_vertices(vids: &[String]) -> Self {
        let mut script = Self::new("vids.collect{g.V(\"vid\", it).toList()}");
        script.bind(
            "vids",
            serde_json::Value::Array(vids.iter().cloned().map(serde_json::Value::String).collect()),
        );
        script
    }

    #[must_use]
    pub fn vertex_by_eid(eid: &ElementId) -> Self {
        let mut script = Self::new("g.v(eid)");
        script.bind("eid", eid.to_json());
        script
    }

    #[must_use]
    pub fn edge_by_eid(eid: &ElementId) -> Self {
        let mut script = Self::new("g.e(eid)");
        script.bind("eid", eid.to_json());
        script
    }

    #[must_use]
    pub fn delete_vertex(eid: &ElementId) -> Self {
        let mut script = Self::new("g.removeVertex(g.v(eid))");
        script.line(COMMIT);
        script.bind("eid", eid.to_json());
        script
    }

    #[must_use]
    pub fn delete_edge(eid: &ElementId) -> Self {
        let mut script = Self::new("g.removeEdge(g.e(eid))");
        script.line(COMMIT);
        script.bind("eid", eid.to_json());
        script
    }

    /// `g.v(eid).<verb>(lbl)`, or `<verb>()` without a label filter.
    #[must_use]
    pub fn vertex_traversal(eid: &ElementId, step: Traversal, label: Option<&str>) -> Self {
        let mut script = match label {
            Some(label) => {
                let mut script = Self::new(format!("g.v(eid).{}(lbl)", step.verb()));
                script.bind("lbl", label.into());
                script
            }
            None => Self::new(format!("g.v(eid).{}()", step.verb())),
        };
        script.bind("eid", eid.to_json());
        script
    }
}

fn endpoint_id<'a>(eid: Option<&'a ElementId>, which: &str) -> Result<&'a ElementId, OgmError> {
    eid.ok_or_else(|| {
        OgmError::Validation(format!("{which} vertex must be saved before saving new edges"))
    })
}

// =============================================================================
// TESTS
// =============================================================================
