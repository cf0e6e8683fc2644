//! # Wire Primitives
//!
//! Fixed names shared with the graph server.
//!
//! The discriminator and endpoint keys are load-bearing: an existing graph
//! written by another client of this protocol can only be read back if these
//! match exactly.
//!
//! ## Result Row Shape
//!
//! ```text
//! { "_id": <id>, "_type": "vertex" | "edge",
//!   "element_type": <str>            (vertices)
//!   "_label": <str>, "_inV": <id>, "_outV": <id>   (edges)
//!   <wire field names>: <values> }
//! ```

/// Key holding the server id of an element.
pub const ID_KEY: &str = "_id";

/// Key holding the element kind (`"vertex"` or `"edge"`).
pub const TYPE_KEY: &str = "_type";

/// `_type` value for vertices.
pub const VERTEX_TYPE: &str = "vertex";

/// `_type` value for edges.
pub const EDGE_TYPE: &str = "edge";

/// Vertex property holding the model discriminator.
pub const ELEMENT_TYPE_KEY: &str = "element_type";

/// Key holding an edge's label (its model discriminator).
pub const LABEL_KEY: &str = "_label";

/// Key holding an edge's target vertex id.
pub const IN_V_KEY: &str = "_inV";

/// Key holding an edge's source vertex id.
pub const OUT_V_KEY: &str = "_outV";

/// Field every vertex model inherits: a client-generated UUID.
pub const VID_FIELD: &str = "vid";

/// Suffix appended to a field name to form its script parameter name.
pub const VALUE_PARAM_SUFFIX: &str = "_val";

/// Script file embedded methods are read from when no path is declared.
pub const DEFAULT_SCRIPT_FILE: &str = "gremlin.groovy";

/// Keyword opening a function definition in a script file.
pub const SCRIPT_DEF_KEYWORD: &str = "def";

/// Commits the server-side transaction opened by a script.
pub const COMMIT: &str = "g.stopTransaction(SUCCESS)";

/// Discards whatever transaction the server thread is still holding.
pub const ROLLBACK: &str = "g.stopTransaction(FAILURE)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_keys_are_fixed() {
        assert_eq!(TYPE_KEY, "_type");
        assert_eq!(ELEMENT_TYPE_KEY, "element_type");
        assert_eq!(LABEL_KEY, "_label");
        assert_eq!((IN_V_KEY, OUT_V_KEY), ("_inV", "_outV"));
    }
}
