//! # gremlin-ogm-core
//!
//! Object-graph mapping for Rexster-style Gremlin servers - THE MAPPER.
//!
//! Callers declare typed vertex and edge models. Attribute reads and writes,
//! creation and traversal become parameterized Gremlin scripts, and the JSON
//! rows the server returns become typed model instances again.
//!
//! ## Layers
//!
//! - `field` / `value`: typed attributes and their per-instance containers
//! - `schema` / `registry`: model declaration and discriminator lookup
//! - `element`: vertex and edge instances, polymorphic deserialization
//! - `query` / `session`: script generation and the query engine
//! - `groovy` / `binder`: Groovy functions bound as model methods
//!
//! ## Architectural Constraints
//!
//! - Synchronous, no network: the only I/O seam is [`QueryExecutor`]
//! - Values never appear in script text, only as bound parameters
//! - The registry is an explicit value, filled at startup and then shared

// =============================================================================
// MODULES
// =============================================================================

pub mod binder;
pub mod element;
pub mod field;
pub mod groovy;
pub mod primitives;
pub mod query;
pub mod registry;
pub mod schema;
pub mod session;
pub mod types;
pub mod value;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ElementId, OgmError, Params, WireValue};

// =============================================================================
// RE-EXPORTS: Models
// =============================================================================

pub use element::{Edge, Element, EndpointRef, Model, ModelValues, Vertex};
pub use field::{DefaultValue, FieldDescriptor, FieldKind};
pub use registry::ModelRegistry;
pub use schema::{ElementKind, ModelSchema, SchemaBuilder};
pub use value::ValueContainer;

// =============================================================================
// RE-EXPORTS: Query Engine
// =============================================================================

pub use query::{Script, Traversal};
pub use session::{MethodOutput, QueryExecutor, Session};

// =============================================================================
// RE-EXPORTS: Script Methods
// =============================================================================

pub use binder::{BoundScript, ScriptArgs, ScriptLibrary, ScriptMethod};
pub use groovy::ScriptSignature;
