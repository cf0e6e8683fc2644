//! # Model Registry
//!
//! Discriminator to schema lookup used when rows come back from the server.
//!
//! Two append-only tables:
//! - element type -> vertex schema
//! - label -> edge schema
//!
//! The registry is filled through `&mut self` at startup and then frozen
//! into an `Arc` shared by every session. A fresh registry per test keeps
//! tests independent.

use crate::binder::ScriptLibrary;
use crate::schema::{ElementKind, ModelSchema, SchemaBuilder};
use crate::OgmError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered vertex and edge models plus the script parse cache.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    vertices: BTreeMap<String, Arc<ModelSchema>>,
    edges: BTreeMap<String, Arc<ModelSchema>>,
    library: ScriptLibrary,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model, bind its script methods and register it.
    ///
    /// # Errors
    ///
    /// - `SchemaDefinition` if the schema is invalid or its discriminator is
    ///   already registered for the same element kind
    /// - `Binding` if a script method cannot be bound
    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<ModelSchema>, OgmError> {
        let mut schema = builder.build()?;

        let table = match schema.kind() {
            ElementKind::Vertex => &self.vertices,
            ElementKind::Edge => &self.edges,
        };
        if table.contains_key(schema.discriminator()) {
            return Err(OgmError::SchemaDefinition(format!(
                "{} is already registered as a{} {}",
                schema.discriminator(),
                if schema.kind() == ElementKind::Edge { "n" } else { "" },
                schema.kind()
            )));
        }

        schema.bind_methods(&mut self.library)?;

        let schema = Arc::new(schema);
        let table = match schema.kind() {
            ElementKind::Vertex => &mut self.vertices,
            ElementKind::Edge => &mut self.edges,
        };
        table.insert(schema.discriminator().to_string(), Arc::clone(&schema));

        tracing::info!(
            model = %schema.name(),
            kind = %schema.kind(),
            discriminator = %schema.discriminator(),
            fields = schema.fields().len(),
            methods = schema.method_names().count(),
            "registered model"
        );
        Ok(schema)
    }

    /// Vertex schema by element type.
    #[must_use]
    pub fn vertex(&self, element_type: &str) -> Option<&Arc<ModelSchema>> {
        self.vertices.get(element_type)
    }

    /// Edge schema by label.
    #[must_use]
    pub fn edge(&self, label: &str) -> Option<&Arc<ModelSchema>> {
        self.edges.get(label)
    }

    /// Schema by kind and discriminator.
    #[must_use]
    pub fn lookup(&self, kind: ElementKind, discriminator: &str) -> Option<&Arc<ModelSchema>> {
        match kind {
            ElementKind::Vertex => self.vertex(discriminator),
            ElementKind::Edge => self.edge(discriminator),
        }
    }

    pub fn vertex_models(&self) -> impl Iterator<Item = &Arc<ModelSchema>> {
        self.vertices.values()
    }

    /// Number of registered models of both kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct script files parsed so far.
    #[must_use]
    pub fn script_files(&self) -> usize {
        self.library.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
