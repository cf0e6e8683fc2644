//! # Schema Builder
//!
//! Models are declared with an explicit builder that runs once per model
//! type, typically during startup:
//!
//! ```
//! use gremlin_ogm_core::{FieldDescriptor, SchemaBuilder};
//!
//! let person = SchemaBuilder::vertex("Person")
//!     .field(FieldDescriptor::text("name").required(true))
//!     .field(FieldDescriptor::integer("age"))
//!     .build()
//!     .expect("valid schema");
//!
//! assert_eq!(person.discriminator(), "person");
//! assert_eq!(person.field_names().collect::<Vec<_>>(), ["vid", "name", "age"]);
//! ```
//!
//! ## Field Order
//!
//! 1. The `vid` field every vertex carries
//! 2. Fields inherited through `extends`, in the base's order
//! 3. Declared fields: explicit positions ascending, then unpositioned
//!    fields in declaration order
//!
//! A declared field with the same name as an inherited one replaces it in
//! place.

use crate::binder::{BoundScript, ScriptLibrary, ScriptMethod};
use crate::field::FieldDescriptor;
use crate::primitives::{ELEMENT_TYPE_KEY, VID_FIELD};
use crate::OgmError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// ELEMENT KIND
// =============================================================================

/// Whether a model describes vertices or edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a discriminator from a model name.
///
/// An explicit override is lower-cased. Otherwise `_` is inserted between a
/// lower-case letter and a following upper-case letter and the result is
/// lower-cased: `TestModel` becomes `test_model`, `WildDBNames` becomes
/// `wild_dbnames`.
#[must_use]
pub fn type_name(model_name: &str, manual: Option<&str>) -> String {
    if let Some(manual) = manual {
        return manual.to_lowercase();
    }
    let mut out = String::with_capacity(model_name.len() + 4);
    let mut prev_lower = false;
    for ch in model_name.chars() {
        if prev_lower && ch.is_ascii_uppercase() {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase();
        out.extend(ch.to_lowercase());
    }
    out
}

// =============================================================================
// METHOD DECLARATIONS
// =============================================================================

/// A script method declaration together with the directory of the model
/// that declared it. Inherited methods keep their declaring directory.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub method: ScriptMethod,
    pub source_dir: Option<PathBuf>,
}

// =============================================================================
// MODEL SCHEMA
// =============================================================================

/// Immutable description of one model type.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    kind: ElementKind,
    discriminator: String,
    fields: Vec<Arc<FieldDescriptor>>,
    /// field name -> index into `fields`
    field_index: BTreeMap<String, usize>,
    /// wire name -> index into `fields`
    db_map: BTreeMap<String, usize>,
    method_decls: Vec<MethodDecl>,
    methods: BTreeMap<String, Arc<BoundScript>>,
    source_dir: Option<PathBuf>,
}

impl ModelSchema {
    /// Model name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Element type (vertices) or label (edges).
    #[must_use]
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Fields in effective order.
    #[must_use]
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.field_index.get(name).map(|&idx| &self.fields[idx])
    }

    /// Index of a field by field name.
    #[must_use]
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.field_index.get(name).copied()
    }

    /// Index of a field by wire name.
    #[must_use]
    pub fn wire_position(&self, wire_name: &str) -> Option<usize> {
        self.db_map.get(wire_name).copied()
    }

    #[must_use]
    pub fn method_decls(&self) -> &[MethodDecl] {
        &self.method_decls
    }

    /// A bound script method. Only registered schemas have bound methods.
    #[must_use]
    pub fn method(&self, attr_name: &str) -> Option<&Arc<BoundScript>> {
        self.methods.get(attr_name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    #[must_use]
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Bind every declared method through the shared parse cache.
    pub(crate) fn bind_methods(&mut self, library: &mut ScriptLibrary) -> Result<(), OgmError> {
        let mut methods = BTreeMap::new();
        for decl in &self.method_decls {
            let bound = library.bind(decl.source_dir.as_deref(), &decl.method)?;
            methods.insert(decl.method.attr_name().to_string(), Arc::new(bound));
        }
        self.methods = methods;
        Ok(())
    }
}

// =============================================================================
// SCHEMA BUILDER
// =============================================================================

/// Collects the declaration of one model.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    kind: ElementKind,
    manual_name: Option<String>,
    inherited: Vec<Arc<FieldDescriptor>>,
    declared: Vec<FieldDescriptor>,
    inherited_methods: Vec<MethodDecl>,
    declared_methods: Vec<ScriptMethod>,
    source_dir: Option<PathBuf>,
    error: Option<String>,
}

impl SchemaBuilder {
    /// Start a vertex model. The `vid` field is inherited automatically.
    #[must_use]
    pub fn vertex(name: impl Into<String>) -> Self {
        let mut builder = Self::new(name.into(), ElementKind::Vertex);
        builder
            .inherited
            .push(Arc::new(FieldDescriptor::uuid(VID_FIELD)));
        builder
    }

    /// Start an edge model.
    #[must_use]
    pub fn edge(name: impl Into<String>) -> Self {
        Self::new(name.into(), ElementKind::Edge)
    }

    fn new(name: String, kind: ElementKind) -> Self {
        Self {
            name,
            kind,
            manual_name: None,
            inherited: Vec::new(),
            declared: Vec::new(),
            inherited_methods: Vec::new(),
            declared_methods: Vec::new(),
            source_dir: None,
            error: None,
        }
    }

    /// Override the derived element type of a vertex model.
    #[must_use]
    pub fn element_type(mut self, element_type: impl Into<String>) -> Self {
        if self.kind != ElementKind::Vertex {
            self.fail(format!("{}: only vertex models have an element type", self.name));
        }
        self.manual_name = Some(element_type.into());
        self
    }

    /// Override the derived label of an edge model.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        if self.kind != ElementKind::Edge {
            self.fail(format!("{}: only edge models have a label", self.name));
        }
        self.manual_name = Some(label.into());
        self
    }

    /// Inherit fields and script methods from a base model.
    ///
    /// Names already present (from an earlier base) win.
    #[must_use]
    pub fn extends(mut self, base: &ModelSchema) -> Self {
        if base.kind != self.kind {
            self.fail(format!(
                "{} is a {} model and cannot extend the {} model {}",
                self.name, self.kind, base.kind, base.name
            ));
            return self;
        }
        for field in &base.fields {
            if !self.inherited.iter().any(|f| f.name() == field.name()) {
                self.inherited.push(Arc::clone(field));
            }
        }
        for decl in &base.method_decls {
            let name = decl.method.attr_name();
            if !self
                .inherited_methods
                .iter()
                .any(|d| d.method.attr_name() == name)
            {
                self.inherited_methods.push(decl.clone());
            }
        }
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.declared.push(field);
        self
    }

    #[must_use]
    pub fn script(mut self, method: ScriptMethod) -> Self {
        self.declared_methods.push(method);
        self
    }

    /// Directory that relative script paths of this model resolve against.
    #[must_use]
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Assemble the schema. Script methods stay unbound until registration.
    pub fn build(self) -> Result<ModelSchema, OgmError> {
        if let Some(message) = self.error {
            return Err(OgmError::SchemaDefinition(message));
        }
        if self.name.trim().is_empty() {
            return Err(OgmError::SchemaDefinition("model name cannot be empty".into()));
        }

        let discriminator = type_name(&self.name, self.manual_name.as_deref());
        if discriminator.is_empty() {
            return Err(OgmError::SchemaDefinition(format!(
                "{} has an empty {}",
                self.name,
                match self.kind {
                    ElementKind::Vertex => "element type",
                    ElementKind::Edge => "label",
                }
            )));
        }

        let mut declared = self.declared;
        // Stable: unpositioned fields keep declaration order.
        declared.sort_by_key(|f| (f.declared_position().is_none(), f.declared_position()));

        let mut fields = self.inherited;
        for field in declared {
            let field = Arc::new(field);
            match fields.iter().position(|f| f.name() == field.name()) {
                Some(idx) => fields[idx] = field,
                None => fields.push(field),
            }
        }

        let mut field_index = BTreeMap::new();
        let mut db_map = BTreeMap::new();
        for (idx, field) in fields.iter().enumerate() {
            check_field_name(&self.name, field.name())?;
            check_wire_name(&self.name, self.kind, field.wire_name())?;
            if db_map.insert(field.wire_name().to_string(), idx).is_some() {
                return Err(OgmError::SchemaDefinition(format!(
                    "{} defines the column {} more than once",
                    self.name,
                    field.wire_name()
                )));
            }
            field_index.insert(field.name().to_string(), idx);
        }

        let mut method_decls = self.inherited_methods;
        for method in self.declared_methods {
            let decl = MethodDecl {
                method,
                source_dir: self.source_dir.clone(),
            };
            match method_decls
                .iter()
                .position(|d| d.method.attr_name() == decl.method.attr_name())
            {
                Some(idx) => method_decls[idx] = decl,
                None => method_decls.push(decl),
            }
        }

        Ok(ModelSchema {
            name: self.name,
            kind: self.kind,
            discriminator,
            fields,
            field_index,
            db_map,
            method_decls,
            methods: BTreeMap::new(),
            source_dir: self.source_dir,
        })
    }
}

/// Field names become script parameter names, so they must be identifiers.
fn check_field_name(model: &str, name: &str) -> Result<(), OgmError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(OgmError::SchemaDefinition(format!(
            "{model}: '{name}' is not a valid field name"
        )))
    }
}

/// Wire names are spliced into script text inside double quotes.
fn check_wire_name(model: &str, kind: ElementKind, wire: &str) -> Result<(), OgmError> {
    if wire.is_empty()
        || wire
            .chars()
            .any(|c| c == '"' || c == '\\' || c == '$' || c.is_control())
    {
        return Err(OgmError::SchemaDefinition(format!(
            "{model}: '{}' is not a valid column name",
            wire.escape_debug()
        )));
    }
    if kind == ElementKind::Vertex && wire == ELEMENT_TYPE_KEY {
        return Err(OgmError::SchemaDefinition(format!(
            "{model}: the column name '{ELEMENT_TYPE_KEY}' is reserved"
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
