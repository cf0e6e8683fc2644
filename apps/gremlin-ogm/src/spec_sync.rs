//! # Type-Definition Sync
//!
//! A spec file declares Titan property keys and edge labels so that edge
//! primary keys exist before any data is written:
//!
//! ```json
//! [
//!   {"type": "property", "name": "updated_at", "data_type": "Integer", "functional": true},
//!   {"type": "edge", "label": "subscribed_to", "primary_key": "updated_at"}
//! ]
//! ```
//!
//! Each statement renders to one line of type-definition Gremlin; `sync`
//! sends all of them in a single committed script.

use crate::transport::RexsterClient;
use gremlin_ogm_core::primitives::COMMIT;
use gremlin_ogm_core::{OgmError, Params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// One parsed declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypeStatement {
    Property {
        name: String,
        data_type: String,
        functional: bool,
    },
    Edge {
        label: String,
        primary_key: Option<String>,
    },
}

#[derive(Deserialize)]
struct PropertyFields {
    name: String,
    data_type: String,
    #[serde(default)]
    functional: bool,
}

#[derive(Deserialize)]
struct EdgeFields {
    label: String,
    #[serde(default)]
    primary_key: Option<String>,
}

impl TypeStatement {
    /// The type name this statement declares.
    pub fn name(&self) -> &str {
        match self {
            Self::Property { name, .. } => name,
            Self::Edge { label, .. } => label,
        }
    }

    /// Titan type-definition Gremlin for this statement.
    pub fn gremlin(&self) -> String {
        match self {
            Self::Property {
                name,
                data_type,
                functional,
            } => {
                let func = if *functional { "functional()." } else { "" };
                format!(
                    "{name} = g.makeType().name(\"{name}\").dataType({data_type}.class).{func}makePropertyKey()"
                )
            }
            Self::Edge { label, primary_key } => {
                let pk = primary_key
                    .as_deref()
                    .map(|pk| format!("primaryKey({pk})."))
                    .unwrap_or_default();
                format!("{label} = g.makeType().name(\"{label}\").{pk}makeEdgeLabel()")
            }
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a spec file.
pub fn parse_file(path: &Path) -> Result<Vec<TypeStatement>, OgmError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OgmError::Io(format!("{}: {e}", path.display())))?;
    parse_str(&text)
}

/// Parse spec JSON text and validate cross-statement references.
pub fn parse_str(text: &str) -> Result<Vec<TypeStatement>, OgmError> {
    let raw: Vec<Value> =
        serde_json::from_str(text).map_err(|e| OgmError::Deserialization(e.to_string()))?;

    let mut properties = BTreeSet::new();
    let mut statements = Vec::with_capacity(raw.len());
    for stmt in raw {
        let statement = parse_statement(stmt)?;
        if let TypeStatement::Property { name, .. } = &statement {
            if !properties.insert(name.clone()) {
                return Err(OgmError::Validation(format!(
                    "There is already a property called {name}"
                )));
            }
        }
        statements.push(statement);
    }

    let dangling = statements.iter().find_map(|statement| match statement {
        TypeStatement::Edge {
            label,
            primary_key: Some(pk),
        } if !properties.contains(pk) => Some((label, pk)),
        _ => None,
    });
    if let Some((label, pk)) = dangling {
        return Err(OgmError::Validation(format!(
            "Missing primary key {pk} for edge {label}"
        )));
    }
    Ok(statements)
}

fn parse_statement(stmt: Value) -> Result<TypeStatement, OgmError> {
    let kind = match stmt.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => {
            return Err(OgmError::Validation(format!("Invalid `type` value {other}")));
        }
        None => return Err(OgmError::Validation("Type field required".to_string())),
    };
    let malformed = |e: serde_json::Error| OgmError::Deserialization(format!("{kind} statement: {e}"));

    let statement = match kind.as_str() {
        "property" => {
            let p: PropertyFields = serde_json::from_value(stmt).map_err(malformed)?;
            TypeStatement::Property {
                name: p.name,
                data_type: p.data_type,
                functional: p.functional,
            }
        }
        "edge" => {
            let e: EdgeFields = serde_json::from_value(stmt).map_err(malformed)?;
            TypeStatement::Edge {
                label: e.label,
                primary_key: e.primary_key,
            }
        }
        other => return Err(OgmError::Validation(format!("Invalid `type` value {other}"))),
    };
    check_spliced(&statement)?;
    Ok(statement)
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Names and data types end up in script text, not parameters.
fn check_spliced(statement: &TypeStatement) -> Result<(), OgmError> {
    let (what, value) = match statement {
        TypeStatement::Property { name, .. } if !is_ident(name) => ("property name", name),
        TypeStatement::Property { data_type, .. } if !data_type.split('.').all(is_ident) => {
            ("data type", data_type)
        }
        TypeStatement::Edge { label, .. } if !is_ident(label) => ("edge label", label),
        TypeStatement::Edge {
            primary_key: Some(pk),
            ..
        } if !is_ident(pk) => ("primary key", pk),
        _ => return Ok(()),
    };
    Err(OgmError::Validation(format!(
        "{what} '{value}' is not an identifier"
    )))
}

// =============================================================================
// SERVER CALLS
// =============================================================================

/// The whole sync script: one definition per line, then a commit.
pub fn sync_script(statements: &[TypeStatement]) -> String {
    let mut script = String::new();
    for statement in statements {
        script.push_str(&statement.gremlin());
        script.push('\n');
    }
    script.push_str(COMMIT);
    script
}

/// Create every declared type on the server.
pub fn sync(client: &RexsterClient, statements: &[TypeStatement]) -> Result<(), OgmError> {
    let script = sync_script(statements);
    client.execute_script(&script, &Params::new(), true)?;
    tracing::info!(statements = statements.len(), graph = client.graph(), "type definitions synced");
    Ok(())
}

const EXISTING_TYPES: &str = "names.findAll{ g.getType(it) != null }";

/// Declared names that already exist as types on the server.
pub fn existing_types(
    client: &RexsterClient,
    statements: &[TypeStatement],
) -> Result<Vec<String>, OgmError> {
    let names: Vec<Value> = statements
        .iter()
        .map(|s| Value::String(s.name().to_string()))
        .collect();
    let mut params = Params::new();
    params.insert("names".to_string(), Value::Array(names));

    let rows = client.execute_script(EXISTING_TYPES, &params, true)?;
    rows.into_iter()
        .map(|row| match row {
            Value::String(name) => Ok(name),
            other => Err(OgmError::Deserialization(format!(
                "expected a type name, got {other}"
            ))),
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
