//! Key-index bootstrap.
//!
//! Vertex lookups go through `g.V(key, value)`, which is only fast when the
//! key is indexed. `vid` and `element_type` are always indexed; with
//! `index_all_fields` every wire name of every registered vertex model is too.

use crate::transport::RexsterClient;
use gremlin_ogm_core::primitives::{ELEMENT_TYPE_KEY, VID_FIELD};
use gremlin_ogm_core::{ModelRegistry, OgmError, Params};
use std::collections::BTreeSet;

const INDEXED_KEYS: &str = "g.getIndexedKeys(Vertex.class)";
const CREATE_KEY_INDEX: &str = "g.createKeyIndex(keyname, Vertex.class); g.stopTransaction(SUCCESS)";

/// Create a vertex key index unless it already exists. Returns whether one
/// was created.
pub fn ensure_key_index(client: &RexsterClient, name: &str) -> Result<bool, OgmError> {
    let existing = client.execute_script(INDEXED_KEYS, &Params::new(), true)?;
    if existing.iter().any(|key| key.as_str() == Some(name)) {
        return Ok(false);
    }

    let mut params = Params::new();
    params.insert("keyname".to_string(), name.into());
    // Index creation cannot run inside an open transaction.
    client.execute_script(CREATE_KEY_INDEX, &params, false)?;
    tracing::info!(key = name, "created key index");
    Ok(true)
}

/// Every key [`prepare_graph`] makes sure is indexed.
pub fn index_keys(registry: &ModelRegistry, index_all_fields: bool) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = [VID_FIELD, ELEMENT_TYPE_KEY]
        .into_iter()
        .map(String::from)
        .collect();
    if index_all_fields {
        for schema in registry.vertex_models() {
            keys.extend(schema.fields().iter().map(|f| f.wire_name().to_string()));
        }
    }
    keys
}

/// Ensure all indices exist. Returns the keys that had to be created.
pub fn prepare_graph(
    client: &RexsterClient,
    registry: &ModelRegistry,
    index_all_fields: bool,
) -> Result<Vec<String>, OgmError> {
    let mut created = Vec::new();
    for key in index_keys(registry, index_all_fields) {
        if ensure_key_index(client, &key)? {
            created.push(key);
        }
    }
    Ok(created)
}
