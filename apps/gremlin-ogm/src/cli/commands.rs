//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::bootstrap;
use crate::config::OgmConfig;
use crate::spec_sync::{self, TypeStatement};
use crate::transport::RexsterClient;
use gremlin_ogm_core::{ModelRegistry, OgmError, Params, QueryExecutor, groovy};
use std::path::Path;

/// Maximum size of a script or spec file read from disk (10 MB).
const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Reject files that are missing, not regular, or oversized before reading.
fn validate_input_file(path: &Path) -> Result<(), OgmError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| OgmError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(OgmError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(OgmError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    Ok(())
}

fn print_json(output: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(output).unwrap_or_default()
    );
}

// =============================================================================
// BOOTSTRAP COMMAND
// =============================================================================

/// Ensure the default key indices exist.
pub fn cmd_bootstrap(config: &OgmConfig, json_mode: bool) -> Result<(), OgmError> {
    let client = RexsterClient::new(&config.connection)?;
    // Models live in the application embedding the mapper, so only the
    // built-in keys are known here.
    let created = bootstrap::prepare_graph(&client, &ModelRegistry::new(), false)?;

    if json_mode {
        print_json(&serde_json::json!({
            "graph": client.graph(),
            "created": created,
        }));
        return Ok(());
    }

    if created.is_empty() {
        println!("All key indices already exist on graph '{}'", client.graph());
    } else {
        for key in &created {
            println!("Created key index: {key}");
        }
    }
    Ok(())
}

// =============================================================================
// EXEC COMMAND
// =============================================================================

/// Run a script and print the result rows.
pub fn cmd_exec(
    config: &OgmConfig,
    json_mode: bool,
    verbose: bool,
    script: &str,
    params: Option<&str>,
) -> Result<(), OgmError> {
    let params: Params = match params {
        Some(text) => serde_json::from_str(text)
            .map_err(|e| OgmError::Validation(format!("--params must be a JSON object: {e}")))?,
        None => Params::new(),
    };

    let client = RexsterClient::new(&config.connection)?;
    if verbose {
        eprintln!("Graph:  {}", client.graph());
        eprintln!("Script: {script}");
    }
    let rows = client.execute(script, &params)?;

    if json_mode {
        print_json(&serde_json::json!({ "results": rows }));
        return Ok(());
    }

    for row in &rows {
        println!("{}", serde_json::to_string(row).unwrap_or_default());
    }
    if verbose {
        eprintln!("{} row(s)", rows.len());
    }
    Ok(())
}

// =============================================================================
// PARSE-SCRIPT COMMAND
// =============================================================================

/// List the functions a Groovy file defines.
pub fn cmd_parse_script(file: &Path, json_mode: bool, verbose: bool) -> Result<(), OgmError> {
    validate_input_file(file)?;
    let signatures = groovy::parse_file(file)?;

    if json_mode {
        let output: Vec<serde_json::Value> = signatures
            .iter()
            .map(|sig| {
                serde_json::json!({
                    "name": sig.name,
                    "params": sig.params,
                    "body": sig.body,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(output));
        return Ok(());
    }

    if signatures.is_empty() {
        println!("No functions found in {}", file.display());
        return Ok(());
    }
    for sig in &signatures {
        println!("{}({})", sig.name, sig.params.join(", "));
        if verbose {
            for line in sig.body.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

// =============================================================================
// SYNC-SPEC COMMAND
// =============================================================================

fn load_statements(file: &Path) -> Result<Vec<TypeStatement>, OgmError> {
    validate_input_file(file)?;
    spec_sync::parse_file(file)
}

/// Print the sync script without contacting the server.
pub fn cmd_sync_spec_dry_run(file: &Path, json_mode: bool) -> Result<(), OgmError> {
    let statements = load_statements(file)?;
    let script = spec_sync::sync_script(&statements);

    if json_mode {
        print_json(&serde_json::json!({
            "statements": statements,
            "script": script,
        }));
        return Ok(());
    }
    println!("{script}");
    Ok(())
}

/// Sync the declared types, or with `check` report which already exist.
pub fn cmd_sync_spec(
    config: &OgmConfig,
    json_mode: bool,
    file: &Path,
    check: bool,
) -> Result<(), OgmError> {
    let statements = load_statements(file)?;
    let client = RexsterClient::new(&config.connection)?;

    if check {
        let existing = spec_sync::existing_types(&client, &statements)?;
        if json_mode {
            print_json(&serde_json::json!({ "existing": existing }));
        } else {
            for statement in &statements {
                let state = if existing.iter().any(|n| n == statement.name()) {
                    "exists"
                } else {
                    "missing"
                };
                println!("{:<32} {state}", statement.name());
            }
        }
        return Ok(());
    }

    spec_sync::sync(&client, &statements)?;
    if json_mode {
        print_json(&serde_json::json!({
            "graph": client.graph(),
            "synced": statements.len(),
        }));
    } else {
        println!(
            "Synced {} type definition(s) to graph '{}'",
            statements.len(),
            client.graph()
        );
    }
    Ok(())
}
