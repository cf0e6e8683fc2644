//! # Embedded Script Binder
//!
//! Turns Groovy function definitions into checked model methods.
//!
//! A model declares a [`ScriptMethod`]; at registration the binder locates
//! the matching definition in the script file and produces a
//! [`BoundScript`]. Calling a bound script maps positional and named
//! arguments onto the definition's parameter list with the same rules a
//! function call would apply, then hands the body and the resulting
//! parameter map to the session.

use crate::groovy::{self, ScriptSignature};
use crate::primitives::DEFAULT_SCRIPT_FILE;
use crate::{ElementId, OgmError, Params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// DECLARATION
// =============================================================================

/// Declaration of a model method backed by a Groovy function.
#[derive(Debug, Clone)]
pub struct ScriptMethod {
    attr_name: String,
    path: Option<PathBuf>,
    method_name: Option<String>,
    is_static: bool,
    default_args: Params,
    deserialize: bool,
}

impl ScriptMethod {
    /// Declare a method exposed under `attr_name`.
    ///
    /// Defaults: file `gremlin.groovy`, function name = `attr_name`,
    /// instance method, raw result rows.
    #[must_use]
    pub fn new(attr_name: impl Into<String>) -> Self {
        Self {
            attr_name: attr_name.into(),
            path: None,
            method_name: None,
            is_static: false,
            default_args: Params::new(),
            deserialize: false,
        }
    }

    /// Script file; relative paths resolve against the model's source directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Name of the function in the script file.
    #[must_use]
    pub fn method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = Some(name.into());
        self
    }

    /// Static methods receive no implicit owner id.
    #[must_use]
    pub const fn static_method(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    #[must_use]
    pub fn default_arg(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.default_args.insert(name.into(), value.into());
        self
    }

    /// Deserialize result rows into model instances instead of returning them raw.
    #[must_use]
    pub const fn deserialize(mut self, deserialize: bool) -> Self {
        self.deserialize = deserialize;
        self
    }

    #[must_use]
    pub fn attr_name(&self) -> &str {
        &self.attr_name
    }

    /// Function name looked up in the script file.
    #[must_use]
    pub fn function_name(&self) -> &str {
        self.method_name.as_deref().unwrap_or(&self.attr_name)
    }

    /// Resolve the script file location.
    #[must_use]
    pub fn resolve_path(&self, source_dir: Option<&Path>) -> PathBuf {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_FILE));
        if path.is_absolute() {
            return path;
        }
        match source_dir {
            Some(dir) => dir.join(path),
            None => path,
        }
    }
}

// =============================================================================
// CALL ARGUMENTS
// =============================================================================

/// Arguments for a bound script call.
#[derive(Debug, Clone, Default)]
pub struct ScriptArgs {
    positional: Vec<serde_json::Value>,
    named: Vec<(String, serde_json::Value)>,
}

impl ScriptArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a named argument.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }
}

// =============================================================================
// BOUND SCRIPT
// =============================================================================

/// A script method resolved against its definition.
#[derive(Debug, Clone)]
pub struct BoundScript {
    attr_name: String,
    path: PathBuf,
    signature: Arc<ScriptSignature>,
    is_static: bool,
    default_args: Params,
    deserialize: bool,
}

impl BoundScript {
    #[must_use]
    pub fn attr_name(&self) -> &str {
        &self.attr_name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.signature.params
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.signature.body
    }

    #[must_use]
    pub fn definition(&self) -> &str {
        &self.signature.definition
    }

    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.is_static
    }

    #[must_use]
    pub const fn deserializes(&self) -> bool {
        self.deserialize
    }

    /// Map call arguments onto the parameter list.
    ///
    /// Instance methods receive the owner's server id as the first positional
    /// argument. Positionals bind in order, named arguments by name, and the
    /// result is merged over the declared defaults.
    pub fn prepare(&self, owner: Option<&ElementId>, args: ScriptArgs) -> Result<Params, OgmError> {
        let mut positional = Vec::with_capacity(args.positional.len() + 1);
        if !self.is_static {
            let id = owner.ok_or_else(|| {
                OgmError::Structural(format!(
                    "{}() is an instance method and needs a saved owner",
                    self.attr_name
                ))
            })?;
            positional.push(id.to_json());
        }
        positional.extend(args.positional);

        let expected = self.signature.params.len();
        let given = positional.len() + args.named.len();
        if given > expected {
            return Err(OgmError::Arity {
                method: self.attr_name.clone(),
                expected,
                given,
            });
        }

        let mut params = self.default_args.clone();
        let mut bound: BTreeSet<&str> = BTreeSet::new();

        for (name, value) in self.signature.params.iter().zip(positional) {
            bound.insert(name);
            params.insert(name.clone(), value);
        }

        for (name, value) in args.named {
            if bound.contains(name.as_str()) {
                return Err(OgmError::DuplicateArgument {
                    method: self.attr_name.clone(),
                    argument: name,
                });
            }
            let Some(param) = self.signature.params.iter().find(|p| **p == name) else {
                return Err(OgmError::UnknownArgument {
                    method: self.attr_name.clone(),
                    argument: name,
                });
            };
            bound.insert(param);
            params.insert(name, value);
        }

        Ok(params)
    }
}

// =============================================================================
// SCRIPT LIBRARY (parse cache)
// =============================================================================

/// Cache of parsed script files, keyed by resolved path.
///
/// Each file is read and scanned once no matter how many methods bind to it.
#[derive(Debug, Default)]
pub struct ScriptLibrary {
    files: BTreeMap<PathBuf, Vec<Arc<ScriptSignature>>>,
}

impl ScriptLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signatures found in `path`, parsing the file on first use.
    pub fn signatures(&mut self, path: &Path) -> Result<&[Arc<ScriptSignature>], OgmError> {
        if !self.files.contains_key(path) {
            let parsed = groovy::parse_file(path)?
                .into_iter()
                .map(Arc::new)
                .collect();
            self.files.insert(path.to_path_buf(), parsed);
        }
        Ok(self.files.get(path).map(Vec::as_slice).unwrap_or_default())
    }

    /// Number of cached files.
    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    /// Bind a method declaration.
    ///
    /// Fails if the file cannot be read, has no definition with the method's
    /// function name, or the definition repeats a parameter name.
    pub fn bind(
        &mut self,
        source_dir: Option<&Path>,
        method: &ScriptMethod,
    ) -> Result<BoundScript, OgmError> {
        let path = method.resolve_path(source_dir);
        let function = method.function_name();

        let signature = self
            .signatures(&path)
            .map_err(|e| OgmError::Binding(format!("{}(): {}", method.attr_name, e)))?
            .iter()
            .find(|sig| sig.name == function)
            .cloned()
            .ok_or_else(|| {
                OgmError::Binding(format!(
                    "the method '{}' wasn't found in {}",
                    function,
                    path.display()
                ))
            })?;

        let mut seen = BTreeSet::new();
        for param in &signature.params {
            if !seen.insert(param.as_str()) {
                return Err(OgmError::Binding(format!(
                    "'{}' defined more than once in arguments of '{}'",
                    param, function
                )));
            }
        }

        tracing::debug!(
            method = %method.attr_name,
            function,
            path = %path.display(),
            params = signature.params.len(),
            "bound script method"
        );

        Ok(BoundScript {
            attr_name: method.attr_name.clone(),
            path,
            signature,
            is_static: method.is_static,
            default_args: method.default_args.clone(),
            deserialize: method.deserialize,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
