//! # Connection Configuration
//!
//! Where the Rexster server lives and how to talk to it. Values come from a
//! TOML file, then `GREMLIN_OGM_*` environment variables override them.

use gremlin_ogm_core::OgmError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Rexster's default HTTP port.
pub const DEFAULT_PORT: u16 = 8182;

/// Environment variable names read by [`OgmConfig::apply_env`].
pub const ENV_HOSTS: &str = "GREMLIN_OGM_HOSTS";
pub const ENV_GRAPH: &str = "GREMLIN_OGM_GRAPH";
pub const ENV_USERNAME: &str = "GREMLIN_OGM_USERNAME";
pub const ENV_PASSWORD: &str = "GREMLIN_OGM_PASSWORD";

// =============================================================================
// FILE FORMAT
// =============================================================================

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OgmConfig {
    pub connection: ConnectionConfig,
}

/// The `[connection]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// `"<host>"` or `"<host>:<port>"` entries.
    pub hosts: Vec<String>,
    /// Graph name as configured in rexster.xml.
    pub graph: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Index every vertex field's wire name during bootstrap.
    pub index_all_fields: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: vec![format!("localhost:{DEFAULT_PORT}")],
            graph: "graph".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            index_all_fields: true,
        }
    }
}

impl OgmConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, OgmError> {
        toml::from_str(text).map_err(|e| OgmError::Config(e.to_string()))
    }

    /// Load from `path` if given, else defaults; then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, OgmError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| OgmError::Io(format!("{}: {e}", path.display())))?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        tracing::debug!(hosts = ?config.connection.hosts, graph = %config.connection.graph, "configuration loaded");
        Ok(config)
    }

    /// Override fields from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let conn = &mut self.connection;
        if let Some(hosts) = lookup(ENV_HOSTS) {
            conn.hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(graph) = lookup(ENV_GRAPH) {
            conn.graph = graph;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            conn.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            conn.password = Some(password);
        }
    }
}

impl ConnectionConfig {
    /// Parse every host entry. At least one is required.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, OgmError> {
        let endpoints = self
            .hosts
            .iter()
            .map(|h| Endpoint::parse(h))
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(OgmError::Config("at least one host required".to_string()));
        }
        Ok(endpoints)
    }
}

// =============================================================================
// ENDPOINT
// =============================================================================

/// One Rexster host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// `"host"` gets the default port, `"host:port"` is split; anything
    /// with more colons is rejected.
    pub fn parse(text: &str) -> Result<Self, OgmError> {
        let text = text.trim();
        let parts: Vec<&str> = text.split(':').collect();
        let (host, port) = match parts.as_slice() {
            [host] => (*host, DEFAULT_PORT),
            [host, port] => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| OgmError::Config(format!("Can't parse port in '{text}'")))?;
                (*host, port)
            }
            _ => return Err(OgmError::Config(format!("Can't parse {text}"))),
        };
        if host.is_empty() {
            return Err(OgmError::Config(format!("Can't parse {text}")));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Base URL for this host.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================
