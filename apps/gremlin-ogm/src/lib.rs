//! # gremlin-ogm
//!
//! The network side of the mapper: a blocking Rexster client implementing
//! [`gremlin_ogm_core::QueryExecutor`], connection configuration, key-index
//! bootstrap, Titan type-definition sync and the CLI.
//!
//! ```no_run
//! use gremlin_ogm::{OgmConfig, RexsterClient};
//! use gremlin_ogm_core::{ModelRegistry, Session};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), gremlin_ogm_core::OgmError> {
//! let config = OgmConfig::load(None)?;
//! let client = RexsterClient::new(&config.connection)?;
//! let registry = ModelRegistry::new();
//! gremlin_ogm::bootstrap::prepare_graph(&client, &registry, config.connection.index_all_fields)?;
//! let session = Session::new(client, Arc::new(registry));
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod spec_sync;
pub mod transport;

pub use config::{ConnectionConfig, Endpoint, OgmConfig};
pub use transport::RexsterClient;
