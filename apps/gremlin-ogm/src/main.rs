//! # gremlin-ogm
//!
//! Command-line entry point for the Rexster object-graph mapper.
//!
//! ## Usage
//!
//! ```bash
//! # Ensure the default key indices exist
//! gremlin-ogm --config ogm.toml bootstrap
//!
//! # Run a script with bound parameters
//! gremlin-ogm exec --script 'g.V("vid", vid).toList()' --params '{"vid": "..."}'
//!
//! # Create Titan types from a spec file
//! gremlin-ogm sync-spec --file types.json --dry-run
//! ```

use clap::Parser;
use gremlin_ogm::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // GREMLIN_OGM_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("GREMLIN_OGM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gremlin_ogm=info,gremlin_ogm_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
