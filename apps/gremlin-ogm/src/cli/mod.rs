//! # gremlin-ogm CLI Module
//!
//! Operational commands against a live Rexster server.
//!
//! ## Available Commands
//!
//! - `bootstrap` - Ensure the default vertex key indices exist
//! - `exec` - Run a raw Gremlin script with JSON parameters
//! - `parse-script` - List the functions a Groovy file defines
//! - `sync-spec` - Create Titan types declared in a spec file

mod commands;

use crate::config::OgmConfig;
use clap::{Parser, Subcommand};
use gremlin_ogm_core::OgmError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// gremlin-ogm - object-graph mapping for Rexster
///
/// Talks to the server configured in the TOML file given by `--config`,
/// overridden by GREMLIN_OGM_* environment variables.
#[derive(Parser, Debug)]
#[command(name = "gremlin-ogm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the connection configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure the vid and element_type key indices exist
    Bootstrap,

    /// Execute a Gremlin script
    Exec {
        /// Script text
        #[arg(short, long)]
        script: String,

        /// Bound parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// List the functions defined in a Groovy file
    ParseScript {
        /// Path to the Groovy file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create the property keys and edge labels declared in a spec file
    SyncSpec {
        /// Path to the JSON spec file
        #[arg(short, long)]
        file: PathBuf,

        /// Print the generated script without sending it
        #[arg(long)]
        dry_run: bool,

        /// Report which declared types already exist instead of syncing
        #[arg(long, conflicts_with = "dry_run")]
        check: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), OgmError> {
    let json_mode = cli.json_mode;
    let verbose = cli.verbose;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::ParseScript { file } => cmd_parse_script(&file, json_mode, verbose),
        Commands::SyncSpec {
            file,
            dry_run: true,
            ..
        } => cmd_sync_spec_dry_run(&file, json_mode),
        Commands::SyncSpec { file, check, .. } => {
            cmd_sync_spec(&OgmConfig::load(config_path)?, json_mode, &file, check)
        }
        Commands::Bootstrap => cmd_bootstrap(&OgmConfig::load(config_path)?, json_mode),
        Commands::Exec { script, params } => cmd_exec(
            &OgmConfig::load(config_path)?,
            json_mode,
            verbose,
            &script,
            params.as_deref(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gremlin-ogm",
            "exec",
            "--script",
            "g.V.count()",
            "--json-mode",
            "-c",
            "ogm.toml",
        ])
        .expect("parse");
        assert!(cli.json_mode);
        assert_eq!(cli.config, Some(PathBuf::from("ogm.toml")));
        assert!(matches!(cli.command, Commands::Exec { params: None, .. }));
    }

    #[test]
    fn dry_run_and_check_conflict() {
        let result = Cli::try_parse_from([
            "gremlin-ogm",
            "sync-spec",
            "--file",
            "types.json",
            "--dry-run",
            "--check",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["gremlin-ogm"]).is_err());
    }
}
