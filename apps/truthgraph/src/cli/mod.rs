//! # TruthGraph CLI Module
//!
//! This module implements the CLI interface for TruthGraph.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and the consistency schedule (default)
//! - `check` - Run every consistency check once and print the report
//! - `gate` - Run the Query Safety Gate on a query string
//! - `validate` - Run an input guard on a single value
//!
//! ## Exit Codes
//!
//! - `0` - success
//! - `1` - the command itself failed (configuration, I/O, store)
//! - `2` - `check` found critical issues, or `gate`/`validate` rejected the input

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use truthgraph_core::TruthGraphError;

use crate::config::AppConfig;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// TruthGraph - fact service
///
/// Keeps the graph store and the relational store honest with each other,
/// and refuses any input it cannot prove safe.
#[derive(Parser, Debug)]
#[command(name = "truthgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON snapshot backing both stores (overrides the configured one)
    #[arg(short, long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides configuration)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run all consistency checks once
    Check,

    /// Check a query against the read-only safety gate
    Gate {
        /// The query text
        query: String,
    },

    /// Validate a single input value
    Validate {
        /// The value to validate
        value: String,

        /// Which guard to apply
        #[arg(short, long, value_enum, default_value = "identifier")]
        kind: ValueKind,

        /// Allow `.` in identifiers
        #[arg(long)]
        relaxed: bool,
    },
}

/// Guards available to `validate`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Identifier,
    FreeText,
    Parameter,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<ExitCode, TruthGraphError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Gate { query }) => Ok(cmd_gate(&query, json_mode)),
        Some(Commands::Validate {
            value,
            kind,
            relaxed,
        }) => Ok(cmd_validate(&value, kind, relaxed, json_mode)),
        Some(Commands::Check) => {
            let config = load_config(cli.config, cli.snapshot)?;
            cmd_check(&config, json_mode).await
        }
        Some(Commands::Server { host, port }) => {
            let mut config = load_config(cli.config, cli.snapshot)?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_server(config).await
        }
        None => {
            // No subcommand - start the server by default
            let config = load_config(cli.config, cli.snapshot)?;
            cmd_server(config).await
        }
    }
}

/// File, then environment, then the `--snapshot` flag.
fn load_config(
    path: Option<PathBuf>,
    snapshot: Option<PathBuf>,
) -> Result<AppConfig, TruthGraphError> {
    let mut config = AppConfig::load(path.as_deref())?;
    if snapshot.is_some() {
        config.snapshot = snapshot;
    }
    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}
