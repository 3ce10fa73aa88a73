//! # TruthGraph Fact Service
//!
//! The main binary for TruthGraph.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) with guarded fact endpoints
//! - Consistency Checker reconciling the graph and relational stores
//! - CLI interface for one-shot audits and guard checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/truthgraph (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │    Scheduler     │   │
//! │  │  (clap)     │    │   (axum)    │    │  (tokio timers)  │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                 ┌─────────────────────┐                        │
//! │                 │   truthgraph-core   │                        │
//! │                 │     (THE LOGIC)     │                        │
//! │                 └─────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server over a snapshot
//! truthgraph --snapshot stores.json server --host 0.0.0.0 --port 8080
//!
//! # One-shot audit
//! truthgraph --snapshot stores.json check --json-mode
//!
//! # Guard checks
//! truthgraph gate "MATCH (f:Fact) RETURN f LIMIT 10"
//! truthgraph validate fact-42 --kind identifier
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use truthgraph::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    init_tracing(cli.verbose);

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    match cli::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// TRUTHGRAPH_LOG_FORMAT=json enables machine-parseable output.
fn init_tracing(verbose: bool) {
    let log_format = std::env::var("TRUTHGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if verbose {
        "truthgraph=debug,truthgraph_core=debug,tower_http=debug"
    } else {
        "truthgraph=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Print the TruthGraph startup banner.
fn print_banner() {
    println!(
        r#"
  ████████╗██████╗ ██╗   ██╗████████╗██╗  ██╗
  ╚══██╔══╝██╔══██╗██║   ██║╚══██╔══╝██║  ██║
     ██║   ██████╔╝██║   ██║   ██║   ███████║
     ██║   ██╔══██╗██║   ██║   ██║   ██╔══██║
     ██║   ██║  ██║╚██████╔╝   ██║   ██║  ██║
     ╚═╝   ╚═╝  ╚═╝ ╚═════╝    ╚═╝   ╚═╝  ╚═╝  GRAPH

  Fact Service v{}

  Verify Explicitly • Fail Closed
"#,
        env!("CARGO_PKG_VERSION")
    );
}
