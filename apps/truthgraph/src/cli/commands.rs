//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::ValueKind;
use crate::api::{self, AppState, SecurityConfig};
use crate::config::AppConfig;
use crate::consistency::ConsistencyChecker;
use crate::scheduler::spawn_consistency_schedule;
use crate::store::{GraphExecutor, RelationalExecutor, SnapshotStore};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use truthgraph_core::{
    CharsetPolicy, ConsistencyReport, Severity, TruthGraphError, ValidationResult,
    primitives::{DEFAULT_FREE_TEXT_MAX, DEFAULT_FREE_TEXT_MIN},
    sanitize_parameter, validate_free_text, validate_identifier, validate_query,
};

/// Exit status for critical findings and rejected input.
const EXIT_FINDINGS: u8 = 2;

// =============================================================================
// STORE WIRING
// =============================================================================

/// Open the configured snapshot, or an empty one.
fn open_store(config: &AppConfig) -> Result<Arc<SnapshotStore>, TruthGraphError> {
    match &config.snapshot {
        Some(path) => Ok(Arc::new(SnapshotStore::load(path)?)),
        None => {
            tracing::warn!(
                "No snapshot configured (--snapshot or TRUTHGRAPH_SNAPSHOT); both stores are empty"
            );
            Ok(Arc::new(SnapshotStore::default()))
        }
    }
}

fn build_checker(config: &AppConfig, store: &Arc<SnapshotStore>) -> Arc<ConsistencyChecker> {
    let graph: Arc<dyn GraphExecutor> = store.clone();
    let relational: Arc<dyn RelationalExecutor> = store.clone();
    Arc::new(ConsistencyChecker::new(
        graph,
        relational,
        config.checker_config(),
    ))
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and the consistency schedule.
pub async fn cmd_server(config: AppConfig) -> Result<ExitCode, TruthGraphError> {
    let store = open_store(&config)?;
    let checker = build_checker(&config, &store);

    println!("TruthGraph Fact Service Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:           {}", config.host);
    println!("  Port:           {}", config.port);
    println!(
        "  Snapshot:       {}",
        config
            .snapshot
            .as_ref()
            .map_or_else(|| "(empty)".to_string(), |p| p.display().to_string())
    );
    println!("  Check interval: {}s", config.check_interval_secs);
    println!("  Check timeout:  {}s", config.check_timeout_secs);
    println!();
    println!("Endpoints:");
    println!("  GET  /health               - Health check");
    println!("  GET  /api/consistency      - Latest consistency report");
    println!("  POST /api/consistency/run  - Run consistency checks now");
    println!("  POST /api/query            - Gated read-only query");
    println!("  GET  /api/facts            - Search facts");
    println!("  GET  /api/facts/:id        - Get a fact");
    println!("  GET  /api/fact_graph/:id   - Fact history");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let schedule = spawn_consistency_schedule(Arc::clone(&checker), config.schedule_config());

    let graph: Arc<dyn GraphExecutor> = store;
    let state = AppState::new(checker, graph);
    let security = SecurityConfig::from(&config);

    let served = api::run_server(&config.bind_addr(), state, &security, shutdown_signal()).await;
    schedule.shutdown().await;
    served.map(|()| ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Run every consistency check once.
pub async fn cmd_check(config: &AppConfig, json_mode: bool) -> Result<ExitCode, TruthGraphError> {
    let store = open_store(config)?;
    let checker = build_checker(config, &store);
    let report = checker.run_all_checks().await?;

    if json_mode {
        print_json(&*report);
    } else {
        print_report(&report);
    }

    if report.summary().critical_issues > 0 {
        Ok(ExitCode::from(EXIT_FINDINGS))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_report(report: &ConsistencyReport) {
    let summary = report.summary();

    println!("TruthGraph Consistency Report");
    println!("=============================");
    println!("Timestamp: {}", report.timestamp().to_rfc3339());
    println!("Health:    {:?}", report.health());
    println!();
    println!("Total issues:    {}", summary.total_issues);
    println!("Critical:        {}", summary.critical_issues);
    println!("High severity:   {}", summary.high_severity_issues);

    if let Some(error) = report.error() {
        println!();
        println!("Run error: {}", error);
    }

    let findings: Vec<_> = report.checks().iter().collect();
    if findings.is_empty() {
        return;
    }

    println!();
    println!("Findings:");
    for finding in findings {
        let marker = if finding.severity() >= Severity::High {
            "!"
        } else {
            " "
        };
        match finding.subject_id() {
            Some(subject) => println!(
                " {} [{}] {:?} ({}): {}",
                marker,
                finding.severity(),
                finding.kind(),
                subject,
                finding.message()
            ),
            None => println!(
                " {} [{}] {:?}: {}",
                marker,
                finding.severity(),
                finding.kind(),
                finding.message()
            ),
        }
    }
}

// =============================================================================
// GUARD COMMANDS
// =============================================================================

/// Run the Query Safety Gate.
pub fn cmd_gate(query: &str, json_mode: bool) -> ExitCode {
    let result = validate_query(query);
    report_validation("query", &result, json_mode)
}

/// Run one input guard.
pub fn cmd_validate(value: &str, kind: ValueKind, relaxed: bool, json_mode: bool) -> ExitCode {
    let result = match kind {
        ValueKind::Identifier => {
            let policy = if relaxed {
                CharsetPolicy::Relaxed
            } else {
                CharsetPolicy::Strict
            };
            validate_identifier(value, policy)
        }
        ValueKind::FreeText => {
            validate_free_text(value, DEFAULT_FREE_TEXT_MIN, DEFAULT_FREE_TEXT_MAX)
        }
        ValueKind::Parameter => sanitize_parameter(value),
    };
    report_validation("value", &result, json_mode)
}

fn report_validation(subject: &str, result: &ValidationResult, json_mode: bool) -> ExitCode {
    if json_mode {
        print_json(result);
    } else if let Some(value) = result.sanitized_value() {
        println!("ACCEPTED {}: {}", subject, value);
    } else {
        let code = result
            .code()
            .map_or_else(|| "UNKNOWN".to_string(), |c| c.to_string());
        println!(
            "REJECTED {} [{}]: {}",
            subject,
            code,
            result.error().unwrap_or("invalid input")
        );
    }

    if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FINDINGS)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_exit_codes() {
        assert_eq!(
            cmd_gate("MATCH (f:Fact) RETURN f LIMIT 10", true),
            ExitCode::SUCCESS
        );
        assert_eq!(
            cmd_gate("MATCH (f:Fact) DETACH DELETE f", true),
            ExitCode::from(EXIT_FINDINGS)
        );
    }

    #[test]
    fn validate_respects_charset_policy() {
        assert_eq!(
            cmd_validate("fact.42", ValueKind::Identifier, false, true),
            ExitCode::from(EXIT_FINDINGS)
        );
        assert_eq!(
            cmd_validate("fact.42", ValueKind::Identifier, true, true),
            ExitCode::SUCCESS
        );
    }

    #[tokio::test]
    async fn check_on_empty_stores_succeeds() {
        let config = AppConfig::default();
        let code = cmd_check(&config, true).await;
        assert!(matches!(code, Ok(c) if c == ExitCode::SUCCESS));
    }
}
