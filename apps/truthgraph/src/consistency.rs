//! # Consistency Checker
//!
//! Runs the three cross-store comparisons against the graph and relational
//! executors, aggregates findings into a [`ConsistencyReport`], and keeps the
//! latest report for readers.
//!
//! ## Run Semantics
//!
//! - The three sub-checks run concurrently, each as its own task bounded by
//!   `CheckerConfig::subcheck_timeout`. A failure, timeout or panic in one
//!   becomes a CRITICAL finding in that category; the other two still
//!   report.
//! - If all three fail, the report's `error` is set. The report is still
//!   stored and returned.
//! - Runs never overlap: a run requested while one is in flight is refused
//!   with `TruthGraphError::CheckInProgress`.
//! - The latest report is swapped in whole at the end of a run. Readers see
//!   either the previous report or the new one, never a partial one.
//! - After each run the derived `HealthSignal` is published on a watch
//!   channel.

use crate::queries::{
    GRAPH_FACT_IDS, GRAPH_FACT_INTEGRITY, GRAPH_RELATIONSHIP_COUNTS, RELATIONAL_FACT_IDS,
};
use crate::store::{GraphExecutor, Params, RelationalExecutor, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use truthgraph_core::primitives::{DEFAULT_SUBCHECK_TIMEOUT_SECS, EXPECTED_RELATIONSHIP_TYPES};
use truthgraph_core::{
    CheckCategory, CheckResults, ConsistencyReport, Finding, HealthSignal, IntegrityRecord,
    TruthGraphError, audit_integrity, audit_relationship_types, reconcile_record_ids,
};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunables for a checker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Bound on each sub-check.
    pub subcheck_timeout: Duration,
    /// Relationship types the graph is expected to contain.
    pub expected_relationship_types: BTreeSet<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            subcheck_timeout: Duration::from_secs(DEFAULT_SUBCHECK_TIMEOUT_SECS),
            expected_relationship_types: EXPECTED_RELATIONSHIP_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }
}

// =============================================================================
// SNAPSHOT VIEW
// =============================================================================

/// What `last_check_results` hands out: `None` for both until the first run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCheckResults {
    pub last_check: Option<DateTime<Utc>>,
    pub results: Option<ConsistencyReport>,
}

// =============================================================================
// CHECKER
// =============================================================================

/// Cross-store consistency checker.
///
/// Cheap to share: wrap in an `Arc` and hand clones to the scheduler and
/// the HTTP layer.
pub struct ConsistencyChecker {
    graph: Arc<dyn GraphExecutor>,
    relational: Arc<dyn RelationalExecutor>,
    config: CheckerConfig,
    run_guard: Mutex<()>,
    latest: RwLock<Option<Arc<ConsistencyReport>>>,
    health: watch::Sender<HealthSignal>,
}

impl std::fmt::Debug for ConsistencyChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistencyChecker")
            .field("config", &self.config)
            .field("health", &*self.health.borrow())
            .finish()
    }
}

impl ConsistencyChecker {
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphExecutor>,
        relational: Arc<dyn RelationalExecutor>,
        config: CheckerConfig,
    ) -> Self {
        let (health, _) = watch::channel(HealthSignal::Unknown);
        Self {
            graph,
            relational,
            config,
            run_guard: Mutex::new(()),
            latest: RwLock::new(None),
            health,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Run every sub-check once and publish the resulting report.
    pub async fn run_all_checks(&self) -> Result<Arc<ConsistencyReport>, TruthGraphError> {
        let Ok(_running) = self.run_guard.try_lock() else {
            tracing::warn!(
                event = "consistency_run_skipped",
                "Consistency check already in progress, skipping"
            );
            return Err(TruthGraphError::CheckInProgress);
        };

        tracing::info!("Starting consistency checks");
        let bound = self.config.subcheck_timeout;
        let expected = self.config.expected_relationship_types.clone();

        let (facts, relationships, integrity) = tokio::join!(
            run_bounded(
                CheckCategory::Facts,
                bound,
                check_facts(Arc::clone(&self.graph), Arc::clone(&self.relational)),
            ),
            run_bounded(
                CheckCategory::Relationships,
                bound,
                check_relationships(Arc::clone(&self.graph), expected),
            ),
            run_bounded(
                CheckCategory::Integrity,
                bound,
                check_integrity(Arc::clone(&self.graph)),
            ),
        );

        let all_failed = facts.failed && relationships.failed && integrity.failed;
        let error = all_failed.then(|| "All consistency sub-checks failed".to_string());
        let checks = CheckResults {
            facts: facts.findings,
            relationships: relationships.findings,
            integrity: integrity.findings,
        };
        let report = Arc::new(ConsistencyReport::new(Utc::now(), checks, error));

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&report));
        self.health.send_replace(report.health());

        let summary = report.summary();
        if summary.critical_issues > 0 {
            tracing::error!(
                total = summary.total_issues,
                critical = summary.critical_issues,
                high = summary.high_severity_issues,
                "Consistency checks found critical issues"
            );
        } else if summary.total_issues > 0 {
            tracing::warn!(
                total = summary.total_issues,
                high = summary.high_severity_issues,
                "Consistency checks found issues"
            );
        } else {
            tracing::info!("Consistency checks passed");
        }

        Ok(report)
    }

    /// The most recent report, without waiting on an in-flight run.
    #[must_use]
    pub fn last_check_results(&self) -> LastCheckResults {
        let latest = self.latest_report();
        LastCheckResults {
            last_check: latest.as_ref().map(|r| r.timestamp()),
            results: latest.map(|r| ConsistencyReport::clone(&r)),
        }
    }

    /// The most recent report as a shared handle.
    #[must_use]
    pub fn latest_report(&self) -> Option<Arc<ConsistencyReport>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to the health signal published after every run.
    #[must_use]
    pub fn subscribe_health(&self) -> watch::Receiver<HealthSignal> {
        self.health.subscribe()
    }

    /// Whether a run is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }
}

// =============================================================================
// SUB-CHECK EXECUTION
// =============================================================================

struct SubcheckOutcome {
    findings: Vec<Finding>,
    failed: bool,
}

impl SubcheckOutcome {
    fn failed(finding: Finding) -> Self {
        Self {
            findings: vec![finding],
            failed: true,
        }
    }
}

/// Run one sub-check as its own task under a time bound.
///
/// The spawned task isolates panics; a timed-out task is aborted.
async fn run_bounded<F>(category: CheckCategory, bound: Duration, check: F) -> SubcheckOutcome
where
    F: Future<Output = Result<Vec<Finding>, StoreError>> + Send + 'static,
{
    let mut task = tokio::spawn(check);
    match tokio::time::timeout(bound, &mut task).await {
        Ok(Ok(Ok(findings))) => SubcheckOutcome {
            findings,
            failed: false,
        },
        Ok(Ok(Err(e))) => {
            tracing::error!(check = %category, error = %e, "Consistency sub-check failed");
            SubcheckOutcome::failed(Finding::check_error(category, e))
        }
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                "panicked"
            } else {
                "was cancelled"
            };
            tracing::error!(check = %category, "Consistency sub-check {}", reason);
            SubcheckOutcome::failed(Finding::check_error(category, format!("task {}", reason)))
        }
        Err(_) => {
            task.abort();
            tracing::error!(
                check = %category,
                bound_ms = bound.as_millis() as u64,
                "Consistency sub-check timed out"
            );
            SubcheckOutcome::failed(Finding::check_timeout(category, bound))
        }
    }
}

async fn check_facts(
    graph: Arc<dyn GraphExecutor>,
    relational: Arc<dyn RelationalExecutor>,
) -> Result<Vec<Finding>, StoreError> {
    let no_params = Params::new();
    let (graph_rows, relational_rows) = tokio::try_join!(
        graph.execute(GRAPH_FACT_IDS, &no_params),
        relational.execute(RELATIONAL_FACT_IDS, &no_params),
    )?;

    let graph_ids = graph_rows
        .iter()
        .map(|r| r.id("id"))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let relational_ids = relational_rows
        .iter()
        .map(|r| r.id("id"))
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(reconcile_record_ids(&graph_ids, &relational_ids))
}

async fn check_relationships(
    graph: Arc<dyn GraphExecutor>,
    expected: BTreeSet<String>,
) -> Result<Vec<Finding>, StoreError> {
    let rows = graph
        .execute(GRAPH_RELATIONSHIP_COUNTS, &Params::new())
        .await?;

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for row in &rows {
        let rel_type = row.id("rel_type")?;
        *counts.entry(rel_type).or_default() += row.count("count")?;
    }

    Ok(audit_relationship_types(&counts, &expected))
}

async fn check_integrity(graph: Arc<dyn GraphExecutor>) -> Result<Vec<Finding>, StoreError> {
    let rows = graph.execute(GRAPH_FACT_INTEGRITY, &Params::new()).await?;

    let records = rows
        .iter()
        .map(|row| {
            Ok(IntegrityRecord {
                id: row.id("id")?,
                confidence: row.number("confidence"),
                text: row.text("text").map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(audit_integrity(&records))
}

// =============================================================================
// TESTS
// =============================================================================
