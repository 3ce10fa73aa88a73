//! # Consistency Model
//!
//! Findings, severities and reports produced by cross-store reconciliation.
//!
//! ## Invariants
//!
//! - A `Finding`'s severity comes from `severity_for` at construction and
//!   is never re-derived.
//! - A `ConsistencyReport`'s summary is a cached projection of its check
//!   arrays, always computed from scratch by `ReportSummary::recount`.
//! - Reports are immutable; a new run produces a new report.

pub mod detect;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// SEVERITY POLICY
// =============================================================================

/// What a finding reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    /// Present in the graph store, absent from the relational store.
    OrphanedGraphRecord,
    /// Present in the relational store, not yet mirrored into the graph.
    MissingGraphRecord,
    /// A relationship type outside the expected schema.
    UnexpectedRelationshipType,
    /// A confidence score outside `[0, 1]`.
    InvalidConfidence,
    /// A required text field that is missing or blank.
    MissingRequiredField,
    /// A sub-check failed to execute.
    ConsistencyCheckError,
    /// A sub-check exceeded its time bound.
    ConsistencyCheckTimeout,
}

impl FindingKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::OrphanedGraphRecord,
        Self::MissingGraphRecord,
        Self::UnexpectedRelationshipType,
        Self::InvalidConfidence,
        Self::MissingRequiredField,
        Self::ConsistencyCheckError,
        Self::ConsistencyCheckTimeout,
    ];
}

/// How urgently a finding needs attention.
///
/// Ordered so that `Critical` is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// The severity policy table.
///
/// The graph store is a derived view: an orphaned graph record means a
/// write skipped the canonical store (HIGH), while a missing mirror is
/// indexing lag that self-heals (MEDIUM). Out-of-range confidence is an
/// upstream computation bug (HIGH). A check that cannot run is CRITICAL.
#[must_use]
pub const fn severity_for(kind: FindingKind) -> Severity {
    match kind {
        FindingKind::OrphanedGraphRecord => Severity::High,
        FindingKind::MissingGraphRecord => Severity::Medium,
        FindingKind::UnexpectedRelationshipType => Severity::Medium,
        FindingKind::InvalidConfidence => Severity::High,
        FindingKind::MissingRequiredField => Severity::Medium,
        FindingKind::ConsistencyCheckError => Severity::Critical,
        FindingKind::ConsistencyCheckTimeout => Severity::Critical,
    }
}

// =============================================================================
// FINDING
// =============================================================================

/// One detected inconsistency or integrity violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    kind: FindingKind,
    severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_id: Option<String>,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
}

impl Finding {
    /// Create a finding; severity is taken from the policy table.
    #[must_use]
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: severity_for(kind),
            subject_id: None,
            message: message.into(),
            count: None,
        }
    }

    /// Attach the identifier the finding is about.
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Attach a count (e.g. edges of an unexpected type).
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// A CRITICAL finding for a sub-check that failed to execute.
    #[must_use]
    pub fn check_error(check: CheckCategory, error: impl fmt::Display) -> Self {
        Self::new(
            FindingKind::ConsistencyCheckError,
            format!("{} check failed: {}", check, error),
        )
    }

    /// A CRITICAL finding for a sub-check that exceeded its time bound.
    #[must_use]
    pub fn check_timeout(check: CheckCategory, bound: Duration) -> Self {
        Self::new(
            FindingKind::ConsistencyCheckTimeout,
            format!("{} check exceeded {}ms time bound", check, bound.as_millis()),
        )
    }

    #[must_use]
    pub fn kind(&self) -> FindingKind {
        self.kind
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Whether this finding records a failed or timed-out check rather than
    /// a data problem.
    #[must_use]
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self.kind,
            FindingKind::ConsistencyCheckError | FindingKind::ConsistencyCheckTimeout
        )
    }
}

// =============================================================================
// CHECK RESULTS
// =============================================================================

/// The three independent comparisons of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Facts,
    Relationships,
    Integrity,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Facts => "facts",
            Self::Relationships => "relationships",
            Self::Integrity => "integrity",
        };
        f.write_str(name)
    }
}

/// Findings grouped by the check that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResults {
    pub facts: Vec<Finding>,
    pub relationships: Vec<Finding>,
    pub integrity: Vec<Finding>,
}

impl CheckResults {
    /// Findings of one category.
    #[must_use]
    pub fn category(&self, check: CheckCategory) -> &[Finding] {
        match check {
            CheckCategory::Facts => &self.facts,
            CheckCategory::Relationships => &self.relationships,
            CheckCategory::Integrity => &self.integrity,
        }
    }

    /// All findings across categories.
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.facts
            .iter()
            .chain(self.relationships.iter())
            .chain(self.integrity.iter())
    }
}

/// Cached counts over a report's findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_issues: usize,
    pub critical_issues: usize,
    pub high_severity_issues: usize,
}

impl ReportSummary {
    /// Count from scratch.
    #[must_use]
    pub fn recount(checks: &CheckResults) -> Self {
        checks.iter().fold(Self::default(), |mut acc, finding| {
            acc.total_issues += 1;
            match finding.severity() {
                Severity::Critical => acc.critical_issues += 1,
                Severity::High => acc.high_severity_issues += 1,
                Severity::Medium | Severity::Low => {}
            }
            acc
        })
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Coarse health derived from a report, pushed to health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthSignal {
    /// No run has completed yet.
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Critical,
}

/// The result of one consistency run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    timestamp: DateTime<Utc>,
    checks: CheckResults,
    summary: ReportSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ConsistencyReport {
    /// Assemble a report, computing the summary from `checks`.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, checks: CheckResults, error: Option<String>) -> Self {
        let summary = ReportSummary::recount(&checks);
        Self {
            timestamp,
            checks,
            summary,
            error,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn checks(&self) -> &CheckResults {
        &self.checks
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    /// Run-level failure, when the run could not complete normally.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the cached summary matches a fresh recount.
    #[must_use]
    pub fn summary_is_consistent(&self) -> bool {
        self.summary == ReportSummary::recount(&self.checks)
    }

    /// Health derived from the findings.
    #[must_use]
    pub fn health(&self) -> HealthSignal {
        if self.error.is_some() || self.summary.critical_issues > 0 {
            HealthSignal::Critical
        } else if self.summary.high_severity_issues > 0 {
            HealthSignal::Degraded
        } else {
            HealthSignal::Healthy
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_policy_table() {
        assert_eq!(severity_for(FindingKind::OrphanedGraphRecord), Severity::High);
        assert_eq!(severity_for(FindingKind::MissingGraphRecord), Severity::Medium);
        assert_eq!(
            severity_for(FindingKind::UnexpectedRelationshipType),
            Severity::Medium
        );
        assert_eq!(severity_for(FindingKind::InvalidConfidence), Severity::High);
        assert_eq!(severity_for(FindingKind::MissingRequiredField), Severity::Medium);
        assert_eq!(severity_for(FindingKind::ConsistencyCheckError), Severity::Critical);
        assert_eq!(severity_for(FindingKind::ConsistencyCheckTimeout), Severity::Critical);
    }

    #[test]
    fn finding_takes_severity_from_policy() {
        for kind in FindingKind::ALL {
            assert_eq!(Finding::new(kind, "x").severity(), severity_for(kind));
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn summary_recounts_from_checks() {
        let checks = CheckResults {
            facts: vec![
                Finding::new(FindingKind::OrphanedGraphRecord, "a").with_subject("1"),
                Finding::new(FindingKind::MissingGraphRecord, "b").with_subject("2"),
            ],
            relationships: vec![Finding::check_error(CheckCategory::Relationships, "down")],
            integrity: vec![],
        };
        let report = ConsistencyReport::new(Utc::now(), checks, None);

        assert_eq!(report.summary().total_issues, 3);
        assert_eq!(report.summary().critical_issues, 1);
        assert_eq!(report.summary().high_severity_issues, 1);
        assert!(report.summary_is_consistent());
        assert_eq!(report.health(), HealthSignal::Critical);
    }

    #[test]
    fn health_levels() {
        let empty = ConsistencyReport::new(Utc::now(), CheckResults::default(), None);
        assert_eq!(empty.health(), HealthSignal::Healthy);

        let high = ConsistencyReport::new(
            Utc::now(),
            CheckResults {
                integrity: vec![Finding::new(FindingKind::InvalidConfidence, "c")],
                ..CheckResults::default()
            },
            None,
        );
        assert_eq!(high.health(), HealthSignal::Degraded);

        let errored = ConsistencyReport::new(
            Utc::now(),
            CheckResults::default(),
            Some("stores unavailable".to_string()),
        );
        assert_eq!(errored.health(), HealthSignal::Critical);
    }

    #[test]
    fn timeout_finding_names_bound() {
        let finding = Finding::check_timeout(CheckCategory::Integrity, Duration::from_millis(1500));
        assert_eq!(finding.severity(), Severity::Critical);
        assert!(finding.is_check_failure());
        assert_eq!(finding.message(), "integrity check exceeded 1500ms time bound");
    }

    #[test]
    fn finding_serializes_kind_and_severity() {
        let finding = Finding::new(FindingKind::MissingGraphRecord, "lag").with_subject("f9");
        let json = serde_json::to_value(&finding).expect("ser");
        assert_eq!(json["kind"], "MISSING_GRAPH_RECORD");
        assert_eq!(json["severity"], "MEDIUM");
        assert_eq!(json["subjectId"], "f9");
    }
}
