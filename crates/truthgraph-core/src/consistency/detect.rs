//! # Detectors
//!
//! Pure comparison functions behind each consistency check. They take data
//! already fetched from the stores and return findings; fetching, timing and
//! failure handling belong to the caller.

use super::{Finding, FindingKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// FACT EXISTENCE RECONCILIATION
// =============================================================================

/// Compare the record identifiers held by each store.
///
/// Graph-only ids are `ORPHANED_GRAPH_RECORD`; relational-only ids are
/// `MISSING_GRAPH_RECORD`. Output is ordered by kind, then id.
pub fn reconcile_record_ids(
    graph_ids: &BTreeSet<String>,
    relational_ids: &BTreeSet<String>,
) -> Vec<Finding> {
    let orphaned = graph_ids.difference(relational_ids).map(|id| {
        Finding::new(
            FindingKind::OrphanedGraphRecord,
            format!("Fact {} exists in the graph store but not in the relational store", id),
        )
        .with_subject(id.clone())
    });

    let missing = relational_ids.difference(graph_ids).map(|id| {
        Finding::new(
            FindingKind::MissingGraphRecord,
            format!("Fact {} exists in the relational store but is not mirrored in the graph", id),
        )
        .with_subject(id.clone())
    });

    orphaned.chain(missing).collect()
}

// =============================================================================
// RELATIONSHIP SHAPE AUDIT
// =============================================================================

/// Flag relationship types outside the expected set.
///
/// One-sided: an expected type with no edges is not reported. This is a
/// schema-drift alarm, not a completeness check.
pub fn audit_relationship_types(
    counts: &BTreeMap<String, u64>,
    expected: &BTreeSet<String>,
) -> Vec<Finding> {
    counts
        .iter()
        .filter(|(rel_type, _)| !expected.contains(*rel_type))
        .map(|(rel_type, count)| {
            Finding::new(
                FindingKind::UnexpectedRelationshipType,
                format!("Unexpected relationship type {} ({} edges)", rel_type, count),
            )
            .with_subject(rel_type.clone())
            .with_count(*count)
        })
        .collect()
}

// =============================================================================
// VALUE INTEGRITY AUDIT
// =============================================================================

/// The fields of a record the integrity audit inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub id: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Whether a confidence score lies in `[0, 1]`. NaN does not.
#[must_use]
pub fn confidence_in_range(confidence: f64) -> bool {
    (0.0..=1.0).contains(&confidence)
}

/// Flag out-of-range confidence and missing or blank required text.
///
/// A record may produce both findings.
pub fn audit_integrity(records: &[IntegrityRecord]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for record in records {
        if let Some(confidence) = record.confidence
            && !confidence_in_range(confidence)
        {
            findings.push(
                Finding::new(
                    FindingKind::InvalidConfidence,
                    format!(
                        "Fact {} has confidence {} outside [0, 1]",
                        record.id, confidence
                    ),
                )
                .with_subject(record.id.clone()),
            );
        }
        let blank = record.text.as_deref().is_none_or(|t| t.trim().is_empty());
        if blank {
            findings.push(
                Finding::new(
                    FindingKind::MissingRequiredField,
                    format!("Fact {} has no statement text", record.id),
                )
                .with_subject(record.id.clone()),
            );
        }
    }
    findings
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::Severity;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn identical_sets_reconcile_clean() {
        let a = ids(&["1", "2", "3"]);
        assert!(reconcile_record_ids(&a, &a).is_empty());
    }

    #[test]
    fn reconcile_reports_both_directions() {
        let graph = ids(&["1", "2", "9"]);
        let relational = ids(&["1", "2", "3"]);
        let findings = reconcile_record_ids(&graph, &relational);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind(), FindingKind::OrphanedGraphRecord);
        assert_eq!(findings[0].subject_id(), Some("9"));
        assert_eq!(findings[0].severity(), Severity::High);
        assert_eq!(findings[1].kind(), FindingKind::MissingGraphRecord);
        assert_eq!(findings[1].subject_id(), Some("3"));
        assert_eq!(findings[1].severity(), Severity::Medium);
    }

    #[test]
    fn relationship_audit_is_one_sided() {
        let expected = ids(&["ASSERTED", "CONTRADICTS"]);
        let mut counts = BTreeMap::new();
        counts.insert("ASSERTED".to_string(), 10);
        counts.insert("LIKES".to_string(), 4);

        let findings = audit_relationship_types(&counts, &expected);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subject_id(), Some("LIKES"));
        assert_eq!(findings[0].count(), Some(4));
    }

    #[test]
    fn integrity_flags_range_and_blank_text() {
        let records = vec![
            IntegrityRecord {
                id: "ok".into(),
                confidence: Some(0.5),
                text: Some("sky is blue".into()),
            },
            IntegrityRecord {
                id: "high".into(),
                confidence: Some(1.5),
                text: Some("x".into()),
            },
            IntegrityRecord {
                id: "nan".into(),
                confidence: Some(f64::NAN),
                text: Some("x".into()),
            },
            IntegrityRecord {
                id: "blank".into(),
                confidence: None,
                text: Some("   ".into()),
            },
        ];
        let findings = audit_integrity(&records);
        let kinds: Vec<_> = findings
            .iter()
            .map(|f| (f.subject_id().unwrap_or(""), f.kind()))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("high", FindingKind::InvalidConfidence),
                ("nan", FindingKind::InvalidConfidence),
                ("blank", FindingKind::MissingRequiredField),
            ]
        );
    }

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(confidence_in_range(0.0));
        assert!(confidence_in_range(1.0));
        assert!(!confidence_in_range(1.0001));
        assert!(!confidence_in_range(f64::NEG_INFINITY));
    }
}
