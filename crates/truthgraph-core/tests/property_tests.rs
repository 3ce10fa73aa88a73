//! # Property-Based Tests
//!
//! Invariants of the guards and the report model, checked with proptest.

use chrono::Utc;
use proptest::collection::vec;
use proptest::prelude::*;
use truthgraph_core::primitives::{MAX_PAGE_LIMIT, MAX_PAGE_OFFSET, MAX_QUERY_LIMIT};
use truthgraph_core::{
    CharsetPolicy, CheckResults, ConsistencyReport, Finding, FindingKind, ReportSummary,
    build_redirect_url, sanitize_parameter, validate_identifier, validate_pagination,
    validate_query,
};

fn strict_charset(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 255
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn finding_kind() -> impl Strategy<Value = FindingKind> {
    (0usize..FindingKind::ALL.len()).prop_map(|i| FindingKind::ALL[i])
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Strict identifiers are accepted exactly when they match the whitelist.
    #[test]
    fn identifier_accepts_exactly_the_whitelist(input in ".{0,300}") {
        let result = validate_identifier(input.as_str(), CharsetPolicy::Strict);
        prop_assert_eq!(result.is_valid(), strict_charset(&input));
        if result.is_valid() {
            prop_assert_eq!(result.sanitized_value(), Some(input.as_str()));
        }
    }

    /// Whitelisted identifiers built from the charset always pass.
    #[test]
    fn identifier_charset_always_passes(input in "[A-Za-z0-9_-]{1,255}") {
        prop_assert!(validate_identifier(input.as_str(), CharsetPolicy::Strict).is_valid());
    }

    /// An accepted page is always inside the bounds.
    #[test]
    fn pagination_accepts_only_bounded_pages(limit in any::<i64>(), offset in any::<i64>()) {
        let result = validate_pagination(limit, offset);
        if result.is_valid() {
            let l = result.normalized_limit().expect("limit");
            let o = result.normalized_offset().expect("offset");
            prop_assert!(l >= 1 && l <= MAX_PAGE_LIMIT);
            prop_assert!(o <= MAX_PAGE_OFFSET);
        } else {
            prop_assert!(limit > i64::from(MAX_PAGE_LIMIT) || offset > MAX_PAGE_OFFSET as i64);
        }
    }

    /// Built redirects never leave the origin, whatever the segment.
    #[test]
    fn redirect_stays_same_origin(segment in ".{1,64}") {
        if let Ok(target) = build_redirect_url("/api/facts", &[("id", segment.as_str())]) {
            let path = target.as_str();
            prop_assert!(path.starts_with("/api/facts/"));
            prop_assert!(!path.contains("//"));
            prop_assert!(!path.contains("://"));
            prop_assert!(!path.contains(".."));
            prop_assert!(!path.chars().any(char::is_control));
        }
    }

    /// The gate's LIMIT ceiling is exact.
    #[test]
    fn gate_limit_ceiling(limit in 0u64..10_000) {
        let query = format!("MATCH (f:Fact) RETURN f LIMIT {}", limit);
        prop_assert_eq!(validate_query(query.as_str()).is_valid(), limit <= MAX_QUERY_LIMIT);
    }

    /// A rejected query never exposes a value.
    #[test]
    fn gate_rejections_carry_no_value(input in ".{0,200}") {
        let result = validate_query(input.as_str());
        if !result.is_valid() {
            prop_assert!(result.sanitized_value().is_none());
            prop_assert!(result.code().is_some());
        }
    }

    /// Sanitized parameters contain no raw control characters.
    #[test]
    fn sanitized_parameter_has_no_controls(input in "\\PC{0,100}[\\n\\t\\x00-\\x1f]{0,5}") {
        let result = sanitize_parameter(input.as_str());
        if let Some(value) = result.sanitized_value() {
            prop_assert!(!value.chars().any(char::is_control));
        }
    }

    /// The cached summary always equals a fresh recount.
    #[test]
    fn summary_matches_recount(
        facts in vec(finding_kind(), 0..20),
        relationships in vec(finding_kind(), 0..20),
        integrity in vec(finding_kind(), 0..20),
    ) {
        let to_findings = |kinds: &[FindingKind]| -> Vec<Finding> {
            kinds.iter().map(|k| Finding::new(*k, "generated")).collect()
        };
        let checks = CheckResults {
            facts: to_findings(&facts),
            relationships: to_findings(&relationships),
            integrity: to_findings(&integrity),
        };
        let report = ConsistencyReport::new(Utc::now(), checks, None);

        prop_assert!(report.summary_is_consistent());
        prop_assert_eq!(
            report.summary().total_issues,
            facts.len() + relationships.len() + integrity.len()
        );
        prop_assert_eq!(report.summary(), ReportSummary::recount(report.checks()));
    }
}
