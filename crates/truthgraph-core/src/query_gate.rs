//! # Query Safety Gate
//!
//! Approves or rejects a complete graph query whose text is not fully
//! controlled by the system (human- or model-authored).
//!
//! ## Algorithm
//!
//! 1. Reject missing, non-string, blank or over-long (`MAX_QUERY_LENGTH`) input.
//! 2. Reject any forbidden operation anywhere in the text (not only the
//!    first token), and any `CALL` of a procedure outside
//!    `ALLOWED_INDEX_PROCEDURES`.
//! 3. Require the first clause to be read-only (`ALLOWED_LEADING_CLAUSES`)
//!    or a whitelisted index call.
//! 4. Unless the query is an index call, every `RETURN` part must carry its
//!    own `LIMIT`. A `LIMIT` on an earlier `WITH` does not bound a later
//!    `MATCH`.
//! 5. Every `LIMIT` present must be a numeric literal `<= MAX_QUERY_LIMIT`.
//!
//! Comments are refused outright, so no clause the gate inspects can hide
//! inside one.
//!
//! The gate never rewrites or truncates a query: reject and report only.

use crate::patterns::{PatternRule, PatternTable};
use crate::primitives::{
    ALLOWED_INDEX_PROCEDURES, ALLOWED_LEADING_CLAUSES, MAX_QUERY_LENGTH, MAX_QUERY_LIMIT,
};
use crate::types::{RawInput, ValidationCode, ValidationResult};
use regex::Regex;
use std::sync::LazyLock;

// =============================================================================
// FORBIDDEN OPERATIONS
// =============================================================================

/// Operations that may not appear anywhere in a gated query.
pub const FORBIDDEN_OPERATION_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: r"(?i)\bDETACH\s+DELETE\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "DETACH DELETE is a destructive operation",
    },
    PatternRule {
        pattern: r"(?i)\bDELETE\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "DELETE is a destructive operation",
    },
    PatternRule {
        pattern: r"(?i)\bREMOVE\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "REMOVE mutates labels or properties",
    },
    PatternRule {
        pattern: r"(?i)\bSET\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "SET mutates properties",
    },
    PatternRule {
        pattern: r"(?i)\b(?:CREATE|MERGE)\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "CREATE/MERGE write to the graph",
    },
    PatternRule {
        pattern: r"(?i)\b(?:DROP|ALTER|RENAME)\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "schema mutation",
    },
    PatternRule {
        pattern: r"(?i)\b(?:GRANT|REVOKE|DENY)\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "privilege management",
    },
    PatternRule {
        pattern: r"(?i)\b(?:SHOW|START|STOP)\s+(?:USERS?|ROLES?|DATABASES?|PRIVILEGES|SERVERS?)\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "user, role or database administration",
    },
    PatternRule {
        pattern: r"(?i)\bFOREACH\b",
        code: ValidationCode::ForbiddenOperation,
        reason: "FOREACH is a write iteration",
    },
    PatternRule {
        pattern: r"(?i)\bLOAD\s+CSV\b|\bfile:/",
        code: ValidationCode::ForbiddenOperation,
        reason: "file access",
    },
    PatternRule {
        pattern: r"//|/\*|\*/",
        code: ValidationCode::CommentSequence,
        reason: "comments are not allowed in gated queries",
    },
    PatternRule {
        pattern: r"(?i)\bdbms\.|\bapoc\.",
        code: ValidationCode::ForbiddenProcedure,
        reason: "system or extension procedure",
    },
    PatternRule {
        pattern: r"(?i)\bCALL\s*\{",
        code: ValidationCode::ForbiddenOperation,
        reason: "CALL subqueries are not allowed",
    },
    PatternRule {
        pattern: r";\s*\S",
        code: ValidationCode::ForbiddenOperation,
        reason: "multiple statements",
    },
];

static FORBIDDEN_TABLE: LazyLock<PatternTable> =
    LazyLock::new(|| PatternTable::compile(FORBIDDEN_OPERATION_RULES));

static CALL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bCALL\s+([A-Za-z_][\w.]*)").ok());

static LIMIT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+([^\s;)]+)").ok());

static RETURN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bRETURN\b").ok());

fn table_unavailable(which: &str) -> ValidationResult {
    ValidationResult::rejected(
        ValidationCode::PatternTableUnavailable,
        format!("Query gate pattern '{}' unavailable", which),
    )
}

// =============================================================================
// GATE
// =============================================================================

/// Run the query safety gate.
///
/// On acceptance the trimmed query is returned as the sanitized value.
pub fn validate_query<'a>(query: impl Into<RawInput<'a>>) -> ValidationResult {
    let text = match query.into().require_text("Query") {
        Ok(text) => text.trim(),
        Err(rejection) => return rejection,
    };

    // Step 1: shape
    if text.is_empty() {
        return ValidationResult::rejected(ValidationCode::Empty, "Query must not be empty");
    }
    if text.len() > MAX_QUERY_LENGTH {
        return ValidationResult::rejected(
            ValidationCode::TooLong,
            format!(
                "Query length {} exceeds maximum {}",
                text.len(),
                MAX_QUERY_LENGTH
            ),
        );
    }

    // Step 2: forbidden operations anywhere in the text
    if let Some(rejection) = FORBIDDEN_TABLE.screen(text) {
        return rejection;
    }
    let Some(call_re) = CALL_RE.as_ref() else {
        return table_unavailable("CALL");
    };
    for capture in call_re.captures_iter(text) {
        let procedure = capture.get(1).map_or("", |m| m.as_str());
        if !ALLOWED_INDEX_PROCEDURES.contains(&procedure) {
            return ValidationResult::rejected(
                ValidationCode::ForbiddenProcedure,
                format!("Procedure '{}' is not allowed", procedure),
            );
        }
    }

    // Step 3: leading clause
    let index_call = is_index_call(text);
    if !index_call && !has_read_only_lead(text) {
        return ValidationResult::rejected(
            ValidationCode::DisallowedOperation,
            format!(
                "Query must start with one of {:?} or an allowed index call",
                ALLOWED_LEADING_CLAUSES
            ),
        );
    }

    // Steps 4 and 5: bounding clause
    let Some(limit_re) = LIMIT_RE.as_ref() else {
        return table_unavailable("LIMIT");
    };
    let Some(return_re) = RETURN_RE.as_ref() else {
        return table_unavailable("RETURN");
    };
    let mut limit_offsets = Vec::new();
    for capture in limit_re.captures_iter(text) {
        let literal = capture.get(1).map_or("", |m| m.as_str());
        if let Some(rejection) = check_limit_literal(literal) {
            return rejection;
        }
        limit_offsets.push(capture.get(0).map_or(0, |m| m.start()));
    }
    if !index_call {
        let returns: Vec<usize> = return_re.find_iter(text).map(|m| m.start()).collect();
        if !every_return_bounded(&returns, &limit_offsets, text.len()) {
            return ValidationResult::rejected(
                ValidationCode::MissingLimit,
                format!(
                    "Every RETURN must end with a LIMIT clause of at most {}",
                    MAX_QUERY_LIMIT
                ),
            );
        }
    }

    ValidationResult::accepted_with(text)
}

/// Each `RETURN` needs a `LIMIT` before the next `RETURN` or the end of the
/// text. Without any `RETURN`, one `LIMIT` anywhere is enough.
fn every_return_bounded(returns: &[usize], limits: &[usize], len: usize) -> bool {
    if returns.is_empty() {
        return !limits.is_empty();
    }
    returns.iter().enumerate().all(|(i, &start)| {
        let end = returns.get(i + 1).copied().unwrap_or(len);
        limits.iter().any(|&offset| offset > start && offset < end)
    })
}

fn first_word(text: &str) -> &str {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("")
}

fn has_read_only_lead(text: &str) -> bool {
    let lead = first_word(text).to_ascii_uppercase();
    if !ALLOWED_LEADING_CLAUSES.contains(&lead.as_str()) {
        return false;
    }
    if lead == "OPTIONAL" {
        let rest = text[first_word(text).len()..].trim_start();
        return first_word(rest).eq_ignore_ascii_case("MATCH");
    }
    true
}

/// Whether the query starts with a call to a whitelisted index procedure.
pub fn is_index_call(query: &str) -> bool {
    let text = query.trim_start();
    if !first_word(text).eq_ignore_ascii_case("CALL") {
        return false;
    }
    let rest = text[4..].trim_start();
    ALLOWED_INDEX_PROCEDURES
        .iter()
        .any(|procedure| rest.starts_with(procedure))
}

fn check_limit_literal(literal: &str) -> Option<ValidationResult> {
    if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_digit()) {
        return Some(ValidationResult::rejected(
            ValidationCode::InvalidLimit,
            format!("LIMIT must be a numeric literal, got '{}'", literal),
        ));
    }
    // All digits: a parse failure can only be overflow.
    match literal.parse::<u64>() {
        Ok(value) if value <= MAX_QUERY_LIMIT => None,
        _ => Some(ValidationResult::rejected(
            ValidationCode::LimitExceeded,
            format!("LIMIT {} exceeds maximum {}", literal, MAX_QUERY_LIMIT),
        )),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_table_compiles() {
        assert!(FORBIDDEN_TABLE.is_available());
        assert!(CALL_RE.is_some());
        assert!(LIMIT_RE.is_some());
        assert!(RETURN_RE.is_some());
    }

    #[test]
    fn accepts_bounded_match() {
        let query = "MATCH (f:Fact) WHERE f.confidence > 0.5 RETURN f LIMIT 50";
        let result = validate_query(query);
        assert!(result.is_valid());
        assert_eq!(result.sanitized_value(), Some(query));
    }

    #[test]
    fn rejects_limit_over_ceiling() {
        let result = validate_query("MATCH (f:Fact) RETURN f LIMIT 500");
        assert_eq!(result.code(), Some(ValidationCode::LimitExceeded));
    }

    #[test]
    fn limit_ceiling_is_inclusive() {
        assert!(validate_query("MATCH (f:Fact) RETURN f LIMIT 100").is_valid());
        assert!(!validate_query("MATCH (f:Fact) RETURN f LIMIT 101").is_valid());
    }

    #[test]
    fn rejects_detach_delete_anywhere() {
        let result = validate_query("MATCH (f:Fact) WITH f LIMIT 10 DETACH DELETE f");
        assert_eq!(result.code(), Some(ValidationCode::ForbiddenOperation));

        let lower = validate_query("match (n) detach delete n return n limit 1");
        assert_eq!(lower.code(), Some(ValidationCode::ForbiddenOperation));
    }

    #[test]
    fn rejects_missing_limit() {
        let result = validate_query("MATCH (f:Fact) RETURN f");
        assert_eq!(result.code(), Some(ValidationCode::MissingLimit));
    }

    #[test]
    fn rejects_parameterised_limit() {
        let result = validate_query("MATCH (f:Fact) RETURN f LIMIT $limit");
        assert_eq!(result.code(), Some(ValidationCode::InvalidLimit));
    }

    #[test]
    fn rejects_overflowing_limit() {
        let result = validate_query("MATCH (f:Fact) RETURN f LIMIT 99999999999999999999999");
        assert_eq!(result.code(), Some(ValidationCode::LimitExceeded));
    }

    #[test]
    fn index_calls_need_no_limit() {
        let query = r#"CALL db.index.fulltext.queryNodes("fact_statement_fulltext", "vaccine") YIELD node, score RETURN node, score"#;
        assert!(validate_query(query).is_valid());
        assert!(is_index_call(query));
    }

    #[test]
    fn index_call_limit_still_checked() {
        let query = r#"CALL db.index.fulltext.queryNodes("fact_statement_fulltext", "x") YIELD node RETURN node LIMIT 500"#;
        assert_eq!(validate_query(query).code(), Some(ValidationCode::LimitExceeded));
    }

    #[test]
    fn rejects_other_procedures() {
        let result = validate_query("CALL db.labels() YIELD label RETURN label LIMIT 5");
        assert_eq!(result.code(), Some(ValidationCode::ForbiddenProcedure));

        let apoc = validate_query("MATCH (n) CALL apoc.help('x') RETURN n LIMIT 5");
        assert_eq!(apoc.code(), Some(ValidationCode::ForbiddenProcedure));
    }

    #[test]
    fn rejects_non_read_lead() {
        let result = validate_query("UNION MATCH (n) RETURN n LIMIT 5");
        assert_eq!(result.code(), Some(ValidationCode::DisallowedOperation));

        let optional = validate_query("OPTIONAL RETURN 1 LIMIT 1");
        assert_eq!(optional.code(), Some(ValidationCode::DisallowedOperation));
    }

    #[test]
    fn accepts_optional_match() {
        assert!(validate_query("OPTIONAL MATCH (f:Fact) RETURN f LIMIT 5").is_valid());
    }

    #[test]
    fn rejects_shape_failures() {
        assert_eq!(validate_query("   ").code(), Some(ValidationCode::Empty));
        assert_eq!(
            validate_query(None::<&str>).code(),
            Some(ValidationCode::MissingValue)
        );
        let long = format!("MATCH (n) RETURN n LIMIT 1 {}", " ".repeat(10)) + &"x".repeat(MAX_QUERY_LENGTH);
        assert_eq!(validate_query(long.as_str()).code(), Some(ValidationCode::TooLong));
    }

    #[test]
    fn rejects_chained_statements_and_file_access() {
        assert_eq!(
            validate_query("MATCH (n) RETURN n LIMIT 1; MATCH (m) RETURN m LIMIT 1").code(),
            Some(ValidationCode::ForbiddenOperation)
        );
        assert_eq!(
            validate_query("LOAD CSV FROM 'file:///etc/passwd' AS row RETURN row LIMIT 1").code(),
            Some(ValidationCode::ForbiddenOperation)
        );
    }

    #[test]
    fn limit_inside_comment_does_not_bound() {
        for query in [
            "MATCH (a), (b), (c) RETURN a, b, c // LIMIT 5",
            "MATCH (a), (b) RETURN a, b /* LIMIT 5 */",
            "MATCH (a) RETURN a LIMIT 5 */",
        ] {
            let result = validate_query(query);
            assert_eq!(result.code(), Some(ValidationCode::CommentSequence), "{query}");
            assert!(result.sanitized_value().is_none());
        }
    }

    #[test]
    fn early_with_limit_does_not_bound_final_return() {
        let result = validate_query("MATCH (a) WITH a LIMIT 1 MATCH (b), (c) RETURN a, b, c");
        assert_eq!(result.code(), Some(ValidationCode::MissingLimit));

        assert!(validate_query("MATCH (a) WITH a LIMIT 1 MATCH (b) RETURN a, b LIMIT 10").is_valid());
    }

    #[test]
    fn every_union_part_needs_its_own_limit() {
        let result = validate_query("MATCH (a) RETURN a AS x UNION MATCH (b) RETURN b AS x LIMIT 5");
        assert_eq!(result.code(), Some(ValidationCode::MissingLimit));

        assert!(
            validate_query("MATCH (a) RETURN a AS x LIMIT 5 UNION MATCH (b) RETURN b AS x LIMIT 5")
                .is_valid()
        );
    }
}
