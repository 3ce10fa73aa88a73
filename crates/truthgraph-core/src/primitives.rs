//! # Guard Limits
//!
//! Hardcoded ceilings and defaults for the TruthGraph guards.
//!
//! These are compiled into the binary and are immutable at runtime.
//! Every externally-reachable query path is bounded by one of them.

// =============================================================================
// IDENTIFIERS & TEXT
// =============================================================================

/// Maximum length of an identifier (node id, record id, path segment).
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Default minimum length for free-text search terms.
pub const DEFAULT_FREE_TEXT_MIN: usize = 3;

/// Default maximum length for free-text search terms.
pub const DEFAULT_FREE_TEXT_MAX: usize = 500;

/// Default maximum length for a value bound as a query parameter.
pub const DEFAULT_PARAMETER_MAX: usize = 500;

// =============================================================================
// QUERY SAFETY GATE
// =============================================================================

/// Maximum length of a complete query accepted by the safety gate.
pub const MAX_QUERY_LENGTH: usize = 10_000;

/// Ceiling for the numeric value of a bounding `LIMIT` clause.
pub const MAX_QUERY_LIMIT: u64 = 100;

/// Index procedures that may be called; they bound their own result sets.
pub const ALLOWED_INDEX_PROCEDURES: [&str; 2] =
    ["db.index.fulltext.queryNodes", "db.index.vector.queryNodes"];

/// Read-only leading clauses a query may start with.
pub const ALLOWED_LEADING_CLAUSES: [&str; 5] = ["MATCH", "OPTIONAL", "WITH", "UNWIND", "RETURN"];

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size substituted for a missing, unparsable or non-positive limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Largest offset a caller may request.
///
/// Blunts full-table enumeration via ever-increasing offsets.
pub const MAX_PAGE_OFFSET: u64 = 1_000_000;

// =============================================================================
// REDIRECTS
// =============================================================================

/// Status codes a redirect may carry.
pub const ALLOWED_REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Status substituted for anything outside `ALLOWED_REDIRECT_STATUSES`.
pub const DEFAULT_REDIRECT_STATUS: u16 = 301;

// =============================================================================
// CONSISTENCY CHECKS
// =============================================================================

/// Relationship types the graph store is expected to contain.
pub const EXPECTED_RELATIONSHIP_TYPES: [&str; 5] = [
    "ASSERTED",
    "EVOLVES_TO",
    "CONTRADICTS",
    "SIMILAR_TO",
    "MENTIONS",
];

/// Default interval between scheduled consistency runs (10 minutes).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;

/// Default bound on a single consistency sub-check.
pub const DEFAULT_SUBCHECK_TIMEOUT_SECS: u64 = 60;
