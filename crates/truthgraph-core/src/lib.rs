//! # truthgraph-core
//!
//! The data-integrity and input-safety logic for TruthGraph - THE LOGIC.
//!
//! TruthGraph keeps a graph store (nodes/relationships) and a relational
//! store (canonical records) in sync. This crate holds the two halves that
//! must never trust upstream state:
//!
//! - **Guards**: identifier, free-text, bound-parameter, query-shape,
//!   pagination and redirect validation. Pure, stateless, safe to call from
//!   any number of threads.
//! - **Consistency model**: findings, the severity policy table, reports and
//!   the pure detectors that compare data fetched from both stores.
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network, NO logging backend (corrections are returned as
//!   data for the caller to log)
//! - Whitelist first: anything not explicitly allowed is rejected
//! - Reject and report: guards never rewrite unsafe input, with the single
//!   documented exception of defaulted pagination/status values

// =============================================================================
// MODULES
// =============================================================================

pub mod consistency;
pub mod pagination;
pub mod patterns;
pub mod primitives;
pub mod query_gate;
pub mod redirect;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Correction, RawInput, TruthGraphError, ValidationCode, ValidationResult};

// =============================================================================
// RE-EXPORTS: Guards
// =============================================================================

pub use pagination::{PageParam, validate_pagination};
pub use patterns::{
    CharsetPolicy, PatternRule, PatternTable, sanitize_for_query_parameter, sanitize_parameter,
    validate_free_text, validate_identifier,
};
pub use query_gate::{is_index_call, validate_query};
pub use redirect::{
    RedirectError, RedirectInstruction, RedirectRejection, RedirectTarget, build_redirect_url,
    compatibility_redirect, normalize_status, validate_redirect_target,
};

// =============================================================================
// RE-EXPORTS: Consistency
// =============================================================================

pub use consistency::detect::{
    IntegrityRecord, audit_integrity, audit_relationship_types, confidence_in_range,
    reconcile_record_ids,
};
pub use consistency::{
    CheckCategory, CheckResults, ConsistencyReport, Finding, FindingKind, HealthSignal,
    ReportSummary, Severity, severity_for,
};
