//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the TruthGraph guards:
//! - Raw caller input (`RawInput`)
//! - Rejection codes (`ValidationCode`)
//! - Explicit default substitutions (`Correction`)
//! - Validator output (`ValidationResult`)
//! - Error types (`TruthGraphError`)
//!
//! ## Result Guarantees
//!
//! A `ValidationResult` is produced once per validation call and is never
//! partially valid. A rejected result never exposes a sanitized value.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RAW INPUT
// =============================================================================

/// An untrusted value as it arrived from the caller.
///
/// HTTP layers hand over JSON values or optional query-string text; the
/// validators need to distinguish "absent", "wrong shape" and "text" so each
/// failure carries its own code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput<'a> {
    /// Null, undefined or not supplied at all.
    Missing,
    /// A string value.
    Text(&'a str),
    /// Any other JSON shape; the payload names the shape.
    Other(&'static str),
}

impl<'a> From<&'a str> for RawInput<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for RawInput<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value.as_str())
    }
}

impl<'a> From<Option<&'a str>> for RawInput<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Self::Missing, Self::Text)
    }
}

impl<'a> From<&'a serde_json::Value> for RawInput<'a> {
    fn from(value: &'a serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Self::Missing,
            Json::String(s) => Self::Text(s.as_str()),
            Json::Bool(_) => Self::Other("boolean"),
            Json::Number(_) => Self::Other("number"),
            Json::Array(_) => Self::Other("array"),
            Json::Object(_) => Self::Other("object"),
        }
    }
}

impl<'a> RawInput<'a> {
    /// Extract the text payload or produce the matching shape rejection.
    pub(crate) fn require_text(self, field: &str) -> Result<&'a str, ValidationResult> {
        match self {
            Self::Text(s) => Ok(s),
            Self::Missing => Err(ValidationResult::rejected(
                ValidationCode::MissingValue,
                format!("{} is required", field),
            )),
            Self::Other(shape) => Err(ValidationResult::rejected(
                ValidationCode::InvalidType,
                format!("{} must be a string, got {}", field, shape),
            )),
        }
    }
}

// =============================================================================
// VALIDATION CODES
// =============================================================================

/// Machine-readable rejection reason.
///
/// Callers and tests branch on the code, never on the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    // Shape
    MissingValue,
    InvalidType,
    Empty,
    TooShort,
    TooLong,
    InvalidCharacters,

    // Injection signatures
    SqlInjection,
    ShellMetacharacter,
    TemplateInjection,
    CommentSequence,
    QuoteInjection,
    PrototypeProbe,
    PatternTableUnavailable,

    // Query safety gate
    ForbiddenOperation,
    ForbiddenProcedure,
    DisallowedOperation,
    MissingLimit,
    InvalidLimit,
    LimitExceeded,

    // Pagination
    PageLimitExceeded,
    PageOffsetExceeded,

    // Redirects
    InvalidParameter,
    UnsafeRedirect,
}

impl ValidationCode {
    /// The wire representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingValue => "MISSING_VALUE",
            Self::InvalidType => "INVALID_TYPE",
            Self::Empty => "EMPTY",
            Self::TooShort => "TOO_SHORT",
            Self::TooLong => "TOO_LONG",
            Self::InvalidCharacters => "INVALID_CHARACTERS",
            Self::SqlInjection => "SQL_INJECTION",
            Self::ShellMetacharacter => "SHELL_METACHARACTER",
            Self::TemplateInjection => "TEMPLATE_INJECTION",
            Self::CommentSequence => "COMMENT_SEQUENCE",
            Self::QuoteInjection => "QUOTE_INJECTION",
            Self::PrototypeProbe => "PROTOTYPE_PROBE",
            Self::PatternTableUnavailable => "PATTERN_TABLE_UNAVAILABLE",
            Self::ForbiddenOperation => "FORBIDDEN_OPERATION",
            Self::ForbiddenProcedure => "FORBIDDEN_PROCEDURE",
            Self::DisallowedOperation => "DISALLOWED_OPERATION",
            Self::MissingLimit => "MISSING_LIMIT",
            Self::InvalidLimit => "INVALID_LIMIT",
            Self::LimitExceeded => "LIMIT_EXCEEDED",
            Self::PageLimitExceeded => "PAGE_LIMIT_EXCEEDED",
            Self::PageOffsetExceeded => "PAGE_OFFSET_EXCEEDED",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::UnsafeRedirect => "UNSAFE_REDIRECT",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CORRECTIONS
// =============================================================================

/// A default substituted for a caller-supplied value.
///
/// Guards that "correct and continue" report every substitution so callers
/// can tell "accepted as given" apart from "accepted after defaulting".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// The parameter that was corrected.
    pub field: String,
    /// The value as supplied (rendered as text).
    pub from: String,
    /// The value that replaced it.
    pub to: String,
}

impl Correction {
    /// Create a new correction record.
    #[must_use]
    pub fn new(field: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

// =============================================================================
// VALIDATION RESULT
// =============================================================================

/// Outcome of a single validator call.
///
/// Fields are private so a rejected result can never leak a usable value:
/// `sanitized_value()` only answers for accepted results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<ValidationCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sanitized_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalized_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalized_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    corrections: Vec<Correction>,
}

impl ValidationResult {
    /// An accepted result with no payload.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            valid: true,
            error: None,
            code: None,
            sanitized_value: None,
            normalized_limit: None,
            normalized_offset: None,
            corrections: Vec::new(),
        }
    }

    /// An accepted result carrying the value the caller may use downstream.
    #[must_use]
    pub fn accepted_with(value: impl Into<String>) -> Self {
        Self {
            sanitized_value: Some(value.into()),
            ..Self::accepted()
        }
    }

    /// A rejection with a code and a human-readable reason.
    #[must_use]
    pub fn rejected(code: ValidationCode, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            code: Some(code),
            ..Self::accepted()
        }
    }

    pub(crate) fn with_pagination(mut self, limit: u32, offset: u64) -> Self {
        self.normalized_limit = Some(limit);
        self.normalized_offset = Some(offset);
        self
    }

    pub(crate) fn with_corrections(mut self, corrections: Vec<Correction>) -> Self {
        self.corrections = corrections;
        self
    }

    /// Whether the input was accepted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Rejection reason, if rejected.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Rejection code, if rejected.
    #[must_use]
    pub fn code(&self) -> Option<ValidationCode> {
        self.code
    }

    /// The value safe to hand downstream. Always `None` for rejections.
    #[must_use]
    pub fn sanitized_value(&self) -> Option<&str> {
        if self.valid {
            self.sanitized_value.as_deref()
        } else {
            None
        }
    }

    /// Limit after defaulting. Reported on over-ceiling rejections as the
    /// clamped value the caller could retry with.
    #[must_use]
    pub fn normalized_limit(&self) -> Option<u32> {
        self.normalized_limit
    }

    /// Offset after defaulting.
    #[must_use]
    pub fn normalized_offset(&self) -> Option<u64> {
        self.normalized_offset
    }

    /// Defaults that were substituted for caller input.
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    /// True when the result was accepted only after default substitution.
    #[must_use]
    pub fn was_corrected(&self) -> bool {
        !self.corrections.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur around the TruthGraph core.
///
/// Validators never return these; they report through `ValidationResult`.
/// These cover the fallible edges: stores, configuration and scheduling.
#[derive(Debug, Error)]
pub enum TruthGraphError {
    /// A store handle could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store accepted the query but failed while running it.
    #[error("Store execution failed: {0}")]
    StoreExecution(String),

    /// The query safety gate refused a query.
    #[error("Query rejected ({code}): {reason}")]
    QueryRejected {
        code: ValidationCode,
        reason: String,
    },

    /// A consistency run was requested while another is in flight.
    #[error("Consistency check already in progress")]
    CheckInProgress,

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// TESTS
// =============================================================================
