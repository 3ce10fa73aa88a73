//! # Redirect Guard
//!
//! Builds same-origin, relative redirect targets from caller-supplied path
//! components.
//!
//! A `RedirectTarget` can only be obtained through this module, so holding
//! one proves the path starts with a single `/` and contains no `://`,
//! `//`, `..`, `%2e` or control characters. A caller-supplied base may not
//! carry `%2f` or `%5c` either; those only appear inside segments this
//! module encoded itself.
//!
//! Out-of-range status codes are replaced with 301 and reported as a
//! `Correction` rather than rejected: a wrong status is an ergonomic slip,
//! not an attack signal.

use crate::primitives::{ALLOWED_REDIRECT_STATUSES, DEFAULT_REDIRECT_STATUS};
use crate::types::{Correction, ValidationCode, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// REDIRECT TARGET
// =============================================================================

/// A validated same-origin relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RedirectTarget {
    path: String,
}

impl RedirectTarget {
    /// The validated path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Reasons a redirect target is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("Redirect target must not be empty")]
    Empty,

    #[error("Redirect target must not be absolute or protocol-relative")]
    External,

    #[error("Redirect target must start with '/'")]
    NotRelative,

    #[error("Redirect target must not contain '..'")]
    Traversal,

    #[error("Redirect target must not contain control characters")]
    ControlCharacter,

    #[error("Redirect target must not contain percent-encoded '.', '/' or '\\'")]
    EncodedSeparator,

    #[error("Redirect parameter '{0}' must not be empty")]
    EmptySegment(String),
}

impl RedirectError {
    /// Validation code reported for this error.
    #[must_use]
    pub fn code(&self) -> ValidationCode {
        match self {
            Self::EmptySegment(_) => ValidationCode::InvalidParameter,
            _ => ValidationCode::UnsafeRedirect,
        }
    }
}

/// Validate a complete redirect path.
pub fn validate_redirect_target(target: &str) -> Result<RedirectTarget, RedirectError> {
    if target.is_empty() {
        return Err(RedirectError::Empty);
    }
    // Browsers treat '\' like '/', so "/\evil.com" is protocol-relative.
    if target.contains("://") || target.contains("//") || target.contains('\\') {
        return Err(RedirectError::External);
    }
    if !target.starts_with('/') {
        return Err(RedirectError::NotRelative);
    }
    if target.contains("..") {
        return Err(RedirectError::Traversal);
    }
    // Browsers resolve "%2e%2e" as a dot segment.
    if contains_encoded(target, &["%2e"]) {
        return Err(RedirectError::EncodedSeparator);
    }
    if target.chars().any(char::is_control) {
        return Err(RedirectError::ControlCharacter);
    }
    Ok(RedirectTarget {
        path: target.to_string(),
    })
}

/// Append URL-encoded parameter values to `base`, one path segment each.
///
/// Every segment is encoded on its own before joining, then the joined path
/// is re-checked: segments that are individually harmless can still combine
/// into `..` or `//`.
pub fn build_redirect_url(base: &str, params: &[(&str, &str)]) -> Result<RedirectTarget, RedirectError> {
    let base = validate_redirect_target(base)?;
    if contains_encoded(base.as_str(), &["%2f", "%5c"]) {
        return Err(RedirectError::EncodedSeparator);
    }

    let mut joined = base.path.trim_end_matches('/').to_string();
    for (name, value) in params {
        if value.is_empty() {
            return Err(RedirectError::EmptySegment((*name).to_string()));
        }
        joined.push('/');
        joined.push_str(&encode_segment(value));
    }
    if joined.is_empty() {
        joined.push('/');
    }

    if joined.contains("..") {
        return Err(RedirectError::Traversal);
    }
    if joined.contains("//") {
        return Err(RedirectError::External);
    }
    validate_redirect_target(&joined)
}

fn contains_encoded(target: &str, sequences: &[&str]) -> bool {
    let lower = target.to_ascii_lowercase();
    sequences.iter().any(|sequence| lower.contains(sequence))
}

/// Percent-encode a single path segment.
///
/// Leaves the same unreserved set as `encodeURIComponent` untouched.
fn encode_segment(segment: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        let unreserved = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')');
        if unreserved {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    out
}

// =============================================================================
// STATUS CODES
// =============================================================================

/// Resolve the redirect status.
///
/// Absent → 301 silently. Outside `ALLOWED_REDIRECT_STATUSES` → 301 with a
/// correction record.
pub fn normalize_status(requested: Option<u16>) -> (u16, Option<Correction>) {
    match requested {
        None => (DEFAULT_REDIRECT_STATUS, None),
        Some(status) if ALLOWED_REDIRECT_STATUSES.contains(&status) => (status, None),
        Some(status) => (
            DEFAULT_REDIRECT_STATUS,
            Some(Correction::new(
                "status",
                status.to_string(),
                DEFAULT_REDIRECT_STATUS.to_string(),
            )),
        ),
    }
}

// =============================================================================
// COMPATIBILITY REDIRECTS
// =============================================================================

/// HTTP status used for a rejected compatibility redirect.
pub const REJECTION_STATUS: u16 = 400;

/// A safe redirect for the HTTP layer to issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectInstruction {
    pub location: RedirectTarget,
    pub status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<Correction>,
}

/// A structured 400-equivalent refusal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRejection {
    pub status: u16,
    pub code: ValidationCode,
    pub message: String,
    /// The parameter that failed validation, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Validate every parameter, then build the redirect.
///
/// `validator` is called once per `(name, value)` pair. The first failure
/// produces a rejection naming the parameter; on success the validator's
/// sanitized value (or the original when it returns none) becomes the path
/// segment.
pub fn compatibility_redirect<F>(
    target: &str,
    params: &[(&str, &str)],
    validator: F,
    status: Option<u16>,
) -> Result<RedirectInstruction, RedirectRejection>
where
    F: Fn(&str, &str) -> ValidationResult,
{
    let mut segments: Vec<(&str, String)> = Vec::with_capacity(params.len());
    for (name, value) in params {
        let result = validator(name, value);
        if !result.is_valid() {
            return Err(RedirectRejection {
                status: REJECTION_STATUS,
                code: result.code().unwrap_or(ValidationCode::InvalidParameter),
                message: format!(
                    "Invalid parameter '{}': {}",
                    name,
                    result.error().unwrap_or("rejected")
                ),
                parameter: Some((*name).to_string()),
            });
        }
        let segment = result.sanitized_value().unwrap_or(*value).to_string();
        segments.push((*name, segment));
    }

    let borrowed: Vec<(&str, &str)> = segments
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect();

    let location = build_redirect_url(target, &borrowed).map_err(|e| RedirectRejection {
        status: REJECTION_STATUS,
        code: e.code(),
        message: e.to_string(),
        parameter: match e {
            RedirectError::EmptySegment(name) => Some(name),
            _ => None,
        },
    })?;

    let (status, correction) = normalize_status(status);
    Ok(RedirectInstruction {
        location,
        status,
        corrections: correction.into_iter().collect(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{CharsetPolicy, validate_identifier};

    fn identifier_validator(_name: &str, value: &str) -> ValidationResult {
        validate_identifier(value, CharsetPolicy::Strict)
    }

    #[test]
    fn encodes_segments() {
        let target = build_redirect_url("/api/fact_graph", &[("id", "abc 123")]).expect("build");
        assert_eq!(target.as_str(), "/api/fact_graph/abc%20123");
    }

    #[test]
    fn rejects_traversal_after_encoding() {
        let result = build_redirect_url("/api/fact_graph", &[("id", "../admin")]);
        assert_eq!(result, Err(RedirectError::Traversal));
    }

    #[test]
    fn rejects_absolute_and_protocol_relative() {
        assert_eq!(
            validate_redirect_target("http://evil.com"),
            Err(RedirectError::External)
        );
        assert_eq!(
            validate_redirect_target("//evil.com"),
            Err(RedirectError::External)
        );
        assert_eq!(
            validate_redirect_target("/\\evil.com"),
            Err(RedirectError::External)
        );
        assert_eq!(
            validate_redirect_target("api/facts"),
            Err(RedirectError::NotRelative)
        );
        assert_eq!(
            validate_redirect_target("/a\r\nSet-Cookie: x"),
            Err(RedirectError::ControlCharacter)
        );
    }

    #[test]
    fn rejects_encoded_dot_segments() {
        for base in ["/api/%2e%2e/admin", "/api/%2E%2E/admin", "/api/.%2e/admin"] {
            assert_eq!(
                build_redirect_url(base, &[("id", "x")]),
                Err(RedirectError::EncodedSeparator),
                "{base}"
            );
        }
        assert_eq!(
            validate_redirect_target("/api/%2E./admin"),
            Err(RedirectError::EncodedSeparator)
        );
    }

    #[test]
    fn rejects_encoded_separators_in_base() {
        for base in ["/api/%2f%2fevil.com", "/api/%5Cevil.com"] {
            assert_eq!(
                build_redirect_url(base, &[("id", "x")]),
                Err(RedirectError::EncodedSeparator),
                "{base}"
            );
        }
    }

    #[test]
    fn percent_in_segment_is_double_encoded() {
        let target = build_redirect_url("/api/facts", &[("id", "%2e%2e")]).expect("build");
        assert_eq!(target.as_str(), "/api/facts/%252e%252e");
    }

    #[test]
    fn slash_inside_segment_is_encoded() {
        let target = build_redirect_url("/api/facts/", &[("id", "a/b")]).expect("build");
        assert_eq!(target.as_str(), "/api/facts/a%2Fb");
    }

    #[test]
    fn empty_segment_is_rejected() {
        let result = build_redirect_url("/api/facts", &[("id", "")]);
        assert_eq!(result, Err(RedirectError::EmptySegment("id".to_string())));
    }

    #[test]
    fn status_normalization() {
        assert_eq!(normalize_status(Some(307)), (307, None));
        assert_eq!(normalize_status(None), (301, None));

        let (status, correction) = normalize_status(Some(200));
        assert_eq!(status, 301);
        assert_eq!(
            correction,
            Some(Correction::new("status", "200", "301"))
        );
    }

    #[test]
    fn compatibility_redirect_success() {
        let instruction = compatibility_redirect(
            "/api/facts",
            &[("id", "fact-1")],
            identifier_validator,
            Some(308),
        )
        .expect("redirect");
        assert_eq!(instruction.location.as_str(), "/api/facts/fact-1");
        assert_eq!(instruction.status, 308);
        assert!(instruction.corrections.is_empty());
    }

    #[test]
    fn compatibility_redirect_names_failing_parameter() {
        let rejection = compatibility_redirect(
            "/api/facts",
            &[("id", "../admin")],
            identifier_validator,
            None,
        )
        .expect_err("must reject");
        assert_eq!(rejection.status, REJECTION_STATUS);
        assert_eq!(rejection.code, ValidationCode::InvalidCharacters);
        assert_eq!(rejection.parameter.as_deref(), Some("id"));
    }

    #[test]
    fn compatibility_redirect_records_status_correction() {
        let instruction = compatibility_redirect(
            "/api/facts",
            &[("id", "f1")],
            identifier_validator,
            Some(418),
        )
        .expect("redirect");
        assert_eq!(instruction.status, 301);
        assert_eq!(instruction.corrections.len(), 1);
    }

    #[test]
    fn compatibility_redirect_rejects_unsafe_target() {
        let rejection = compatibility_redirect(
            "https://evil.com",
            &[],
            identifier_validator,
            None,
        )
        .expect_err("must reject");
        assert_eq!(rejection.code, ValidationCode::UnsafeRedirect);
        assert!(rejection.parameter.is_none());
    }
}
