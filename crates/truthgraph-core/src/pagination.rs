//! # Pagination Guard
//!
//! Clamps and validates limit/offset pairs against DoS thresholds.
//!
//! A missing or non-positive limit is not a security signal, so it is the
//! one "correct and continue" path: the default is substituted and reported
//! as a `Correction`. An over-ceiling limit or offset is a hard reject.

use crate::primitives::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_PAGE_OFFSET};
use crate::types::{Correction, ValidationCode, ValidationResult};

/// A raw pagination parameter as the caller supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParam<'a> {
    /// Not supplied.
    Absent,
    /// Already numeric (JSON body, typed CLI argument).
    Number(i64),
    /// Textual (query string).
    Text(&'a str),
}

impl From<i64> for PageParam<'_> {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PageParam<'_> {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<u32> for PageParam<'_> {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl<'a> From<&'a str> for PageParam<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<Option<&'a str>> for PageParam<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Self::Absent, Self::Text)
    }
}

impl From<Option<i64>> for PageParam<'_> {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Absent, Self::Number)
    }
}

impl PageParam<'_> {
    fn parse(self) -> Option<i64> {
        match self {
            Self::Absent => None,
            Self::Number(n) => Some(n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn render(self) -> String {
        match self {
            Self::Absent => "<absent>".to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.to_string(),
        }
    }
}

/// Validate a limit/offset pair.
///
/// - limit: missing, unparsable or `<= 0` → `DEFAULT_PAGE_LIMIT` (corrected);
///   `> MAX_PAGE_LIMIT` → `PAGE_LIMIT_EXCEEDED`, reporting the clamped limit
/// - offset: missing, unparsable or negative → 0 (corrected);
///   `> MAX_PAGE_OFFSET` → `PAGE_OFFSET_EXCEEDED`
///
/// Absent parameters are defaulted without recording a correction.
pub fn validate_pagination<'a, 'b>(
    limit: impl Into<PageParam<'a>>,
    offset: impl Into<PageParam<'b>>,
) -> ValidationResult {
    let limit = limit.into();
    let offset = offset.into();
    let mut corrections = Vec::new();

    let requested_limit = match limit.parse() {
        Some(n) if n > 0 => n,
        _ => {
            if limit != PageParam::Absent {
                corrections.push(Correction::new(
                    "limit",
                    limit.render(),
                    DEFAULT_PAGE_LIMIT.to_string(),
                ));
            }
            i64::from(DEFAULT_PAGE_LIMIT)
        }
    };

    let requested_offset = match offset.parse() {
        Some(n) if n >= 0 => n as u64,
        _ => {
            if offset != PageParam::Absent {
                corrections.push(Correction::new("offset", offset.render(), "0"));
            }
            0
        }
    };

    if requested_limit > i64::from(MAX_PAGE_LIMIT) {
        return ValidationResult::rejected(
            ValidationCode::PageLimitExceeded,
            format!(
                "Limit {} exceeds maximum {}",
                requested_limit, MAX_PAGE_LIMIT
            ),
        )
        .with_pagination(MAX_PAGE_LIMIT, requested_offset.min(MAX_PAGE_OFFSET));
    }

    if requested_offset > MAX_PAGE_OFFSET {
        return ValidationResult::rejected(
            ValidationCode::PageOffsetExceeded,
            format!(
                "Offset {} exceeds maximum {}",
                requested_offset, MAX_PAGE_OFFSET
            ),
        );
    }

    ValidationResult::accepted()
        .with_pagination(requested_limit as u32, requested_offset)
        .with_corrections(corrections)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_values() {
        let result = validate_pagination(50, 10);
        assert!(result.is_valid());
        assert_eq!(result.normalized_limit(), Some(50));
        assert_eq!(result.normalized_offset(), Some(10));
        assert!(!result.was_corrected());
    }

    #[test]
    fn rejects_limit_over_ceiling_reporting_clamp() {
        let result = validate_pagination(500, 0);
        assert!(!result.is_valid());
        assert_eq!(result.code(), Some(ValidationCode::PageLimitExceeded));
        assert_eq!(result.normalized_limit(), Some(MAX_PAGE_LIMIT));
    }

    #[test]
    fn negative_values_default_with_corrections() {
        let result = validate_pagination(-1, -1);
        assert!(result.is_valid());
        assert_eq!(result.normalized_limit(), Some(DEFAULT_PAGE_LIMIT));
        assert_eq!(result.normalized_offset(), Some(0));
        assert_eq!(result.corrections().len(), 2);
        assert_eq!(result.corrections()[0].field, "limit");
        assert_eq!(result.corrections()[1].field, "offset");
    }

    #[test]
    fn absent_values_default_silently() {
        let result = validate_pagination(None::<&str>, None::<&str>);
        assert!(result.is_valid());
        assert_eq!(result.normalized_limit(), Some(DEFAULT_PAGE_LIMIT));
        assert!(!result.was_corrected());
    }

    #[test]
    fn text_values_are_parsed() {
        let result = validate_pagination("25", " 40 ");
        assert_eq!(result.normalized_limit(), Some(25));
        assert_eq!(result.normalized_offset(), Some(40));

        let garbage = validate_pagination("abc", "xyz");
        assert!(garbage.is_valid());
        assert_eq!(garbage.normalized_limit(), Some(DEFAULT_PAGE_LIMIT));
        assert_eq!(garbage.normalized_offset(), Some(0));
        assert!(garbage.was_corrected());
    }

    #[test]
    fn offset_ceiling_is_inclusive() {
        assert!(validate_pagination(10, MAX_PAGE_OFFSET as i64).is_valid());
        let result = validate_pagination(10, MAX_PAGE_OFFSET as i64 + 1);
        assert_eq!(result.code(), Some(ValidationCode::PageOffsetExceeded));
    }

    #[test]
    fn zero_limit_is_defaulted() {
        let result = validate_pagination(0, 0);
        assert_eq!(result.normalized_limit(), Some(DEFAULT_PAGE_LIMIT));
        assert!(result.was_corrected());
    }
}
