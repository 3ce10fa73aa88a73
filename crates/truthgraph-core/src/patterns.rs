//! # Pattern Validator
//!
//! Pure classifiers for untrusted strings.
//!
//! - `validate_identifier`: whitelist-only (fixed character class + length)
//! - `validate_free_text`: whitelist shape (length, non-empty) plus a
//!   blacklist of injection signatures; any signature is a hard reject
//! - `sanitize_for_query_parameter`: strip, screen, then escape a value that
//!   will only ever be passed as a bound query parameter
//!
//! Injection signatures live in `PatternRule` tables (pattern → code) so the
//! policy can be audited and extended without touching control flow.
//!
//! ## Fail-Closed Tables
//!
//! Tables compile on first use. A table whose patterns fail to compile
//! rejects every input with `PATTERN_TABLE_UNAVAILABLE`.

use crate::primitives::{DEFAULT_PARAMETER_MAX, MAX_IDENTIFIER_LENGTH};
use crate::types::{RawInput, ValidationCode, ValidationResult};
use regex::Regex;
use std::sync::LazyLock;

// =============================================================================
// PATTERN TABLES
// =============================================================================

/// One entry of an injection-signature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternRule {
    /// Regular expression matched anywhere in the input.
    pub pattern: &'static str,
    /// Code reported when the pattern matches.
    pub code: ValidationCode,
    /// Human-readable reason reported when the pattern matches.
    pub reason: &'static str,
}

/// Signatures that make a free-text search term a hard reject.
///
/// Ordered: the first matching rule decides the reported code.
pub const FREE_TEXT_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: r"\$\{|\{\{|\}\}|<%|%>",
        code: ValidationCode::TemplateInjection,
        reason: "template interpolation syntax",
    },
    PatternRule {
        pattern: r#"(?i)['"]\s*(?:;|\b(?:or|and|union|select|insert|update|delete|drop|exec|match|merge|create)\b)"#,
        code: ValidationCode::SqlInjection,
        reason: "quote-delimited clause next to a logical keyword",
    },
    PatternRule {
        pattern: r#"(?i)\b(?:or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
        code: ValidationCode::SqlInjection,
        reason: "tautology comparison",
    },
    PatternRule {
        pattern: r"[$`\\]",
        code: ValidationCode::ShellMetacharacter,
        reason: "shell metacharacter",
    },
    PatternRule {
        pattern: r"(?:--|/\*|\*/|//)\s*$",
        code: ValidationCode::CommentSequence,
        reason: "trailing comment marker",
    },
];

/// Signatures screened before a value is bound as a query parameter.
pub const PARAMETER_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: r#"'[^']*'[^']*'|"[^"]*"[^"]*""#,
        code: ValidationCode::QuoteInjection,
        reason: "quoted segment flanked by further quotes",
    },
    PatternRule {
        pattern: r"--|/\*|\*/|//",
        code: ValidationCode::CommentSequence,
        reason: "comment sequence",
    },
    PatternRule {
        pattern: r"(?i)__proto__|\bconstructor\s*[\[.(]|\bprototype\s*[\[.]",
        code: ValidationCode::PrototypeProbe,
        reason: "prototype or constructor probing",
    },
    PatternRule {
        pattern: r"\$\{|\{\{|\}\}",
        code: ValidationCode::TemplateInjection,
        reason: "template interpolation syntax",
    },
];

/// A compiled, ordered pattern table.
#[derive(Debug)]
pub struct PatternTable {
    compiled: Result<Vec<(Regex, &'static PatternRule)>, String>,
}

impl PatternTable {
    /// Compile every rule. Any failure poisons the whole table.
    #[must_use]
    pub fn compile(rules: &'static [PatternRule]) -> Self {
        let compiled = rules
            .iter()
            .map(|rule| {
                Regex::new(rule.pattern)
                    .map(|re| (re, rule))
                    .map_err(|e| format!("pattern '{}': {}", rule.pattern, e))
            })
            .collect();
        Self { compiled }
    }

    /// Whether every rule compiled.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.compiled.is_ok()
    }

    /// Return the first rule matching `input`.
    ///
    /// `Err` carries the compile failure when the table is unavailable.
    pub fn first_match(&self, input: &str) -> Result<Option<&'static PatternRule>, &str> {
        match &self.compiled {
            Ok(rules) => Ok(rules
                .iter()
                .find(|(re, _)| re.is_match(input))
                .map(|(_, rule)| *rule)),
            Err(e) => Err(e.as_str()),
        }
    }

    /// Screen `input`; `Some` is the rejection to return.
    pub(crate) fn screen(&self, input: &str) -> Option<ValidationResult> {
        match self.first_match(input) {
            Ok(None) => None,
            Ok(Some(rule)) => Some(ValidationResult::rejected(
                rule.code,
                format!("Input rejected: {}", rule.reason),
            )),
            Err(e) => Some(ValidationResult::rejected(
                ValidationCode::PatternTableUnavailable,
                format!("Pattern table unavailable: {}", e),
            )),
        }
    }
}

static FREE_TEXT_TABLE: LazyLock<PatternTable> =
    LazyLock::new(|| PatternTable::compile(FREE_TEXT_RULES));

static PARAMETER_TABLE: LazyLock<PatternTable> =
    LazyLock::new(|| PatternTable::compile(PARAMETER_RULES));

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Character class accepted by `validate_identifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharsetPolicy {
    /// `[A-Za-z0-9_-]`
    #[default]
    Strict,
    /// Strict plus `.`
    Relaxed,
}

impl CharsetPolicy {
    fn allows(self, c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || (self == Self::Relaxed && c == '.')
    }
}

/// Validate an identifier against a fixed character class.
///
/// Distinct codes for missing, wrong type, empty, too long and bad characters.
pub fn validate_identifier<'a>(value: impl Into<RawInput<'a>>, policy: CharsetPolicy) -> ValidationResult {
    let text = match value.into().require_text("Identifier") {
        Ok(text) => text,
        Err(rejection) => return rejection,
    };

    if text.is_empty() {
        return ValidationResult::rejected(ValidationCode::Empty, "Identifier must not be empty");
    }
    if let Some(bad) = text.chars().find(|c| !policy.allows(*c)) {
        return ValidationResult::rejected(
            ValidationCode::InvalidCharacters,
            format!("Identifier contains disallowed character {:?}", bad),
        );
    }
    // ASCII only from here, so bytes and characters agree.
    if text.len() > MAX_IDENTIFIER_LENGTH {
        return ValidationResult::rejected(
            ValidationCode::TooLong,
            format!(
                "Identifier length {} exceeds maximum {}",
                text.len(),
                MAX_IDENTIFIER_LENGTH
            ),
        );
    }

    ValidationResult::accepted_with(text)
}

// =============================================================================
// FREE TEXT
// =============================================================================

/// Validate a free-text search term.
///
/// The term is trimmed; its length must fall in `[min_len, max_len]`
/// characters. Any injection signature is a hard reject; nothing is
/// sanitized here.
pub fn validate_free_text<'a>(
    value: impl Into<RawInput<'a>>,
    min_len: usize,
    max_len: usize,
) -> ValidationResult {
    let text = match value.into().require_text("Search text") {
        Ok(text) => text.trim(),
        Err(rejection) => return rejection,
    };

    if text.is_empty() {
        return ValidationResult::rejected(ValidationCode::Empty, "Search text must not be empty");
    }
    let length = text.chars().count();
    if length < min_len {
        return ValidationResult::rejected(
            ValidationCode::TooShort,
            format!("Search text must be at least {} characters", min_len),
        );
    }
    if length > max_len {
        return ValidationResult::rejected(
            ValidationCode::TooLong,
            format!("Search text must be at most {} characters", max_len),
        );
    }
    if let Some(rejection) = FREE_TEXT_TABLE.screen(text) {
        return rejection;
    }

    ValidationResult::accepted_with(text)
}

// =============================================================================
// BOUND PARAMETERS
// =============================================================================

/// Prepare a value for use as a bound query parameter.
///
/// Steps: strip control characters (keeping newline, carriage return and
/// tab, which are escaped later), screen `PARAMETER_RULES`, then escape
/// backslash, quotes, newline, carriage return and tab.
///
/// The escaped output must still only ever be bound as a parameter, never
/// concatenated into query text.
pub fn sanitize_for_query_parameter<'a>(value: impl Into<RawInput<'a>>, max_len: usize) -> ValidationResult {
    let text = match value.into().require_text("Parameter") {
        Ok(text) => text,
        Err(rejection) => return rejection,
    };

    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();

    if stripped.trim().is_empty() {
        return ValidationResult::rejected(ValidationCode::Empty, "Parameter must not be empty");
    }
    if stripped.chars().count() > max_len {
        return ValidationResult::rejected(
            ValidationCode::TooLong,
            format!("Parameter must be at most {} characters", max_len),
        );
    }
    if let Some(rejection) = PARAMETER_TABLE.screen(&stripped) {
        return rejection;
    }

    ValidationResult::accepted_with(escape_parameter(&stripped))
}

/// `sanitize_for_query_parameter` with the default length ceiling.
pub fn sanitize_parameter<'a>(value: impl Into<RawInput<'a>>) -> ValidationResult {
    sanitize_for_query_parameter(value, DEFAULT_PARAMETER_MAX)
}

fn escape_parameter(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{DEFAULT_FREE_TEXT_MAX, DEFAULT_FREE_TEXT_MIN};

    fn free_text(value: &str) -> ValidationResult {
        validate_free_text(value, DEFAULT_FREE_TEXT_MIN, DEFAULT_FREE_TEXT_MAX)
    }

    #[test]
    fn builtin_tables_compile() {
        assert!(FREE_TEXT_TABLE.is_available());
        assert!(PARAMETER_TABLE.is_available());
    }

    #[test]
    fn broken_table_fails_closed() {
        static BROKEN: &[PatternRule] = &[PatternRule {
            pattern: "(unclosed",
            code: ValidationCode::SqlInjection,
            reason: "broken",
        }];
        let table = PatternTable::compile(BROKEN);
        assert!(!table.is_available());
        let rejection = table.screen("harmless").expect("must reject");
        assert_eq!(rejection.code(), Some(ValidationCode::PatternTableUnavailable));
    }

    #[test]
    fn identifier_strict_accepts_charset() {
        let result = validate_identifier("fact_42-a", CharsetPolicy::Strict);
        assert!(result.is_valid());
        assert_eq!(result.sanitized_value(), Some("fact_42-a"));
    }

    #[test]
    fn identifier_dot_depends_on_policy() {
        assert_eq!(
            validate_identifier("a.b", CharsetPolicy::Strict).code(),
            Some(ValidationCode::InvalidCharacters)
        );
        assert!(validate_identifier("a.b", CharsetPolicy::Relaxed).is_valid());
    }

    #[test]
    fn identifier_failure_codes_are_distinct() {
        let long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let json_number = serde_json::json!(7);

        assert_eq!(
            validate_identifier(None::<&str>, CharsetPolicy::Strict).code(),
            Some(ValidationCode::MissingValue)
        );
        assert_eq!(
            validate_identifier(&json_number, CharsetPolicy::Strict).code(),
            Some(ValidationCode::InvalidType)
        );
        assert_eq!(
            validate_identifier("", CharsetPolicy::Strict).code(),
            Some(ValidationCode::Empty)
        );
        assert_eq!(
            validate_identifier(long.as_str(), CharsetPolicy::Strict).code(),
            Some(ValidationCode::TooLong)
        );
        assert_eq!(
            validate_identifier("a/b", CharsetPolicy::Strict).code(),
            Some(ValidationCode::InvalidCharacters)
        );
    }

    #[test]
    fn multibyte_identifier_reports_charset_not_length() {
        let accented = "é".repeat(200);
        assert_eq!(
            validate_identifier(accented.as_str(), CharsetPolicy::Strict).code(),
            Some(ValidationCode::InvalidCharacters)
        );

        let long_and_bad = format!("{}/", "a".repeat(MAX_IDENTIFIER_LENGTH + 10));
        assert_eq!(
            validate_identifier(long_and_bad.as_str(), CharsetPolicy::Relaxed).code(),
            Some(ValidationCode::InvalidCharacters)
        );
    }

    #[test]
    fn free_text_rejects_injection() {
        let result = free_text("'; DROP--");
        assert!(!result.is_valid());
        assert_eq!(result.code(), Some(ValidationCode::SqlInjection));
    }

    #[test]
    fn free_text_rejects_short() {
        assert_eq!(free_text("ab").code(), Some(ValidationCode::TooShort));
    }

    #[test]
    fn free_text_accepts_plain_terms() {
        let result = free_text("valid search terms");
        assert!(result.is_valid());
        assert_eq!(result.sanitized_value(), Some("valid search terms"));
    }

    #[test]
    fn free_text_signatures() {
        assert_eq!(free_text("whitespace only   ").code(), None);
        assert_eq!(free_text("    ").code(), Some(ValidationCode::Empty));
        assert_eq!(free_text("cost $5").code(), Some(ValidationCode::ShellMetacharacter));
        assert_eq!(free_text("hello ${name}").code(), Some(ValidationCode::TemplateInjection));
        assert_eq!(free_text("x or 1=1").code(), Some(ValidationCode::SqlInjection));
        assert_eq!(free_text("vaccines /*").code(), Some(ValidationCode::CommentSequence));
    }

    #[test]
    fn free_text_length_window() {
        let long = "a".repeat(DEFAULT_FREE_TEXT_MAX + 1);
        assert_eq!(free_text(&long).code(), Some(ValidationCode::TooLong));
        assert!(validate_free_text("ab", 2, 10).is_valid());
    }

    #[test]
    fn sanitize_escapes_special_characters() {
        let result = sanitize_parameter("line\tone\nO'Brien");
        assert!(result.is_valid());
        assert_eq!(result.sanitized_value(), Some("line\\tone\\nO\\'Brien"));
    }

    #[test]
    fn sanitize_strips_control_characters() {
        let result = sanitize_parameter("ab\u{0000}c\u{0007}d");
        assert_eq!(result.sanitized_value(), Some("abcd"));
    }

    #[test]
    fn sanitize_rejects_forbidden_patterns() {
        assert_eq!(
            sanitize_parameter("a' OR 'b'='b").code(),
            Some(ValidationCode::QuoteInjection)
        );
        assert_eq!(
            sanitize_parameter("value -- rest").code(),
            Some(ValidationCode::CommentSequence)
        );
        assert_eq!(
            sanitize_parameter("__proto__").code(),
            Some(ValidationCode::PrototypeProbe)
        );
        assert_eq!(
            sanitize_parameter("{{7*7}}").code(),
            Some(ValidationCode::TemplateInjection)
        );
    }

    #[test]
    fn sanitize_enforces_length() {
        assert_eq!(
            sanitize_for_query_parameter("abcdef", 5).code(),
            Some(ValidationCode::TooLong)
        );
        assert!(sanitize_for_query_parameter("abcde", 5).is_valid());
    }
}
