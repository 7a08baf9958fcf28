//! Argument sanitation applied before any store access.
//!
//! Identifiers and indexed fields end up inside composite keys, so they are
//! held to the stricter key rules; free text only has a length bound.

use crate::{
    config::LimitsConfig,
    db::key::KEY_DELIMITER,
    error::{ErrorOrigin, InternalError},
};
use thiserror::Error as ThisError;

///
/// SanitizeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum SanitizeError {
    #[error("{operation} expects {expected} argument(s), got {found}")]
    Arity {
        operation: String,
        expected: String,
        found: usize,
    },

    #[error("argument '{field}' must not be empty")]
    Empty { field: &'static str },

    #[error("argument '{field}' is {len} bytes (max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("argument '{field}' must not contain the key delimiter (U+0000)")]
    ContainsDelimiter { field: &'static str },

    #[error("argument '{field}' must not contain control characters")]
    ControlCharacter { field: &'static str },
}

impl From<SanitizeError> for InternalError {
    fn from(err: SanitizeError) -> Self {
        Self::invalid_argument(ErrorOrigin::Sanitize, err.to_string())
    }
}

///
/// Sanitizer
///

#[derive(Clone, Copy, Debug)]
pub struct Sanitizer {
    limits: LimitsConfig,
}

impl Sanitizer {
    #[must_use]
    pub const fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> LimitsConfig {
        self.limits
    }

    /// Require between `min` and `max` arguments, inclusive.
    pub fn arity<'a>(
        operation: &str,
        args: &'a [String],
        min: usize,
        max: usize,
    ) -> Result<&'a [String], SanitizeError> {
        if (min..=max).contains(&args.len()) {
            return Ok(args);
        }

        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min}-{max}")
        };

        Err(SanitizeError::Arity {
            operation: operation.to_string(),
            expected,
            found: args.len(),
        })
    }

    /// Validate a value destined for a composite key.
    pub fn key_field<'a>(
        &self,
        field: &'static str,
        value: &'a str,
    ) -> Result<&'a str, SanitizeError> {
        Self::bounded(field, value, self.limits.max_key_len)?;
        Self::key_chars(field, value)
    }

    /// Validate an identifier built by concatenating `parts` key fields.
    pub fn derived_key_field<'a>(
        &self,
        field: &'static str,
        value: &'a str,
        parts: usize,
    ) -> Result<&'a str, SanitizeError> {
        Self::bounded(field, value, self.limits.max_key_len.saturating_mul(parts))?;
        Self::key_chars(field, value)
    }

    /// Validate a free-text value that never participates in a key.
    pub fn text_field<'a>(
        &self,
        field: &'static str,
        value: &'a str,
    ) -> Result<&'a str, SanitizeError> {
        Self::bounded(field, value, self.limits.max_text_len)
    }

    fn key_chars<'a>(field: &'static str, value: &'a str) -> Result<&'a str, SanitizeError> {
        if value.contains(KEY_DELIMITER) {
            return Err(SanitizeError::ContainsDelimiter { field });
        }
        if value.chars().any(char::is_control) {
            return Err(SanitizeError::ControlCharacter { field });
        }

        Ok(value)
    }

    fn bounded<'a>(
        field: &'static str,
        value: &'a str,
        max: usize,
    ) -> Result<&'a str, SanitizeError> {
        if value.is_empty() {
            return Err(SanitizeError::Empty { field });
        }
        if value.len() > max {
            return Err(SanitizeError::TooLong {
                field,
                len: value.len(),
                max,
            });
        }

        Ok(value)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn arity_accepts_range_and_reports_expected_span() {
        let three = args(&["a", "b", "c"]);
        assert!(Sanitizer::arity("InitAgent", &three, 3, 3).is_ok());
        assert!(Sanitizer::arity("InitServiceAgentRelation", &three, 4, 5).is_err());

        let err = Sanitizer::arity("InitServiceAgentRelation", &three, 4, 5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "InitServiceAgentRelation expects 4-5 argument(s), got 3"
        );
    }

    #[test]
    fn key_field_rejects_empty_delimiter_and_control() {
        let sanitizer = Sanitizer::default();

        assert_eq!(
            sanitizer.key_field("AgentId", ""),
            Err(SanitizeError::Empty { field: "AgentId" })
        );
        assert_eq!(
            sanitizer.key_field("AgentId", "a\u{0}b"),
            Err(SanitizeError::ContainsDelimiter { field: "AgentId" })
        );
        assert_eq!(
            sanitizer.key_field("AgentId", "a\u{7f}"),
            Err(SanitizeError::ControlCharacter { field: "AgentId" })
        );
        assert_eq!(sanitizer.key_field("Name", "agent 1"), Ok("agent 1"));
    }

    #[test]
    fn length_bounds_follow_limits() {
        let sanitizer = Sanitizer::new(LimitsConfig {
            max_key_len: 4,
            max_text_len: 8,
        });

        assert!(matches!(
            sanitizer.key_field("AgentId", "abcde"),
            Err(SanitizeError::TooLong { len: 5, max: 4, .. })
        ));
        assert_eq!(sanitizer.text_field("Description", "a~b c"), Ok("a~b c"));
        assert_eq!(
            sanitizer.derived_key_field("RelationId", "abcdefgh", 2),
            Ok("abcdefgh")
        );
        assert!(sanitizer.text_field("Description", "123456789").is_err());
    }
}
