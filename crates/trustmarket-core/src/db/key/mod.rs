//! Module: key
//! Responsibility: composite key encoding/decoding and prefix-scan bounds.
//! Does not own: which fields an entity indexes (see `db::index`).
//!
//! Invariants:
//! - A key is `namespace DELIM field1 DELIM field2 ...`; no part is empty and
//!   no part contains the delimiter.
//! - The delimiter is the lowest code point, so byte order of encoded keys
//!   equals tuple order of `(namespace, fields...)`.
//! - `decode(encode(k)) == k` for every valid key.

#[cfg(test)]
mod tests;

use crate::error::{ErrorOrigin, InternalError};
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

///
/// Constants
///

/// Reserved separator between key parts.
pub const KEY_DELIMITER: char = '\u{0}';

/// Next code point after the delimiter; closes a prefix range.
const DELIMITER_SUCCESSOR: char = '\u{1}';

/// Separator shown in place of the delimiter in logs and messages.
const DISPLAY_DELIMITER: char = '~';

///
/// KeyEncodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum KeyEncodeError {
    #[error("key namespace is empty")]
    EmptyNamespace,

    #[error("key namespace '{namespace}' contains the delimiter")]
    DelimiterInNamespace { namespace: String },

    #[error("key field {position} is empty")]
    EmptyField { position: usize },

    #[error("key field {position} contains the delimiter")]
    DelimiterInField { position: usize },
}

impl From<KeyEncodeError> for InternalError {
    fn from(err: KeyEncodeError) -> Self {
        Self::invalid_argument(ErrorOrigin::Key, err.to_string())
    }
}

///
/// KeyDecodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum KeyDecodeError {
    #[error("expected namespace '{expected}', found '{found}'")]
    NamespaceMismatch { expected: String, found: String },

    #[error("expected {expected} field(s), found {found}")]
    Arity { expected: usize, found: usize },

    #[error("field {position} is empty")]
    EmptyField { position: usize },
}

///
/// CompositeKey
///
/// Decoded form of one delimiter-joined key.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CompositeKey {
    namespace: String,
    fields: Vec<String>,
}

impl CompositeKey {
    /// Validate parts and build a key.
    pub fn new<I, T>(namespace: &str, fields: I) -> Result<Self, KeyEncodeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        check_namespace(namespace)?;

        let fields = fields.into_iter().map(Into::into).collect::<Vec<String>>();
        for (position, field) in fields.iter().enumerate() {
            check_field(position, field)?;
        }

        Ok(Self {
            namespace: namespace.to_string(),
            fields,
        })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Produce the stored key string.
    #[must_use]
    pub fn encode(&self) -> String {
        let len = self.namespace.len() + self.fields.iter().map(|f| f.len() + 1).sum::<usize>();
        let mut out = String::with_capacity(len);

        out.push_str(&self.namespace);
        for field in &self.fields {
            out.push(KEY_DELIMITER);
            out.push_str(field);
        }

        out
    }

    /// Parse a stored key, requiring an exact namespace and field count.
    pub fn decode(raw: &str, namespace: &str, arity: usize) -> Result<Self, KeyDecodeError> {
        let mut parts = raw.split(KEY_DELIMITER);
        let found_namespace = parts.next().unwrap_or_default();

        if found_namespace != namespace {
            return Err(KeyDecodeError::NamespaceMismatch {
                expected: namespace.to_string(),
                found: found_namespace.to_string(),
            });
        }

        let fields = parts.map(str::to_string).collect::<Vec<_>>();
        if fields.len() != arity {
            return Err(KeyDecodeError::Arity {
                expected: arity,
                found: fields.len(),
            });
        }
        if let Some(position) = fields.iter().position(String::is_empty) {
            return Err(KeyDecodeError::EmptyField { position });
        }

        Ok(Self {
            namespace: namespace.to_string(),
            fields,
        })
    }
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace)?;
        for field in &self.fields {
            write!(f, "{DISPLAY_DELIMITER}{field}")?;
        }

        Ok(())
    }
}

/// Encode the primary-record key of one entity.
pub fn data_key(entity_name: &str, id: &str) -> Result<String, KeyEncodeError> {
    CompositeKey::new(entity_name, [id]).map(|key| key.encode())
}

/// Render a stored key with the display separator, for diagnostics.
#[must_use]
pub fn render_key(raw: &str) -> String {
    raw.replace(KEY_DELIMITER, &DISPLAY_DELIMITER.to_string())
}

///
/// KeyRange
///
/// Half-open scan range `[start, end)` covering every key that begins with
/// `namespace` followed by the given prefix fields.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
    pub start: String,
    pub end: String,
}

impl KeyRange {
    pub fn prefix(namespace: &str, prefix: &[&str]) -> Result<Self, KeyEncodeError> {
        let key = CompositeKey::new(namespace, prefix.iter().copied())?;

        let mut start = key.encode();
        let mut end = start.clone();
        start.push(KEY_DELIMITER);
        end.push(DELIMITER_SUCCESSOR);

        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.start.as_str() <= key && key < self.end.as_str()
    }
}

fn check_namespace(namespace: &str) -> Result<(), KeyEncodeError> {
    if namespace.is_empty() {
        return Err(KeyEncodeError::EmptyNamespace);
    }
    if namespace.contains(KEY_DELIMITER) {
        return Err(KeyEncodeError::DelimiterInNamespace {
            namespace: namespace.to_string(),
        });
    }

    Ok(())
}

fn check_field(position: usize, field: &str) -> Result<(), KeyEncodeError> {
    if field.is_empty() {
        return Err(KeyEncodeError::EmptyField { position });
    }
    if field.contains(KEY_DELIMITER) {
        return Err(KeyEncodeError::DelimiterInField { position });
    }

    Ok(())
}
