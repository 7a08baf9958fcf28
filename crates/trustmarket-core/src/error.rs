use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every operation in the core surfaces exactly one of these on failure.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct an input-validation failure raised before any store access.
    pub(crate) fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message)
    }

    /// Construct a missing-primary-record error for one entity key.
    pub fn not_found(entity: &str, key: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("{entity} not found: {key}"),
            detail: Some(ErrorDetail::Store(StoreError::NotFound { key })),
        }
    }

    /// Construct a create-on-existing-key conflict.
    pub fn already_exists(entity: &str, key: impl Into<String>) -> Self {
        let key = key.into();

        Self {
            class: ErrorClass::AlreadyExists,
            origin: ErrorOrigin::Store,
            message: format!("{entity} already exists: {key}"),
            detail: Some(ErrorDetail::Store(StoreError::AlreadyExists { key })),
        }
    }

    /// Construct a backing-store transport failure.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        let message = message.into();

        Self {
            class: ErrorClass::StoreUnavailable,
            origin: ErrorOrigin::Store,
            message: format!("store unavailable: {message}"),
            detail: Some(ErrorDetail::Store(StoreError::Unavailable { message })),
        }
    }

    /// Construct a composite-key decode failure.
    pub(crate) fn malformed_key(key: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::MalformedKey,
            ErrorOrigin::Key,
            format!("malformed key '{}': {reason}", key.escape_debug()),
        )
    }

    /// Wrap a failure that interrupted a multi-key write sequence.
    ///
    /// `applied` counts the store mutations that already landed.
    pub(crate) fn index_consistency(
        operation: &'static str,
        key: &str,
        applied: usize,
        source: &Self,
    ) -> Self {
        let cause = match &source.detail {
            Some(ErrorDetail::Index(inner)) => inner.cause,
            _ => source.class,
        };

        Self {
            class: ErrorClass::IndexConsistency,
            origin: ErrorOrigin::Index,
            message: format!(
                "{operation} of '{key}' interrupted after {applied} store write(s): {}",
                source.message
            ),
            detail: Some(ErrorDetail::Index(IndexConsistencyDetail {
                operation,
                key: key.to_string(),
                applied,
                cause,
            })),
        }
    }

    /// Construct a reputation-aggregation failure for a key with no events.
    pub(crate) fn no_history(key: &str) -> Self {
        Self::new(
            ErrorClass::NoHistory,
            ErrorOrigin::Reputation,
            format!("no reputation events recorded for '{key}'"),
        )
    }

    /// Construct an index-origin corruption error.
    pub(crate) fn index_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Index, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),

    #[error("{0}")]
    Index(IndexConsistencyDetail),
}

///
/// StoreError
///
/// Store-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Store`].
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("key already exists: {key}")]
    AlreadyExists { key: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

///
/// IndexConsistencyDetail
///
/// Where a primary/index write sequence stopped.
///

#[derive(Debug, ThisError)]
#[error("{operation} of '{key}' stopped after {applied} write(s) ({cause})")]
pub struct IndexConsistencyDetail {
    pub operation: &'static str,
    pub key: String,
    pub applied: usize,
    pub cause: ErrorClass,
}

///
/// ErrorClass
/// Runtime error taxonomy.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    MalformedKey,
    IndexConsistency,
    StoreUnavailable,
    NoHistory,
    Corruption,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::MalformedKey => "malformed_key",
            Self::IndexConsistency => "index_consistency",
            Self::StoreUnavailable => "store_unavailable",
            Self::NoHistory => "no_history",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Subsystem that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Sanitize,
    Serialize,
    Store,
    Key,
    Index,
    Query,
    History,
    Reputation,
    Config,
    Interface,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sanitize => "sanitize",
            Self::Serialize => "serialize",
            Self::Store => "store",
            Self::Key => "key",
            Self::Index => "index",
            Self::Query => "query",
            Self::History => "history",
            Self::Reputation => "reputation",
            Self::Config => "config",
            Self::Interface => "interface",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
