use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use trustmarket_core::{
    config::ConfigError,
    entity::RoleParseError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
    sanitize::SanitizeError,
    types::AmountParseError,
};

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{origin}:{kind}: {message}")]
#[serde(rename_all = "PascalCase")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, ErrorOrigin::Interface, message)
    }

    pub(crate) fn serialize(err: &serde_json::Error) -> Self {
        Self::new(
            ErrorKind::Internal,
            ErrorOrigin::Serialize,
            format!("response encoding failed: {err}"),
        )
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class.into(), err.origin.into(), err.message)
    }
}

impl From<SanitizeError> for Error {
    fn from(err: SanitizeError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<AmountParseError> for Error {
    fn from(err: AmountParseError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<RoleParseError> for Error {
    fn from(err: RoleParseError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        InternalError::from(err).into()
    }
}

///
/// ErrorKind
/// Public failure taxonomy; one variant per way an operation can fail.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Rejected before any store access; the caller can correct and retry.
    InvalidArgument,
    NotFound,
    AlreadyExists,

    /// An index key did not decode; stored data is damaged.
    MalformedKey,

    /// A multi-key write stopped partway. Run `RebuildIndexes` to repair.
    IndexConsistency,

    StoreUnavailable,
    NoHistory,
    Corruption,

    /// The caller cannot remediate this.
    Internal,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::InvalidArgument => Self::InvalidArgument,
            ErrorClass::NotFound => Self::NotFound,
            ErrorClass::AlreadyExists => Self::AlreadyExists,
            ErrorClass::MalformedKey => Self::MalformedKey,
            ErrorClass::IndexConsistency => Self::IndexConsistency,
            ErrorClass::StoreUnavailable => Self::StoreUnavailable,
            ErrorClass::NoHistory => Self::NoHistory,
            ErrorClass::Corruption => Self::Corruption,
            ErrorClass::Internal => Self::Internal,
        }
    }
}

///
/// ErrorOrigin
/// Public origin taxonomy.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Config,
    History,
    Index,
    Interface,
    Key,
    Query,
    Reputation,
    Sanitize,
    Serialize,
    Store,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Config => Self::Config,
            CoreErrorOrigin::History => Self::History,
            CoreErrorOrigin::Index => Self::Index,
            CoreErrorOrigin::Interface => Self::Interface,
            CoreErrorOrigin::Key => Self::Key,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Reputation => Self::Reputation,
            CoreErrorOrigin::Sanitize => Self::Sanitize,
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Store => Self::Store,
        }
    }
}

///
/// TESTS
///
