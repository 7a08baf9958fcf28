//! Module: store
//! Responsibility: the key-value capability every repository operation runs
//! against, plus an in-memory implementation.
//! Does not own: key layout or record encoding.
//!
//! Contract:
//! - `get` distinguishes "absent" (`Ok(None)`) from transport failure
//!   (`Err` with class `StoreUnavailable`).
//! - `scan` yields `[start, end)` in ascending key order.
//! - `history` yields every put/delete ever applied to a key, oldest first;
//!   history is append-only and survives deletion of the live value.

mod memory;

pub use memory::MemoryStore;

use crate::error::InternalError;
use derive_more::{Display, From};
use serde::Serialize;

///
/// TxId
/// Identifier of the host transaction that produced a version.
///

#[derive(Clone, Debug, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

///
/// HistoryRecord
/// One version of one key; `value == None` is a tombstone.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryRecord {
    pub ordinal: u64,
    pub tx_id: TxId,
    pub value: Option<Vec<u8>>,
}

impl HistoryRecord {
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Ascending `(key, value)` stream from a range scan.
pub type KvScan<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>), InternalError>> + 'a>;

/// Oldest-first version stream for one key.
pub type KvHistory<'a> = Box<dyn Iterator<Item = Result<HistoryRecord, InternalError>> + 'a>;

///
/// KeyValueStore
///
/// Versioned, ordered key-value substrate supplied by the host.
///

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, InternalError>;

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), InternalError>;

    fn delete(&mut self, key: &str) -> Result<(), InternalError>;

    fn scan(&self, start: &str, end: &str) -> Result<KvScan<'_>, InternalError>;

    fn history(&self, key: &str) -> Result<KvHistory<'_>, InternalError>;

    fn contains(&self, key: &str) -> Result<bool, InternalError> {
        Ok(self.get(key)?.is_some())
    }
}
