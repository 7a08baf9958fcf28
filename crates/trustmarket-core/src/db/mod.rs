//! Storage layer: key codec, store capability, repository, indexes, range
//! queries and history.
//!
//! Every operation takes the store handle explicitly; nothing here holds
//! ambient state.

pub mod history;
pub mod index;
pub mod key;
pub mod query;
pub mod repository;
pub mod store;

pub(crate) mod write;

pub use history::{HistoryReader, Version, VersionIter};
pub use index::{INDEX_MARKER, IndexManager, RebuildReport, VerifyReport};
pub use key::{CompositeKey, KEY_DELIMITER, KeyDecodeError, KeyEncodeError, KeyRange};
pub use query::{IndexScan, RangeQueryEngine, ScanDiagnostics, ScanPage};
pub use repository::EntityRepository;
pub use store::{HistoryRecord, KeyValueStore, KvHistory, KvScan, MemoryStore, TxId};
pub use write::CompositeWrite;
