use crate::{
    db::store::{HistoryRecord, KeyValueStore, KvHistory, KvScan, TxId},
    error::InternalError,
};
use std::collections::BTreeMap;

///
/// MemoryStore
///
/// Ordered map of live values plus an append-only version log per key.
/// Carries fault switches so callers can exercise failure paths.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    live: BTreeMap<String, Vec<u8>>,
    versions: BTreeMap<String, Vec<HistoryRecord>>,
    tx_seq: u64,
    pinned_tx: Option<TxId>,
    faults: FaultPlan,
}

///
/// FaultPlan
///

#[derive(Clone, Copy, Debug, Default)]
struct FaultPlan {
    unavailable: bool,
    writes_until_failure: Option<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute every following write to `tx_id` until [`Self::end_tx`].
    pub fn begin_tx(&mut self, tx_id: impl Into<TxId>) {
        self.pinned_tx = Some(tx_id.into());
    }

    pub fn end_tx(&mut self) {
        self.pinned_tx = None;
    }

    /// Make every call fail as if the backing store were unreachable.
    pub const fn set_unavailable(&mut self, unavailable: bool) {
        self.faults.unavailable = unavailable;
    }

    /// Let `n` more writes succeed, then fail every write after them.
    pub const fn fail_writes_after(&mut self, n: usize) {
        self.faults.writes_until_failure = Some(n);
    }

    pub const fn clear_faults(&mut self) {
        self.faults = FaultPlan {
            unavailable: false,
            writes_until_failure: None,
        };
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.live.keys().map(String::as_str)
    }

    fn check_available(&self) -> Result<(), InternalError> {
        if self.faults.unavailable {
            return Err(InternalError::store_unavailable("memory store switched off"));
        }

        Ok(())
    }

    fn check_write(&mut self, key: &str) -> Result<(), InternalError> {
        self.check_available()?;

        match self.faults.writes_until_failure {
            Some(0) => Err(InternalError::store_unavailable(format!(
                "injected write failure at '{}'",
                key.escape_debug()
            ))),
            Some(n) => {
                self.faults.writes_until_failure = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn next_tx(&mut self) -> TxId {
        self.tx_seq += 1;

        match &self.pinned_tx {
            Some(tx) => tx.clone(),
            None => TxId::from(format!("tx{:08}", self.tx_seq)),
        }
    }

    fn append_version(&mut self, key: &str, value: Option<Vec<u8>>) {
        let tx_id = self.next_tx();
        let versions = self.versions.entry(key.to_string()).or_default();
        let ordinal = versions.len() as u64 + 1;

        versions.push(HistoryRecord {
            ordinal,
            tx_id,
            value,
        });
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, InternalError> {
        self.check_available()?;

        Ok(self.live.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), InternalError> {
        self.check_write(key)?;

        self.append_version(key, Some(value.clone()));
        self.live.insert(key.to_string(), value);

        Ok(())
    }

    // Deleting an absent key leaves no tombstone.
    fn delete(&mut self, key: &str) -> Result<(), InternalError> {
        self.check_write(key)?;

        if self.live.remove(key).is_some() {
            self.append_version(key, None);
        }

        Ok(())
    }

    fn scan(&self, start: &str, end: &str) -> Result<KvScan<'_>, InternalError> {
        self.check_available()?;

        if start >= end {
            return Ok(Box::new(std::iter::empty()));
        }

        let iter = self
            .live
            .range::<str, _>((
                std::ops::Bound::Included(start),
                std::ops::Bound::Excluded(end),
            ))
            .map(|(k, v)| Ok::<_, InternalError>((k.clone(), v.clone())));

        Ok(Box::new(iter))
    }

    fn history(&self, key: &str) -> Result<KvHistory<'_>, InternalError> {
        self.check_available()?;

        let records = self.versions.get(key).map_or(&[][..], Vec::as_slice);

        Ok(Box::new(records.iter().cloned().map(Ok::<_, InternalError>)))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn get_distinguishes_absent_from_unavailable() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set_unavailable(true);
        let err = store.get("k").unwrap_err();
        assert_eq!(err.class, ErrorClass::StoreUnavailable);
    }

    #[test]
    fn scan_is_ordered_and_half_open() {
        let mut store = MemoryStore::new();
        for key in ["b", "a", "c", "d"] {
            store.put(key, key.as_bytes().to_vec()).unwrap();
        }

        let keys = store
            .scan("a", "c")
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect::<Vec<_>>();

        assert_eq!(keys, ["a", "b"]);
        assert_eq!(store.scan("c", "a").unwrap().count(), 0);
    }

    #[test]
    fn history_keeps_tombstones_after_delete() {
        let mut store = MemoryStore::new();
        store.put("k", b"1".to_vec()).unwrap();
        store.put("k", b"2".to_vec()).unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();

        let history = store.history("k").unwrap().collect::<Result<Vec<_>, _>>().unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].ordinal, 1);
        assert_eq!(history[1].value.as_deref(), Some(&b"2"[..]));
        assert!(history[2].is_tombstone());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn pinned_tx_id_tags_every_write() {
        let mut store = MemoryStore::new();
        store.begin_tx("tx-a");
        store.put("x", vec![1]).unwrap();
        store.put("y", vec![2]).unwrap();
        store.end_tx();
        store.put("x", vec![3]).unwrap();

        let x = store.history("x").unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(x[0].tx_id.as_str(), "tx-a");
        assert_ne!(x[1].tx_id.as_str(), "tx-a");
    }

    #[test]
    fn injected_write_failure_trips_after_budget() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(1);

        store.put("a", vec![]).unwrap();
        let err = store.put("b", vec![]).unwrap_err();

        assert_eq!(err.class, ErrorClass::StoreUnavailable);
        assert!(store.contains("a").unwrap());
        assert!(!store.contains("b").unwrap());

        store.clear_faults();
        store.put("b", vec![]).unwrap();
    }
}
