//! Module: write
//! Responsibility: ordered multi-key mutation with partial-failure accounting.
//! Does not own: which keys a mutation touches (callers decide the order).
//!
//! A failure on the first step surfaces unchanged: nothing landed, so the
//! store is exactly as it was. A failure after at least one step landed is
//! reported as `IndexConsistency` carrying the number of applied writes.
//!
//! `WriteSequence` covers one record and its index entries. `CompositeWrite`
//! covers operations built from several repository writes (cascading
//! deletes, an evaluation plus the relation score it changes).

use crate::{
    db::{
        key::render_key,
        store::{KeyValueStore, KvHistory, KvScan},
    },
    error::{ErrorClass, InternalError},
    obs::sink::{MetricsEvent, record},
};

///
/// WriteSequence
///
/// Tracks one logical write (create/update/delete of one record and its
/// index entries) across several store mutations.
///

pub(crate) struct WriteSequence<'s, S: KeyValueStore + ?Sized> {
    store: &'s mut S,
    operation: &'static str,
    key: String,
    applied: usize,
    inserts: u64,
    removes: u64,
}

impl<'s, S: KeyValueStore + ?Sized> WriteSequence<'s, S> {
    pub(crate) fn new(store: &'s mut S, operation: &'static str, key: &str) -> Self {
        Self {
            store,
            operation,
            key: render_key(key),
            applied: 0,
            inserts: 0,
            removes: 0,
        }
    }

    /// Write a primary record.
    pub(crate) fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), InternalError> {
        let result = self.store.put(key, value);
        self.step(result)
    }

    /// Delete a primary record.
    pub(crate) fn delete(&mut self, key: &str) -> Result<(), InternalError> {
        let result = self.store.delete(key);
        self.step(result)
    }

    /// Write one index entry.
    pub(crate) fn insert_index(&mut self, key: &str, marker: Vec<u8>) -> Result<(), InternalError> {
        self.put(key, marker)?;
        self.inserts += 1;

        Ok(())
    }

    /// Remove one index entry.
    pub(crate) fn remove_index(&mut self, key: &str) -> Result<(), InternalError> {
        self.delete(key)?;
        self.removes += 1;

        Ok(())
    }

    #[must_use]
    pub(crate) const fn applied(&self) -> usize {
        self.applied
    }

    /// Index `(inserts, removes)` applied so far.
    #[must_use]
    pub(crate) const fn index_delta(&self) -> (u64, u64) {
        (self.inserts, self.removes)
    }

    fn step(&mut self, result: Result<(), InternalError>) -> Result<(), InternalError> {
        match result {
            Ok(()) => {
                self.applied += 1;
                Ok(())
            }
            Err(err) => Err(interrupted(self.operation, &self.key, self.applied, err)),
        }
    }
}

///
/// CompositeWrite
///
/// Store adapter for one logical operation spanning several repository
/// writes. Counts every mutation that lands, so a failure in a later step
/// is reported against the whole operation rather than the step alone.
///

pub struct CompositeWrite<'s, S: KeyValueStore + ?Sized> {
    store: &'s mut S,
    operation: &'static str,
    key: String,
    applied: usize,
}

impl<'s, S: KeyValueStore + ?Sized> CompositeWrite<'s, S> {
    pub fn new(store: &'s mut S, operation: &'static str, key: &str) -> Self {
        Self {
            store,
            operation,
            key: render_key(key),
            applied: 0,
        }
    }

    /// Store mutations applied so far.
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.applied
    }

    /// Classify a failure raised by any step of this operation.
    ///
    /// Unchanged while nothing has landed; `IndexConsistency` over the whole
    /// operation otherwise.
    #[must_use]
    pub fn fail(&self, err: InternalError) -> InternalError {
        interrupted(self.operation, &self.key, self.applied, err)
    }

    fn count(&mut self, result: Result<(), InternalError>) -> Result<(), InternalError> {
        if result.is_ok() {
            self.applied += 1;
        }

        result
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for CompositeWrite<'_, S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, InternalError> {
        self.store.get(key)
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), InternalError> {
        let result = self.store.put(key, value);
        self.count(result)
    }

    fn delete(&mut self, key: &str) -> Result<(), InternalError> {
        let result = self.store.delete(key);
        self.count(result)
    }

    fn scan(&self, start: &str, end: &str) -> Result<KvScan<'_>, InternalError> {
        self.store.scan(start, end)
    }

    fn history(&self, key: &str) -> Result<KvHistory<'_>, InternalError> {
        self.store.history(key)
    }
}

// Nothing applied: the store is untouched and the error passes through.
// An inner sequence that already reported its interruption is re-scoped to
// the outer operation without logging it twice.
fn interrupted(
    operation: &'static str,
    key: &str,
    applied: usize,
    err: InternalError,
) -> InternalError {
    if applied == 0 {
        return err;
    }

    if err.class != ErrorClass::IndexConsistency {
        tracing::error!(
            operation,
            key,
            applied,
            error = %err.display_with_class(),
            "write sequence interrupted; primary record and indexes may disagree"
        );
        record(MetricsEvent::InterruptedWrite { operation });
    }

    InternalError::index_consistency(operation, key, applied, &err)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::store::MemoryStore,
        error::{ErrorClass, ErrorDetail},
    };

    #[test]
    fn first_step_failure_surfaces_original_error() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(0);

        let mut seq = WriteSequence::new(&mut store, "create", "agent\u{0}a");
        let err = seq.put("agent\u{0}a", vec![1]).unwrap_err();

        assert_eq!(err.class, ErrorClass::StoreUnavailable);
        assert_eq!(seq.applied(), 0);
    }

    #[test]
    fn later_step_failure_becomes_index_consistency() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(1);

        let mut seq = WriteSequence::new(&mut store, "create", "agent\u{0}a");
        seq.put("agent\u{0}a", vec![1]).unwrap();
        let err = seq.insert_index("agentByAddress\u{0}x\u{0}a", vec![0]).unwrap_err();

        assert_eq!(err.class, ErrorClass::IndexConsistency);
        assert!(err.message.contains("agent~a"));
        assert_eq!(seq.index_delta(), (0, 0));
    }

    #[test]
    fn index_steps_count_deltas() {
        let mut store = MemoryStore::new();

        let mut seq = WriteSequence::new(&mut store, "update", "agent\u{0}a");
        seq.insert_index("i\u{0}1", vec![0]).unwrap();
        seq.insert_index("i\u{0}2", vec![0]).unwrap();
        seq.remove_index("i\u{0}1").unwrap();

        assert_eq!(seq.applied(), 3);
        assert_eq!(seq.index_delta(), (2, 1));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["i\u{0}2"]);
    }

    #[test]
    fn composite_counts_writes_across_steps() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(3);

        let mut write = CompositeWrite::new(&mut store, "cascade delete", "service\u{0}s");
        let mut first = WriteSequence::new(&mut write, "delete", "relation\u{0}sa");
        first.remove_index("i\u{0}1").unwrap();
        first.put("relation\u{0}sa", vec![1]).unwrap();
        write.put("evaluation\u{0}sa", vec![1]).unwrap();

        let mut second = WriteSequence::new(&mut write, "delete", "service\u{0}s");
        let err = second.delete("service\u{0}s").unwrap_err();
        assert_eq!(err.class, ErrorClass::StoreUnavailable);

        let err = write.fail(err);
        assert_eq!(err.class, ErrorClass::IndexConsistency);
        assert_eq!(write.applied(), 3);
        assert!(err.message.contains("service~s"));
    }

    #[test]
    fn composite_passes_error_through_before_any_write() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(0);

        let mut write = CompositeWrite::new(&mut store, "reputation", "relation\u{0}sa");
        let err = write.put("evaluation\u{0}sa", vec![1]).unwrap_err();

        assert_eq!(write.fail(err).class, ErrorClass::StoreUnavailable);
    }

    #[test]
    fn composite_keeps_root_cause_of_inner_interruption() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(2);

        let mut write = CompositeWrite::new(&mut store, "reputation", "relation\u{0}sa");
        write.put("evaluation\u{0}sa", vec![1]).unwrap();

        let mut seq = WriteSequence::new(&mut write, "update", "relation\u{0}sa");
        seq.remove_index("i\u{0}1").unwrap();
        let inner = seq.put("relation\u{0}sa", vec![1]).unwrap_err();
        assert_eq!(inner.class, ErrorClass::IndexConsistency);

        let err = write.fail(inner);
        let Some(ErrorDetail::Index(detail)) = err.detail else {
            panic!("expected index detail");
        };
        assert_eq!(detail.operation, "reputation");
        assert_eq!(detail.applied, 2);
        assert_eq!(detail.cause, ErrorClass::StoreUnavailable);
    }
}
