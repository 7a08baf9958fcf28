//! Module: repository
//! Responsibility: primary-record lifecycle for any entity kind, composed
//! with index maintenance under a fixed write order.
//! Does not own: what an entity's indexes are (`EntityKind::MODEL`).
//!
//! Write order per operation:
//! - create: primary, then every index entry
//! - update: stale index entries out, primary overwrite, fresh entries in
//! - delete: every index entry out, then the primary
//!
//! An interrupted sequence therefore leaves at worst a record with a missing
//! index entry, never an index entry pointing at absent or different data.

use crate::{
    MAX_RECORD_BYTES,
    db::{
        index::IndexManager,
        key::{KeyRange, data_key, render_key},
        store::KeyValueStore,
        write::WriteSequence,
    },
    error::InternalError,
    obs::sink::{ExecKind, MetricsEvent, Span, record},
    sanitize::Sanitizer,
    serialize::{deserialize_bounded, serialize},
    traits::EntityKind,
};
use std::marker::PhantomData;

///
/// EntityRepository
///

#[derive(Clone, Copy, Debug)]
pub struct EntityRepository<E: EntityKind> {
    sanitizer: Sanitizer,
    _marker: PhantomData<E>,
}

impl<E: EntityKind> EntityRepository<E> {
    #[must_use]
    pub const fn new(sanitizer: Sanitizer) -> Self {
        Self {
            sanitizer,
            _marker: PhantomData,
        }
    }

    /// Primary-record key for `id`.
    pub fn data_key(id: &str) -> Result<String, InternalError> {
        Ok(data_key(E::MODEL.entity_name, id)?)
    }

    pub fn exists<S>(&self, store: &S, id: &str) -> Result<bool, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        store.contains(&Self::data_key(id)?)
    }

    /// Read one record; `Ok(None)` when absent.
    pub fn try_read<S>(&self, store: &S, id: &str) -> Result<Option<E>, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut span = Span::<E>::new(ExecKind::Read);
        span.finish(Self::try_read_inner(store, id))
    }

    /// Read one record; absence is `NotFound`.
    pub fn read<S>(&self, store: &S, id: &str) -> Result<E, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        self.try_read(store, id)?
            .ok_or_else(|| InternalError::not_found(E::MODEL.entity_name, id))
    }

    pub fn create<S>(&self, store: &mut S, entity: &E) -> Result<(), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut span = Span::<E>::new(ExecKind::Create);
        span.finish(self.create_inner(store, entity))
    }

    /// Overwrite an existing record, moving any index entries whose fields changed.
    pub fn update<S>(&self, store: &mut S, entity: &E) -> Result<E, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut span = Span::<E>::new(ExecKind::Update);
        span.finish(self.update_inner(store, entity))
    }

    /// Create when absent, overwrite otherwise.
    pub fn save<S>(&self, store: &mut S, entity: &E) -> Result<(), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        if self.exists(&*store, entity.primary_key())? {
            self.update(store, entity).map(|_| ())
        } else {
            self.create(store, entity)
        }
    }

    /// Remove a record and all of its index entries; returns the removed value.
    pub fn delete<S>(&self, store: &mut S, id: &str) -> Result<E, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut span = Span::<E>::new(ExecKind::Delete);
        span.finish(Self::delete_inner(store, id))
    }

    /// Every live record of this kind, in primary-key order.
    pub fn scan_all<S>(&self, store: &S) -> Result<Vec<E>, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut span = Span::<E>::new(ExecKind::Scan);
        span.finish(Self::scan_all_inner(store))
    }

    fn try_read_inner<S>(store: &S, id: &str) -> Result<Option<E>, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let key = Self::data_key(id)?;
        store
            .get(&key)?
            .map(|bytes| {
                deserialize_bounded(&bytes, MAX_RECORD_BYTES).map_err(InternalError::from)
            })
            .transpose()
    }

    fn create_inner<S>(&self, store: &mut S, entity: &E) -> Result<(), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        entity.sanitize(&self.sanitizer)?;

        let id = entity.primary_key();
        let key = Self::data_key(id)?;
        if store.contains(&key)? {
            return Err(InternalError::already_exists(E::MODEL.entity_name, id));
        }

        let index_keys = IndexManager::<E>::index_keys_for(entity)?;
        let bytes = serialize(entity)?;

        let mut seq = WriteSequence::new(store, "create", &key);
        seq.put(&key, bytes)?;
        IndexManager::<E>::create_all(&mut seq, &index_keys)?;

        Self::finish_write(&seq, &key);

        Ok(())
    }

    fn update_inner<S>(&self, store: &mut S, entity: &E) -> Result<E, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        entity.sanitize(&self.sanitizer)?;

        let id = entity.primary_key();
        let key = Self::data_key(id)?;
        let previous: E = match store.get(&key)? {
            Some(bytes) => deserialize_bounded(&bytes, MAX_RECORD_BYTES)?,
            None => return Err(InternalError::not_found(E::MODEL.entity_name, id)),
        };

        let old_keys = IndexManager::<E>::index_keys_for(&previous)?;
        let new_keys = IndexManager::<E>::index_keys_for(entity)?;
        let stale = old_keys.difference(&new_keys).cloned().collect();
        let fresh = new_keys.difference(&old_keys).cloned().collect();
        let bytes = serialize(entity)?;

        let mut seq = WriteSequence::new(store, "update", &key);
        IndexManager::<E>::retract_all(&mut seq, &stale)?;
        seq.put(&key, bytes)?;
        IndexManager::<E>::create_all(&mut seq, &fresh)?;

        Self::finish_write(&seq, &key);

        Ok(previous)
    }

    fn delete_inner<S>(store: &mut S, id: &str) -> Result<E, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let entity = Self::try_read_inner(&*store, id)?
            .ok_or_else(|| InternalError::not_found(E::MODEL.entity_name, id))?;

        let key = Self::data_key(id)?;
        let index_keys = IndexManager::<E>::index_keys_for(&entity)?;

        let mut seq = WriteSequence::new(store, "delete", &key);
        IndexManager::<E>::retract_all(&mut seq, &index_keys)?;
        seq.delete(&key)?;

        Self::finish_write(&seq, &key);

        Ok(entity)
    }

    fn scan_all_inner<S>(store: &S) -> Result<Vec<E>, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let range = KeyRange::prefix(E::MODEL.entity_name, &[])?;
        let rows = store
            .scan(&range.start, &range.end)?
            .map(|row| {
                let (_, bytes) = row?;
                Ok(deserialize_bounded(&bytes, MAX_RECORD_BYTES)?)
            })
            .collect::<Result<Vec<E>, InternalError>>()?;

        record(MetricsEvent::RowsScanned {
            entity: E::MODEL.entity_name,
            rows: rows.len() as u64,
        });

        Ok(rows)
    }

    fn finish_write<S>(seq: &WriteSequence<'_, S>, key: &str)
    where
        S: KeyValueStore + ?Sized,
    {
        let (inserts, removes) = seq.index_delta();
        if inserts + removes > 0 {
            record(MetricsEvent::IndexDelta {
                entity: E::MODEL.entity_name,
                inserts,
                removes,
            });
        }

        tracing::debug!(
            entity = E::MODEL.entity_name,
            key = %render_key(key),
            writes = seq.applied(),
            inserts,
            removes,
            "record written"
        );
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::store::MemoryStore,
        entity::{Agent, Relation},
        error::ErrorClass,
        obs::{metrics_report, metrics_reset_all},
        types::Amount,
    };

    fn agents() -> EntityRepository<Agent> {
        EntityRepository::new(Sanitizer::default())
    }

    fn agent() -> Agent {
        Agent::new("idagent1", "agent1", "address1")
    }

    #[test]
    fn create_then_read_returns_input() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();

        assert_eq!(agents().read(&store, "idagent1").unwrap(), agent());
        assert!(store.contains("agentByAddress\u{0}address1\u{0}idagent1").unwrap());
    }

    #[test]
    fn create_twice_is_already_exists() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();

        let err = agents().create(&mut store, &agent()).unwrap_err();
        assert_eq!(err.class, ErrorClass::AlreadyExists);
    }

    #[test]
    fn absent_key_is_not_found_everywhere() {
        let mut store = MemoryStore::new();

        assert!(agents().read(&store, "nobody").unwrap_err().is_not_found());
        assert!(agents().update(&mut store, &agent()).unwrap_err().is_not_found());
        assert!(agents().delete(&mut store, "nobody").unwrap_err().is_not_found());
        assert!(agents().try_read(&store, "nobody").unwrap().is_none());
    }

    #[test]
    fn unavailable_store_is_not_confused_with_absence() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);

        let err = agents().read(&store, "idagent1").unwrap_err();
        assert_eq!(err.class, ErrorClass::StoreUnavailable);
    }

    #[test]
    fn update_moves_changed_index_entry_only() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();

        let moved = Agent::new("idagent1", "agent1", "address2");
        let previous = agents().update(&mut store, &moved).unwrap();

        assert_eq!(previous, agent());
        assert!(!store.contains("agentByAddress\u{0}address1\u{0}idagent1").unwrap());
        assert!(store.contains("agentByAddress\u{0}address2\u{0}idagent1").unwrap());
    }

    #[test]
    fn update_of_unindexed_field_touches_no_index() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();
        metrics_reset_all();

        agents()
            .update(&mut store, &Agent::new("idagent1", "renamed", "address1"))
            .unwrap();

        let report = metrics_report();
        assert_eq!(report.ops.index_inserts + report.ops.index_removes, 0);
    }

    #[test]
    fn delete_removes_primary_and_indexes() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();

        let removed = agents().delete(&mut store, "idagent1").unwrap();

        assert_eq!(removed, agent());
        assert!(store.is_empty());
    }

    #[test]
    fn create_failure_after_primary_is_index_consistency() {
        let mut store = MemoryStore::new();
        store.fail_writes_after(1);

        let err = agents().create(&mut store, &agent()).unwrap_err();

        assert_eq!(err.class, ErrorClass::IndexConsistency);
        // primary landed, index did not: a missing index, never a dangling one
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["agent\u{0}idagent1"]);
    }

    #[test]
    fn delete_failure_after_index_removal_leaves_primary() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();
        store.fail_writes_after(1);

        let err = agents().delete(&mut store, "idagent1").unwrap_err();

        assert_eq!(err.class, ErrorClass::IndexConsistency);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["agent\u{0}idagent1"]);
    }

    #[test]
    fn update_failure_after_stale_retract_leaves_no_index() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();
        store.fail_writes_after(1);

        let moved = Agent::new("idagent1", "agent1", "address2");
        let err = agents().update(&mut store, &moved).unwrap_err();

        // stale entry out, primary untouched, fresh entry never written
        assert_eq!(err.class, ErrorClass::IndexConsistency);
        store.clear_faults();
        assert_eq!(agents().read(&store, "idagent1").unwrap(), agent());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["agent\u{0}idagent1"]);

        let report = IndexManager::<Agent>::verify(&store).unwrap();
        assert!(report.orphaned.is_empty());
        assert_eq!(report.missing, vec!["agentByAddress~address1~idagent1"]);
    }

    #[test]
    fn update_failure_after_overwrite_leaves_only_missing_entry() {
        let mut store = MemoryStore::new();
        agents().create(&mut store, &agent()).unwrap();
        store.fail_writes_after(2);

        let moved = Agent::new("idagent1", "agent1", "address2");
        let err = agents().update(&mut store, &moved).unwrap_err();

        assert_eq!(err.class, ErrorClass::IndexConsistency);
        store.clear_faults();
        assert_eq!(agents().read(&store, "idagent1").unwrap(), moved);
        assert!(!store.contains("agentByAddress\u{0}address1\u{0}idagent1").unwrap());
        assert!(!store.contains("agentByAddress\u{0}address2\u{0}idagent1").unwrap());

        let report = IndexManager::<Agent>::verify(&store).unwrap();
        assert!(report.orphaned.is_empty());
        assert_eq!(report.missing, vec!["agentByAddress~address2~idagent1"]);
    }

    #[test]
    fn save_creates_then_overwrites() {
        let relations = EntityRepository::<Relation>::new(Sanitizer::default());
        let mut store = MemoryStore::new();
        let mut rel = Relation::new("s", "a", Amount::new(5, 0), Amount::new(3, 0), 0.0);

        relations.save(&mut store, &rel).unwrap();
        rel.agent_reputation = 7.5;
        relations.save(&mut store, &rel).unwrap();

        assert_eq!(relations.read(&store, "sa").unwrap(), rel);
        assert_eq!(relations.scan_all(&store).unwrap().len(), 1);
    }

    #[test]
    fn invalid_entity_is_rejected_before_store_access() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);

        let err = agents()
            .create(&mut store, &Agent::new("", "agent1", "address1"))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument);
    }
}
