use super::*;
use crate::{
    db::store::MemoryStore,
    entity::{Agent, BY_AGENT, BY_SERVICE, Relation},
    serialize::serialize,
    types::Amount,
};

fn relation(service: &str, agent: &str) -> Relation {
    Relation::new(service, agent, Amount::new(5, 0), Amount::new(3, 0), 0.0)
}

fn put_record<E: EntityKind>(store: &mut MemoryStore, entity: &E) {
    let key = crate::db::key::data_key(E::MODEL.entity_name, entity.primary_key()).unwrap();
    store.put(&key, serialize(entity).unwrap()).unwrap();
}

#[test]
fn relation_maps_to_both_index_orders() {
    let keys = IndexManager::<Relation>::index_keys_for(&relation("s1", "a1")).unwrap();

    assert_eq!(
        keys.into_iter().collect::<Vec<_>>(),
        vec!["byAgent\u{0}a1\u{0}s1", "byService\u{0}s1\u{0}a1"]
    );
}

#[test]
fn resolve_recovers_primary_key() {
    assert_eq!(
        IndexManager::<Relation>::resolve(&BY_AGENT, "byAgent\u{0}a1\u{0}s1").unwrap(),
        "s1a1"
    );
    let key = "agentByAddress\u{0}addr\u{0}a1";
    assert_eq!(
        IndexManager::<Agent>::resolve(&crate::entity::AGENT_BY_ADDRESS, key).unwrap(),
        "a1"
    );
}

#[test]
fn resolve_rejects_wrong_arity() {
    let err = IndexManager::<Relation>::resolve(&BY_SERVICE, "byService\u{0}s1").unwrap_err();

    assert_eq!(err.class, crate::error::ErrorClass::MalformedKey);
}

#[test]
fn rebuild_restores_missing_and_drops_orphans() {
    let mut store = MemoryStore::new();
    put_record(&mut store, &relation("s1", "a1"));
    store.put("byService\u{0}s9\u{0}a9", vec![INDEX_MARKER]).unwrap();

    let before = IndexManager::<Relation>::verify(&store).unwrap();
    assert_eq!(before.orphaned, vec!["byService~s9~a9"]);
    assert_eq!(before.missing.len(), 2);

    let report = IndexManager::<Relation>::rebuild(&mut store).unwrap();
    assert_eq!(
        report,
        RebuildReport {
            records: 1,
            written: 2,
            removed: 1,
        }
    );
    assert!(IndexManager::<Relation>::verify(&store).unwrap().is_consistent());
}

#[test]
fn rebuild_is_idempotent() {
    let mut store = MemoryStore::new();
    put_record(&mut store, &relation("s1", "a1"));
    IndexManager::<Relation>::rebuild(&mut store).unwrap();

    let second = IndexManager::<Relation>::rebuild(&mut store).unwrap();
    assert_eq!(second.written + second.removed, 0);
}

#[test]
fn unknown_namespace_is_invalid_argument() {
    let err = index_for::<Relation>("byName").unwrap_err();

    assert_eq!(err.class, crate::error::ErrorClass::InvalidArgument);
}
