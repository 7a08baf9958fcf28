//! Module: history
//! Responsibility: replay the version log of one primary record as decoded
//! snapshots, oldest first.
//! Does not own: version storage (the store keeps the append-only log).

use crate::{
    MAX_RECORD_BYTES,
    db::{
        key::{data_key, render_key},
        store::{KeyValueStore, KvHistory, TxId},
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    obs::sink::{ExecKind, Span},
    serialize::deserialize_bounded,
    traits::EntityKind,
};
use serde::Serialize;

///
/// Version
///
/// One write or delete applied to a record. A delete carries no value and
/// sets `is_delete`; it is never decoded.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version<E> {
    pub ordinal: u64,
    pub tx_id: TxId,
    pub is_delete: bool,
    pub value: Option<E>,
}

impl<E> Version<E> {
    #[must_use]
    pub const fn live(&self) -> Option<&E> {
        self.value.as_ref()
    }
}

///
/// HistoryReader
///

pub struct HistoryReader;

impl HistoryReader {
    /// Every version of the `E` record keyed `id`.
    ///
    /// Each call re-reads the store; an id that was never written yields an
    /// empty sequence.
    pub fn read<'s, E, S>(store: &'s S, id: &str) -> Result<VersionIter<'s, E>, InternalError>
    where
        E: EntityKind,
        S: KeyValueStore + ?Sized,
    {
        let key = data_key(E::MODEL.entity_name, id)?;
        let mut span = Span::<E>::new(ExecKind::History);
        let records = span.finish(store.history(&key))?;

        Ok(VersionIter {
            key,
            records,
            span,
        })
    }
}

///
/// VersionIter
///

pub struct VersionIter<'s, E: EntityKind> {
    key: String,
    records: KvHistory<'s>,
    span: Span<E>,
}

impl<E: EntityKind> VersionIter<'_, E> {
    fn decode(&self, bytes: &[u8], ordinal: u64) -> Result<E, InternalError> {
        deserialize_bounded(bytes, MAX_RECORD_BYTES).map_err(|err| {
            InternalError::new(
                ErrorClass::Corruption,
                ErrorOrigin::History,
                format!(
                    "version {ordinal} of '{}' does not decode: {err}",
                    render_key(&self.key)
                ),
            )
        })
    }
}

impl<E: EntityKind> Iterator for VersionIter<'_, E> {
    type Item = Result<Version<E>, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err)),
        };

        let value = match &record.value {
            Some(bytes) => match self.decode(bytes, record.ordinal) {
                Ok(entity) => Some(entity),
                Err(err) => return Some(Err(err)),
            },
            None => None,
        };
        self.span.mark_ok();

        Some(Ok(Version {
            ordinal: record.ordinal,
            tx_id: record.tx_id,
            is_delete: value.is_none(),
            value,
        }))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{repository::EntityRepository, store::MemoryStore},
        entity::Service,
        sanitize::Sanitizer,
    };
    use proptest::prelude::*;

    fn services() -> EntityRepository<Service> {
        EntityRepository::new(Sanitizer::default())
    }

    fn service(description: &str) -> Service {
        Service::new("idservice1", "service1", description)
    }

    #[test]
    fn create_then_delete_reads_back_with_tombstone() {
        let mut store = MemoryStore::new();
        services().create(&mut store, &service("first")).unwrap();
        services().delete(&mut store, "idservice1").unwrap();

        let versions = HistoryReader::read::<Service, _>(&store, "idservice1")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].live(), Some(&service("first")));
        assert!(!versions[0].is_delete);
        assert!(versions[1].is_delete);
        assert_eq!(versions[1].ordinal, 2);
    }

    #[test]
    fn unknown_key_has_empty_history() {
        let store = MemoryStore::new();

        assert_eq!(
            HistoryReader::read::<Service, _>(&store, "ghost")
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn undecodable_version_is_corruption() {
        let mut store = MemoryStore::new();
        store.put("service\u{0}bad", b"not json".to_vec()).unwrap();

        let err = HistoryReader::read::<Service, _>(&store, "bad")
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Corruption);
        assert_eq!(err.origin, ErrorOrigin::History);
    }

    #[test]
    fn history_is_reissuable() {
        let mut store = MemoryStore::new();
        services().create(&mut store, &service("first")).unwrap();

        let first = HistoryReader::read::<Service, _>(&store, "idservice1").unwrap().count();
        let second = HistoryReader::read::<Service, _>(&store, "idservice1").unwrap().count();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn history_counts_every_write_and_delete(
            ops in proptest::collection::vec(any::<bool>(), 1..16),
        ) {
            let mut store = MemoryStore::new();
            let mut live = false;
            let mut applied = Vec::new();

            for (n, write) in ops.into_iter().enumerate() {
                if write {
                    services().save(&mut store, &service(&format!("v{n}"))).unwrap();
                    live = true;
                    applied.push(false);
                } else if live {
                    services().delete(&mut store, "idservice1").unwrap();
                    live = false;
                    applied.push(true);
                }
            }

            let versions = HistoryReader::read::<Service, _>(&store, "idservice1")
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();

            prop_assert_eq!(
                versions.iter().map(|v| v.is_delete).collect::<Vec<_>>(),
                applied
            );
            prop_assert!(versions.iter().enumerate().all(|(i, v)| v.ordinal == i as u64 + 1));
        }
    }
}
