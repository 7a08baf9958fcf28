//! Module: index
//! Responsibility: derive, write, retract, rebuild and verify the secondary
//! index entries of one entity kind.
//! Does not own: range scans over index namespaces (see `db::query`).
//!
//! Invariants:
//! - Index entries carry a one-byte marker value; the key is the payload.
//! - After any successful write, the live index set of a record equals
//!   `IndexManager::index_keys_for(record)`.

#[cfg(test)]
mod tests;

use crate::{
    MAX_RECORD_BYTES,
    db::{
        key::{CompositeKey, KeyRange, render_key},
        store::KeyValueStore,
        write::WriteSequence,
    },
    error::{ErrorOrigin, InternalError},
    model::index::IndexModel,
    obs::sink::{MetricsEvent, record},
    serialize::deserialize_bounded,
    traits::EntityKind,
};
use serde::Serialize;
use std::{collections::BTreeSet, marker::PhantomData};

/// Stored value of every index entry.
pub const INDEX_MARKER: u8 = 0x00;

///
/// RebuildReport
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RebuildReport {
    pub records: u64,
    pub written: u64,
    pub removed: u64,
}

///
/// VerifyReport
///
/// `orphaned` entries point at no record (or a record that no longer maps to
/// them); `missing` entries are expected from a record but absent.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerifyReport {
    pub records: u64,
    pub orphaned: Vec<String>,
    pub missing: Vec<String>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.missing.is_empty()
    }
}

///
/// IndexManager
///

pub struct IndexManager<E: EntityKind> {
    _marker: PhantomData<E>,
}

impl<E: EntityKind> IndexManager<E> {
    /// Encoded index key of `entity` in one index namespace.
    pub fn index_key(entity: &E, index: &IndexModel) -> Result<String, InternalError> {
        let fields = index
            .fields
            .iter()
            .map(|field| {
                entity.field_value(field).ok_or_else(|| {
                    InternalError::index_corruption(format!(
                        "{} has no value for indexed field '{field}' of {index}",
                        E::MODEL.entity_name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompositeKey::new(index.name, fields)?.encode())
    }

    /// Every index key `entity` must be reachable under.
    pub fn index_keys_for(entity: &E) -> Result<BTreeSet<String>, InternalError> {
        E::MODEL
            .indexes
            .iter()
            .map(|index| Self::index_key(entity, index))
            .collect()
    }

    /// Decode an index key and recover the primary key it points at.
    pub fn resolve(index: &IndexModel, raw: &str) -> Result<String, InternalError> {
        let key = CompositeKey::decode(raw, index.name, index.arity())
            .map_err(|err| InternalError::malformed_key(raw, err))?;

        E::primary_key_from_index(index, key.fields()).ok_or_else(|| {
            InternalError::malformed_key(
                raw,
                format!("{index} does not carry the {} identifier", E::MODEL.entity_name),
            )
        })
    }

    pub(crate) fn create_all<S>(
        seq: &mut WriteSequence<'_, S>,
        keys: &BTreeSet<String>,
    ) -> Result<(), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        for key in keys {
            seq.insert_index(key, vec![INDEX_MARKER])?;
        }

        Ok(())
    }

    pub(crate) fn retract_all<S>(
        seq: &mut WriteSequence<'_, S>,
        keys: &BTreeSet<String>,
    ) -> Result<(), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        for key in keys {
            seq.remove_index(key)?;
        }

        Ok(())
    }

    /// Regenerate every index entry from the primary records.
    ///
    /// Entries no record maps to are removed; expected entries that are
    /// absent are written. Entries already in place are left alone.
    pub fn rebuild<S>(store: &mut S) -> Result<RebuildReport, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let entity = E::MODEL.entity_name;

        // ------------------------------------------------------------------
        // Phase 1: derive the expected index set from authoritative rows
        // ------------------------------------------------------------------
        let (records, expected) = Self::expected_entries(&*store)?;

        // ------------------------------------------------------------------
        // Phase 2: diff against what is stored
        // ------------------------------------------------------------------
        let present = Self::present_entries(&*store)?;
        let stale = present.difference(&expected).cloned().collect::<Vec<_>>();
        let absent = expected.difference(&present).cloned().collect::<Vec<_>>();

        // ------------------------------------------------------------------
        // Phase 3: apply
        // ------------------------------------------------------------------
        let mut seq = WriteSequence::new(store, "rebuild", entity);
        for key in &stale {
            seq.remove_index(key)?;
        }
        for key in &absent {
            seq.insert_index(key, vec![INDEX_MARKER])?;
        }

        let (written, removed) = seq.index_delta();
        record(MetricsEvent::IndexDelta {
            entity,
            inserts: written,
            removes: removed,
        });
        tracing::info!(entity, records, written, removed, "indexes rebuilt");

        Ok(RebuildReport {
            records,
            written,
            removed,
        })
    }

    /// Compare stored index entries against the primary records, read-only.
    pub fn verify<S>(store: &S) -> Result<VerifyReport, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let (records, expected) = Self::expected_entries(store)?;
        let present = Self::present_entries(store)?;

        let report = VerifyReport {
            records,
            orphaned: present.difference(&expected).map(String::as_str).map(render_key).collect(),
            missing: expected.difference(&present).map(String::as_str).map(render_key).collect(),
        };
        if !report.is_consistent() {
            tracing::warn!(
                entity = E::MODEL.entity_name,
                orphaned = report.orphaned.len(),
                missing = report.missing.len(),
                "index verification found drift"
            );
        }

        Ok(report)
    }

    fn expected_entries<S>(store: &S) -> Result<(u64, BTreeSet<String>), InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let range = KeyRange::prefix(E::MODEL.entity_name, &[])?;
        let mut records = 0;
        let mut expected = BTreeSet::new();

        for row in store.scan(&range.start, &range.end)? {
            let (_, bytes) = row?;
            let entity: E = deserialize_bounded(&bytes, MAX_RECORD_BYTES)?;
            expected.extend(Self::index_keys_for(&entity)?);
            records += 1;
        }

        Ok((records, expected))
    }

    fn present_entries<S>(store: &S) -> Result<BTreeSet<String>, InternalError>
    where
        S: KeyValueStore + ?Sized,
    {
        let mut present = BTreeSet::new();

        for index in E::MODEL.indexes {
            let range = KeyRange::prefix(index.name, &[])?;
            for row in store.scan(&range.start, &range.end)? {
                let (key, _) = row?;
                present.insert(key);
            }
        }

        Ok(present)
    }
}

/// Reject a namespace that is not an index of `E`.
pub(crate) fn index_for<E: EntityKind>(
    namespace: &str,
) -> Result<&'static IndexModel, InternalError> {
    E::MODEL.index(namespace).ok_or_else(|| {
        InternalError::invalid_argument(
            ErrorOrigin::Index,
            format!(
                "'{namespace}' is not an index of {}",
                E::MODEL.entity_name
            ),
        )
    })
}
