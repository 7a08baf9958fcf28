//! Module: query
//! Responsibility: prefix scans over one index namespace, resolving each
//! entry back to its primary record.
//! Does not own: index derivation (see `db::index`).
//!
//! Orphan policy: an index entry whose record is absent, or whose record no
//! longer maps to that entry, is skipped and counted. A key that cannot be
//! decoded is yielded as a `MalformedKey` error.

use crate::{
    MAX_RECORD_BYTES,
    db::{
        index::{IndexManager, index_for},
        key::{KeyRange, data_key, render_key},
        store::{KeyValueStore, KvScan},
    },
    error::{ErrorOrigin, InternalError},
    model::index::IndexModel,
    obs::sink::{ExecKind, MetricsEvent, Span, record},
    serialize::deserialize_bounded,
    traits::EntityKind,
};
use serde::Serialize;

///
/// ScanDiagnostics
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanDiagnostics {
    pub scanned: u64,
    pub returned: u64,
    pub orphaned: u64,
}

///
/// ScanPage
/// Materialized scan result with its orphan count.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanPage<E> {
    pub results: Vec<E>,
    pub orphaned: u64,
}

///
/// RangeQueryEngine
///

pub struct RangeQueryEngine;

impl RangeQueryEngine {
    /// Scan `namespace` for every entry whose leading fields equal `prefix`.
    ///
    /// `prefix` must be shorter than the index arity; an empty prefix scans
    /// the whole namespace.
    pub fn scan_prefix<'s, E, S>(
        store: &'s S,
        namespace: &str,
        prefix: &[&str],
    ) -> Result<IndexScan<'s, E, S>, InternalError>
    where
        E: EntityKind,
        S: KeyValueStore + ?Sized,
    {
        let index = index_for::<E>(namespace)?;
        if prefix.len() >= index.arity() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Query,
                format!(
                    "prefix of {} field(s) does not fit {index}; at most {} allowed",
                    prefix.len(),
                    index.arity() - 1
                ),
            ));
        }

        let range = KeyRange::prefix(index.name, prefix)?;
        let mut span = Span::<E>::new(ExecKind::Scan);
        let rows = span.finish(store.scan(&range.start, &range.end))?;

        Ok(IndexScan {
            store,
            index,
            rows,
            diagnostics: ScanDiagnostics::default(),
            span,
            done: false,
        })
    }
}

///
/// IndexScan
///
/// Lazy, single-pass sequence of resolved records. Each call to
/// `scan_prefix` takes a fresh snapshot.
///

pub struct IndexScan<'s, E: EntityKind, S: KeyValueStore + ?Sized> {
    store: &'s S,
    index: &'static IndexModel,
    rows: KvScan<'s>,
    diagnostics: ScanDiagnostics,
    span: Span<E>,
    done: bool,
}

impl<E: EntityKind, S: KeyValueStore + ?Sized> IndexScan<'_, E, S> {
    #[must_use]
    pub const fn diagnostics(&self) -> ScanDiagnostics {
        self.diagnostics
    }

    /// Drain the scan into a page, stopping at the first error.
    pub fn into_page(mut self) -> Result<ScanPage<E>, InternalError> {
        let results = self.by_ref().collect::<Result<Vec<_>, _>>()?;

        Ok(ScanPage {
            results,
            orphaned: self.diagnostics.orphaned,
        })
    }

    fn resolve(&mut self, raw: &str) -> Result<Option<E>, InternalError> {
        let id = IndexManager::<E>::resolve(self.index, raw).inspect_err(|err| {
            tracing::warn!(index = self.index.name, error = %err.message, "malformed index key");
            record(MetricsEvent::MalformedKey {
                index: self.index.name,
            });
        })?;

        let entity: Option<E> = match self.store.get(&data_key(E::MODEL.entity_name, &id)?)? {
            Some(bytes) => Some(deserialize_bounded(&bytes, MAX_RECORD_BYTES)?),
            None => None,
        };

        match entity {
            Some(entity) if IndexManager::<E>::index_key(&entity, self.index)? == raw => {
                Ok(Some(entity))
            }
            _ => {
                self.diagnostics.orphaned += 1;
                tracing::warn!(
                    entity = E::MODEL.entity_name,
                    index = self.index.name,
                    key = %render_key(raw),
                    "orphan index entry skipped"
                );
                record(MetricsEvent::OrphanIndexEntry {
                    entity: E::MODEL.entity_name,
                    index: self.index.name,
                });

                Ok(None)
            }
        }
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.span.mark_ok();
            record(MetricsEvent::RowsScanned {
                entity: E::MODEL.entity_name,
                rows: self.diagnostics.scanned,
            });
        }
    }
}

impl<E: EntityKind, S: KeyValueStore + ?Sized> Iterator for IndexScan<'_, E, S> {
    type Item = Result<E, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let (raw, _) = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    self.finish();
                    return None;
                }
            };
            self.diagnostics.scanned += 1;

            match self.resolve(&raw) {
                Ok(Some(entity)) => {
                    self.diagnostics.returned += 1;
                    return Some(Ok(entity));
                }
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

///
/// TESTS
///
