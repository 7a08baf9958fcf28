//! Metrics sink boundary.
//!
//! Core DB logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.

use crate::{
    obs::metrics::{self, EventState},
    traits::EntityKind,
};
use std::{cell::RefCell, marker::PhantomData, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Create,
    Read,
    Update,
    Delete,
    Scan,
    History,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricsEvent {
    ExecStart {
        kind: ExecKind,
        entity: &'static str,
    },
    ExecFinish {
        kind: ExecKind,
        entity: &'static str,
        ok: bool,
    },
    RowsScanned {
        entity: &'static str,
        rows: u64,
    },
    IndexDelta {
        entity: &'static str,
        inserts: u64,
        removes: u64,
    },
    OrphanIndexEntry {
        entity: &'static str,
        index: &'static str,
    },
    MalformedKey {
        index: &'static str,
    },
    InterruptedWrite {
        operation: &'static str,
    },
    ReputationUpdated {
        score: f64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ExecStart { kind, entity } => {
                metrics::with_state_mut(|m| {
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    match kind {
                        ExecKind::Create => {
                            m.ops.create_calls = m.ops.create_calls.saturating_add(1);
                            entry.create_calls = entry.create_calls.saturating_add(1);
                        }
                        ExecKind::Read => {
                            m.ops.read_calls = m.ops.read_calls.saturating_add(1);
                            entry.read_calls = entry.read_calls.saturating_add(1);
                        }
                        ExecKind::Update => {
                            m.ops.update_calls = m.ops.update_calls.saturating_add(1);
                            entry.update_calls = entry.update_calls.saturating_add(1);
                        }
                        ExecKind::Delete => {
                            m.ops.delete_calls = m.ops.delete_calls.saturating_add(1);
                            entry.delete_calls = entry.delete_calls.saturating_add(1);
                        }
                        ExecKind::Scan => {
                            m.ops.scan_calls = m.ops.scan_calls.saturating_add(1);
                            entry.scan_calls = entry.scan_calls.saturating_add(1);
                        }
                        ExecKind::History => {
                            m.ops.history_calls = m.ops.history_calls.saturating_add(1);
                            entry.history_calls = entry.history_calls.saturating_add(1);
                        }
                    }
                });
            }

            MetricsEvent::ExecFinish { ok, .. } => {
                if !ok {
                    metrics::with_state_mut(|m| {
                        m.ops.failed_calls = m.ops.failed_calls.saturating_add(1);
                    });
                }
            }

            MetricsEvent::RowsScanned { entity, rows } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows);
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.rows_scanned = entry.rows_scanned.saturating_add(rows);
                });
            }

            MetricsEvent::IndexDelta {
                entity,
                inserts,
                removes,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.index_inserts = m.ops.index_inserts.saturating_add(inserts);
                    m.ops.index_removes = m.ops.index_removes.saturating_add(removes);
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.index_inserts = entry.index_inserts.saturating_add(inserts);
                    entry.index_removes = entry.index_removes.saturating_add(removes);
                });
            }

            MetricsEvent::OrphanIndexEntry { entity, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.orphan_index_entries = m.ops.orphan_index_entries.saturating_add(1);
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.orphan_index_entries = entry.orphan_index_entries.saturating_add(1);
                });
            }

            MetricsEvent::MalformedKey { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.malformed_keys = m.ops.malformed_keys.saturating_add(1);
                });
            }

            MetricsEvent::InterruptedWrite { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.interrupted_writes = m.ops.interrupted_writes.saturating_add(1);
                });
            }

            MetricsEvent::ReputationUpdated { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.reputation_updates = m.ops.reputation_updates.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());

    match override_sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> EventState {
    metrics::snapshot()
}

/// Reset all counters on this thread.
pub fn metrics_reset_all() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// Span
/// RAII guard that emits start/finish events for one repository call.
/// Finish accounting happens even on early return.
///

pub(crate) struct Span<E: EntityKind> {
    kind: ExecKind,
    ok: bool,
    _marker: PhantomData<E>,
}

impl<E: EntityKind> Span<E> {
    #[must_use]
    pub(crate) fn new(kind: ExecKind) -> Self {
        record(MetricsEvent::ExecStart {
            kind,
            entity: E::MODEL.entity_name,
        });

        Self {
            kind,
            ok: false,
            _marker: PhantomData,
        }
    }

    /// Mark the call successful and pass its result through.
    pub(crate) fn finish<T, Err>(&mut self, result: Result<T, Err>) -> Result<T, Err> {
        self.ok = result.is_ok();
        result
    }

    /// Mark a streamed call successful once its iterator is drained.
    pub(crate) const fn mark_ok(&mut self) {
        self.ok = true;
    }
}

impl<E: EntityKind> Drop for Span<E> {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            entity: E::MODEL.entity_name,
            ok: self.ok,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CaptureSink {
        events: RefCell<Vec<MetricsEvent>>,
    }

    impl MetricsSink for CaptureSink {
        fn record(&self, event: MetricsEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    #[test]
    fn override_captures_events_and_restores_global_sink() {
        metrics_reset_all();
        let sink = Rc::new(CaptureSink::default());

        with_metrics_sink(sink.clone(), || {
            record(MetricsEvent::MalformedKey { index: "byAgent" });
        });
        record(MetricsEvent::MalformedKey { index: "byAgent" });

        assert_eq!(sink.events.borrow().len(), 1);
        assert_eq!(metrics_report().ops.malformed_keys, 1);
    }

    #[test]
    fn index_delta_accumulates_per_entity() {
        metrics_reset_all();
        record(MetricsEvent::IndexDelta {
            entity: "relation",
            inserts: 2,
            removes: 0,
        });
        record(MetricsEvent::IndexDelta {
            entity: "relation",
            inserts: 0,
            removes: 2,
        });

        let report = metrics_report();
        assert_eq!(report.ops.index_inserts, 2);
        assert_eq!(report.ops.index_removes, 2);
        assert_eq!(report.entities["relation"].index_removes, 2);
    }
}
