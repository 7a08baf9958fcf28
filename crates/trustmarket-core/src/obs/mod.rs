//! Observability: in-process counters and the sink they flow through.
//!
//! Storage logic emits `MetricsEvent`s only; it never touches the counter
//! state directly. Human-readable diagnostics go through `tracing`.

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::{EntityCounters, EventOps, EventState};
pub use sink::{
    ExecKind, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink,
};
