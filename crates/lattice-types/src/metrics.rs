//! Metrics sink abstraction.
//!
//! The core never talks to a collector registry directly; components take
//! an `Arc<dyn MetricsSink>` at construction and emit named counters and
//! gauges through it. The default sink drops everything.

use std::sync::Arc;

/// Process-wide metrics sink handed to core components.
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter.
    fn incr(&self, name: &'static str, value: u64);

    /// Set a named gauge.
    fn gauge(&self, name: &'static str, value: i64);
}

/// Sink that discards all metrics.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr(&self, _name: &'static str, _value: u64) {}

    fn gauge(&self, _name: &'static str, _value: i64) {}
}

/// Shared no-op sink.
pub fn noop() -> Arc<dyn MetricsSink> {
    Arc::new(NoopMetrics)
}
