// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Metrics-collecting wrapper for event sinks.
//
// Wraps any `EventSink` and transparently counts invocations per operation,
// failures, and cumulative wall-clock latency of the wrapped calls. It is
// the simplest example of daisy-chaining: every call is forwarded first and
// only then accounted for.

use std::time::Instant;

use crate::document::Document;
use crate::error::SinkResult;
use crate::sink::{EventSink, SinkOperation};

/// Accumulated statistics for a wrapped sink.
///
/// Counters include failed calls; `failure_count` tells how many of them
/// returned an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkStats {
    pub create_count: u64,
    pub update_count: u64,
    pub update_or_create_count: u64,
    pub delete_count: u64,
    pub delete_osm_count: u64,
    pub finish_count: u64,
    /// Number of calls that returned an error.
    pub failure_count: u64,
    /// Cumulative latency of all wrapped calls, in milliseconds.
    pub latency_sum_ms: f64,
}

impl SinkStats {
    /// Number of calls recorded for `operation`.
    pub fn count(&self, operation: SinkOperation) -> u64 {
        match operation {
            SinkOperation::Create => self.create_count,
            SinkOperation::Update => self.update_count,
            SinkOperation::UpdateOrCreate => self.update_or_create_count,
            SinkOperation::Delete => self.delete_count,
            SinkOperation::DeleteOsm => self.delete_osm_count,
            SinkOperation::Finish => self.finish_count,
        }
    }

    /// Number of document events, excluding `finish()`.
    pub fn event_count(&self) -> u64 {
        self.create_count
            + self.update_count
            + self.update_or_create_count
            + self.delete_count
            + self.delete_osm_count
    }

    fn counter_mut(&mut self, operation: SinkOperation) -> &mut u64 {
        match operation {
            SinkOperation::Create => &mut self.create_count,
            SinkOperation::Update => &mut self.update_count,
            SinkOperation::UpdateOrCreate => &mut self.update_or_create_count,
            SinkOperation::Delete => &mut self.delete_count,
            SinkOperation::DeleteOsm => &mut self.delete_osm_count,
            SinkOperation::Finish => &mut self.finish_count,
        }
    }
}

/// A sink wrapper that collects operation metrics.
///
/// # Example
///
/// ```rust
/// use georepl_sink::{Document, EventSink, MetricsSink, NullSink};
///
/// let mut metered = MetricsSink::new(NullSink);
/// metered.create(&Document::new("n1")).unwrap();
/// metered.finish().unwrap();
///
/// let stats = metered.stats();
/// assert_eq!(stats.create_count, 1);
/// assert_eq!(stats.finish_count, 1);
/// ```
#[derive(Debug)]
pub struct MetricsSink<S: EventSink> {
    /// The wrapped sink that performs the actual work.
    inner: S,
    stats: SinkStats,
}

impl<S: EventSink> MetricsSink<S> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: SinkStats::default(),
        }
    }

    /// Return a snapshot of the current statistics.
    pub fn stats(&self) -> SinkStats {
        self.stats.clone()
    }

    /// Reset all statistics to zero.
    pub fn reset_stats(&mut self) {
        self.stats = SinkStats::default();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn measure(
        &mut self,
        operation: SinkOperation,
        call: impl FnOnce(&mut S) -> SinkResult<()>,
    ) -> SinkResult<()> {
        let start = Instant::now();
        let result = call(&mut self.inner);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        *self.stats.counter_mut(operation) += 1;
        self.stats.latency_sum_ms += elapsed_ms;
        if result.is_err() {
            self.stats.failure_count += 1;
        }

        result
    }
}

impl<S: EventSink> EventSink for MetricsSink<S> {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        self.measure(SinkOperation::Create, |inner| inner.create(doc))
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        self.measure(SinkOperation::Update, |inner| inner.update(doc))
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        self.measure(SinkOperation::UpdateOrCreate, |inner| {
            inner.update_or_create(doc)
        })
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        self.measure(SinkOperation::Delete, |inner| inner.delete(id))
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        self.measure(SinkOperation::DeleteOsm, |inner| {
            inner.delete_osm(osm_type, osm_id, osm_key, osm_value)
        })
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.measure(SinkOperation::Finish, |inner| inner.finish())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
