// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl event sinks
//
// A synchronisation run against the upstream geographic database produces
// a stream of per-document changes. Everything that consumes that stream
// implements the `EventSink` trait defined here, so consumers can be
// daisy-chained: one sink holds another and forwards each event before
// acting on it.
//
// # Modules
//
// - [`document`] -- The opaque geocoding `Document` carried by change events.
// - [`sink`] -- The `EventSink` trait, `SinkOperation` and `NullSink`.
// - [`error`] -- The `SinkError` enum shared by all sinks.
// - [`memory`] -- An in-memory sink that materialises the change stream.
// - [`metrics`] -- A transparent wrapper that counts and times operations.
//
// # Example
//
// ```rust
// use georepl_sink::{Document, EventSink, InMemorySink, MetricsSink};
//
// let mut sink = MetricsSink::new(InMemorySink::new());
// sink.create(&Document::new("n1").with_attribute("name", "Berlin")).unwrap();
// sink.delete("n1").unwrap();
// sink.finish().unwrap();
//
// assert_eq!(sink.stats().create_count, 1);
// assert!(sink.inner().is_empty());
// ```

pub mod document;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod sink;

pub use document::Document;
pub use error::{SinkError, SinkResult};
pub use memory::InMemorySink;
pub use metrics::{MetricsSink, SinkStats};
pub use sink::{EventSink, NullSink, SinkOperation};
