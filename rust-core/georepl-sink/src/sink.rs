// SPDX-License-Identifier: PMPL-1.0-or-later
//
// The event sink contract.
//
// A synchronisation driver calls the event operations once per changed
// document, in an order it controls, then calls `finish()` exactly once to
// close the run. Sinks compose by ownership: a sink may hold another sink
// and forward each call to it before doing its own work. `Option<S>` is a
// sink too, so an optional downstream is forwarded to without any special
// casing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::SinkResult;

/// The operations of the [`EventSink`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkOperation {
    Create,
    Update,
    UpdateOrCreate,
    Delete,
    DeleteOsm,
    Finish,
}

impl SinkOperation {
    /// Every operation, in contract order.
    pub const ALL: [SinkOperation; 6] = [
        SinkOperation::Create,
        SinkOperation::Update,
        SinkOperation::UpdateOrCreate,
        SinkOperation::Delete,
        SinkOperation::DeleteOsm,
        SinkOperation::Finish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SinkOperation::Create => "create",
            SinkOperation::Update => "update",
            SinkOperation::UpdateOrCreate => "update_or_create",
            SinkOperation::Delete => "delete",
            SinkOperation::DeleteOsm => "delete_osm",
            SinkOperation::Finish => "finish",
        }
    }
}

impl fmt::Display for SinkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consumer of the per-document change stream.
///
/// Event operations may be called any number of times per run. `finish()`
/// marks the end of a run; buffering sinks do their durable work there.
/// An error from any operation must stop the run.
pub trait EventSink {
    /// A new document appeared upstream.
    fn create(&mut self, doc: &Document) -> SinkResult<()>;

    /// An existing document changed.
    fn update(&mut self, doc: &Document) -> SinkResult<()>;

    /// The document changed and may or may not already exist downstream.
    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()>;

    /// The document with key `id` disappeared.
    fn delete(&mut self, id: &str) -> SinkResult<()>;

    /// The OSM element disappeared and its document key is unknown to the
    /// caller. `osm_key` and `osm_value` narrow the match when given.
    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()>;

    /// The run is complete.
    fn finish(&mut self) -> SinkResult<()>;

    /// A human-readable name used in logs and errors.
    fn name(&self) -> &str {
        "sink"
    }
}

/// A sink that accepts and discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn create(&mut self, _doc: &Document) -> SinkResult<()> {
        Ok(())
    }

    fn update(&mut self, _doc: &Document) -> SinkResult<()> {
        Ok(())
    }

    fn update_or_create(&mut self, _doc: &Document) -> SinkResult<()> {
        Ok(())
    }

    fn delete(&mut self, _id: &str) -> SinkResult<()> {
        Ok(())
    }

    fn delete_osm(
        &mut self,
        _osm_type: &str,
        _osm_id: i64,
        _osm_key: Option<&str>,
        _osm_value: Option<&str>,
    ) -> SinkResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

impl<S: EventSink> EventSink for Option<S> {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        match self {
            Some(sink) => sink.create(doc),
            None => Ok(()),
        }
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        match self {
            Some(sink) => sink.update(doc),
            None => Ok(()),
        }
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        match self {
            Some(sink) => sink.update_or_create(doc),
            None => Ok(()),
        }
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        match self {
            Some(sink) => sink.delete(id),
            None => Ok(()),
        }
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        match self {
            Some(sink) => sink.delete_osm(osm_type, osm_id, osm_key, osm_value),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> SinkResult<()> {
        match self {
            Some(sink) => sink.finish(),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Some(sink) => sink.name(),
            None => "none",
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).create(doc)
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).update(doc)
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).update_or_create(doc)
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        (**self).delete(id)
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        (**self).delete_osm(osm_type, osm_id, osm_key, osm_value)
    }

    fn finish(&mut self) -> SinkResult<()> {
        (**self).finish()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).create(doc)
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).update(doc)
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        (**self).update_or_create(doc)
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        (**self).delete(id)
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        (**self).delete_osm(osm_type, osm_id, osm_key, osm_value)
    }

    fn finish(&mut self) -> SinkResult<()> {
        (**self).finish()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
