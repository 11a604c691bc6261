// SPDX-License-Identifier: PMPL-1.0-or-later
//
// In-memory event sink.
//
// Materialises the change stream into a `BTreeMap` keyed by document uid.
// Creates, updates and upserts all store the latest version of the
// document; deletes by OSM coordinates scan every stored document. Intended
// for tests, for replaying a replication log into a throwaway view, and as
// the terminal link of a sink chain.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::Document;
use crate::error::SinkResult;
use crate::sink::EventSink;

/// A sink that keeps the current state of every document in memory.
///
/// # Example
///
/// ```rust
/// use georepl_sink::{Document, EventSink, InMemorySink};
///
/// let mut sink = InMemorySink::new();
/// sink.create(&Document::new("n1").with_osm("node", 1, None, None)).unwrap();
/// sink.delete_osm("node", 1, None, None).unwrap();
/// assert!(sink.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    /// Current documents, ordered by uid.
    documents: BTreeMap<String, Document>,
    /// Number of `finish()` calls received.
    completed_runs: u64,
}

impl InMemorySink {
    /// Create a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of documents currently held.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Return true if the sink holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, uid: &str) -> Option<&Document> {
        self.documents.get(uid)
    }

    /// Iterate documents in uid order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    fn store(&mut self, doc: &Document) {
        self.documents.insert(doc.uid.clone(), doc.clone());
    }
}

impl EventSink for InMemorySink {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        self.store(doc);
        Ok(())
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        self.store(doc);
        Ok(())
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        self.store(doc);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        self.documents.remove(id);
        Ok(())
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        let before = self.documents.len();
        self.documents
            .retain(|_, doc| !doc.matches_osm(osm_type, osm_id, osm_key, osm_value));
        debug!(
            osm_type,
            osm_id,
            removed = before - self.documents.len(),
            "Deleted documents by OSM coordinates"
        );
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.completed_runs += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
