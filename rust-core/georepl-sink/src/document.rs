// SPDX-License-Identifier: PMPL-1.0-or-later
//! Geocoding documents as seen by the change stream.
//!
//! A document is identified by its `uid`; every other attribute is opaque
//! JSON. The only attributes this crate interprets are the OSM coordinates
//! (`osm_type`, `osm_id`, `osm_key`, `osm_value`), which sinks need in order
//! to honour a delete addressed by external coordinates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Key of the document identity. Reserved: never stored as an attribute.
pub const UID: &str = "uid";

/// Attribute holding the OSM element type (`node`, `way`, `relation`).
pub const OSM_TYPE: &str = "osm_type";
/// Attribute holding the numeric OSM element id.
pub const OSM_ID: &str = "osm_id";
/// Attribute holding the main tag key of the element.
pub const OSM_KEY: &str = "osm_key";
/// Attribute holding the main tag value of the element.
pub const OSM_VALUE: &str = "osm_value";

/// A geocoding record keyed by `uid`.
///
/// Attributes are flattened next to `uid` when serialised, so the wire form
/// is a single flat JSON object. The attribute map can never hold a `uid`
/// key of its own, otherwise the flat object would carry it twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, stable key of the record.
    pub uid: String,
    /// Every other attribute of the record.
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl Document {
    /// Create a document with no attributes.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            attributes: Map::new(),
        }
    }

    /// Set an attribute, replacing any previous value.
    ///
    /// The reserved key `uid` is ignored; use [`Document::new`] to set the
    /// identity.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == UID {
            debug!(uid = %self.uid, "Ignoring reserved attribute key");
            return self;
        }
        self.attributes.insert(key, value.into());
        self
    }

    /// Attach OSM coordinates. Key and value are only stored when given.
    pub fn with_osm(
        mut self,
        osm_type: impl Into<String>,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> Self {
        self.attributes
            .insert(OSM_TYPE.to_string(), Value::String(osm_type.into()));
        self.attributes.insert(OSM_ID.to_string(), Value::from(osm_id));
        if let Some(key) = osm_key {
            self.attributes
                .insert(OSM_KEY.to_string(), Value::String(key.to_string()));
        }
        if let Some(value) = osm_value {
            self.attributes
                .insert(OSM_VALUE.to_string(), Value::String(value.to_string()));
        }
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Every attribute except `uid`, ordered by key.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn osm_type(&self) -> Option<&str> {
        self.attribute(OSM_TYPE).and_then(Value::as_str)
    }

    pub fn osm_id(&self) -> Option<i64> {
        self.attribute(OSM_ID).and_then(Value::as_i64)
    }

    pub fn osm_key(&self) -> Option<&str> {
        self.attribute(OSM_KEY).and_then(Value::as_str)
    }

    pub fn osm_value(&self) -> Option<&str> {
        self.attribute(OSM_VALUE).and_then(Value::as_str)
    }

    /// Whether this document is the OSM element addressed by the given
    /// coordinates. Key and value only constrain the match when supplied.
    pub fn matches_osm(
        &self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> bool {
        if self.osm_type() != Some(osm_type) || self.osm_id() != Some(osm_id) {
            return false;
        }
        if osm_key.is_some() && self.osm_key() != osm_key {
            return false;
        }
        if osm_value.is_some() && self.osm_value() != osm_value {
            return false;
        }
        true
    }
}
