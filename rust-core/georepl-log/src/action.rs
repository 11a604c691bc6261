// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Action records
//
// One `Action` describes one change event. The in-memory form is a true
// sum type, so a record can only carry the fields of its own variant. The
// wire form is a flat JSON object tagged by `action`:
//
//   {"action": "CREATE",     "id": "n1", "doc": {...}}
//   {"action": "DELETE",     "id": "n1"}
//   {"action": "DELETE_OSM", "osmType": "way", "osmId": 123,
//                            "osmKey": "highway", "osmValue": "residential"}
//
// Decoding goes through `ActionRecord`, the flat all-optional shape, and
// rejects any record whose fields do not match its tag.

use std::fmt;

use georepl_sink::{Document, EventSink, SinkResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LogError, LogResult};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The tag of an action record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Create,
    Update,
    UpdateOrCreate,
    Delete,
    DeleteOsm,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Create,
        ActionKind::Update,
        ActionKind::UpdateOrCreate,
        ActionKind::Delete,
        ActionKind::DeleteOsm,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Create => "CREATE",
            ActionKind::Update => "UPDATE",
            ActionKind::UpdateOrCreate => "UPDATE_OR_CREATE",
            ActionKind::Delete => "DELETE",
            ActionKind::DeleteOsm => "DELETE_OSM",
        }
    }

    /// Whether records of this kind carry a document.
    pub fn carries_document(self) -> bool {
        matches!(
            self,
            ActionKind::Create | ActionKind::Update | ActionKind::UpdateOrCreate
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A single change event as recorded in the replication log.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create { id: String, doc: Document },
    Update { id: String, doc: Document },
    UpdateOrCreate { id: String, doc: Document },
    Delete { id: String },
    DeleteOsm {
        osm_type: String,
        osm_id: i64,
        osm_key: Option<String>,
        osm_value: Option<String>,
    },
}

impl Action {
    /// A `CREATE` record keyed by the document's uid.
    pub fn create(doc: &Document) -> Self {
        Action::Create {
            id: doc.uid.clone(),
            doc: doc.clone(),
        }
    }

    /// An `UPDATE` record keyed by the document's uid.
    pub fn update(doc: &Document) -> Self {
        Action::Update {
            id: doc.uid.clone(),
            doc: doc.clone(),
        }
    }

    /// An `UPDATE_OR_CREATE` record keyed by the document's uid.
    pub fn update_or_create(doc: &Document) -> Self {
        Action::UpdateOrCreate {
            id: doc.uid.clone(),
            doc: doc.clone(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Action::Delete { id: id.into() }
    }

    pub fn delete_osm(
        osm_type: impl Into<String>,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> Self {
        Action::DeleteOsm {
            osm_type: osm_type.into(),
            osm_id,
            osm_key: osm_key.map(str::to_string),
            osm_value: osm_value.map(str::to_string),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Update { .. } => ActionKind::Update,
            Action::UpdateOrCreate { .. } => ActionKind::UpdateOrCreate,
            Action::Delete { .. } => ActionKind::Delete,
            Action::DeleteOsm { .. } => ActionKind::DeleteOsm,
        }
    }

    /// The document key, for every kind except `DELETE_OSM`.
    pub fn id(&self) -> Option<&str> {
        match self {
            Action::Create { id, .. }
            | Action::Update { id, .. }
            | Action::UpdateOrCreate { id, .. }
            | Action::Delete { id } => Some(id.as_str()),
            Action::DeleteOsm { .. } => None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Action::Create { doc, .. }
            | Action::Update { doc, .. }
            | Action::UpdateOrCreate { doc, .. } => Some(doc),
            Action::Delete { .. } | Action::DeleteOsm { .. } => None,
        }
    }

    /// Re-issue this record as the matching call on `sink`.
    pub fn apply<S: EventSink + ?Sized>(&self, sink: &mut S) -> SinkResult<()> {
        match self {
            Action::Create { doc, .. } => sink.create(doc),
            Action::Update { doc, .. } => sink.update(doc),
            Action::UpdateOrCreate { doc, .. } => sink.update_or_create(doc),
            Action::Delete { id } => sink.delete(id),
            Action::DeleteOsm {
                osm_type,
                osm_id,
                osm_key,
                osm_value,
            } => sink.delete_osm(osm_type, *osm_id, osm_key.as_deref(), osm_value.as_deref()),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRecord (wire shape)
// ---------------------------------------------------------------------------

/// The flat wire shape of an action record, every field optional.
///
/// Converting it into an [`Action`] is the only way to build a record from
/// untrusted input, and fails when the fields do not match the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionRecord {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_value: Option<String>,
}

impl ActionRecord {
    fn has_osm_fields(&self) -> bool {
        self.osm_type.is_some()
            || self.osm_id.is_some()
            || self.osm_key.is_some()
            || self.osm_value.is_some()
    }
}

fn invalid(kind: ActionKind, problem: &str) -> LogError {
    LogError::InvalidAction(format!("{kind} record {problem}"))
}

impl TryFrom<ActionRecord> for Action {
    type Error = LogError;

    fn try_from(record: ActionRecord) -> LogResult<Self> {
        let kind = record.action;
        match kind {
            ActionKind::Create | ActionKind::Update | ActionKind::UpdateOrCreate => {
                if record.has_osm_fields() {
                    return Err(invalid(kind, "must not carry OSM fields"));
                }
                let id = record.id.ok_or_else(|| invalid(kind, "is missing id"))?;
                let doc = record.doc.ok_or_else(|| invalid(kind, "is missing doc"))?;
                Ok(match kind {
                    ActionKind::Create => Action::Create { id, doc },
                    ActionKind::Update => Action::Update { id, doc },
                    _ => Action::UpdateOrCreate { id, doc },
                })
            }
            ActionKind::Delete => {
                if record.doc.is_some() {
                    return Err(invalid(kind, "must not carry doc"));
                }
                if record.has_osm_fields() {
                    return Err(invalid(kind, "must not carry OSM fields"));
                }
                let id = record.id.ok_or_else(|| invalid(kind, "is missing id"))?;
                Ok(Action::Delete { id })
            }
            ActionKind::DeleteOsm => {
                if record.id.is_some() {
                    return Err(invalid(kind, "must not carry id"));
                }
                if record.doc.is_some() {
                    return Err(invalid(kind, "must not carry doc"));
                }
                let osm_type = record
                    .osm_type
                    .ok_or_else(|| invalid(kind, "is missing osmType"))?;
                let osm_id = record
                    .osm_id
                    .ok_or_else(|| invalid(kind, "is missing osmId"))?;
                Ok(Action::DeleteOsm {
                    osm_type,
                    osm_id,
                    osm_key: record.osm_key,
                    osm_value: record.osm_value,
                })
            }
        }
    }
}

impl From<Action> for ActionRecord {
    fn from(action: Action) -> Self {
        let mut record = ActionRecord {
            action: action.kind(),
            id: None,
            doc: None,
            osm_type: None,
            osm_id: None,
            osm_key: None,
            osm_value: None,
        };
        match action {
            Action::Create { id, doc }
            | Action::Update { id, doc }
            | Action::UpdateOrCreate { id, doc } => {
                record.id = Some(id);
                record.doc = Some(doc);
            }
            Action::Delete { id } => record.id = Some(id),
            Action::DeleteOsm {
                osm_type,
                osm_id,
                osm_key,
                osm_value,
            } => {
                record.osm_type = Some(osm_type);
                record.osm_id = Some(osm_id);
                record.osm_key = osm_key;
                record.osm_value = osm_value;
            }
        }
        record
    }
}

/// Borrowed twin of [`ActionRecord`] so a batch serialises without cloning
/// its documents.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionRecordRef<'a> {
    action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<&'a Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osm_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osm_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osm_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    osm_value: Option<&'a str>,
}

impl<'a> From<&'a Action> for ActionRecordRef<'a> {
    fn from(action: &'a Action) -> Self {
        let (osm_type, osm_id, osm_key, osm_value) = match action {
            Action::DeleteOsm {
                osm_type,
                osm_id,
                osm_key,
                osm_value,
            } => (
                Some(osm_type.as_str()),
                Some(*osm_id),
                osm_key.as_deref(),
                osm_value.as_deref(),
            ),
            _ => (None, None, None, None),
        };
        ActionRecordRef {
            action: action.kind(),
            id: action.id(),
            doc: action.document(),
            osm_type,
            osm_id,
            osm_key,
            osm_value,
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ActionRecordRef::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = ActionRecord::deserialize(deserializer)?;
        Action::try_from(record).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Batch encoding
// ---------------------------------------------------------------------------

/// Serialise a batch to a compact JSON array, preserving order.
pub fn encode_batch(actions: &[Action]) -> LogResult<Vec<u8>> {
    Ok(serde_json::to_vec(actions)?)
}

/// Parse a JSON array of action records.
pub fn decode_batch(bytes: &[u8]) -> LogResult<Vec<Action>> {
    Ok(serde_json::from_slice(bytes)?)
}
