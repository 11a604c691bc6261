// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Checkpoints and the pointer
//
// A checkpoint records the sequence number of a flushed segment, the format
// it was written in, and when. Each flush writes its own
// `checkpoint-<seq>.state.json` and then republishes `state.json` with the
// very same bytes. `state.json` is the only mutable file in a log
// directory, and it is only ever replaced by an atomic rename.
//
// Wire format:
//
//   {"sequenceNumber": 42, "replicationFormat": "0.0.0",
//    "timestamp": "2026-10-19T08:30:00.123Z"}

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SyncMode;
use crate::durable::{sync_directory, write_atomic};
use crate::error::LogResult;

/// Version of the segment and checkpoint format written by this crate.
pub const REPLICATION_FORMAT: &str = "0.0.0";

/// The persisted marker of one flushed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Sequence number of the segment this checkpoint publishes.
    pub sequence_number: u64,
    /// Format version the segment was written in.
    pub replication_format: String,
    /// When the flush happened (UTC).
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// A checkpoint for `sequence_number` in the current format, stamped now.
    pub fn new(sequence_number: u64) -> Self {
        Self::at(sequence_number, Utc::now())
    }

    pub fn at(sequence_number: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence_number,
            replication_format: REPLICATION_FORMAT.to_string(),
            timestamp,
        }
    }

    /// Whether this checkpoint was written in the format this build uses.
    pub fn is_current_format(&self) -> bool {
        self.replication_format == REPLICATION_FORMAT
    }

    pub fn to_bytes(&self) -> LogResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> LogResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read and parse a checkpoint file.
    pub fn read(path: &Path) -> LogResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Read a checkpoint, treating every failure as "no checkpoint".
    ///
    /// A missing pointer is the normal state of a new log directory, and a
    /// truncated or foreign one cannot be trusted to resume from either.
    pub fn read_optional(path: &Path) -> Option<Self> {
        match Self::read(path) {
            Ok(checkpoint) => Some(checkpoint),
            Err(error) => {
                debug!(
                    path = %path.display(),
                    error = %error,
                    "No usable checkpoint"
                );
                None
            }
        }
    }
}

/// Write the per-sequence checkpoint file.
pub fn write_checkpoint(path: &Path, bytes: &[u8], sync_mode: SyncMode) -> LogResult<()> {
    write_atomic(path, bytes, sync_mode)?;
    Ok(())
}

/// Atomically replace the pointer with `bytes`.
///
/// The new content is written beside the pointer and renamed over it, so
/// readers see either the previous checkpoint or the new one in full.
pub fn publish_pointer(pointer_path: &Path, bytes: &[u8], sync_mode: SyncMode) -> LogResult<()> {
    write_atomic(pointer_path, bytes, sync_mode)?;
    if let Some(directory) = pointer_path.parent() {
        sync_directory(directory, sync_mode)?;
    }
    Ok(())
}
