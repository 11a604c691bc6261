// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Error types
//
// Defines every error condition of the replication log: I/O failures while
// writing or reading segments and checkpoints, records that violate the
// variant rules, and inconsistencies between the pointer and the files it
// refers to.

use std::path::PathBuf;

use georepl_sink::SinkError;
use thiserror::Error;

/// Errors that can occur during replication log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// An I/O error occurred while reading or writing a log file.
    #[error("replication log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error in replication log: {0}")]
    Json(#[from] serde_json::Error),

    /// A wrapped or replay-target sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// A record carries fields that are missing, forbidden, or foreign to
    /// its variant.
    #[error("invalid action record: {0}")]
    InvalidAction(String),

    /// The log directory does not exist or is not a directory.
    #[error("replication directory not found or inaccessible: {0}")]
    DirectoryNotFound(String),

    /// A segment below the published sequence is absent.
    #[error("segment {sequence} missing at {}", path.display())]
    MissingSegment {
        /// The sequence number of the missing segment.
        sequence: u64,
        /// Where the segment was expected.
        path: PathBuf,
    },

    /// Every sequence number has been used; the log cannot grow further.
    #[error("replication sequence exhausted after {last}")]
    SequenceExhausted {
        /// The last sequence number that was or would be published.
        last: u64,
    },

    /// The pointer was written by an incompatible format version.
    #[error("replication format mismatch: expected {expected}, found {found}")]
    FormatMismatch {
        /// The format this build reads and writes.
        expected: String,
        /// The format recorded in the checkpoint.
        found: String,
    },
}

impl From<LogError> for SinkError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Sink(inner) => inner,
            other => SinkError::Log(Box::new(other)),
        }
    }
}

/// Convenience type alias for replication log results.
pub type LogResult<T> = Result<T, LogError>;
