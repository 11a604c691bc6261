// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Sink error types.
//
// Every sink reports failures through `SinkError` so that sinks can wrap
// each other without translating errors at each link of the chain. A sink
// built on a richer error type (the replication log writer, for one) boxes
// it into `SinkError::Log` and keeps it reachable through `source()`.

use thiserror::Error;

use crate::sink::SinkOperation;

/// Errors raised by an [`EventSink`](crate::EventSink) operation.
#[derive(Debug, Error)]
pub enum SinkError {
    /// An I/O error occurred in the sink's storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink refused the event.
    #[error("{sink} rejected {operation} for '{key}': {reason}")]
    Rejected {
        /// Name of the refusing sink.
        sink: String,
        /// The operation that was refused.
        operation: SinkOperation,
        /// Document key or OSM coordinates the event addressed.
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The replication log failed to record or flush the event stream.
    #[error("replication log failure: {0}")]
    Log(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SinkError {
    /// Shorthand for [`SinkError::Rejected`].
    pub fn rejected(
        sink: impl Into<String>,
        operation: SinkOperation,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SinkError::Rejected {
            sink: sink.into(),
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for sink results.
pub type SinkResult<T> = Result<T, SinkError>;
