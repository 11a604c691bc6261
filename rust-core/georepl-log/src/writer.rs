// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Writer
//
// The `ReplicationWriter` is an `EventSink` that records every change event
// of a synchronisation run and, when the run finishes, writes them as one
// numbered segment. It may wrap another sink (typically the search-index
// updater); every event is forwarded to the wrapped sink first and only
// recorded once that call has returned successfully.
//
// Flush protocol, for sequence N:
//
//   1. segment-N.json.gz       gzip(JSON array of the batch), atomic rename
//   2. checkpoint-N.state.json {sequenceNumber: N, ...},       atomic rename
//   3. state.json              same bytes as 2,                atomic rename
//   4. N += 1, batch cleared
//
// Any failure in 1-3 is returned to the caller with N and the batch left
// untouched. The caller must abort the run; the writer never retries.

use std::fs;
use std::path::{Path, PathBuf};

use georepl_sink::{Document, EventSink, NullSink, SinkResult};
use tracing::{error, info, warn};

use crate::action::Action;
use crate::checkpoint::{publish_pointer, write_checkpoint, Checkpoint, REPLICATION_FORMAT};
use crate::codec::encode_segment;
use crate::config::ReplicationConfig;
use crate::durable::{sync_directory, write_atomic};
use crate::error::{LogError, LogResult};
use crate::segment::SegmentNamer;

/// Result of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch was empty; nothing was written.
    Empty,
    /// A segment was written and published.
    Written {
        /// Sequence number of the new segment.
        sequence: u64,
        /// Number of records in the segment.
        records: usize,
        /// Path of the new segment file.
        segment: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// ReplicationWriter
// ---------------------------------------------------------------------------

/// Records a change stream as sequence-numbered replication segments.
///
/// One writer owns one log directory for its lifetime. It is not
/// synchronised: the caller must ensure that only one run is in flight
/// against a directory at a time.
pub struct ReplicationWriter<S: EventSink = NullSink> {
    /// Sink every event is forwarded to before it is recorded.
    wrapped: Option<S>,

    config: ReplicationConfig,

    namer: SegmentNamer,

    pointer_path: PathBuf,

    /// Records accumulated since the last successful flush, in call order.
    batch: Vec<Action>,

    /// Sequence number the next flush will be written under.
    sequence: u64,
}

impl ReplicationWriter<NullSink> {
    /// Open a writer that only records, without a downstream sink.
    pub fn open(config: ReplicationConfig) -> LogResult<Self> {
        Self::with_wrapped(config, None)
    }
}

impl<S: EventSink> ReplicationWriter<S> {
    /// Open a writer that forwards every event to `sink` before recording it.
    pub fn wrapping(config: ReplicationConfig, sink: S) -> LogResult<Self> {
        Self::with_wrapped(config, Some(sink))
    }

    /// Open a writer with an optional downstream sink.
    ///
    /// Numbering resumes one past the sequence named by the pointer. A
    /// missing or unreadable pointer starts a new log at sequence 0. A
    /// pointer at `u64::MAX` fails with `SequenceExhausted`.
    pub fn with_wrapped(config: ReplicationConfig, wrapped: Option<S>) -> LogResult<Self> {
        let directory = config.directory.clone();

        if !directory.is_dir() {
            if !config.create_directory {
                return Err(LogError::DirectoryNotFound(
                    directory.display().to_string(),
                ));
            }
            fs::create_dir_all(&directory)?;
            info!(dir = %directory.display(), "Created replication directory");
        }

        let namer = SegmentNamer::new(&directory);
        let pointer_path = namer.pointer_path();

        let sequence = match Checkpoint::read_optional(&pointer_path) {
            Some(checkpoint) => {
                if !checkpoint.is_current_format() {
                    warn!(
                        found = %checkpoint.replication_format,
                        expected = REPLICATION_FORMAT,
                        "Resuming a log written in another replication format"
                    );
                }
                checkpoint
                    .sequence_number
                    .checked_add(1)
                    .ok_or(LogError::SequenceExhausted {
                        last: checkpoint.sequence_number,
                    })?
            }
            None => 0,
        };

        info!(
            dir = %directory.display(),
            next_sequence = sequence,
            wrapped = wrapped.as_ref().map(|s| s.name()).unwrap_or("none"),
            "Next sequence number {sequence}"
        );

        Ok(Self {
            wrapped,
            config,
            namer,
            pointer_path,
            batch: Vec::new(),
            sequence,
        })
    }

    /// Write the pending batch as a new segment and publish it.
    ///
    /// An empty batch writes nothing and leaves the sequence unchanged. On
    /// error the batch and sequence are left as they were.
    pub fn flush(&mut self) -> LogResult<FlushOutcome> {
        if self.batch.is_empty() {
            warn!(sequence = self.sequence, "Update empty, no segment written");
            return Ok(FlushOutcome::Empty);
        }

        let sequence = self.sequence;
        // The last u64 is never written, so a published segment always has
        // a successor number.
        let Some(next) = sequence.checked_add(1) else {
            error!(sequence, "Replication sequence exhausted");
            return Err(LogError::SequenceExhausted { last: sequence });
        };

        match self.write_segment(sequence) {
            Ok(segment) => {
                let records = self.batch.len();
                self.batch.clear();
                self.sequence = next;
                info!(
                    sequence,
                    records,
                    segment = %segment.display(),
                    "Replication segment published"
                );
                Ok(FlushOutcome::Written {
                    sequence,
                    records,
                    segment,
                })
            }
            Err(err) => {
                error!(
                    sequence,
                    pending = self.batch.len(),
                    error = %err,
                    "Failed to write replication segment"
                );
                Err(err)
            }
        }
    }

    /// Sequence number the next non-empty flush will use.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Records waiting for the next flush, in call order.
    pub fn pending(&self) -> &[Action] {
        &self.batch
    }

    pub fn directory(&self) -> &Path {
        self.namer.directory()
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn wrapped(&self) -> Option<&S> {
        self.wrapped.as_ref()
    }

    pub fn wrapped_mut(&mut self) -> Option<&mut S> {
        self.wrapped.as_mut()
    }

    /// Consume the writer, returning the downstream sink. Unflushed records
    /// are dropped.
    pub fn into_wrapped(self) -> Option<S> {
        if !self.batch.is_empty() {
            warn!(
                pending = self.batch.len(),
                "Discarding unflushed replication records"
            );
        }
        self.wrapped
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn write_segment(&self, sequence: u64) -> LogResult<PathBuf> {
        let sync_mode = self.config.sync_mode;
        let segment_path = self.namer.segment_path(sequence);
        let checkpoint_path = self.namer.checkpoint_path(sequence);

        // Anything already at this sequence was never published.
        for orphan in [&segment_path, &checkpoint_path] {
            if orphan.exists() {
                warn!(
                    path = %orphan.display(),
                    sequence,
                    "Replacing file left by an interrupted flush"
                );
            }
        }

        let bytes = encode_segment(&self.batch, self.config.compression_level)?;
        write_atomic(&segment_path, &bytes, sync_mode)?;

        let checkpoint_bytes = Checkpoint::new(sequence).to_bytes()?;
        write_checkpoint(&checkpoint_path, &checkpoint_bytes, sync_mode)?;

        // Segment and checkpoint must be durable before the pointer names them.
        sync_directory(self.namer.directory(), sync_mode)?;
        publish_pointer(&self.pointer_path, &checkpoint_bytes, sync_mode)?;

        Ok(segment_path)
    }
}

impl<S: EventSink> EventSink for ReplicationWriter<S> {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        self.wrapped.create(doc)?;
        self.batch.push(Action::create(doc));
        Ok(())
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        self.wrapped.update(doc)?;
        self.batch.push(Action::update(doc));
        Ok(())
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        self.wrapped.update_or_create(doc)?;
        self.batch.push(Action::update_or_create(doc));
        Ok(())
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        self.wrapped.delete(id)?;
        self.batch.push(Action::delete(id));
        Ok(())
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        osm_key: Option<&str>,
        osm_value: Option<&str>,
    ) -> SinkResult<()> {
        self.wrapped
            .delete_osm(osm_type, osm_id, osm_key, osm_value)?;
        self.batch
            .push(Action::delete_osm(osm_type, osm_id, osm_key, osm_value));
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.wrapped.finish()?;
        self.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "replication-log"
    }
}
