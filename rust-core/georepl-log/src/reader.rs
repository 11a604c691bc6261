// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Reader
//
// The consumer side of a log directory. A replica learns the latest
// published sequence from `state.json` and then applies the segments it has
// not seen yet, in sequence order, to its own sink. Files with a sequence
// beyond the pointer belong to a flush that never completed and are never
// replayed.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use georepl_sink::EventSink;
use tracing::{debug, info};

use crate::action::Action;
use crate::checkpoint::{Checkpoint, REPLICATION_FORMAT};
use crate::codec::decode_segment;
use crate::error::{LogError, LogResult};
use crate::segment::{list_files, list_segments, LogFile, SegmentInfo, SegmentNamer};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What a replay applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of segments applied; each ended with one `finish()`.
    pub segments: usize,
    /// Number of records applied across all segments.
    pub records: usize,
    /// Sequence of the last applied segment, if any.
    pub last_sequence: Option<u64>,
}

/// A consistency problem found by [`ReplicationReader::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyProblem {
    /// `state.json` exists but cannot be parsed.
    PointerUnreadable(String),
    /// The pointer was written in another format.
    UnsupportedFormat(String),
    /// The per-sequence checkpoint named by the pointer is absent.
    MissingCheckpoint(u64),
    /// The pointer's bytes differ from its per-sequence checkpoint.
    PointerMismatch(u64),
    /// Published segments `first..=last` are absent.
    MissingSegments { first: u64, last: u64 },
    /// A published segment cannot be decoded.
    CorruptSegment { sequence: u64, reason: String },
}

impl fmt::Display for VerifyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyProblem::PointerUnreadable(reason) => {
                write!(f, "pointer unreadable: {reason}")
            }
            VerifyProblem::UnsupportedFormat(found) => {
                write!(f, "unsupported replication format {found} (expected {REPLICATION_FORMAT})")
            }
            VerifyProblem::MissingCheckpoint(sequence) => {
                write!(f, "checkpoint {sequence} named by the pointer is missing")
            }
            VerifyProblem::PointerMismatch(sequence) => {
                write!(f, "pointer differs from checkpoint {sequence}")
            }
            VerifyProblem::MissingSegments { first, last } if first == last => {
                write!(f, "segment {first} is missing")
            }
            VerifyProblem::MissingSegments { first, last } => {
                write!(f, "segments {first} to {last} are missing")
            }
            VerifyProblem::CorruptSegment { sequence, reason } => {
                write!(f, "segment {sequence} is corrupt: {reason}")
            }
        }
    }
}

/// Outcome of [`ReplicationReader::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Sequence named by the pointer, if any.
    pub latest: Option<u64>,
    /// Published segments that were decoded successfully.
    pub segments_checked: usize,
    /// Records across all decoded segments.
    pub records: usize,
    pub problems: Vec<VerifyProblem>,
    /// Files beyond the pointer, left by interrupted flushes.
    pub orphans: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ReplicationReader
// ---------------------------------------------------------------------------

/// Reads a replication log directory.
#[derive(Debug, Clone)]
pub struct ReplicationReader {
    namer: SegmentNamer,
}

impl ReplicationReader {
    /// Open a log directory for reading.
    pub fn open(directory: impl AsRef<Path>) -> LogResult<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(LogError::DirectoryNotFound(
                directory.display().to_string(),
            ));
        }
        Ok(Self {
            namer: SegmentNamer::new(directory),
        })
    }

    pub fn directory(&self) -> &Path {
        self.namer.directory()
    }

    /// The published checkpoint, or `None` for a log with no flush yet.
    ///
    /// Unlike the writer, the reader reports an unreadable pointer as an
    /// error: a replica must not guess how far the log goes.
    pub fn latest(&self) -> LogResult<Option<Checkpoint>> {
        let pointer_path = self.namer.pointer_path();
        if !pointer_path.exists() {
            return Ok(None);
        }
        Ok(Some(Checkpoint::read(&pointer_path)?))
    }

    /// Segment files present in the directory, sorted by sequence.
    pub fn segments(&self) -> LogResult<Vec<SegmentInfo>> {
        list_segments(self.namer.directory())
    }

    /// Decode the segment for `sequence`.
    pub fn read_segment(&self, sequence: u64) -> LogResult<Vec<Action>> {
        let path = self.namer.segment_path(sequence);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LogError::MissingSegment { sequence, path });
            }
            Err(err) => return Err(err.into()),
        };
        decode_segment(&bytes)
    }

    /// Apply every published segment from `from_sequence` onwards to `sink`.
    ///
    /// Each segment is replayed as one run: its records in order, then
    /// `finish()`. Replay stops at the first error; segments before it
    /// have been applied completely.
    pub fn replay_from<S: EventSink + ?Sized>(
        &self,
        from_sequence: u64,
        sink: &mut S,
    ) -> LogResult<ReplayReport> {
        let mut report = ReplayReport::default();

        let Some(latest) = self.latest()? else {
            debug!(dir = %self.directory().display(), "Nothing published yet");
            return Ok(report);
        };
        if !latest.is_current_format() {
            return Err(LogError::FormatMismatch {
                expected: REPLICATION_FORMAT.to_string(),
                found: latest.replication_format,
            });
        }

        for sequence in from_sequence..=latest.sequence_number {
            let actions = self.read_segment(sequence)?;
            for action in &actions {
                action.apply(sink)?;
            }
            sink.finish()?;

            report.segments += 1;
            report.records += actions.len();
            report.last_sequence = Some(sequence);
            debug!(sequence, records = actions.len(), "Applied replication segment");
        }

        info!(
            from_sequence,
            segments = report.segments,
            records = report.records,
            sink = sink.name(),
            "Replay complete"
        );

        Ok(report)
    }

    /// Check the directory for consistency between pointer, checkpoints and
    /// segments.
    pub fn verify(&self) -> LogResult<VerifyReport> {
        let mut report = VerifyReport::default();
        let pointer_path = self.namer.pointer_path();

        let latest = if pointer_path.exists() {
            let pointer_bytes = fs::read(&pointer_path)?;
            match Checkpoint::from_bytes(&pointer_bytes) {
                Ok(checkpoint) => {
                    let sequence = checkpoint.sequence_number;
                    if !checkpoint.is_current_format() {
                        report
                            .problems
                            .push(VerifyProblem::UnsupportedFormat(checkpoint.replication_format));
                    }
                    match fs::read(self.namer.checkpoint_path(sequence)) {
                        Ok(bytes) if bytes == pointer_bytes => {}
                        Ok(_) => report.problems.push(VerifyProblem::PointerMismatch(sequence)),
                        Err(_) => report.problems.push(VerifyProblem::MissingCheckpoint(sequence)),
                    }
                    Some(sequence)
                }
                Err(err) => {
                    report
                        .problems
                        .push(VerifyProblem::PointerUnreadable(err.to_string()));
                    return Ok(report);
                }
            }
        } else {
            None
        };
        report.latest = latest;

        if let Some(latest) = latest {
            self.verify_segments(latest, &mut report)?;
        }

        for kind in [LogFile::Segment, LogFile::Checkpoint] {
            for file in list_files(self.namer.directory(), kind)? {
                if latest.map_or(true, |latest| file.sequence > latest) {
                    report.orphans.push(file.path);
                }
            }
        }
        report.orphans.sort();

        Ok(report)
    }
}

impl ReplicationReader {
    /// Decode every segment present in `0..=latest` and report gaps as
    /// ranges. Work is bounded by the files on disk, not by `latest`.
    fn verify_segments(&self, latest: u64, report: &mut VerifyReport) -> LogResult<()> {
        // `None` once sequence u64::MAX has been seen.
        let mut expected = Some(0u64);

        for file in list_segments(self.namer.directory())? {
            if file.sequence > latest {
                break;
            }
            if let Some(first) = expected {
                if file.sequence > first {
                    report.problems.push(VerifyProblem::MissingSegments {
                        first,
                        last: file.sequence - 1,
                    });
                }
            }

            match fs::read(&file.path)
                .map_err(LogError::from)
                .and_then(|bytes| decode_segment(&bytes))
            {
                Ok(actions) => {
                    report.segments_checked += 1;
                    report.records += actions.len();
                }
                Err(err) => report.problems.push(VerifyProblem::CorruptSegment {
                    sequence: file.sequence,
                    reason: err.to_string(),
                }),
            }
            expected = file.sequence.checked_add(1);
        }

        if let Some(first) = expected.filter(|first| *first <= latest) {
            report
                .problems
                .push(VerifyProblem::MissingSegments { first, last: latest });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReplicationConfig, SyncMode};
    use crate::writer::ReplicationWriter;
    use georepl_sink::{Document, InMemorySink};
    use tempfile::TempDir;

    fn write_runs(dir: &Path, runs: &[&[&str]]) {
        let config = ReplicationConfig::new(dir).with_sync_mode(SyncMode::Async);
        let mut writer = ReplicationWriter::open(config).unwrap();
        for run in runs {
            for uid in *run {
                writer.create(&Document::new(*uid)).unwrap();
            }
            writer.finish().unwrap();
        }
    }

    #[test]
    fn test_open_nonexistent_dir() {
        let result = ReplicationReader::open("/nonexistent/replication/dir");
        assert!(matches!(result, Err(LogError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_latest_on_empty_log() {
        let dir = TempDir::new().unwrap();
        let reader = ReplicationReader::open(dir.path()).unwrap();
        assert!(reader.latest().unwrap().is_none());
        assert!(reader.segments().unwrap().is_empty());
    }

    #[test]
    fn test_latest_rejects_corrupt_pointer() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("state.json"), b"{").unwrap();
        let reader = ReplicationReader::open(dir.path()).unwrap();
        assert!(reader.latest().is_err());
    }

    #[test]
    fn test_replay_from_middle() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"], &["n2", "n3"], &["n4"]]);

        let reader = ReplicationReader::open(dir.path()).unwrap();
        let mut sink = InMemorySink::new();
        let report = reader.replay_from(1, &mut sink).unwrap();

        assert_eq!(report.segments, 2);
        assert_eq!(report.records, 3);
        assert_eq!(report.last_sequence, Some(2));
        assert_eq!(sink.completed_runs(), 2);
        assert!(sink.get("n1").is_none());
        assert!(sink.get("n4").is_some());
    }

    #[test]
    fn test_replay_past_latest_is_noop() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"]]);

        let reader = ReplicationReader::open(dir.path()).unwrap();
        let mut sink = InMemorySink::new();
        let report = reader.replay_from(5, &mut sink).unwrap();
        assert_eq!(report, ReplayReport::default());
    }

    #[test]
    fn test_replay_reports_missing_segment() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"], &["n2"]]);
        fs::remove_file(SegmentNamer::new(dir.path()).segment_path(0)).unwrap();

        let reader = ReplicationReader::open(dir.path()).unwrap();
        let mut sink = InMemorySink::new();
        let result = reader.replay_from(0, &mut sink);
        assert!(matches!(result, Err(LogError::MissingSegment { sequence: 0, .. })));
    }

    #[test]
    fn test_replay_rejects_foreign_format() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"]]);
        let mut checkpoint = Checkpoint::new(0);
        checkpoint.replication_format = "9.9.9".to_string();
        fs::write(dir.path().join("state.json"), checkpoint.to_bytes().unwrap()).unwrap();

        let reader = ReplicationReader::open(dir.path()).unwrap();
        let mut sink = InMemorySink::new();
        assert!(matches!(
            reader.replay_from(0, &mut sink),
            Err(LogError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_healthy_log() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1", "n2"], &["n3"]]);

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert!(report.is_ok(), "{:?}", report.problems);
        assert_eq!(report.latest, Some(1));
        assert_eq!(report.segments_checked, 2);
        assert_eq!(report.records, 3);
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn test_verify_flags_missing_and_corrupt_segments() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"], &["n2"], &["n3"]]);
        let namer = SegmentNamer::new(dir.path());
        fs::remove_file(namer.segment_path(0)).unwrap();
        fs::write(namer.segment_path(1), b"garbage").unwrap();

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert!(!report.is_ok());
        assert!(report
            .problems
            .contains(&VerifyProblem::MissingSegments { first: 0, last: 0 }));
        assert!(report
            .problems
            .iter()
            .any(|p| matches!(p, VerifyProblem::CorruptSegment { sequence: 1, .. })));
        assert_eq!(report.segments_checked, 1);
    }

    #[test]
    fn test_verify_reports_gaps_as_ranges() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"], &["n2"], &["n3"], &["n4"], &["n5"]]);
        let namer = SegmentNamer::new(dir.path());
        for sequence in [1, 2, 4] {
            fs::remove_file(namer.segment_path(sequence)).unwrap();
        }

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert_eq!(
            report.problems,
            vec![
                VerifyProblem::MissingSegments { first: 1, last: 2 },
                VerifyProblem::MissingSegments { first: 4, last: 4 },
            ]
        );
        assert_eq!(report.segments_checked, 2);
    }

    #[test]
    fn test_verify_huge_pointer_is_bounded_by_files() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"]]);
        let namer = SegmentNamer::new(dir.path());
        let bytes = Checkpoint::new(u64::MAX).to_bytes().unwrap();
        fs::write(namer.checkpoint_path(u64::MAX), &bytes).unwrap();
        fs::write(namer.pointer_path(), &bytes).unwrap();

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert_eq!(report.latest, Some(u64::MAX));
        assert_eq!(report.segments_checked, 1);
        assert_eq!(
            report.problems,
            vec![VerifyProblem::MissingSegments {
                first: 1,
                last: u64::MAX
            }]
        );
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn test_verify_flags_pointer_mismatch() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"]]);
        let namer = SegmentNamer::new(dir.path());
        fs::write(namer.checkpoint_path(0), Checkpoint::new(0).to_bytes().unwrap()).unwrap();
        fs::write(
            namer.pointer_path(),
            serde_json::to_vec_pretty(&Checkpoint::new(0)).unwrap(),
        )
        .unwrap();

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert_eq!(report.problems, vec![VerifyProblem::PointerMismatch(0)]);
    }

    #[test]
    fn test_verify_lists_orphans() {
        let dir = TempDir::new().unwrap();
        write_runs(dir.path(), &[&["n1"]]);
        let orphan = SegmentNamer::new(dir.path()).segment_path(1);
        fs::write(&orphan, b"interrupted").unwrap();

        let report = ReplicationReader::open(dir.path()).unwrap().verify().unwrap();
        assert!(report.is_ok());
        assert_eq!(report.orphans, vec![orphan]);
    }
}
