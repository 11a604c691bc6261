// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end behaviour of the replication writer against a real directory.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use georepl_log::{
    decode_segment, Action, Checkpoint, FlushOutcome, LogError, ReplicationConfig,
    ReplicationReader, ReplicationWriter, SegmentNamer, SyncMode,
};
use georepl_sink::{Document, EventSink, InMemorySink, SinkError, SinkOperation, SinkResult};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.logs.lock().unwrap()).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with tracing output captured.
fn with_tracing<T>(f: impl FnOnce() -> T) -> (String, T) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (logs.contents(), result)
}

fn config(dir: &Path) -> ReplicationConfig {
    ReplicationConfig::new(dir).with_sync_mode(SyncMode::Fsync)
}

fn segment(dir: &Path, sequence: u64) -> Vec<Action> {
    let bytes = fs::read(SegmentNamer::new(dir).segment_path(sequence)).unwrap();
    decode_segment(&bytes).unwrap()
}

fn pointer_equals_checkpoint(dir: &Path, sequence: u64) -> bool {
    let namer = SegmentNamer::new(dir);
    fs::read(namer.pointer_path()).unwrap() == fs::read(namer.checkpoint_path(sequence)).unwrap()
}

fn log_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Records each call, then fails `create` from the n-th invocation on.
struct FailingCreateSink {
    calls: Vec<String>,
    fail_from: usize,
    creates: usize,
}

impl FailingCreateSink {
    fn new(fail_from: usize) -> Self {
        Self {
            calls: Vec::new(),
            fail_from,
            creates: 0,
        }
    }
}

impl EventSink for FailingCreateSink {
    fn create(&mut self, doc: &Document) -> SinkResult<()> {
        self.calls.push(format!("create {}", doc.uid));
        self.creates += 1;
        if self.creates >= self.fail_from {
            return Err(SinkError::rejected(
                "failing",
                SinkOperation::Create,
                doc.uid.clone(),
                "index unavailable",
            ));
        }
        Ok(())
    }

    fn update(&mut self, doc: &Document) -> SinkResult<()> {
        self.calls.push(format!("update {}", doc.uid));
        Ok(())
    }

    fn update_or_create(&mut self, doc: &Document) -> SinkResult<()> {
        self.calls.push(format!("update_or_create {}", doc.uid));
        Ok(())
    }

    fn delete(&mut self, id: &str) -> SinkResult<()> {
        self.calls.push(format!("delete {id}"));
        Ok(())
    }

    fn delete_osm(
        &mut self,
        osm_type: &str,
        osm_id: i64,
        _osm_key: Option<&str>,
        _osm_value: Option<&str>,
    ) -> SinkResult<()> {
        self.calls.push(format!("delete_osm {osm_type}/{osm_id}"));
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.calls.push("finish".to_string());
        Ok(())
    }
}

#[test]
fn fresh_directory_writes_segment_zero() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    assert_eq!(writer.next_sequence(), 0);

    let n1 = Document::new("n1").with_attribute("name", "Marktplatz");
    let w5 = Document::new("w5").with_attribute("name", "Lindenallee");
    writer.create(&n1).unwrap();
    writer.update(&w5).unwrap();
    writer.finish().unwrap();

    assert_eq!(
        segment(dir.path(), 0),
        vec![Action::create(&n1), Action::update(&w5)]
    );
    assert!(pointer_equals_checkpoint(dir.path(), 0));

    let pointer = Checkpoint::read(&SegmentNamer::new(dir.path()).pointer_path()).unwrap();
    assert_eq!(pointer.sequence_number, 0);
    assert!(pointer.is_current_format());
}

#[test]
fn new_writer_resumes_after_pointer() {
    let dir = TempDir::new().unwrap();
    {
        let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
        writer.create(&Document::new("n1")).unwrap();
        writer.update(&Document::new("w5")).unwrap();
        writer.finish().unwrap();
    }

    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    assert_eq!(writer.next_sequence(), 1);

    writer.delete("n1").unwrap();
    writer.finish().unwrap();

    assert_eq!(segment(dir.path(), 1), vec![Action::delete("n1")]);
    assert!(pointer_equals_checkpoint(dir.path(), 1));
    assert_eq!(writer.next_sequence(), 2);
}

#[test]
fn empty_finish_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    writer.delete("n1").unwrap();
    writer.finish().unwrap();

    let before = log_files(dir.path());
    let pointer_before = fs::read(dir.path().join("state.json")).unwrap();

    let (logs, outcome) = with_tracing(|| {
        writer.finish().unwrap();
        writer.flush().unwrap()
    });
    assert_eq!(outcome, FlushOutcome::Empty);
    assert_eq!(logs.matches("Update empty, no segment written").count(), 2, "{logs}");
    assert!(logs.contains("WARN"), "{logs}");

    assert_eq!(log_files(dir.path()), before);
    assert_eq!(fs::read(dir.path().join("state.json")).unwrap(), pointer_before);
    assert_eq!(writer.next_sequence(), 1);
}

#[test]
fn reserved_uid_attribute_keeps_segment_decodable() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();

    let doc = Document::new("n1")
        .with_attribute("uid", "n1")
        .with_attribute("name", "Marktplatz");
    writer.create(&doc).unwrap();
    writer.update_or_create(&doc).unwrap();
    writer.finish().unwrap();

    assert_eq!(
        segment(dir.path(), 0),
        vec![Action::create(&doc), Action::update_or_create(&doc)]
    );

    let reader = ReplicationReader::open(dir.path()).unwrap();
    assert!(reader.verify().unwrap().is_ok());
    let mut replica = InMemorySink::new();
    reader.replay_from(0, &mut replica).unwrap();
    assert_eq!(replica.get("n1"), Some(&doc));
}

#[test]
fn delete_by_osm_coordinates_is_recorded() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();

    writer
        .delete_osm("way", 123, Some("highway"), Some("residential"))
        .unwrap();
    writer.finish().unwrap();

    let actions = segment(dir.path(), 0);
    assert_eq!(
        actions,
        vec![Action::DeleteOsm {
            osm_type: "way".to_string(),
            osm_id: 123,
            osm_key: Some("highway".to_string()),
            osm_value: Some("residential".to_string()),
        }]
    );
    assert_eq!(actions[0].id(), None);
    assert!(actions[0].document().is_none());

    // The raw record carries neither id nor doc.
    let bytes = fs::read(SegmentNamer::new(dir.path()).segment_path(0)).unwrap();
    let mut json = Vec::new();
    std::io::Read::read_to_end(&mut flate2::read::GzDecoder::new(&bytes[..]), &mut json).unwrap();
    let records: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert!(records[0].get("id").is_none());
    assert!(records[0].get("doc").is_none());
}

#[test]
fn wrapped_failure_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let mut writer =
        ReplicationWriter::wrapping(config(dir.path()), FailingCreateSink::new(2)).unwrap();

    let doc_a = Document::new("a");
    let doc_b = Document::new("b");
    writer.create(&doc_a).unwrap();

    let err = writer.create(&doc_b).unwrap_err();
    assert!(matches!(
        err,
        SinkError::Rejected {
            operation: SinkOperation::Create,
            ..
        }
    ));

    assert_eq!(writer.pending(), &[Action::create(&doc_a)]);
    assert_eq!(writer.wrapped().unwrap().calls, vec!["create a", "create b"]);
}

#[test]
fn every_event_reaches_wrapped_sink_before_batch() {
    let dir = TempDir::new().unwrap();
    let mut writer =
        ReplicationWriter::wrapping(config(dir.path()), FailingCreateSink::new(usize::MAX))
            .unwrap();

    let doc = Document::new("r7");
    writer.create(&doc).unwrap();
    assert_eq!(writer.wrapped().unwrap().calls.len(), 1);
    assert_eq!(writer.pending().len(), 1);

    writer.update(&doc).unwrap();
    writer.update_or_create(&doc).unwrap();
    writer.delete("r7").unwrap();
    writer.delete_osm("relation", 7, None, None).unwrap();
    assert_eq!(writer.wrapped().unwrap().calls.len(), 5);
    assert_eq!(writer.pending().len(), 5);

    writer.finish().unwrap();
    let calls = &writer.wrapped().unwrap().calls;
    assert_eq!(calls.last().map(String::as_str), Some("finish"));
    assert_eq!(segment(dir.path(), 0).len(), 5);
}

#[test]
fn pointer_publish_failure_is_fatal_and_keeps_state() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    writer.delete("n1").unwrap();
    writer.finish().unwrap();

    // A non-empty directory at the pointer path makes the rename fail.
    let pointer = dir.path().join("state.json");
    fs::remove_file(&pointer).unwrap();
    fs::create_dir(&pointer).unwrap();
    fs::write(pointer.join("blocker"), b"x").unwrap();

    writer.delete("n2").unwrap();
    let err = writer.finish().unwrap_err();
    assert!(matches!(err, SinkError::Log(_)));

    assert_eq!(writer.pending(), &[Action::delete("n2")]);
    assert_eq!(writer.next_sequence(), 1);
}

#[test]
fn interrupted_flush_is_invisible_to_readers() {
    let dir = TempDir::new().unwrap();
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    writer.delete("n1").unwrap();
    writer.finish().unwrap();

    let pointer = dir.path().join("state.json");
    let published = fs::read(&pointer).unwrap();
    fs::remove_file(&pointer).unwrap();
    fs::create_dir(&pointer).unwrap();
    fs::write(pointer.join("blocker"), b"x").unwrap();

    writer.delete("n2").unwrap();
    assert!(writer.flush().is_err());

    // Restore the published pointer; sequence 1 is now an orphan.
    fs::remove_dir_all(&pointer).unwrap();
    fs::write(&pointer, &published).unwrap();

    let reader = ReplicationReader::open(dir.path()).unwrap();
    assert_eq!(reader.latest().unwrap().unwrap().sequence_number, 0);
    let report = reader.verify().unwrap();
    assert!(report.is_ok());
    assert_eq!(report.orphans.len(), 2);

    // A new writer reuses sequence 1 and replaces the orphans.
    let mut writer = ReplicationWriter::open(config(dir.path())).unwrap();
    assert_eq!(writer.next_sequence(), 1);
    writer.delete("n3").unwrap();
    writer.finish().unwrap();
    assert_eq!(segment(dir.path(), 1), vec![Action::delete("n3")]);
    assert!(reader.verify().unwrap().orphans.is_empty());
}

#[test]
fn flush_io_failure_surfaces_as_log_error() {
    let dir = TempDir::new().unwrap();
    let log_dir = dir.path().join("replication");
    let mut writer = ReplicationWriter::open(config(&log_dir)).unwrap();

    writer.create(&Document::new("n1")).unwrap();
    fs::remove_dir_all(&log_dir).unwrap();

    match writer.finish().unwrap_err() {
        SinkError::Log(source) => {
            assert!(matches!(source.downcast_ref::<LogError>(), Some(LogError::Io(_))));
        }
        other => panic!("expected a log failure, got {other:?}"),
    }
    assert_eq!(writer.pending().len(), 1);
    assert_eq!(writer.next_sequence(), 0);
}

#[test]
fn replay_reproduces_primary_state() {
    let dir = TempDir::new().unwrap();
    let mut writer =
        ReplicationWriter::wrapping(config(dir.path()), InMemorySink::new()).unwrap();

    writer
        .create(&Document::new("n1").with_osm("node", 1, Some("place"), Some("city")))
        .unwrap();
    writer
        .create(&Document::new("w5").with_osm("way", 5, Some("highway"), Some("residential")))
        .unwrap();
    writer.finish().unwrap();

    writer
        .update(&Document::new("n1").with_attribute("name", "Neustadt"))
        .unwrap();
    writer
        .delete_osm("way", 5, Some("highway"), None)
        .unwrap();
    writer
        .update_or_create(&Document::new("r9").with_osm("relation", 9, None, None))
        .unwrap();
    writer.finish().unwrap();

    writer.delete("r9").unwrap();
    writer.finish().unwrap();

    let primary = writer.into_wrapped().unwrap();

    let reader = ReplicationReader::open(dir.path()).unwrap();
    let mut replica = InMemorySink::new();
    let report = reader.replay_from(0, &mut replica).unwrap();

    assert_eq!(report.segments, 3);
    assert_eq!(report.records, 6);
    assert_eq!(replica.completed_runs(), primary.completed_runs());
    assert_eq!(
        replica.documents().collect::<Vec<_>>(),
        primary.documents().collect::<Vec<_>>()
    );
}
