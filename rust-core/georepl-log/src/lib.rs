// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log crate
//
// Records every change applied to the geocoding index so that replicas can
// reproduce it. A `ReplicationWriter` sits in front of the real index sink:
// each event is forwarded first and then buffered as an `Action`. When the
// update run finishes, the buffer becomes one gzip-compressed segment file
// and the writer publishes a checkpoint naming it.
//
// # Directory layout
//
// ```text
// replication/
//   segment-00000000000000000000.json.gz            -- actions of run 0
//   checkpoint-00000000000000000000.state.json      -- checkpoint of run 0
//   segment-00000000000000000001.json.gz
//   checkpoint-00000000000000000001.state.json
//   state.json                                      -- copy of the latest checkpoint
// ```
//
// Segments and checkpoints are written once and never modified. `state.json`
// is replaced by an atomic rename after the segment and checkpoint of a run
// are on disk, so a reader that trusts it always finds complete files.
//
// ## Segment format
//
// A gzip stream wrapping a JSON array of action records:
//
// ```text
// [{"action":"CREATE","id":"n1","doc":{"uid":"n1",...}},
//  {"action":"DELETE_OSM","osmType":"N","osmId":42,"osmKey":"place"}]
// ```
//
// ## Usage
//
// ```no_run
// use georepl_log::{ReplicationConfig, ReplicationReader, ReplicationWriter};
// use georepl_sink::{Document, EventSink, InMemorySink};
//
// let config = ReplicationConfig::new("/tmp/georepl");
// let mut writer = ReplicationWriter::wrapping(config, InMemorySink::new()).unwrap();
//
// writer.create(&Document::new("n1").with_osm("N", 1, Some("place"), Some("city"))).unwrap();
// writer.delete("n2").unwrap();
// writer.finish().unwrap();
//
// // On a replica.
// let reader = ReplicationReader::open("/tmp/georepl").unwrap();
// let mut replica = InMemorySink::new();
// reader.replay_from(0, &mut replica).unwrap();
// ```

pub mod action;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod durable;
pub mod error;
pub mod reader;
pub mod segment;
pub mod writer;

pub use action::{Action, ActionKind, ActionRecord};
pub use checkpoint::{Checkpoint, REPLICATION_FORMAT};
pub use codec::{decode_segment, encode_segment};
pub use config::{ReplicationConfig, SyncMode};
pub use error::{LogError, LogResult};
pub use reader::{ReplayReport, ReplicationReader, VerifyProblem, VerifyReport};
pub use segment::{list_segments, LogFile, SegmentInfo, SegmentNamer};
pub use writer::{FlushOutcome, ReplicationWriter};
