// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Segment codec
//
// A segment is one gzip member wrapping the compact JSON array of the
// batch. Nothing else is framed inside the file: a client that can gunzip
// and parse JSON can consume the log.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::action::{decode_batch, encode_batch, Action};
use crate::error::LogResult;

/// Highest gzip level accepted; larger values are clamped.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Encode a batch into segment bytes.
pub fn encode_segment(actions: &[Action], compression_level: u32) -> LogResult<Vec<u8>> {
    let json = encode_batch(actions)?;
    let level = Compression::new(compression_level.min(MAX_COMPRESSION_LEVEL));
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), level);
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode segment bytes back into the batch they hold.
pub fn decode_segment(bytes: &[u8]) -> LogResult<Vec<Action>> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    decode_batch(&json)
}
