// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Segment naming and discovery
//
// Every flush produces two immutable files named by its sequence number:
//
//   segment-00000000000000000042.json.gz      compressed batch
//   checkpoint-00000000000000000042.state.json checkpoint record
//
// plus the mutable pointer `state.json`. Sequence numbers are zero-padded
// to 20 digits so that a plain lexicographic listing of the directory is
// also numeric order for every `u64`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LogError, LogResult};

/// Name of the pointer file that always holds the latest checkpoint.
pub const POINTER_FILE: &str = "state.json";

/// Width of the zero-padded sequence number in file names.
pub const SEQUENCE_WIDTH: usize = 20;

/// The kinds of per-sequence file in a log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFile {
    /// Compressed serialized batch.
    Segment,
    /// Checkpoint record written alongside the segment.
    Checkpoint,
}

impl LogFile {
    pub fn prefix(self) -> &'static str {
        match self {
            LogFile::Segment => "segment-",
            LogFile::Checkpoint => "checkpoint-",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            LogFile::Segment => ".json.gz",
            LogFile::Checkpoint => ".state.json",
        }
    }
}

/// Build the canonical file name for `sequence`.
///
/// Format: `segment-00000000000000000001.json.gz`
pub fn file_name(sequence: u64, kind: LogFile) -> String {
    format!(
        "{}{:0width$}{}",
        kind.prefix(),
        sequence,
        kind.suffix(),
        width = SEQUENCE_WIDTH
    )
}

/// Parse the sequence number from a file name of the given kind.
///
/// Returns `None` if the name does not match the expected pattern.
pub fn parse_file_name(name: &str, kind: LogFile) -> Option<u64> {
    let stripped = name.strip_prefix(kind.prefix())?;
    let digits = stripped.strip_suffix(kind.suffix())?;
    if digits.len() != SEQUENCE_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()
}

// ---------------------------------------------------------------------------
// SegmentNamer
// ---------------------------------------------------------------------------

/// Maps sequence numbers to paths inside one log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNamer {
    directory: PathBuf,
}

impl SegmentNamer {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Full path of the `kind` file for `sequence`.
    pub fn path(&self, sequence: u64, kind: LogFile) -> PathBuf {
        self.directory.join(file_name(sequence, kind))
    }

    pub fn segment_path(&self, sequence: u64) -> PathBuf {
        self.path(sequence, LogFile::Segment)
    }

    pub fn checkpoint_path(&self, sequence: u64) -> PathBuf {
        self.path(sequence, LogFile::Checkpoint)
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.directory.join(POINTER_FILE)
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Metadata about a single file in the log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// The full path to the file on disk.
    pub path: PathBuf,

    /// The sequence number encoded in the file name.
    pub sequence: u64,

    /// File size in bytes.
    pub file_size: u64,
}

impl PartialOrd for SegmentInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SegmentInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

/// Scan a log directory and return metadata for every file of `kind`,
/// sorted by sequence number (ascending).
///
/// Other files in the directory are silently ignored.
pub fn list_files(directory: &Path, kind: LogFile) -> LogResult<Vec<SegmentInfo>> {
    if !directory.is_dir() {
        return Err(LogError::DirectoryNotFound(
            directory.display().to_string(),
        ));
    }

    let mut files = Vec::new();

    for dir_entry in fs::read_dir(directory)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let name = file_name.to_string_lossy();

        if let Some(sequence) = parse_file_name(&name, kind) {
            let metadata = dir_entry.metadata()?;
            files.push(SegmentInfo {
                path: dir_entry.path(),
                sequence,
                file_size: metadata.len(),
            });
        }
    }

    files.sort();

    debug!(
        count = files.len(),
        kind = ?kind,
        dir = %directory.display(),
        "Discovered replication files"
    );

    Ok(files)
}

/// Segments in a log directory, sorted by sequence number.
pub fn list_segments(directory: &Path) -> LogResult<Vec<SegmentInfo>> {
    list_files(directory, LogFile::Segment)
}
