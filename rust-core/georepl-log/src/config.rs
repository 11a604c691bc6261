// SPDX-License-Identifier: PMPL-1.0-or-later
//! Replication log configuration.
//!
//! Defaults favour durability: every flush fsyncs the segment, the
//! checkpoint, the pointer and the directory entry before it returns.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::MAX_COMPRESSION_LEVEL;

/// Controls whether a flush forces its files to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// `fsync` every file written by a flush, and the directory after the
    /// pointer is republished. A flush that returns survives a crash.
    Fsync,

    /// Never explicitly call `fsync`; rely on the OS page cache. A crash may
    /// lose recent flushes or leave the pointer behind the segments.
    Async,
}

/// Configuration for a [`ReplicationWriter`](crate::ReplicationWriter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Directory holding segments, checkpoints and the pointer.
    pub directory: PathBuf,
    /// How aggressively flushes are synced.
    pub sync_mode: SyncMode,
    /// gzip level for segments (0-9).
    pub compression_level: u32,
    /// Create `directory` when the writer is constructed, if missing.
    pub create_directory: bool,
}

impl ReplicationConfig {
    /// Defaults with the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Set the gzip level; values above 9 are clamped.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
        self
    }

    pub fn with_create_directory(mut self, create: bool) -> Self {
        self.create_directory = create;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for ReplicationConfig {
    /// - directory: `replication`
    /// - sync_mode: fsync
    /// - compression_level: 6
    /// - create_directory: true
    fn default() -> Self {
        Self {
            directory: PathBuf::from("replication"),
            sync_mode: SyncMode::Fsync,
            compression_level: 6,
            create_directory: true,
        }
    }
}
