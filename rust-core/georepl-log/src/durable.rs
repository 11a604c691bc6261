// SPDX-License-Identifier: PMPL-1.0-or-later
//
// georepl replication log - Atomic file replacement
//
// Every file the writer produces goes through `write_atomic`: the bytes land
// in a sibling `<name>.tmp`, are optionally fsynced, and the temporary file
// is renamed over the target. Readers therefore see either the previous
// file or the complete new one, never a missing or half-written file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncMode;

/// Suffix appended to a target's file name while it is being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// The temporary sibling used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Replace `path` with `bytes` atomically.
///
/// On failure the temporary file is removed and `path` is left as it was.
pub fn write_atomic(path: &Path, bytes: &[u8], sync_mode: SyncMode) -> io::Result<()> {
    let temp = temp_path(path);
    let result = write_file(&temp, bytes, sync_mode).and_then(|()| fs::rename(&temp, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_file(path: &Path, bytes: &[u8], sync_mode: SyncMode) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    if sync_mode == SyncMode::Fsync {
        file.sync_all()?;
    }
    Ok(())
}

/// Make renames inside `directory` durable.
#[cfg(unix)]
pub fn sync_directory(directory: &Path, sync_mode: SyncMode) -> io::Result<()> {
    if sync_mode == SyncMode::Async {
        return Ok(());
    }
    File::open(directory)?.sync_all()
}

/// Directories cannot be opened as files here; renames are durable once the
/// file system commits them.
#[cfg(not(unix))]
pub fn sync_directory(_directory: &Path, _sync_mode: SyncMode) -> io::Result<()> {
    Ok(())
}
