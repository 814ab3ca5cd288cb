// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-temp-then-rename persistence, shared by the queue, metrics store,
//! and logger rotation. A crash mid-write leaves the prior file intact —
//! the rename is the only step that can make the new content visible, and
//! renames within one directory are atomic on every platform we target.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace the file at
/// `path`. Fails before touching `path` if serialization or the temp-file
/// write fails, so prior on-disk state is never lost.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path);
    Ok(())
}

/// Append `line` (without trailing newline) to `path`, creating it if
/// necessary, followed by a newline and an fsync of the write.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.sync_all()?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| format!("{}.tmp", n.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(file_name)
}

/// Best-effort directory fsync so the rename itself survives a crash.
/// Not supported on all platforms; failures are ignored.
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        n: u32,
    }

    #[test]
    fn round_trips_and_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &Doc { n: 1 }).unwrap();
        let loaded: Doc = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(loaded, Doc { n: 1 });
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn overwrite_replaces_prior_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &Doc { n: 1 }).unwrap();
        write_json_atomic(&path, &Doc { n: 2 }).unwrap();
        let loaded: Doc = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(loaded, Doc { n: 2 });
    }

    #[test]
    fn append_line_creates_file_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_line(&path, "a").unwrap();
        append_line(&path, "b").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a\nb\n");
    }
}
