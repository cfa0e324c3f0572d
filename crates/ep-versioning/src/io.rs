//! Atomic file publication.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, VersionError};

/// Suffix of in-progress temp files. Directory scans skip these.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` so that readers see either the previous file or
/// the complete new one.
///
/// The data goes to a uniquely named sibling temp file, is synced, and is
/// then renamed over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| VersionError::InvalidPath {
        path: path.display().to_string(),
        reason: "has no parent directory",
    })?;
    fs::create_dir_all(parent).map_err(VersionError::io("create directory", parent))?;

    let temp_path = temp_sibling(path);
    let written = write_synced(&temp_path, bytes).and_then(|()| {
        fs::rename(&temp_path, path).map_err(VersionError::io("publish", path))
    });
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written?;

    sync_dir(parent);
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(VersionError::io("create", path))?;
    file.write_all(bytes).map_err(VersionError::io("write", path))?;
    file.sync_all().map_err(VersionError::io("sync", path))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{n}{TEMP_SUFFIX}", std::process::id()))
}

/// Best effort: persist the rename itself.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
    #[cfg(not(unix))]
    let _ = dir;
}

/// Whether a directory entry name belongs to an unfinished write.
pub(crate) fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_name(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_temp_names_are_recognized() {
        let temp = temp_sibling(Path::new("/x/abc.json"));
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(is_temp_name(&name));
        assert!(!is_temp_name("abc.json"));
    }
}
