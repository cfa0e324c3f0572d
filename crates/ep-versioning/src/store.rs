//! Content-addressed blob store.
//!
//! Blobs live at `snapshots/{h[0:2]}/{h[2:]}` and are written once. A blob
//! that already exists is never rewritten, so identical content is stored a
//! single time no matter how many commits reference it.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use ep_model::ContentHash;
use tracing::{debug, warn};

use crate::error::{Result, VersionError};
use crate::io::{is_temp_name, write_atomic};
use crate::layout::ControlLayout;

#[derive(Debug, Clone)]
pub struct ContentStore {
    layout: ControlLayout,
}

impl ContentStore {
    pub fn new(layout: ControlLayout) -> Self {
        Self { layout }
    }

    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.layout.blob_file(hash)
    }

    /// Store `bytes` and return their hash. Skips the write if present.
    pub fn put(&self, bytes: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of(bytes);
        let path = self.blob_path(&hash);
        if path.is_file() {
            debug!(hash = %hash.short(), "blob already stored");
            return Ok(hash);
        }
        write_atomic(&path, bytes)?;
        debug!(hash = %hash.short(), size = bytes.len(), "stored blob");
        Ok(hash)
    }

    /// Read a blob, checking that its content still matches its key.
    pub fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VersionError::BlobNotFound { hash: hash.clone() });
            }
            Err(e) => return Err(VersionError::io("read blob", path)(e)),
        };

        let actual = ContentHash::of(&bytes);
        if &actual != hash {
            warn!(expected = %hash, actual = %actual, "blob failed integrity check");
            return Err(VersionError::HashMismatch {
                expected: hash.clone(),
                actual,
            });
        }
        Ok(bytes)
    }

    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.blob_path(hash).is_file()
    }

    /// Delete a blob. Only garbage collection calls this.
    pub(crate) fn remove(&self, hash: &ContentHash) -> Result<u64> {
        let path = self.blob_path(hash);
        let size = fs::metadata(&path)
            .map(|m| m.len())
            .map_err(VersionError::io("stat blob", &path))?;
        fs::remove_file(&path).map_err(VersionError::io("delete blob", &path))?;
        if let Some(shard) = path.parent() {
            // Succeeds only when the shard is now empty.
            let _ = fs::remove_dir(shard);
        }
        Ok(size)
    }

    /// Every stored blob hash, sorted. Names that are not valid hashes
    /// (including unfinished temp files) are skipped.
    pub fn hashes(&self) -> Result<Vec<ContentHash>> {
        let root = self.layout.snapshots_dir();
        let shards = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VersionError::io("list snapshots", root)(e)),
        };

        let mut hashes = Vec::new();
        for shard in shards {
            let shard = shard.map_err(VersionError::io("list snapshots", &root))?;
            if !shard.path().is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().into_owned();
            let entries =
                fs::read_dir(shard.path()).map_err(VersionError::io("list snapshots", shard.path()))?;
            for entry in entries {
                let entry = entry.map_err(VersionError::io("list snapshots", shard.path()))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_temp_name(&name) {
                    continue;
                }
                if let Ok(hash) = format!("{prefix}{name}").parse::<ContentHash>() {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Total size in bytes of all stored blobs.
    pub fn disk_usage(&self) -> Result<u64> {
        let mut total = 0;
        for hash in self.hashes()? {
            let path = self.blob_path(&hash);
            total += fs::metadata(&path)
                .map_err(VersionError::io("stat blob", &path))?
                .len();
        }
        Ok(total)
    }
}
