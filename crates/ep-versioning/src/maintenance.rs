//! Explicit maintenance passes over the snapshot store.
//!
//! Neither runs implicitly. Garbage collection only considers commits that
//! can be parsed, so it refuses to run while any record is unreadable.

use std::collections::HashSet;

use ep_model::ContentHash;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, VersionError};
use crate::log::LogListing;
use crate::store::ContentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    /// Blobs examined.
    pub scanned: usize,
    /// Blobs deleted because no commit references them.
    pub removed: usize,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub checked: usize,
    /// Blobs whose content no longer matches their hash.
    pub damaged: Vec<ContentHash>,
    /// Hashes referenced by commits but absent from the store.
    pub missing: Vec<ContentHash>,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.damaged.is_empty() && self.missing.is_empty()
    }
}

fn referenced(listing: &LogListing) -> HashSet<&ContentHash> {
    listing
        .commits
        .iter()
        .flat_map(|commit| commit.files.iter().map(|file| &file.hash))
        .collect()
}

/// Delete blobs that no commit in `listing` references.
pub(crate) fn collect_garbage(store: &ContentStore, listing: &LogListing) -> Result<GcReport> {
    if listing.corrupted > 0 {
        warn!(corrupted = listing.corrupted, "garbage collection refused");
        return Err(VersionError::GcRefused {
            corrupted: listing.corrupted,
        });
    }

    let live = referenced(listing);
    let mut report = GcReport::default();
    for hash in store.hashes()? {
        report.scanned += 1;
        if live.contains(&hash) {
            continue;
        }
        report.bytes_freed += store.remove(&hash)?;
        report.removed += 1;
    }

    info!(
        scanned = report.scanned,
        removed = report.removed,
        bytes_freed = report.bytes_freed,
        "garbage collection finished"
    );
    Ok(report)
}

/// Re-hash every stored blob and check every referenced blob is present.
pub(crate) fn verify(store: &ContentStore, listing: &LogListing) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for hash in store.hashes()? {
        report.checked += 1;
        match store.get(&hash) {
            Ok(_) => {}
            Err(VersionError::HashMismatch { .. }) => report.damaged.push(hash),
            Err(e) => return Err(e),
        }
    }

    let mut missing: Vec<ContentHash> = referenced(listing)
        .into_iter()
        .filter(|hash| !store.exists(hash))
        .cloned()
        .collect();
    missing.sort();
    report.missing = missing;

    if !report.is_healthy() {
        warn!(
            damaged = report.damaged.len(),
            missing = report.missing.len(),
            "snapshot store has integrity problems"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ControlLayout;
    use ep_model::{Commit, FileRef};
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> ContentStore {
        let layout = ControlLayout::new(dir);
        layout.create_dirs().unwrap();
        ContentStore::new(layout)
    }

    fn listing_for(hashes: &[&ContentHash]) -> LogListing {
        LogListing {
            commits: hashes
                .iter()
                .map(|h| Commit::save(FileRef::new("main.tex", (*h).clone())))
                .collect(),
            corrupted: 0,
        }
    }

    #[test]
    fn test_gc_removes_only_unreferenced() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        let live = store.put(b"kept").unwrap();
        let dead = store.put(b"orphan!").unwrap();

        let report = collect_garbage(&store, &listing_for(&[&live])).unwrap();
        assert_eq!(
            report,
            GcReport {
                scanned: 2,
                removed: 1,
                bytes_freed: 7
            }
        );
        assert!(store.exists(&live));
        assert!(!store.exists(&dead));
    }

    #[test]
    fn test_gc_refuses_with_corrupted_commits() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        let orphan = store.put(b"maybe referenced").unwrap();
        let listing = LogListing {
            commits: Vec::new(),
            corrupted: 1,
        };

        assert!(matches!(
            collect_garbage(&store, &listing),
            Err(VersionError::GcRefused { corrupted: 1 })
        ));
        assert!(store.exists(&orphan));
    }

    #[test]
    fn test_verify_reports_damage_and_missing() {
        let dir = tempdir().unwrap();
        let store = setup(dir.path());
        let good = store.put(b"good").unwrap();
        let bad = store.put(b"bad").unwrap();
        std::fs::write(store.blob_path(&bad), b"flipped").unwrap();
        let absent = ContentHash::of(b"absent");

        let report = verify(&store, &listing_for(&[&good, &absent])).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.damaged, vec![bad]);
        assert_eq!(report.missing, vec![absent]);
        assert!(!report.is_healthy());
    }
}
