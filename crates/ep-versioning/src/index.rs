//! Per-path history index.
//!
//! Maps each path to the `(sequence, hash)` pairs recorded for it, in log
//! order. The effective file set at any commit is then a binary search per
//! path instead of a backward walk over the whole log.

use std::collections::{BTreeMap, HashMap};

use ep_model::{Commit, ContentHash};

/// Position of a commit in the ordered log.
pub type Seq = usize;

#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    entries: HashMap<String, Vec<(Seq, ContentHash)>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit's files. Sequences must be recorded in increasing order.
    pub fn record(&mut self, seq: Seq, commit: &Commit) {
        for file in &commit.files {
            let versions = self.entries.entry(file.path.clone()).or_default();
            debug_assert!(versions.last().is_none_or(|(last, _)| *last <= seq));
            versions.push((seq, file.hash.clone()));
        }
    }

    /// Most recent hash recorded for `path`.
    pub fn latest(&self, path: &str) -> Option<&ContentHash> {
        self.entries
            .get(path)
            .and_then(|versions| versions.last())
            .map(|(_, hash)| hash)
    }

    /// Hash of `path` as of commit `seq` (inclusive).
    pub fn at(&self, path: &str, seq: Seq) -> Option<&ContentHash> {
        let versions = self.entries.get(path)?;
        let upto = versions.partition_point(|(s, _)| *s <= seq);
        upto.checked_sub(1).map(|i| &versions[i].1)
    }

    /// Every path known to history at commit `seq`, with its hash then.
    pub fn effective_at(&self, seq: Seq) -> BTreeMap<String, ContentHash> {
        self.entries
            .keys()
            .filter_map(|path| self.at(path, seq).map(|hash| (path.clone(), hash.clone())))
            .collect()
    }

    /// All paths ever recorded, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
