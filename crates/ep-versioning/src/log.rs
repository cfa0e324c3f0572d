//! Append-only commit log.
//!
//! Each commit is its own JSON file, published atomically before `append`
//! returns. The head pointer in `config.json` is advanced only after that.
//! The in-memory view (ordered ids plus the path index) is rebuilt from disk
//! on open and extended on every append.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use ep_model::{Commit, CommitId};
use tracing::{debug, info, warn};

use crate::error::{Result, VersionError};
use crate::index::{PathIndex, Seq};
use crate::io::{is_temp_name, write_atomic};
use crate::layout::{ControlLayout, ProjectVersionState};
use crate::paths::is_stored_form;

/// Result of reading every commit record from disk.
#[derive(Debug, Default, Clone)]
pub struct LogListing {
    /// Parseable commits, oldest first.
    pub commits: Vec<Commit>,
    /// Records that could not be read or parsed.
    pub corrupted: usize,
}

#[derive(Debug)]
pub struct CommitLog {
    layout: ControlLayout,
    state: ProjectVersionState,
    order: Vec<CommitId>,
    last_timestamp: Option<DateTime<Utc>>,
    index: PathIndex,
    corrupted: usize,
}

impl CommitLog {
    /// Load the log of an initialized project.
    pub fn open(layout: ControlLayout) -> Result<Self> {
        let state = ProjectVersionState::load(&layout)?;
        let listing = scan(&layout)?;

        let mut index = PathIndex::new();
        for (seq, commit) in listing.commits.iter().enumerate() {
            index.record(seq, commit);
        }

        let mut log = Self {
            layout,
            state,
            order: listing.commits.iter().map(|c| c.id.clone()).collect(),
            last_timestamp: listing.commits.last().map(|c| c.timestamp),
            index,
            corrupted: listing.corrupted,
        };
        log.repair_head()?;

        debug!(
            commits = log.order.len(),
            corrupted = log.corrupted,
            "opened commit log"
        );
        Ok(log)
    }

    /// Point the head at the newest commit if a crash left it behind.
    fn repair_head(&mut self) -> Result<()> {
        let newest = self.order.last().cloned();
        if self.state.last_commit == newest {
            return Ok(());
        }
        warn!(
            recorded = ?self.state.last_commit.as_ref().map(CommitId::as_str),
            newest = ?newest.as_ref().map(CommitId::as_str),
            "head does not match the newest commit; repairing"
        );
        self.state.last_commit = newest;
        self.state.save(&self.layout)
    }

    /// Persist `commit` and make it the head.
    ///
    /// The timestamp is raised just past the previous commit's if the clock
    /// did not advance, so timestamps alone fix the order on reopen.
    pub fn append(&mut self, mut commit: Commit) -> Result<CommitId> {
        if let Some(last) = self.last_timestamp
            && commit.timestamp <= last
        {
            commit.timestamp = last + TimeDelta::nanoseconds(1);
        }

        let path = self.layout.commit_file(&commit.id);
        if path.exists() {
            // Ids are never reused.
            return Err(VersionError::io("append commit", &path)(
                std::io::Error::from(ErrorKind::AlreadyExists),
            ));
        }
        let bytes = serde_json::to_vec_pretty(&commit)?;
        write_atomic(&path, &bytes)?;

        let seq = self.order.len();
        self.index.record(seq, &commit);
        self.order.push(commit.id.clone());
        self.last_timestamp = Some(commit.timestamp);
        self.set_head(&commit.id)?;

        info!(
            commit_id = %commit.id,
            kind = %commit.kind,
            files = commit.files.len(),
            "appended commit"
        );
        Ok(commit.id)
    }

    /// Read one commit record.
    pub fn get(&self, id: &CommitId) -> Result<Commit> {
        let not_found = || VersionError::CommitNotFound {
            id: id.as_str().to_string(),
        };
        if !is_plain_id(id.as_str()) {
            return Err(not_found());
        }

        let path = self.layout.commit_file(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(VersionError::io("read commit", path)(e)),
        };
        serde_json::from_slice(&bytes).map_err(VersionError::from)
    }

    /// Re-read every commit from disk, oldest first, skipping unreadable ones.
    pub fn list(&self) -> Result<LogListing> {
        scan(&self.layout)
    }

    pub fn set_head(&mut self, id: &CommitId) -> Result<()> {
        if self.position(id).is_none() {
            return Err(VersionError::CommitNotFound {
                id: id.as_str().to_string(),
            });
        }
        self.state.last_commit = Some(id.clone());
        self.state.save(&self.layout)
    }

    pub fn head(&self) -> Option<&CommitId> {
        self.state.last_commit.as_ref()
    }

    /// Sequence number of a commit in log order.
    pub fn position(&self, id: &CommitId) -> Option<Seq> {
        self.order.iter().rposition(|known| known == id)
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn state(&self) -> &ProjectVersionState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Unreadable records seen when the log was opened.
    pub fn corrupted_at_open(&self) -> usize {
        self.corrupted
    }
}

/// Ids are file names; anything that could escape `commits/` is unknown.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.starts_with('.')
}

fn scan(layout: &ControlLayout) -> Result<LogListing> {
    let dir = layout.commits_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogListing::default()),
        Err(e) => return Err(VersionError::io("list commits", dir)(e)),
    };

    let project_dir = layout.root().parent().unwrap_or(Path::new(""));
    let mut listing = LogListing::default();
    for entry in entries {
        let entry = entry.map_err(VersionError::io("list commits", &dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(".json") else {
            continue;
        };
        if is_temp_name(&name) {
            continue;
        }

        let path = entry.path();
        let parsed = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Commit>(&bytes).map_err(|e| e.to_string()));
        match parsed {
            Ok(commit) if commit.id.as_str() != stem => {
                warn!(path = %path.display(), id = %commit.id, "commit id does not match file name; skipping");
                listing.corrupted += 1;
            }
            Ok(commit) => {
                if let Some(bad) = commit
                    .files
                    .iter()
                    .find(|file| !is_stored_form(project_dir, &file.path))
                {
                    warn!(path = %path.display(), file = %bad.path, "commit references a path outside the project; skipping");
                    listing.corrupted += 1;
                } else {
                    listing.commits.push(commit);
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable commit record");
                listing.corrupted += 1;
            }
        }
    }

    listing
        .commits
        .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    Ok(listing)
}
