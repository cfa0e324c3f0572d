//! On-disk layout of the `.control` directory.
//!
//! ```text
//! .control/
//!   config.json              version, created, lastCommit
//!   commits/{id}.json        one immutable record per commit
//!   snapshots/{h[0:2]}/{h[2:]}  blob content keyed by SHA-256
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ep_model::{CommitId, ContentHash};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VersionError};
use crate::io::write_atomic;

pub const CONTROL_DIR: &str = ".control";
const STATE_FILE: &str = "config.json";
const COMMITS_DIR: &str = "commits";
const SNAPSHOTS_DIR: &str = "snapshots";

/// Current format version written to `config.json`.
pub const FORMAT_VERSION: u32 = 1;

/// Resolved paths for one project's versioning directory.
#[derive(Debug, Clone)]
pub struct ControlLayout {
    root: PathBuf,
}

impl ControlLayout {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(CONTROL_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn commits_dir(&self) -> PathBuf {
        self.root.join(COMMITS_DIR)
    }

    pub fn commit_file(&self, id: &CommitId) -> PathBuf {
        self.commits_dir().join(format!("{id}.json"))
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    pub fn blob_file(&self, hash: &ContentHash) -> PathBuf {
        let (shard, rest) = hash.shard();
        self.snapshots_dir().join(shard).join(rest)
    }

    /// Versioning counts as initialized once the state file exists.
    pub fn is_initialized(&self) -> bool {
        self.state_file().is_file()
    }

    /// Create the directory skeleton.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [self.commits_dir(), self.snapshots_dir()] {
            fs::create_dir_all(&dir).map_err(VersionError::io("create directory", &dir))?;
        }
        Ok(())
    }
}

/// Contents of `.control/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersionState {
    pub version: u32,
    pub created: DateTime<Utc>,
    /// Head of the log; `None` before the first commit.
    #[serde(default)]
    pub last_commit: Option<CommitId>,
}

impl ProjectVersionState {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            created: Utc::now(),
            last_commit: None,
        }
    }

    pub fn load(layout: &ControlLayout) -> Result<Self> {
        let path = layout.state_file();
        let bytes = fs::read(&path).map_err(VersionError::io("read state", &path))?;
        serde_json::from_slice(&bytes).map_err(|source| VersionError::CorruptState { path, source })
    }

    pub fn save(&self, layout: &ControlLayout) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(&layout.state_file(), &bytes)
    }
}

impl Default for ProjectVersionState {
    fn default() -> Self {
        Self::new()
    }
}
