//! Versioning error types.
//!
//! Versioning is an optional layer on top of editing, so callers are expected
//! to log these errors and keep going. [`VersionError::is_unavailable`] marks
//! the "history feature not set up" case that should not be shown at all.

use std::path::PathBuf;

use ep_model::ContentHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    /// Disk read or write failed.
    #[error("Failed to {operation}: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project has no `.control` directory yet.
    #[error("Versioning is not initialized for {project_dir}")]
    NotInitialized { project_dir: PathBuf },

    #[error("Commit not found: {id}")]
    CommitNotFound { id: String },

    #[error("Snapshot blob not found: {hash}")]
    BlobNotFound { hash: ContentHash },

    /// Stored bytes no longer hash to their key.
    #[error("Snapshot blob {expected} is corrupted (content hashes to {actual})")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// `config.json` exists but cannot be parsed.
    #[error("Versioning state file is corrupted: {path}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid project path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Failed to serialize versioning data")]
    Serialization(#[from] serde_json::Error),

    /// Garbage collection would drop blobs still referenced by unreadable commits.
    #[error("Refusing to collect garbage while {corrupted} commit record(s) are unreadable")]
    GcRefused { corrupted: usize },
}

impl VersionError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }

    /// True when history is simply not available for this project.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }

    /// True for transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Message suitable for a status bar.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { operation, .. } => {
                format!("Version history could not {operation}. Editing continues normally.")
            }
            Self::NotInitialized { .. } => "Version history is not enabled for this project.".into(),
            Self::CommitNotFound { id } => format!("The version '{id}' no longer exists."),
            Self::BlobNotFound { .. } | Self::HashMismatch { .. } => {
                "A stored snapshot is missing or damaged.".into()
            }
            Self::CorruptState { .. } => {
                "The version history state file is damaged and must be repaired.".into()
            }
            Self::InvalidPath { path, .. } => format!("'{path}' is not inside the project."),
            Self::Serialization(_) => "Version history could not record this change.".into(),
            Self::GcRefused { .. } => {
                "Cleanup skipped because some history records are unreadable.".into()
            }
        }
    }
}

/// Result type alias for versioning operations.
pub type Result<T> = std::result::Result<T, VersionError>;
