//! Commit records.
//!
//! A commit is written once to `.control/commits/{id}.json` and never
//! modified afterwards. The JSON shape is:
//!
//! ```text
//! { id, kind, timestamp, message?, buildSuccess?, files: [{ path, hash }] }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::ContentHash;

/// Opaque commit identifier.
///
/// New ids are UUIDv7, so ids created later in the same process sort after
/// earlier ones. Ids read from disk are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for tables.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(13).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CommitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    /// An editor save of a single file.
    Save,
    /// The outcome of a compile, with every tracked file that changed.
    Compile,
}

impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => f.write_str("save"),
            Self::Compile => f.write_str("compile"),
        }
    }
}

/// A file's content at a point in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Project-relative, `/`-separated.
    pub path: String,
    pub hash: ContentHash,
}

impl FileRef {
    pub fn new(path: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            path: path.into(),
            hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub id: CommitId,
    pub kind: CommitKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Only present on compile commits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_success: Option<bool>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

impl Commit {
    /// Commit recording a single saved file.
    pub fn save(file: FileRef) -> Self {
        Self {
            id: CommitId::generate(),
            kind: CommitKind::Save,
            timestamp: Utc::now(),
            message: None,
            build_success: None,
            files: vec![file],
        }
    }

    /// Commit recording a compile outcome. `files` may be empty.
    pub fn compile(message: Option<String>, build_success: bool, files: Vec<FileRef>) -> Self {
        Self {
            id: CommitId::generate(),
            kind: CommitKind::Compile,
            timestamp: Utc::now(),
            message,
            build_success: Some(build_success),
            files,
        }
    }

    /// Short one-line summary used by history listings.
    pub fn summary(&self) -> String {
        match (self.kind, self.message.as_deref()) {
            (CommitKind::Save, _) => match self.files.first() {
                Some(file) => format!("save {}", file.path),
                None => "save".to_string(),
            },
            (CommitKind::Compile, Some(message)) => message.to_string(),
            (CommitKind::Compile, None) => match self.build_success {
                Some(true) => "compile succeeded".to_string(),
                _ => "compile failed".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_commit_json_shape() {
        let commit = Commit::save(FileRef::new("main.tex", ContentHash::of(b"A")));
        let value = serde_json::to_value(&commit).unwrap();

        assert_eq!(value["kind"], "save");
        assert!(value.get("message").is_none());
        assert!(value.get("buildSuccess").is_none());
        assert_eq!(value["files"][0]["path"], "main.tex");
        assert_eq!(value["files"][0]["hash"], ContentHash::of(b"A").as_str());
    }

    #[test]
    fn test_compile_commit_carries_outcome() {
        let commit = Commit::compile(Some("build".into()), false, vec![]);
        let value = serde_json::to_value(&commit).unwrap();

        assert_eq!(value["kind"], "compile");
        assert_eq!(value["buildSuccess"], false);
        assert_eq!(value["message"], "build");
        assert_eq!(value["files"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_generated_ids_are_unique_and_ordered() {
        let a = CommitId::generate();
        let b = CommitId::generate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_summary() {
        let save = Commit::save(FileRef::new("ch1.tex", ContentHash::of(b"x")));
        assert_eq!(save.summary(), "save ch1.tex");
        let compile = Commit::compile(None, true, vec![]);
        assert_eq!(compile.summary(), "compile succeeded");
    }
}
