//! Shared data model for the EasyPaper versioning and build core.
//!
//! The types here are plain serializable values. They carry no I/O beyond
//! loading and saving the project build configuration.
//!
//! - `hash` - SHA-256 content digests used as blob keys
//! - `commit` - commit records and file references
//! - `build` - build results and parsed diagnostics
//! - `config` - project build configuration (`.easypaper/project.toml`)

pub mod build;
pub mod commit;
pub mod config;
pub mod error;
pub mod hash;

pub use build::{BuildResult, Diagnostic, DiagnosticKind};
pub use commit::{Commit, CommitId, CommitKind, FileRef};
pub use config::{CompileConfig, EngineConfig, ProjectConfig};
pub use error::{ModelError, Result};
pub use hash::ContentHash;
