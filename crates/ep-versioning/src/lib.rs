//! Local version history for EasyPaper projects.
//!
//! Every editor save and every compile outcome becomes an immutable commit
//! that references content-addressed snapshots of the project's files.
//!
//! # Features
//!
//! - **Deduplicated snapshots** keyed by SHA-256, written once
//! - **Atomic writes** for blobs, commit records and the head pointer
//! - **Corruption tolerance**: unreadable commit records are skipped and counted
//! - **Indexed restore/diff** without rescanning the log
//!
//! # On-disk layout
//!
//! ```text
//! .control/
//!   config.json                  { version, created, lastCommit }
//!   commits/{id}.json            { id, kind, timestamp, message?, buildSuccess?, files }
//!   snapshots/{h[0:2]}/{h[2:]}   raw blob bytes
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ep_versioning::VersionManager;
//!
//! let mut vm = VersionManager::init(Path::new("/papers/thesis"))?;
//! let first = vm.save("main.tex", b"\\documentclass{article}")?;
//! vm.commit_tracked(Some("compile".into()), true)?;
//! vm.restore(&first)?;
//! ```
//!
//! # Architecture
//!
//! - `store.rs` - content-addressed blob store
//! - `log.rs` - commit records and head pointer
//! - `index.rs` - per-path history for effective file sets
//! - `manager.rs` - init/save/commit/history/restore/diff
//! - `diff.rs` - line deltas in unified format
//! - `maintenance.rs` - garbage collection and integrity checks

mod diff;
mod error;
mod index;
mod io;
mod layout;
mod log;
mod maintenance;
mod manager;
mod paths;
mod store;

pub use diff::{DiffReport, FileDelta};
pub use error::{Result, VersionError};
pub use index::{PathIndex, Seq};
pub use io::write_atomic;
pub use layout::{CONTROL_DIR, ControlLayout, FORMAT_VERSION, ProjectVersionState};
pub use log::{CommitLog, LogListing};
pub use maintenance::{GcReport, VerifyReport};
pub use manager::{History, RestoreReport, VersionManager};
pub use paths::{TRACKED_EXTENSIONS, discover_sources, normalize};
pub use store::ContentStore;
