//! Version manager: the only writer of a project's history.
//!
//! One `VersionManager` exists per open project. It is synchronous; callers
//! that must not block run it on a blocking worker.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ep_model::{Commit, CommitId, ContentHash, FileRef};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::diff::{DiffReport, FileDelta, file_patch};
use crate::error::{Result, VersionError};
use crate::io::write_atomic;
use crate::layout::{ControlLayout, ProjectVersionState};
use crate::log::CommitLog;
use crate::maintenance::{self, GcReport, VerifyReport};
use crate::paths::{discover_sources, normalize, resolve};
use crate::store::ContentStore;

/// Read-only projection of the log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Oldest first.
    pub commits: Vec<Commit>,
    pub head: Option<CommitId>,
    /// Commit records that could not be read.
    pub corrupted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub commit: CommitId,
    /// Files overwritten with their committed content.
    pub written: Vec<String>,
    /// Files that already matched.
    pub unchanged: usize,
}

#[derive(Debug)]
pub struct VersionManager {
    project_dir: PathBuf,
    store: ContentStore,
    log: CommitLog,
    outdir: String,
}

impl VersionManager {
    /// Create the `.control` layout if needed and open it.
    ///
    /// Existing history is never modified; a damaged state file is an error.
    pub fn init(project_dir: &Path) -> Result<Self> {
        let layout = ControlLayout::new(project_dir);
        layout.create_dirs()?;
        if !layout.is_initialized() {
            ProjectVersionState::new().save(&layout)?;
            info!(project = %project_dir.display(), "initialized version history");
        }
        Self::open_layout(project_dir, layout)
    }

    /// Open an initialized project.
    pub fn open(project_dir: &Path) -> Result<Self> {
        let layout = ControlLayout::new(project_dir);
        if !layout.is_initialized() {
            return Err(VersionError::NotInitialized {
                project_dir: project_dir.to_path_buf(),
            });
        }
        Self::open_layout(project_dir, layout)
    }

    fn open_layout(project_dir: &Path, layout: ControlLayout) -> Result<Self> {
        let log = CommitLog::open(layout.clone())?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            store: ContentStore::new(layout),
            log,
            outdir: ep_model::CompileConfig::default().outdir,
        })
    }

    /// Build output directory excluded from source discovery.
    pub fn set_outdir(&mut self, outdir: impl Into<String>) {
        self.outdir = outdir.into();
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn head(&self) -> Option<&CommitId> {
        self.log.head()
    }

    pub fn get(&self, id: &CommitId) -> Result<Commit> {
        self.log.get(id)
    }

    /// Record the content of one file as a save commit.
    ///
    /// Does not write `path`; the caller has already done so.
    pub fn save(&mut self, path: &str, content: &[u8]) -> Result<CommitId> {
        let path = normalize(&self.project_dir, path)?;
        let hash = self.store.put(content)?;
        self.log.append(Commit::save(FileRef::new(path, hash)))
    }

    /// Record a compile outcome over the given paths.
    ///
    /// Only paths whose on-disk content differs from their latest recorded
    /// hash are included. Missing files are skipped. A commit is written even
    /// when nothing changed.
    pub fn commit(
        &mut self,
        message: Option<String>,
        build_success: bool,
        tracked: &[String],
    ) -> Result<CommitId> {
        let mut files = Vec::new();
        let mut seen = BTreeSet::new();
        for raw in tracked {
            let path = normalize(&self.project_dir, raw)?;
            if !seen.insert(path.clone()) {
                continue;
            }
            let Some(content) = self.read_project_file(&path)? else {
                continue;
            };
            let hash = ContentHash::of(&content);
            if self.log.index().latest(&path) == Some(&hash) {
                continue;
            }
            self.store.put(&content)?;
            files.push(FileRef::new(path, hash));
        }

        debug!(changed = files.len(), build_success, "recording compile commit");
        self.log.append(Commit::compile(message, build_success, files))
    }

    /// [`Self::commit`] over [`Self::tracked_paths`].
    pub fn commit_tracked(
        &mut self,
        message: Option<String>,
        build_success: bool,
    ) -> Result<CommitId> {
        let tracked = self.tracked_paths();
        self.commit(message, build_success, &tracked)
    }

    /// Paths known to history plus source files found on disk.
    pub fn tracked_paths(&self) -> Vec<String> {
        let mut paths: BTreeSet<String> = self.log.index().paths().into_iter().collect();
        paths.extend(discover_sources(&self.project_dir, &self.outdir));
        paths.into_iter().collect()
    }

    pub fn history(&self) -> Result<History> {
        let listing = self.log.list()?;
        Ok(History {
            commits: listing.commits,
            head: self.log.head().cloned(),
            corrupted: listing.corrupted,
        })
    }

    /// Overwrite project files with their content as of `id`.
    ///
    /// Every blob is read and verified before any file is written. Files
    /// that history does not know are left alone, and the head does not move.
    pub fn restore(&self, id: &CommitId) -> Result<RestoreReport> {
        let _span = info_span!("restore", commit_id = %id).entered();
        let effective = self.effective_at(id)?;

        let mut contents = Vec::with_capacity(effective.len());
        for (path, hash) in effective {
            let bytes = self.store.get(&hash)?;
            contents.push((path, hash, bytes));
        }

        let mut report = RestoreReport {
            commit: id.clone(),
            written: Vec::new(),
            unchanged: 0,
        };
        for (path, hash, bytes) in contents {
            let on_disk = self.read_project_file(&path)?;
            if on_disk.is_some_and(|current| ContentHash::of(&current) == hash) {
                report.unchanged += 1;
                continue;
            }
            write_atomic(&resolve(&self.project_dir, &path)?, &bytes)?;
            report.written.push(path);
        }

        info!(
            written = report.written.len(),
            unchanged = report.unchanged,
            "restored project files"
        );
        Ok(report)
    }

    /// Compare the effective file set at `id` with the working copy.
    pub fn diff(&self, id: &CommitId) -> Result<DiffReport> {
        let effective = self.effective_at(id)?;

        let mut report = DiffReport {
            commit: id.clone(),
            changed: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        for (path, hash) in &effective {
            match self.read_project_file(path)? {
                None => report.removed.push(path.clone()),
                Some(current) if ContentHash::of(&current) != *hash => {
                    let committed = self.store.get(hash)?;
                    report.changed.push(FileDelta {
                        path: path.clone(),
                        patch: file_patch(path, &committed, &current),
                    });
                }
                Some(_) => {}
            }
        }
        for path in self.tracked_paths() {
            if !effective.contains_key(&path)
                && resolve(&self.project_dir, &path).is_ok_and(|full| full.is_file())
            {
                report.added.push(path);
            }
        }
        Ok(report)
    }

    /// Delete blobs no commit references.
    pub fn gc(&self) -> Result<GcReport> {
        maintenance::collect_garbage(&self.store, &self.log.list()?)
    }

    /// Check every blob against its hash.
    pub fn verify(&self) -> Result<VerifyReport> {
        maintenance::verify(&self.store, &self.log.list()?)
    }

    fn effective_at(&self, id: &CommitId) -> Result<BTreeMap<String, ContentHash>> {
        let seq = self
            .log
            .position(id)
            .ok_or_else(|| VersionError::CommitNotFound {
                id: id.as_str().to_string(),
            })?;
        Ok(self.log.index().effective_at(seq))
    }

    fn read_project_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = resolve(&self.project_dir, path)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => Ok(None),
            Err(e) => Err(VersionError::io("read project file", full)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_open_requires_init() {
        let dir = tempdir().unwrap();
        let err = VersionManager::open(dir.path()).unwrap_err();
        assert!(err.is_unavailable());

        VersionManager::init(dir.path()).unwrap();
        VersionManager::init(dir.path()).unwrap();
        assert!(VersionManager::open(dir.path()).is_ok());
    }

    #[test]
    fn test_init_keeps_existing_history() {
        let dir = tempdir().unwrap();
        let mut vm = VersionManager::init(dir.path()).unwrap();
        let id = vm.save("main.tex", b"A").unwrap();
        drop(vm);

        let vm = VersionManager::init(dir.path()).unwrap();
        assert_eq!(vm.head(), Some(&id));
        assert_eq!(vm.history().unwrap().commits.len(), 1);
    }

    #[test]
    fn test_commit_records_only_changed_paths() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.tex", "A");
        write(dir.path(), "refs.bib", "R");
        let mut vm = VersionManager::init(dir.path()).unwrap();

        let first = vm.commit_tracked(Some("build 1".into()), true).unwrap();
        let first = vm.get(&first).unwrap();
        let paths: Vec<_> = first.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.tex", "refs.bib"]);

        write(dir.path(), "main.tex", "A2");
        let second = vm.commit_tracked(None, false).unwrap();
        let second = vm.get(&second).unwrap();
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].path, "main.tex");
        assert_eq!(second.build_success, Some(false));

        let third = vm.commit_tracked(None, true).unwrap();
        assert!(vm.get(&third).unwrap().files.is_empty());
    }

    #[test]
    fn test_restore_leaves_unknown_files() {
        let dir = tempdir().unwrap();
        let mut vm = VersionManager::init(dir.path()).unwrap();
        write(dir.path(), "main.tex", "A");
        let x = vm.save("main.tex", b"A").unwrap();
        write(dir.path(), "main.tex", "B");
        vm.save("main.tex", b"B").unwrap();
        write(dir.path(), "notes.txt", "scratch");

        let report = vm.restore(&x).unwrap();
        assert_eq!(report.written, vec!["main.tex"]);
        assert_eq!(fs::read_to_string(dir.path().join("main.tex")).unwrap(), "A");
        assert_eq!(
            fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "scratch"
        );
        assert_ne!(vm.head(), Some(&x));
    }

    #[test]
    fn test_restore_unknown_commit() {
        let dir = tempdir().unwrap();
        let vm = VersionManager::init(dir.path()).unwrap();
        assert!(matches!(
            vm.restore(&CommitId::from("missing")),
            Err(VersionError::CommitNotFound { .. })
        ));
    }

    #[test]
    fn test_diff_reports_changes_additions_and_removals() {
        let dir = tempdir().unwrap();
        let mut vm = VersionManager::init(dir.path()).unwrap();
        write(dir.path(), "main.tex", "a\nb\n");
        write(dir.path(), "old.bib", "x");
        vm.save("main.tex", b"a\nb\n").unwrap();
        let id = vm.save("old.bib", b"x").unwrap();

        write(dir.path(), "main.tex", "a\nc\n");
        fs::remove_file(dir.path().join("old.bib")).unwrap();
        write(dir.path(), "chapter.tex", "new");

        let report = vm.diff(&id).unwrap();
        assert_eq!(report.changed.len(), 1);
        assert!(report.changed[0].patch.contains("-b\n+c\n"));
        assert_eq!(report.added, vec!["chapter.tex"]);
        assert_eq!(report.removed, vec!["old.bib"]);
    }

    #[test]
    fn test_save_rejects_escaping_path() {
        let dir = tempdir().unwrap();
        let mut vm = VersionManager::init(dir.path()).unwrap();
        assert!(matches!(
            vm.save("../outside.tex", b"x"),
            Err(VersionError::InvalidPath { .. })
        ));
        assert!(vm.head().is_none());
    }
}
