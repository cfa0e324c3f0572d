//! One open project: its version history and its compile scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ep_build::{PdfLocation, SourceLocation, Toolchain};
use ep_model::{BuildResult, CommitId, ProjectConfig};
use ep_versioning::{
    DiffReport, GcReport, History, RestoreReport, VerifyReport, VersionManager, normalize,
    write_atomic,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::scheduler::{CompileFuture, CompileJob, CompileScheduler, CompileTrigger};

/// Whether an operation may create version history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Fails with `NotInitialized` when history does not exist.
    Read,
    /// Initializes history on first use.
    Write,
}

type SharedVersions = Arc<Mutex<Option<VersionManager>>>;

/// Per-project state. Cheap to share behind an `Arc`.
pub struct ProjectSession {
    project_dir: PathBuf,
    toolchain: Toolchain,
    versions: SharedVersions,
    scheduler: CompileScheduler,
}

impl ProjectSession {
    /// Open a session for `project_dir`. Nothing is written to disk.
    pub fn open(project_dir: impl Into<PathBuf>, toolchain: Toolchain) -> Self {
        let project_dir = project_dir.into();
        let versions: SharedVersions = Arc::default();
        let min_interval = ProjectConfig::load(&project_dir)
            .map(|config| config.compile.min_interval())
            .unwrap_or_else(|_| ProjectConfig::default().compile.min_interval());
        let job = compile_job(project_dir.clone(), toolchain.clone(), Arc::clone(&versions));
        Self {
            project_dir,
            toolchain,
            versions,
            scheduler: CompileScheduler::new(min_interval, job),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn scheduler(&self) -> &CompileScheduler {
        &self.scheduler
    }

    /// Create version history. Idempotent.
    pub async fn version_init(&self) -> Result<()> {
        self.with_versions(Access::Write, |_| Ok(())).await
    }

    /// Write `content` to `path` and record it as a save commit.
    pub async fn version_save(&self, path: &str, content: Vec<u8>) -> Result<CommitId> {
        let relative = normalize(&self.project_dir, path)?;
        let target = self.project_dir.join(&relative);
        self.with_versions(Access::Write, move |vm| {
            write_atomic(&target, &content)?;
            vm.save(&relative, &content)
        })
        .await
    }

    /// Record the current tracked files as a compile commit.
    pub async fn version_commit(
        &self,
        message: Option<String>,
        build_success: bool,
    ) -> Result<CommitId> {
        self.with_versions(Access::Write, move |vm| vm.commit_tracked(message, build_success))
            .await
    }

    pub async fn version_history(&self) -> Result<History> {
        self.with_versions(Access::Read, |vm| vm.history()).await
    }

    pub async fn version_restore(&self, id: CommitId) -> Result<RestoreReport> {
        self.with_versions(Access::Read, move |vm| vm.restore(&id)).await
    }

    pub async fn version_diff(&self, id: CommitId) -> Result<DiffReport> {
        self.with_versions(Access::Read, move |vm| vm.diff(&id)).await
    }

    pub async fn version_gc(&self) -> Result<GcReport> {
        self.with_versions(Access::Read, |vm| vm.gc()).await
    }

    pub async fn version_verify(&self) -> Result<VerifyReport> {
        self.with_versions(Access::Read, |vm| vm.verify()).await
    }

    /// Compile through the scheduler. The outcome is already in history
    /// when this returns.
    pub async fn build_compile(&self, trigger: CompileTrigger) -> Result<BuildResult> {
        let config = ProjectConfig::load(&self.project_dir)?;
        self.scheduler
            .set_min_interval(config.compile.min_interval())
            .await;
        self.scheduler.request(trigger).await
    }

    /// Remove build output.
    pub async fn build_clean(&self) -> Result<()> {
        let config = ProjectConfig::load(&self.project_dir)?;
        ep_build::clean(&self.project_dir, &config).await?;
        Ok(())
    }

    /// Source location under a point of the compiled PDF.
    pub async fn synctex_edit(&self, page: u32, x: f64, y: f64) -> Result<SourceLocation> {
        let pdf = self.pdf_path()?;
        Ok(ep_build::synctex_edit(&self.toolchain, &pdf, page, x, y).await?)
    }

    /// PDF position of a source line.
    pub async fn synctex_view(&self, file: &str, line: u32, column: u32) -> Result<PdfLocation> {
        let pdf = self.pdf_path()?;
        let source = self.project_dir.join(normalize(&self.project_dir, file)?);
        Ok(ep_build::synctex_view(&self.toolchain, &source, line, column, &pdf).await?)
    }

    /// Cancel any running compile and refuse further compiles.
    pub async fn close(&self) {
        self.scheduler.close().await;
        debug!(project = %self.project_dir.display(), "session closed");
    }

    fn pdf_path(&self) -> Result<PathBuf> {
        let config = ProjectConfig::load(&self.project_dir)?;
        let outdir = ep_build::output_dir(&self.project_dir, config.outdir())?;
        Ok(outdir.join(format!("{}.pdf", config.main_stem())))
    }

    async fn with_versions<T, F>(&self, access: Access, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut VersionManager) -> ep_versioning::Result<T> + Send + 'static,
    {
        let versions = Arc::clone(&self.versions);
        let project_dir = self.project_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = versions.blocking_lock();
            run_versioned(&mut guard, &project_dir, access, f)
        })
        .await?
    }
}

/// Run `f` against the cached manager, opening it first if needed.
fn run_versioned<T>(
    slot: &mut Option<VersionManager>,
    project_dir: &Path,
    access: Access,
    f: impl FnOnce(&mut VersionManager) -> ep_versioning::Result<T>,
) -> Result<T> {
    let mut vm = match slot.take() {
        Some(vm) => vm,
        None => match access {
            Access::Read => VersionManager::open(project_dir)?,
            Access::Write => VersionManager::init(project_dir)?,
        },
    };
    vm.set_outdir(source_outdir(project_dir));
    let outcome = f(&mut vm);
    *slot = Some(vm);
    Ok(outcome?)
}

/// Output directory to skip when discovering sources.
fn source_outdir(project_dir: &Path) -> String {
    match ProjectConfig::load(project_dir) {
        Ok(config) => config.compile.outdir,
        Err(e) => {
            warn!(error = %e, "using default output directory for source discovery");
            ProjectConfig::default().compile.outdir
        }
    }
}

/// Compile, then record the outcome before anyone is told about it.
fn compile_job(project_dir: PathBuf, toolchain: Toolchain, versions: SharedVersions) -> CompileJob {
    Arc::new(move |cancel| -> CompileFuture {
        let project_dir = project_dir.clone();
        let toolchain = toolchain.clone();
        let versions = Arc::clone(&versions);
        Box::pin(async move {
            let config = ProjectConfig::load(&project_dir)?;
            let result = ep_build::compile(&toolchain, &project_dir, &config, &cancel).await?;

            let build_success = result.success;
            let recorded = tokio::task::spawn_blocking({
                let project_dir = project_dir.clone();
                move || {
                    let mut guard = versions.blocking_lock();
                    run_versioned(&mut guard, &project_dir, Access::Write, |vm| {
                        vm.commit_tracked(None, build_success)
                    })
                }
            })
            .await?;
            match recorded {
                Ok(id) => info!(commit_id = %id, build_success, "recorded compile"),
                // History problems never fail a build.
                Err(e) => warn!(error = %e, "compile outcome not recorded"),
            }
            Ok(result)
        })
    })
}
