//! Sessions driving stand-in engines end to end.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ep_build::{EngineCommand, EngineKind, Toolchain};
use ep_model::CommitKind;
use ep_service::{CompileTrigger, ServiceError, Workspace, api};
use tempfile::{TempDir, tempdir};

struct Fixture {
    dir: TempDir,
    project: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        let project = dir.path().join("paper");
        fs::create_dir_all(&project).expect("project dir");
        fs::write(project.join("main.tex"), "\\section{Old}\n").expect("main.tex");
        Self { dir, project }
    }

    fn counter(&self) -> PathBuf {
        self.dir.path().join("runs.txt")
    }

    fn runs(&self) -> usize {
        fs::read_to_string(self.counter())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Tectonic stand-in that counts its runs before executing `body`.
    fn workspace(&self, body: &str) -> Workspace {
        let script = self.dir.path().join("tectonic-stub.sh");
        let counter = self.counter();
        fs::write(&script, format!("echo run >> '{}'\n{body}", counter.display()))
            .expect("write stub");
        let command = EngineCommand::new("sh").with_prefix_args([script.display().to_string()]);
        Workspace::new(Toolchain::default().with_engine(EngineKind::Tectonic, command))
    }
}

const SUCCEEDS: &str = "printf '%%PDF-1.5' > out/main.pdf\n";

fn project(fixture: &Fixture) -> &Path {
    &fixture.project
}

#[tokio::test]
async fn compile_is_in_history_when_it_returns() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(SUCCEEDS);

    let built = api::build_compile(&workspace, project(&fixture), CompileTrigger::Manual).await;
    assert!(built.ok, "{:?}", built.error);
    let envelope = serde_json::to_value(&built).expect("serialize");
    assert_eq!(envelope["data"]["success"], true);
    assert!(envelope["data"]["pdfPath"].is_string());
    assert!(envelope.get("error").is_none());

    let history = api::version_history(&workspace, project(&fixture))
        .await
        .data
        .expect("history");
    assert_eq!(history.commits.len(), 1);
    let commit = &history.commits[0];
    assert_eq!(commit.kind, CommitKind::Compile);
    assert_eq!(commit.build_success, Some(true));
    assert_eq!(commit.files.len(), 1);
    assert_eq!(commit.files[0].path, "main.tex");
    assert_eq!(history.head.as_ref(), Some(&commit.id));
}

#[tokio::test]
async fn failed_compile_is_recorded_as_failure() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace("echo 'error: main.tex:1: Undefined control sequence.'\nexit 1\n");

    let result = api::build_compile(&workspace, project(&fixture), CompileTrigger::Manual)
        .await
        .data
        .expect("failed builds are still results");
    assert!(!result.success);
    assert_eq!(result.errors[0].line, Some(1));

    let history = api::version_history(&workspace, project(&fixture))
        .await
        .data
        .expect("history");
    assert_eq!(history.commits[0].build_success, Some(false));
}

#[tokio::test]
async fn concurrent_compiles_run_the_engine_once() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(&format!("sleep 0.3\n{SUCCEEDS}"));
    let session = workspace.session(project(&fixture)).await.expect("session");

    let (a, b) = tokio::join!(
        session.build_compile(CompileTrigger::Automatic),
        session.build_compile(CompileTrigger::Automatic)
    );

    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(fixture.runs(), 1);
    let history = session.version_history().await.expect("history");
    assert_eq!(history.commits.len(), 1);
}

#[tokio::test]
async fn closing_cancels_without_recording() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace("exec sleep 30\n");
    let session = workspace.session(project(&fixture)).await.expect("session");

    let running = tokio::spawn({
        let session = session.clone();
        async move { session.build_compile(CompileTrigger::Manual).await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(workspace.close(project(&fixture)).await.expect("close"));

    let outcome = running.await.expect("join");
    assert!(matches!(outcome, Err(ServiceError::Cancelled)));
    assert!(!fixture.project.join(".control").exists());
}

#[tokio::test]
async fn save_writes_the_file_and_restore_brings_it_back() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(SUCCEEDS);
    let dir = project(&fixture);

    let first = api::version_save(&workspace, dir, "main.tex", "\\section{Old}\n")
        .await
        .data
        .expect("first save");
    api::version_save(&workspace, dir, "main.tex", "\\section{New}\n")
        .await
        .data
        .expect("second save");
    assert_eq!(
        fs::read_to_string(dir.join("main.tex")).expect("read"),
        "\\section{New}\n"
    );

    let diff = api::version_diff(&workspace, dir, first.as_str())
        .await
        .data
        .expect("diff");
    assert!(diff.contains("-\\section{Old}"));
    assert!(diff.contains("+\\section{New}"));

    let restored = api::version_restore(&workspace, dir, first.as_str())
        .await
        .data
        .expect("restore");
    assert_eq!(restored.written, vec!["main.tex".to_string()]);
    assert_eq!(
        fs::read_to_string(dir.join("main.tex")).expect("read"),
        "\\section{Old}\n"
    );
}

#[tokio::test]
async fn history_is_unavailable_until_initialized() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(SUCCEEDS);
    let dir = project(&fixture);

    let history = api::version_history(&workspace, dir).await;
    assert!(!history.ok);
    assert_eq!(
        history.error.as_deref(),
        Some("Version history is not enabled for this project.")
    );

    assert!(api::version_init(&workspace, dir).await.ok);
    assert!(api::version_init(&workspace, dir).await.ok);
    let history = api::version_history(&workspace, dir).await.data.expect("history");
    assert!(history.commits.is_empty());
    assert!(history.head.is_none());
}

#[tokio::test]
async fn unknown_commit_is_reported() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(SUCCEEDS);
    let dir = project(&fixture);
    assert!(api::version_init(&workspace, dir).await.ok);

    let restored = api::version_restore(&workspace, dir, "0192f0c8-0000-7000-8000-000000000000").await;
    assert!(!restored.ok);
    assert!(restored.error.expect("message").contains("no longer exists"));
}

#[tokio::test]
async fn clean_removes_output_only() {
    let fixture = Fixture::new();
    let workspace = fixture.workspace(SUCCEEDS);
    let dir = project(&fixture);

    assert!(api::build_compile(&workspace, dir, CompileTrigger::Manual).await.ok);
    assert!(dir.join("out/main.pdf").exists());

    assert!(api::build_clean(&workspace, dir).await.ok);
    assert!(!dir.join("out").exists());
    assert!(dir.join("main.tex").exists());
    assert!(dir.join(".control").exists());
}
