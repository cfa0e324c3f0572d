//! Engine runs against stand-in scripts.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ep_build::{
    BuildError, CancelToken, EngineCommand, EngineKind, Toolchain, cancel_pair, clean, compile,
};
use ep_model::ProjectConfig;
use tempfile::{TempDir, tempdir};

/// Write a shell script and return a toolchain that runs it as `kind`.
fn stub(dir: &TempDir, kind: EngineKind, body: &str) -> Toolchain {
    let script = dir.path().join(format!("{kind}-stub.sh"));
    fs::write(&script, body).expect("write stub");
    let command = EngineCommand::new("sh").with_prefix_args([path_str(&script)]);
    Toolchain::default().with_engine(kind, command)
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

fn project() -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("paper");
    fs::create_dir_all(&project).expect("project dir");
    fs::write(project.join("main.tex"), "\\documentclass{article}").expect("main.tex");
    (dir, project)
}

#[tokio::test]
async fn tectonic_success_reports_pdf_and_warnings() {
    let (dir, project) = project();
    let toolchain = stub(
        &dir,
        EngineKind::Tectonic,
        r#"
echo "note: $*"
echo "warning: main.tex:3: Overfull \hbox (2pt too wide)" >&2
printf '%%PDF-1.5' > out/main.pdf
"#,
    );

    let result = compile(&toolchain, &project, &ProjectConfig::default(), &CancelToken::never())
        .await
        .expect("compile");

    assert!(result.success);
    assert!(result.is_consistent());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].line, Some(3));
    let pdf = result.pdf_path.expect("pdf path");
    assert!(pdf.ends_with("main.pdf"));
}

#[tokio::test]
async fn tectonic_failure_carries_errors() {
    let (dir, project) = project();
    let toolchain = stub(
        &dir,
        EngineKind::Tectonic,
        r#"
echo "error: main.tex:14: Undefined control sequence."
exit 1
"#,
    );

    let result = compile(&toolchain, &project, &ProjectConfig::default(), &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert!(result.pdf_path.is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].file.as_deref(), Some("main.tex"));
    assert_eq!(result.errors[0].line, Some(14));
}

#[tokio::test]
async fn silent_failure_gets_synthetic_error() {
    let (dir, project) = project();
    let toolchain = stub(&dir, EngineKind::Tectonic, "exit 0\n");

    let result = compile(&toolchain, &project, &ProjectConfig::default(), &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("did not produce"));
}

#[tokio::test]
async fn latexmk_errors_come_from_log_file() {
    let (dir, project) = project();
    let toolchain = stub(
        &dir,
        EngineKind::Latexmk,
        r#"
cat > out/main.log <<'LOG'
(./main.tex
! Undefined control sequence.
l.5 \foo
LOG
exit 12
"#,
    );
    let mut config = ProjectConfig::default();
    config.engine.engine_type = "fallback".into();

    let result = compile(&toolchain, &project, &config, &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert_eq!(result.errors[0].message, "Undefined control sequence.");
    assert_eq!(result.errors[0].line, Some(5));
    assert!(result.log_path.expect("log path").ends_with("main.log"));
}

#[tokio::test]
async fn timeout_becomes_single_diagnostic() {
    let (dir, project) = project();
    let toolchain = stub(&dir, EngineKind::Tectonic, "exec sleep 30\n");
    let mut config = ProjectConfig::default();
    config.compile.timeout_secs = 1;

    let result = compile(&toolchain, &project, &config, &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("longer than 1s"));
}

#[tokio::test]
async fn unknown_engine_is_a_failed_result() {
    let (_dir, project) = project();
    let mut config = ProjectConfig::default();
    config.engine.engine_type = "pdflatex".into();

    let result = compile(&Toolchain::default(), &project, &config, &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert!(result.errors[0].message.contains("pdflatex"));
}

#[tokio::test]
async fn missing_binary_is_a_failed_result() {
    let (_dir, project) = project();
    let toolchain = Toolchain::default().with_engine(
        EngineKind::Tectonic,
        EngineCommand::new("/nonexistent/bin/tectonic"),
    );

    let result = compile(&toolchain, &project, &ProjectConfig::default(), &CancelToken::never())
        .await
        .expect("compile");

    assert!(!result.success);
    assert!(result.errors[0].message.contains("tectonic"));
}

#[tokio::test]
async fn cancellation_is_an_error() {
    let (dir, project) = project();
    let toolchain = stub(&dir, EngineKind::Tectonic, "exec sleep 30\n");
    let (handle, token) = cancel_pair();

    let task = tokio::spawn(async move {
        compile(&toolchain, &project, &ProjectConfig::default(), &token).await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.cancel();

    let outcome = task.await.expect("join");
    assert!(matches!(outcome, Err(BuildError::Cancelled)));
}

#[tokio::test]
async fn clean_removes_only_output() {
    let (_dir, project) = project();
    fs::create_dir_all(project.join("out")).expect("out");
    fs::write(project.join("out/main.pdf"), "pdf").expect("pdf");
    fs::create_dir_all(project.join(".control/commits")).expect("control");

    clean(&project, &ProjectConfig::default()).await.expect("clean");
    assert!(!project.join("out").exists());
    assert!(project.join("main.tex").exists());
    assert!(project.join(".control/commits").exists());

    // Cleaning twice is fine.
    clean(&project, &ProjectConfig::default()).await.expect("clean again");
}

#[tokio::test]
async fn clean_refuses_protected_outdir() {
    let (_dir, project) = project();
    let mut config = ProjectConfig::default();
    config.compile.outdir = ".control".into();

    let err = clean(&project, &config).await.expect_err("refused");
    assert!(matches!(err, BuildError::UnsafeOutdir { .. }));
}
