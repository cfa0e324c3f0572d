//! Command surface for the editor shell.
//!
//! Each operation resolves the project session, runs, and wraps the outcome
//! in an [`ApiResponse`] so callers can forward it without matching on error
//! types. Missing version history is logged at warn level; editing and
//! building carry on without it.

use std::path::Path;

use ep_build::{PdfLocation, SourceLocation};
use ep_model::{BuildResult, CommitId};
use ep_versioning::{GcReport, History, RestoreReport, VerifyReport};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{Result, ServiceError};
use crate::scheduler::CompileTrigger;
use crate::workspace::Workspace;

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_result(operation: &'static str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => {
                if e.is_unavailable()
                    || matches!(e, ServiceError::AlreadyCompiling | ServiceError::Cancelled)
                {
                    warn!(operation, error = %e, "operation not completed");
                } else {
                    error!(operation, error = %e, "operation failed");
                }
                Self::failure(e.user_message())
            }
        }
    }
}

pub async fn version_init(workspace: &Workspace, project_dir: &Path) -> ApiResponse<()> {
    let result = async { workspace.session(project_dir).await?.version_init().await }.await;
    ApiResponse::from_result("versionInit", result)
}

pub async fn version_save(
    workspace: &Workspace,
    project_dir: &Path,
    file_path: &str,
    content: &str,
) -> ApiResponse<CommitId> {
    let result = async {
        let session = workspace.session(project_dir).await?;
        session
            .version_save(file_path, content.as_bytes().to_vec())
            .await
    }
    .await;
    ApiResponse::from_result("versionSave", result)
}

pub async fn version_commit(
    workspace: &Workspace,
    project_dir: &Path,
    message: Option<String>,
    build_success: bool,
) -> ApiResponse<CommitId> {
    let result = async {
        let session = workspace.session(project_dir).await?;
        session.version_commit(message, build_success).await
    }
    .await;
    ApiResponse::from_result("versionCommit", result)
}

pub async fn version_history(workspace: &Workspace, project_dir: &Path) -> ApiResponse<History> {
    let result = async { workspace.session(project_dir).await?.version_history().await }.await;
    ApiResponse::from_result("versionHistory", result)
}

pub async fn version_restore(
    workspace: &Workspace,
    project_dir: &Path,
    commit_id: &str,
) -> ApiResponse<RestoreReport> {
    let id = CommitId::from(commit_id);
    let result = async { workspace.session(project_dir).await?.version_restore(id).await }.await;
    ApiResponse::from_result("versionRestore", result)
}

/// Unified diff of the working copy against `commit_id`.
pub async fn version_diff(
    workspace: &Workspace,
    project_dir: &Path,
    commit_id: &str,
) -> ApiResponse<String> {
    let id = CommitId::from(commit_id);
    let result = async {
        let report = workspace.session(project_dir).await?.version_diff(id).await?;
        Ok::<_, ServiceError>(report.render())
    }
    .await;
    ApiResponse::from_result("versionDiff", result)
}

pub async fn build_compile(
    workspace: &Workspace,
    project_dir: &Path,
    trigger: CompileTrigger,
) -> ApiResponse<BuildResult> {
    let result = async { workspace.session(project_dir).await?.build_compile(trigger).await }.await;
    ApiResponse::from_result("buildCompile", result)
}

pub async fn build_clean(workspace: &Workspace, project_dir: &Path) -> ApiResponse<()> {
    let result = async { workspace.session(project_dir).await?.build_clean().await }.await;
    ApiResponse::from_result("buildClean", result)
}

pub async fn version_gc(workspace: &Workspace, project_dir: &Path) -> ApiResponse<GcReport> {
    let result = async { workspace.session(project_dir).await?.version_gc().await }.await;
    ApiResponse::from_result("versionGc", result)
}

pub async fn version_verify(workspace: &Workspace, project_dir: &Path) -> ApiResponse<VerifyReport> {
    let result = async { workspace.session(project_dir).await?.version_verify().await }.await;
    ApiResponse::from_result("versionVerify", result)
}

pub async fn synctex_edit(
    workspace: &Workspace,
    project_dir: &Path,
    page: u32,
    x: f64,
    y: f64,
) -> ApiResponse<SourceLocation> {
    let result = async {
        let session = workspace.session(project_dir).await?;
        session.synctex_edit(page, x, y).await
    }
    .await;
    ApiResponse::from_result("synctexEdit", result)
}

pub async fn synctex_view(
    workspace: &Workspace,
    project_dir: &Path,
    file: &str,
    line: u32,
    column: u32,
) -> ApiResponse<PdfLocation> {
    let result = async {
        let session = workspace.session(project_dir).await?;
        session.synctex_view(file, line, column).await
    }
    .await;
    ApiResponse::from_result("synctexView", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn test_envelope_shape() {
        assert_json_snapshot!(ApiResponse::success("0192"), @r#"
        {
          "ok": true,
          "data": "0192"
        }
        "#);
        assert_json_snapshot!(ApiResponse::<()>::failure("Version history is not enabled for this project."), @r#"
        {
          "ok": false,
          "error": "Version history is not enabled for this project."
        }
        "#);
    }
}
