//! Service error types.

use std::path::PathBuf;

use ep_build::BuildError;
use ep_model::ModelError;
use ep_versioning::VersionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Config(#[from] ModelError),

    /// A manual compile is running and another is already queued behind it.
    #[error("A compile is already running and another is queued")]
    AlreadyCompiling,

    /// The compile this request was waiting on was cancelled.
    #[error("Compile cancelled")]
    Cancelled,

    /// The project session has been closed.
    #[error("Project session is closed")]
    Closed,

    /// The compile job itself failed before producing a result.
    #[error("Compile failed: {message}")]
    CompileFailed { message: String },

    #[error("Project directory is not accessible: {path}")]
    ProjectDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed")]
    Worker(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// True when the project simply has no version history yet.
    ///
    /// These are logged at warn level and never block editing or building.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Version(e) if e.is_unavailable())
    }

    /// Message for the status bar or CLI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Version(e) => e.user_message(),
            Self::Build(e) => e.user_message(),
            Self::Config(e) => format!("Project configuration is invalid: {e}"),
            Self::AlreadyCompiling => {
                "A compile is already running. Try again when it finishes.".into()
            }
            Self::Cancelled => "Compilation was cancelled.".into(),
            Self::Closed => "The project is no longer open.".into(),
            Self::CompileFailed { message } => message.clone(),
            Self::ProjectDir { path, .. } => {
                format!("The project folder {} cannot be opened.", path.display())
            }
            Self::Worker(_) => "An internal task stopped unexpectedly.".into(),
        }
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
