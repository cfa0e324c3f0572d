//! Build error types.
//!
//! These describe why an engine could not be run to completion. At the
//! compile boundary they are folded into a failed `BuildResult`, so a
//! broken toolchain shows up as a diagnostic rather than a crash.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Engine name is unknown or its executable cannot be found.
    #[error("Build engine not found: {engine}")]
    EngineNotFound { engine: String },

    #[error("Build timed out after {}s", timeout.as_secs())]
    Timeout { timeout: Duration },

    /// The child process could not be started.
    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {operation}: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory would overlap sources or tool state.
    #[error("Refusing to use output directory '{outdir}'")]
    UnsafeOutdir { outdir: String },

    #[error("Invalid project configuration")]
    Config(#[from] ep_model::ModelError),

    /// The project was closed while the engine was running.
    #[error("Build cancelled")]
    Cancelled,

    /// SyncTeX ran but gave no usable answer.
    #[error("SyncTeX lookup failed: {message}")]
    SyncTex { message: String },
}

impl BuildError {
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

    /// Message shown in the diagnostics panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::EngineNotFound { engine } => {
                format!("The '{engine}' engine is not available.")
            }
            Self::Timeout { timeout } => {
                format!("Compilation took longer than {}s and was stopped.", timeout.as_secs())
            }
            Self::Spawn { program, .. } => format!("Could not start {program}."),
            Self::Io { operation, path, .. } => {
                format!("Could not {operation} {}.", path.display())
            }
            Self::UnsafeOutdir { outdir } => {
                format!("The output directory '{outdir}' overlaps the project sources.")
            }
            Self::Config(e) => format!("Project configuration is invalid: {e}"),
            Self::Cancelled => "Compilation was cancelled.".into(),
            Self::SyncTex { message } => message.clone(),
        }
    }

    /// Hint for fixing the problem, if there is an obvious one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound { .. } => Some(
                "Install tectonic or latexmk, or set [engine] type in .easypaper/project.toml.",
            ),
            Self::Timeout { .. } => Some("Raise [compile] timeout_secs or simplify the document."),
            _ => None,
        }
    }
}

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = BuildError::Timeout {
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "Build timed out after 120s");
        assert!(err.suggestion().is_some());

        let err = BuildError::EngineNotFound {
            engine: "pdflatex".into(),
        };
        assert_eq!(err.user_message(), "The 'pdflatex' engine is not available.");
        assert!(BuildError::Cancelled.suggestion().is_none());
    }
}
