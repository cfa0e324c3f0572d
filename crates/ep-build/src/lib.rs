//! Build engine adapter for EasyPaper projects.
//!
//! Runs an external typesetting engine (tectonic or latexmk) as a
//! supervised child process and turns its output into a [`BuildResult`].
//! Engine trouble is reported as a failed result with a diagnostic; only
//! cancellation and an unreadable project configuration are errors.
//!
//! - `engine.rs` - engine selection, command lines, `clean`
//! - `runner.rs` - process spawning, timeout and cancellation
//! - `diagnostics.rs` - error/warning extraction from engine output
//! - `synctex.rs` - PDF/source position lookups

mod diagnostics;
mod engine;
mod error;
mod runner;
mod synctex;

use std::path::Path;
use std::time::Instant;

use ep_model::{BuildResult, ProjectConfig};
use tracing::{Instrument, info_span, warn};

pub use diagnostics::{LogDialect, ParsedLog, parse as parse_log};
pub use engine::{BuildEngine, EngineCommand, EngineKind, Toolchain, clean, output_dir};
pub use error::{BuildError, Result};
pub use runner::{CancelHandle, CancelToken, ProcessOutput, cancel_pair};
pub use synctex::{
    PdfLocation, SourceLocation, edit as synctex_edit, locate_binary as locate_synctex,
    view as synctex_view,
};

/// Compile `project_dir` with the engine its configuration names.
///
/// Every failure except cancellation becomes a failed [`BuildResult`].
pub async fn compile(
    toolchain: &Toolchain,
    project_dir: &Path,
    config: &ProjectConfig,
    cancel: &CancelToken,
) -> Result<BuildResult> {
    let span = info_span!(
        "compile",
        project = %project_dir.display(),
        engine = %config.engine.engine_type
    );
    async {
        let started = Instant::now();
        let attempt = match toolchain.engine(&config.engine) {
            Ok(engine) => engine.compile(project_dir, config, cancel).await,
            Err(e) => Err(e),
        };
        match attempt {
            Ok(result) => Ok(result),
            Err(BuildError::Cancelled) => Err(BuildError::Cancelled),
            Err(e) => {
                warn!(error = %e, "build could not run");
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                Ok(BuildResult::failure(e.user_message()).with_duration_ms(elapsed))
            }
        }
    }
    .instrument(span)
    .await
}
