//! Typesetting engines and how to invoke them.
//!
//! The engine is chosen from `engine.type` in the project configuration,
//! never by probing the system. `primary` and `fallback` name tectonic and
//! latexmk respectively.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use ep_model::{BuildResult, Diagnostic, EngineConfig, ProjectConfig};
use tokio::process::Command;
use tracing::{debug, info};

use crate::diagnostics::{self, LogDialect};
use crate::error::{BuildError, Result};
use crate::runner::{self, CancelToken};

/// Directories `clean` and the engines must never treat as output.
const PROTECTED_DIRS: &[&str] = &[".control", ep_model::config::CONFIG_DIR, ".git"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Tectonic,
    Latexmk,
}

impl EngineKind {
    /// Resolve a configured engine name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tectonic" | "primary" => Ok(Self::Tectonic),
            "latexmk" | "fallback" => Ok(Self::Latexmk),
            _ => Err(BuildError::EngineNotFound {
                engine: name.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tectonic => "tectonic",
            Self::Latexmk => "latexmk",
        }
    }

    fn dialect(self) -> LogDialect {
        match self {
            Self::Tectonic => LogDialect::Tectonic,
            Self::Latexmk => LogDialect::Latex,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Program plus arguments placed before the engine's own arguments.
///
/// A prefix lets an engine run through a wrapper such as `sh script` or a
/// container launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.prefix_args);
        command
    }
}

/// Where each external tool lives.
#[derive(Debug, Clone)]
pub struct Toolchain {
    tectonic: EngineCommand,
    latexmk: EngineCommand,
    synctex: EngineCommand,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            tectonic: EngineCommand::new("tectonic"),
            latexmk: EngineCommand::new("latexmk"),
            synctex: EngineCommand::new(crate::synctex::locate_binary()),
        }
    }
}

impl Toolchain {
    #[must_use]
    pub fn with_engine(mut self, kind: EngineKind, command: EngineCommand) -> Self {
        match kind {
            EngineKind::Tectonic => self.tectonic = command,
            EngineKind::Latexmk => self.latexmk = command,
        }
        self
    }

    #[must_use]
    pub fn with_synctex(mut self, command: EngineCommand) -> Self {
        self.synctex = command;
        self
    }

    pub(crate) fn synctex(&self) -> &EngineCommand {
        &self.synctex
    }

    /// Engine selected by the project configuration.
    pub fn engine(&self, config: &EngineConfig) -> Result<BuildEngine> {
        let kind = EngineKind::from_name(&config.engine_type)?;
        let command = match kind {
            EngineKind::Tectonic => self.tectonic.clone(),
            EngineKind::Latexmk => self.latexmk.clone(),
        };
        Ok(BuildEngine { kind, command })
    }
}

/// One configured engine, ready to run.
#[derive(Debug, Clone)]
pub struct BuildEngine {
    kind: EngineKind,
    command: EngineCommand,
}

impl BuildEngine {
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Engine arguments for `config`, excluding any wrapper prefix.
    pub fn arguments(&self, config: &ProjectConfig) -> Vec<String> {
        let compile = &config.compile;
        let mut args = Vec::new();
        match self.kind {
            EngineKind::Tectonic => {
                args.push(format!("--outdir={}", compile.outdir));
                if compile.synctex {
                    args.push("--synctex".into());
                }
                if compile.shell_escape {
                    args.extend(["-Z".to_string(), "shell-escape".to_string()]);
                }
                args.push(config.main.clone());
                args.extend(config.engine.args.iter().cloned());
            }
            EngineKind::Latexmk => {
                args.extend(["-pdf".to_string(), "-interaction=nonstopmode".to_string()]);
                if compile.synctex {
                    args.push("-synctex=1".into());
                }
                if compile.shell_escape {
                    args.push("-shell-escape".into());
                }
                args.push(format!("-outdir={}", compile.outdir));
                args.extend(config.engine.args.iter().cloned());
                args.push(config.main.clone());
            }
        }
        args
    }

    /// Run the engine once and describe the outcome.
    ///
    /// Returns `Err` when the engine could not be run to completion
    /// (missing binary, timeout, cancellation). A run that finished but
    /// failed is an `Ok` failed result.
    pub async fn compile(
        &self,
        project_dir: &Path,
        config: &ProjectConfig,
        cancel: &CancelToken,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        let outdir = output_dir(project_dir, &config.compile.outdir)?;
        tokio::fs::create_dir_all(&outdir)
            .await
            .map_err(BuildError::io("create output directory", &outdir))?;

        let mut command = self.command.command();
        command.current_dir(project_dir).args(self.arguments(config));
        debug!(engine = %self.kind, main = %config.main, "starting engine");

        let output = runner::run(
            command,
            self.kind.name(),
            config.compile.timeout(),
            cancel,
        )
        .await?;

        let stem = config.main_stem();
        let pdf_path = outdir.join(format!("{stem}.pdf"));
        let log_path = outdir.join(format!("{stem}.log"));

        let raw_log = match self.kind {
            EngineKind::Latexmk => tokio::fs::read_to_string(&log_path)
                .await
                .unwrap_or_else(|_| output.combined()),
            EngineKind::Tectonic => output.combined(),
        };
        let parsed = diagnostics::parse(self.kind.dialect(), &raw_log);

        let result = if output.status.success() && pdf_path.is_file() {
            // Errors the engine recovered from are still worth showing.
            let mut warnings = parsed.warnings;
            warnings.extend(parsed.errors);
            BuildResult::succeeded(pdf_path.display().to_string(), warnings)
        } else {
            let mut errors = parsed.errors;
            if errors.is_empty() {
                errors.push(Diagnostic::error(if output.status.success() {
                    format!("{} did not produce {}", self.kind, pdf_path.display())
                } else {
                    format!("{} failed ({})", self.kind, output.status)
                }));
            }
            BuildResult::failed(errors, parsed.warnings)
        };

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = result
            .with_log_path(log_path.is_file().then(|| log_path.display().to_string()))
            .with_duration_ms(elapsed);

        info!(
            engine = %self.kind,
            success = result.success,
            errors = result.error_count(),
            warnings = result.warning_count(),
            duration_ms = result.duration_ms,
            "engine finished"
        );
        Ok(result)
    }
}

/// Resolve the output directory, rejecting anything that is not a plain
/// subdirectory of the project.
pub fn output_dir(project_dir: &Path, outdir: &str) -> Result<PathBuf> {
    let unsafe_outdir = || BuildError::UnsafeOutdir {
        outdir: outdir.to_string(),
    };

    let relative = Path::new(outdir);
    let mut components = relative.components().peekable();
    let Some(Component::Normal(first)) = components.peek().copied() else {
        return Err(unsafe_outdir());
    };
    if PROTECTED_DIRS.iter().any(|dir| first == *dir) {
        return Err(unsafe_outdir());
    }
    if !components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
        return Err(unsafe_outdir());
    }
    Ok(project_dir.join(relative))
}

/// Remove generated artifacts. Sources and version history are untouched.
pub async fn clean(project_dir: &Path, config: &ProjectConfig) -> Result<()> {
    let outdir = output_dir(project_dir, &config.compile.outdir)?;
    match tokio::fs::remove_dir_all(&outdir).await {
        Ok(()) => {
            info!(outdir = %outdir.display(), "removed build output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io("remove output directory", outdir)(e)),
    }
}
