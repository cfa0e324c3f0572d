//! Subcommand execution on top of the service API.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use ep_cli::summary::{print_build_result, print_gc, print_history, print_restore, print_verify};
use ep_service::{ApiResponse, CompileTrigger, Workspace, api};
use serde::Serialize;
use tracing::{Instrument, debug, info_span};

use crate::cli::{Command, SynctexCommand};

/// Everything a subcommand needs.
pub struct Context {
    pub workspace: Workspace,
    pub project: PathBuf,
    /// Print response envelopes instead of human output.
    pub json: bool,
}

impl Context {
    pub fn new(project: &Path, json: bool) -> Self {
        Self {
            workspace: Workspace::default(),
            project: project.to_path_buf(),
            json,
        }
    }
}

/// Run one subcommand and return the process exit code.
pub async fn run(ctx: &Context, command: Command) -> Result<i32> {
    let span = info_span!("command", project = %ctx.project.display());
    execute(ctx, command).instrument(span).await
}

async fn execute(ctx: &Context, command: Command) -> Result<i32> {
    let dir = ctx.project.as_path();
    let ws = &ctx.workspace;
    match command {
        Command::Init => emit(ctx, api::version_init(ws, dir).await, |_| {
            println!("Version history enabled in {}", dir.display());
        }),
        Command::Save { file } => {
            let bytes = std::fs::read(dir.join(&file)).with_context(|| format!("read {file}"))?;
            let content = String::from_utf8(bytes)
                .map_err(|_| anyhow!("{file} is not UTF-8 text; only text sources can be saved"))?;
            emit(ctx, api::version_save(ws, dir, &file, &content).await, |id| {
                println!("Saved {file} as {id}");
            })
        }
        Command::Commit {
            message,
            build_failed,
        } => emit(
            ctx,
            api::version_commit(ws, dir, message, !build_failed).await,
            |id| println!("Committed {id}"),
        ),
        Command::History { limit } => emit(ctx, api::version_history(ws, dir).await, |history| {
            print_history(history, limit);
        }),
        Command::Restore { commit } => emit(
            ctx,
            api::version_restore(ws, dir, &commit).await,
            print_restore,
        ),
        Command::Diff { commit } => emit(ctx, api::version_diff(ws, dir, &commit).await, |text| {
            if text.is_empty() {
                println!("No differences.");
            } else {
                print!("{text}");
            }
        }),
        Command::Compile { auto } => {
            let trigger = if auto {
                CompileTrigger::Automatic
            } else {
                CompileTrigger::Manual
            };
            let response = api::build_compile(ws, dir, trigger).await;
            let success = response.data.as_ref().is_some_and(|result| result.success);
            emit(ctx, response, print_build_result)?;
            Ok(if success { 0 } else { 1 })
        }
        Command::Clean => emit(ctx, api::build_clean(ws, dir).await, |_| {
            println!("Build output removed.");
        }),
        Command::Gc => emit(ctx, api::version_gc(ws, dir).await, print_gc),
        Command::Verify => {
            let response = api::version_verify(ws, dir).await;
            let healthy = response.data.as_ref().is_some_and(|report| report.is_healthy());
            emit(ctx, response, print_verify)?;
            Ok(if healthy { 0 } else { 1 })
        }
        Command::Synctex(SynctexCommand::Edit { page, x, y }) => emit(
            ctx,
            api::synctex_edit(ws, dir, page, x, y).await,
            |location| match location.column {
                Some(column) => println!("{}:{}:{column}", location.file, location.line),
                None => println!("{}:{}", location.file, location.line),
            },
        ),
        Command::Synctex(SynctexCommand::View { file, line, column }) => emit(
            ctx,
            api::synctex_view(ws, dir, &file, line, column).await,
            |location| {
                println!("page {} at ({:.2}, {:.2})", location.page, location.x, location.y);
            },
        ),
    }
}

/// Print a response and turn a failed envelope into an error.
///
/// Returns exit code 0 on success.
fn emit<T: Serialize>(
    ctx: &Context,
    response: ApiResponse<T>,
    render: impl FnOnce(&T),
) -> Result<i32> {
    if ctx.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("serialize response")?
        );
    }
    let ApiResponse { ok, data, error } = response;
    match (ok, data) {
        (true, Some(data)) => {
            if !ctx.json {
                render(&data);
            }
            Ok(0)
        }
        _ => {
            let message = error.unwrap_or_else(|| "operation failed".to_string());
            debug!(%message, "command failed");
            Err(anyhow!(message))
        }
    }
}
