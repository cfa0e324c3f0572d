//! Child process supervision: output capture, timeout, cancellation.

use std::future;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{BuildError, Result};

/// Requests cancellation of every [`CancelToken`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            future::pending::<()>().await;
        }
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `command` to completion.
///
/// The child is killed if it outlives `timeout` or if `cancel` fires first.
pub async fn run(
    mut command: Command,
    program: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<ProcessOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let child = command.spawn().map_err(|source| match source.kind() {
        ErrorKind::NotFound => BuildError::EngineNotFound {
            engine: program.to_string(),
        },
        _ => BuildError::Spawn {
            program: program.to_string(),
            source,
        },
    })?;
    debug!(program, pid = ?child.id(), "engine started");

    let mut cancel = cancel.clone();
    // Dropping the wait future drops the child, which kills it.
    tokio::select! {
        finished = tokio::time::timeout(timeout, child.wait_with_output()) => match finished {
            Ok(Ok(output)) => Ok(ProcessOutput {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed: started.elapsed(),
            }),
            Ok(Err(source)) => Err(BuildError::Spawn {
                program: program.to_string(),
                source,
            }),
            Err(_) => {
                warn!(program, timeout_secs = timeout.as_secs(), "engine timed out; killed");
                Err(BuildError::Timeout { timeout })
            }
        },
        () = cancel.cancelled() => {
            debug!(program, "engine cancelled; killed");
            Err(BuildError::Cancelled)
        }
    }
}
