//! Single-flight compile scheduling for one project.
//!
//! At most one compile job runs at a time. Admission:
//!
//! - **Idle**: the run is scheduled no earlier than `min_interval` after the
//!   previous run started. Requests arriving before it starts share it.
//! - **Running, automatic**: share the running compile's result.
//! - **Running, manual**: queue one follow-up run. A manual request that
//!   finds a follow-up already queued gets [`ServiceError::AlreadyCompiling`].
//!
//! The job passed to [`CompileScheduler::new`] covers the whole compile,
//! including recording the outcome in version history, so every waiter is
//! notified only after history is updated.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ep_build::{BuildError, CancelHandle, CancelToken, cancel_pair};
use ep_model::BuildResult;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};

/// Boxed future returned by a [`CompileJob`].
pub type CompileFuture = Pin<Box<dyn Future<Output = Result<BuildResult>> + Send>>;

/// One compile run. Must stop promptly once its token is cancelled.
pub type CompileJob = Arc<dyn Fn(CancelToken) -> CompileFuture + Send + Sync>;

/// Who asked for a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileTrigger {
    /// Explicit user request, e.g. the Compile button.
    #[default]
    Manual,
    /// Preview refresh after an edit.
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    /// A run is admitted and waiting for the throttle window.
    Pending,
    Running,
}

#[derive(Debug, Clone)]
enum Outcome {
    Done(BuildResult),
    Cancelled,
    Failed(String),
}

type Slot = watch::Sender<Option<Outcome>>;

struct State {
    phase: SchedulerPhase,
    min_interval: Duration,
    last_start: Option<Instant>,
    /// Waiters of the pending or running compile.
    current: Option<Slot>,
    /// Waiters of the queued manual follow-up.
    follow_up: Option<Slot>,
    cancel: Option<CancelHandle>,
    closed: bool,
}

impl State {
    /// Fail everything still waiting and return to idle.
    fn abandon(&mut self) {
        for slot in [self.current.take(), self.follow_up.take()].into_iter().flatten() {
            slot.send_replace(Some(Outcome::Cancelled));
        }
        self.phase = SchedulerPhase::Idle;
    }
}

struct Inner {
    state: Mutex<State>,
    closing: Notify,
    job: CompileJob,
}

/// Serializes and throttles compiles for one project.
#[derive(Clone)]
pub struct CompileScheduler {
    inner: Arc<Inner>,
}

impl CompileScheduler {
    pub fn new(min_interval: Duration, job: CompileJob) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    phase: SchedulerPhase::Idle,
                    min_interval,
                    last_start: None,
                    current: None,
                    follow_up: None,
                    cancel: None,
                    closed: false,
                }),
                closing: Notify::new(),
                job,
            }),
        }
    }

    /// Applies from the next scheduled run.
    pub async fn set_min_interval(&self, min_interval: Duration) {
        self.inner.state.lock().await.min_interval = min_interval;
    }

    pub async fn phase(&self) -> SchedulerPhase {
        self.inner.state.lock().await.phase
    }

    /// Request a compile and wait for the result of the run it was admitted to.
    pub async fn request(&self, trigger: CompileTrigger) -> Result<BuildResult> {
        let rx = {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(ServiceError::Closed);
            }
            match (state.phase, trigger) {
                (SchedulerPhase::Idle, _) => {
                    let (slot, rx) = watch::channel(None);
                    state.current = Some(slot);
                    state.phase = SchedulerPhase::Pending;
                    tokio::spawn(drive(Arc::clone(&self.inner)));
                    rx
                }
                (SchedulerPhase::Pending, _) | (SchedulerPhase::Running, CompileTrigger::Automatic) => {
                    match &state.current {
                        Some(slot) => slot.subscribe(),
                        None => return Err(ServiceError::Cancelled),
                    }
                }
                (SchedulerPhase::Running, CompileTrigger::Manual) => match &state.follow_up {
                    Some(_) => return Err(ServiceError::AlreadyCompiling),
                    None => {
                        debug!("queueing follow-up compile");
                        let (slot, rx) = watch::channel(None);
                        state.follow_up = Some(slot);
                        rx
                    }
                },
            }
        };
        wait(rx).await
    }

    /// Cancel any running compile and refuse further requests.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        if let Some(handle) = &state.cancel {
            info!("cancelling running compile");
            handle.cancel();
        }
        drop(state);
        self.inner.closing.notify_one();
    }
}

async fn wait(mut rx: watch::Receiver<Option<Outcome>>) -> Result<BuildResult> {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    match outcome {
        Some(Outcome::Done(result)) => Ok(result),
        Some(Outcome::Failed(message)) => Err(ServiceError::CompileFailed { message }),
        Some(Outcome::Cancelled) | None => Err(ServiceError::Cancelled),
    }
}

/// Run admitted compiles until nothing is pending.
async fn drive(inner: Arc<Inner>) {
    loop {
        let delay = {
            let state = inner.state.lock().await;
            state.last_start.map_or(Duration::ZERO, |started| {
                (started + state.min_interval).saturating_duration_since(Instant::now())
            })
        };
        if !delay.is_zero() {
            debug!(?delay, "compile throttled");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = inner.closing.notified() => {}
            }
        }

        let token = {
            let mut state = inner.state.lock().await;
            if state.closed {
                state.abandon();
                return;
            }
            let (handle, token) = cancel_pair();
            state.phase = SchedulerPhase::Running;
            state.last_start = Some(Instant::now());
            state.cancel = Some(handle);
            token
        };

        let outcome = match tokio::spawn((inner.job)(token)).await {
            Ok(Ok(result)) => Outcome::Done(result),
            Ok(Err(ServiceError::Cancelled | ServiceError::Build(BuildError::Cancelled))) => {
                Outcome::Cancelled
            }
            Ok(Err(e)) => {
                warn!(error = %e, "compile job failed");
                Outcome::Failed(e.user_message())
            }
            Err(e) => {
                warn!(error = %e, "compile job panicked");
                Outcome::Failed(ServiceError::Worker(e).user_message())
            }
        };

        let mut state = inner.state.lock().await;
        state.cancel = None;
        if let Some(slot) = state.current.take() {
            slot.send_replace(Some(outcome));
        }
        if state.closed {
            state.abandon();
            return;
        }
        match state.follow_up.take() {
            Some(next) => {
                state.current = Some(next);
                state.phase = SchedulerPhase::Pending;
            }
            None => {
                state.phase = SchedulerPhase::Idle;
                return;
            }
        }
    }
}
