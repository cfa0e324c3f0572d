//! Project sessions and the command surface for EasyPaper.
//!
//! # Features
//!
//! - **Per-project sessions** pairing version history with a compile scheduler
//! - **Single-flight compiles** with a start-to-start throttle
//! - **History after every compile**, recorded before callers see the result
//! - **Uniform responses** via [`ApiResponse`]
//!
//! # Example
//!
//! ```ignore
//! use ep_service::{CompileTrigger, Workspace, api};
//!
//! let workspace = Workspace::default();
//! let saved = api::version_save(&workspace, dir, "main.tex", source).await;
//! let built = api::build_compile(&workspace, dir, CompileTrigger::Manual).await;
//! ```
//!
//! # Architecture
//!
//! - `scheduler.rs` - admission, throttle and cancellation of compile runs
//! - `session.rs` - one open project
//! - `workspace.rs` - open projects by canonical path
//! - `api.rs` - operations returning [`ApiResponse`]

pub mod api;
mod error;
mod scheduler;
mod session;
mod workspace;

pub use api::ApiResponse;
pub use error::{Result, ServiceError};
pub use scheduler::{CompileFuture, CompileJob, CompileScheduler, CompileTrigger, SchedulerPhase};
pub use session::ProjectSession;
pub use workspace::Workspace;
