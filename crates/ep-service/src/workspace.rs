//! Open projects, keyed by canonical directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ep_build::Toolchain;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Result, ServiceError};
use crate::session::ProjectSession;

/// Every project the process currently has open.
#[derive(Default)]
pub struct Workspace {
    toolchain: Toolchain,
    sessions: Mutex<HashMap<PathBuf, Arc<ProjectSession>>>,
}

impl Workspace {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            sessions: Mutex::default(),
        }
    }

    /// Session for `project_dir`, opening one on first use.
    pub async fn session(&self, project_dir: &Path) -> Result<Arc<ProjectSession>> {
        let key = canonical(project_dir).await?;
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(key).or_insert_with_key(|dir| {
            info!(project = %dir.display(), "opening project");
            Arc::new(ProjectSession::open(dir.clone(), self.toolchain.clone()))
        });
        Ok(Arc::clone(session))
    }

    /// Close `project_dir`, cancelling any running compile.
    ///
    /// Returns false when the project was not open.
    pub async fn close(&self, project_dir: &Path) -> Result<bool> {
        let key = canonical(project_dir).await?;
        let session = self.sessions.lock().await.remove(&key);
        match session {
            Some(session) => {
                session.close().await;
                info!(project = %key.display(), "closed project");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn open_projects(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.sessions.lock().await.keys().cloned().collect();
        dirs.sort();
        dirs
    }
}

async fn canonical(project_dir: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(project_dir)
        .await
        .map_err(|source| ServiceError::ProjectDir {
            path: project_dir.to_path_buf(),
            source,
        })
}
