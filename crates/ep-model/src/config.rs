//! Project build configuration.
//!
//! Read from `.easypaper/project.toml`. A missing file means defaults; a
//! malformed file is an error. Engine names are kept as written so an
//! unknown engine is reported when a compile is attempted, not at load time.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Directory holding project configuration.
pub const CONFIG_DIR: &str = ".easypaper";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "project.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_name")]
    pub name: String,
    /// Main source file, relative to the project root.
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub compile: CompileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `tectonic` / `primary` or `latexmk` / `fallback`.
    #[serde(rename = "type", default = "default_engine")]
    pub engine_type: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileConfig {
    #[serde(default = "default_true")]
    pub synctex: bool,
    #[serde(default)]
    pub shell_escape: bool,
    #[serde(default = "default_outdir")]
    pub outdir: String,
    /// Minimum time between the starts of two compiles.
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    /// Engine process is killed after this long.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_version() -> u32 {
    1
}

fn default_name() -> String {
    "My Paper".to_string()
}

fn default_main() -> String {
    "main.tex".to_string()
}

fn default_engine() -> String {
    "tectonic".to_string()
}

fn default_true() -> bool {
    true
}

fn default_outdir() -> String {
    "out".to_string()
}

fn default_min_interval() -> u64 {
    600
}

fn default_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_type: default_engine(),
            args: Vec::new(),
        }
    }
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            synctex: true,
            shell_escape: false,
            outdir: default_outdir(),
            min_interval_ms: default_min_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            main: default_main(),
            engine: EngineConfig::default(),
            compile: CompileConfig::default(),
        }
    }
}

impl CompileConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProjectConfig {
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load the configuration, falling back to defaults when absent.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ModelError::ConfigIo {
            operation: "read",
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ModelError::ConfigParse { path, source: e })
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = Self::path(project_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ModelError::ConfigIo {
                operation: "create directory for",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| ModelError::ConfigIo {
            operation: "write",
            path,
            source: e,
        })
    }

    /// Output directory, relative to the project root.
    pub fn outdir(&self) -> &str {
        &self.compile.outdir
    }

    /// `main.tex` → `main`.
    pub fn main_stem(&self) -> &str {
        Path::new(&self.main)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.main)
    }
}
