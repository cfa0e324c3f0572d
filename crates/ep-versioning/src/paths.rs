//! Project-relative path handling and source discovery.

use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, VersionError};
use crate::layout::CONTROL_DIR;

/// Extensions of files tracked by compile commits.
pub const TRACKED_EXTENSIONS: &[&str] = &["tex", "bib", "sty", "cls"];

/// Directories never scanned for sources.
const SKIPPED_DIRS: &[&str] = &[CONTROL_DIR, ep_model::config::CONFIG_DIR, ".git", "node_modules"];

/// Turn a user-supplied path into the project-relative, `/`-separated form
/// stored in commits.
///
/// Absolute paths must lie inside `project_dir`. Parent components are
/// rejected so a record can never point outside the project.
pub fn normalize(project_dir: &Path, path: &str) -> Result<String> {
    let raw = Path::new(path);
    let relative = if raw.is_absolute() {
        raw.strip_prefix(project_dir)
            .map_err(|_| VersionError::InvalidPath {
                path: path.to_string(),
                reason: "is outside the project directory",
            })?
    } else {
        raw
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(VersionError::InvalidPath {
                    path: path.to_string(),
                    reason: "contains '..'",
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(VersionError::InvalidPath {
                    path: path.to_string(),
                    reason: "is outside the project directory",
                });
            }
        }
    }

    if parts.is_empty() {
        return Err(VersionError::InvalidPath {
            path: path.to_string(),
            reason: "is empty",
        });
    }
    if parts[0] == CONTROL_DIR {
        return Err(VersionError::InvalidPath {
            path: path.to_string(),
            reason: "points into the versioning store",
        });
    }
    Ok(parts.join("/"))
}

/// Whether `path` is already in the stored form `normalize` produces.
pub fn is_stored_form(project_dir: &Path, path: &str) -> bool {
    normalize(project_dir, path).is_ok_and(|normalized| normalized == path)
}

/// Join a path read back from history onto `project_dir`, refusing anything
/// that is not in stored form.
pub fn resolve(project_dir: &Path, path: &str) -> Result<PathBuf> {
    if is_stored_form(project_dir, path) {
        Ok(project_dir.join(path))
    } else {
        Err(VersionError::InvalidPath {
            path: path.to_string(),
            reason: "is not a project-relative path",
        })
    }
}

/// Find source files under `project_dir`, skipping tool directories and the
/// build output directory. Returned paths are normalized and sorted.
pub fn discover_sources(project_dir: &Path, outdir: &str) -> Vec<String> {
    let outdir = outdir.trim_matches('/');
    let mut found: Vec<String> = WalkDir::new(project_dir)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry, project_dir, outdir))
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_tracked_extension(entry.path()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(project_dir).ok()?;
            normalize(project_dir, &relative.to_string_lossy()).ok()
        })
        .collect();
    found.sort();
    found
}

fn is_skipped(entry: &DirEntry, project_dir: &Path, outdir: &str) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if SKIPPED_DIRS.contains(&name.as_ref()) {
        return true;
    }
    !outdir.is_empty() && entry.path() == project_dir.join(outdir)
}

fn has_tracked_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TRACKED_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_relative_and_absolute() {
        let root = Path::new("/work/paper");
        assert_eq!(normalize(root, "main.tex").unwrap(), "main.tex");
        assert_eq!(normalize(root, "./ch/intro.tex").unwrap(), "ch/intro.tex");
        assert_eq!(
            normalize(root, "/work/paper/ch/intro.tex").unwrap(),
            "ch/intro.tex"
        );
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        let root = Path::new("/work/paper");
        assert!(normalize(root, "../secret.tex").is_err());
        assert!(normalize(root, "/etc/passwd").is_err());
        assert!(normalize(root, "").is_err());
        assert!(normalize(root, ".control/config.json").is_err());
    }

    #[test]
    fn test_stored_form_and_resolve() {
        let root = Path::new("/work/paper");
        assert!(is_stored_form(root, "ch/intro.tex"));
        for path in ["./main.tex", "ch//intro.tex", "../x.tex", "/work/paper/main.tex", ".control/config.json"] {
            assert!(!is_stored_form(root, path), "{path}");
            assert!(resolve(root, path).is_err(), "{path}");
        }
        assert_eq!(
            resolve(root, "ch/intro.tex").unwrap(),
            Path::new("/work/paper/ch/intro.tex")
        );
    }

    #[test]
    fn test_discover_sources_skips_output_and_tool_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "main.tex",
            "refs.bib",
            "chapters/intro.tex",
            "out/main.tex",
            ".control/snapshots/ab/cd.tex",
            ".git/HEAD.tex",
            "figure.png",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let found = discover_sources(root, "out");
        assert_eq!(found, vec!["chapters/intro.tex", "main.tex", "refs.bib"]);
    }
}
