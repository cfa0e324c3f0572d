//! SyncTeX lookups between PDF positions and source lines.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::Toolchain;
use crate::error::{BuildError, Result};
use crate::runner::{self, CancelToken};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Install locations checked when `synctex` is not on `PATH`.
const FALLBACK_LOCATIONS: &[&str] = &[
    "/Library/TeX/texbin/synctex",
    "/opt/homebrew/bin/synctex",
    "/usr/local/bin/synctex",
    "/usr/bin/synctex",
];

/// A point in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    /// SyncTeX reports -1 when the column is unknown.
    pub column: Option<u32>,
}

/// A point on a PDF page, in big points from the top left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfLocation {
    pub page: u32,
    pub x: f64,
    pub y: f64,
}

/// Find the `synctex` binary on `PATH` or in a common TeX install location.
pub fn locate_binary() -> PathBuf {
    let on_path = env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join("synctex"))
            .find(|candidate| candidate.is_file())
    });
    on_path
        .or_else(|| {
            FALLBACK_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or_else(|| PathBuf::from("synctex"))
}

/// PDF position to source location.
pub async fn edit(
    toolchain: &Toolchain,
    pdf: &Path,
    page: u32,
    x: f64,
    y: f64,
) -> Result<SourceLocation> {
    let query = format!("{page}:{x}:{y}:{}", pdf.display());
    let stdout = query_synctex(toolchain, &["edit", "-o", &query]).await?;
    parse_edit_output(&stdout).ok_or_else(|| BuildError::SyncTex {
        message: format!("No source location for page {page} at ({x}, {y})."),
    })
}

/// Source location to PDF position.
pub async fn view(
    toolchain: &Toolchain,
    source: &Path,
    line: u32,
    column: u32,
    pdf: &Path,
) -> Result<PdfLocation> {
    let input = format!("{line}:{column}:{}", source.display());
    let output = pdf.display().to_string();
    let stdout = query_synctex(toolchain, &["view", "-i", &input, "-o", &output]).await?;
    parse_view_output(&stdout).ok_or_else(|| BuildError::SyncTex {
        message: format!("No PDF location for {}:{line}.", source.display()),
    })
}

async fn query_synctex(toolchain: &Toolchain, args: &[&str]) -> Result<String> {
    let mut command = toolchain.synctex().command();
    command.args(args);
    let output = runner::run(command, "synctex", LOOKUP_TIMEOUT, &CancelToken::never()).await?;
    if !output.status.success() {
        return Err(BuildError::SyncTex {
            message: format!("synctex failed: {}", output.stderr.trim()),
        });
    }
    Ok(output.stdout)
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
}

/// First `Input:`/`Line:`/`Column:` record of `synctex edit` output.
pub fn parse_edit_output(stdout: &str) -> Option<SourceLocation> {
    let mut file = None;
    let mut line = None;
    let mut column = None;
    for row in stdout.lines() {
        if let Some(value) = field(row, "Input") {
            if file.is_some() {
                break;
            }
            file = Some(value.to_string());
        } else if let Some(value) = field(row, "Line") {
            line = line.or_else(|| value.parse::<u32>().ok());
        } else if let Some(value) = field(row, "Column") {
            column = column.or_else(|| value.parse::<i64>().ok());
        }
    }
    Some(SourceLocation {
        file: file.filter(|f| !f.is_empty())?,
        line: line?,
        column: column.and_then(|c| u32::try_from(c).ok()),
    })
}

/// First `Page:`/`x:`/`y:` record of `synctex view` output.
pub fn parse_view_output(stdout: &str) -> Option<PdfLocation> {
    let mut page = None;
    let mut x = None;
    let mut y = None;
    for row in stdout.lines() {
        if let Some(value) = field(row, "Page") {
            if page.is_some() {
                break;
            }
            page = value.parse::<u32>().ok();
        } else if let Some(value) = field(row, "x") {
            x = x.or_else(|| value.parse::<f64>().ok());
        } else if let Some(value) = field(row, "y") {
            y = y.or_else(|| value.parse::<f64>().ok());
        }
    }
    Some(PdfLocation {
        page: page?,
        x: x?,
        y: y?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_edit_output() {
        let stdout = "\
This is SyncTeX command line utility, version 1.5
SyncTeX result begin
Output:out/main.pdf
Input:/papers/thesis/./chapters/intro.tex
Line:42
Column:-1
Offset:0
Context:
SyncTeX result end
";
        let location = parse_edit_output(stdout).unwrap();
        assert_eq!(location.file, "/papers/thesis/./chapters/intro.tex");
        assert_eq!(location.line, 42);
        assert_eq!(location.column, None);
    }

    #[test]
    fn test_parse_view_output_takes_first_record() {
        let stdout = "\
SyncTeX result begin
Output:out/main.pdf
Page:3
x:72.270000
y:512.500000
h:72.27
v:515.0
Output:out/main.pdf
Page:4
x:1.0
y:2.0
SyncTeX result end
";
        let location = parse_view_output(stdout).unwrap();
        assert_eq!(location.page, 3);
        assert!((location.x - 72.27).abs() < 1e-9);
        assert!((location.y - 512.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_edit_output("SyncTeX result begin\nSyncTeX result end\n").is_none());
        assert!(parse_view_output("").is_none());
    }
}
