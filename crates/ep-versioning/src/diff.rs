//! Line-level deltas between a commit and the working copy.
//!
//! Lines are mapped to private-use characters so the character diff of
//! `diff-match-patch` becomes a line diff. Output is unified format with no
//! context lines.

use std::collections::HashMap;
use std::fmt::Write as _;

use diff_match_patch_rs::{Compat, DiffMatchPatch, Ops};
use ep_model::CommitId;
use serde::Serialize;
use tracing::debug;

/// Code point ranges used to stand in for distinct lines.
const LINE_CODE_RANGES: &[(u32, u32)] = &[(0xE000, 0xF8FF), (0xF_0000, 0xF_FFFD), (0x10_0000, 0x10_FFFD)];

/// Differences between a commit's effective file set and the project on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub commit: CommitId,
    /// Paths present in both whose content differs.
    pub changed: Vec<FileDelta>,
    /// Tracked paths on disk that the commit does not know.
    pub added: Vec<String>,
    /// Paths the commit knows that are missing on disk.
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDelta {
    pub path: String,
    /// Rendered patch for this file.
    pub patch: String,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Whole report as text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for delta in &self.changed {
            out.push_str(&delta.patch);
        }
        for path in &self.added {
            let _ = writeln!(out, "added: {path}");
        }
        for path in &self.removed {
            let _ = writeln!(out, "removed: {path}");
        }
        out
    }
}

/// Patch turning `old` (committed) into `new` (on disk) for one path.
pub fn file_patch(path: &str, old: &[u8], new: &[u8]) -> String {
    let (Some(old_text), Some(new_text)) = (as_text(old), as_text(new)) else {
        return format!("Binary files a/{path} and b/{path} differ\n");
    };

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    for hunk in line_hunks(old_text, new_text) {
        hunk.render_into(&mut out);
    }
    out
}

fn as_text(bytes: &[u8]) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

#[derive(Debug, Default)]
struct Hunk<'a> {
    /// Lines of each side preceding the hunk.
    old_before: usize,
    new_before: usize,
    removed: Vec<&'a str>,
    added: Vec<&'a str>,
}

impl Hunk<'_> {
    fn render_into(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            range(self.old_before, self.removed.len()),
            range(self.new_before, self.added.len())
        );
        for line in &self.removed {
            push_line(out, '-', line);
        }
        for line in &self.added {
            push_line(out, '+', line);
        }
    }
}

fn range(before: usize, count: usize) -> String {
    match count {
        0 => format!("{before},0"),
        1 => format!("{}", before + 1),
        n => format!("{},{n}", before + 1),
    }
}

fn push_line(out: &mut String, sign: char, line: &str) {
    out.push(sign);
    match line.strip_suffix('\n') {
        Some(body) => {
            out.push_str(body.strip_suffix('\r').unwrap_or(body));
            out.push('\n');
        }
        None => {
            out.push_str(line);
            out.push_str("\n\\ No newline at end of file\n");
        }
    }
}

/// Assigns one stand-in character per distinct line.
#[derive(Default)]
struct LineTable<'a> {
    codes: HashMap<&'a str, char>,
    lines: HashMap<char, &'a str>,
}

impl<'a> LineTable<'a> {
    fn encode(&mut self, text: &'a str) -> Option<String> {
        let mut encoded = String::new();
        for line in text.split_inclusive('\n') {
            let code = match self.codes.get(line) {
                Some(code) => *code,
                None => {
                    let code = nth_line_code(self.codes.len())?;
                    self.codes.insert(line, code);
                    self.lines.insert(code, line);
                    code
                }
            };
            encoded.push(code);
        }
        Some(encoded)
    }

    fn line(&self, code: char) -> &'a str {
        self.lines.get(&code).copied().unwrap_or_default()
    }
}

fn nth_line_code(mut n: usize) -> Option<char> {
    for &(start, end) in LINE_CODE_RANGES {
        let size = (end - start + 1) as usize;
        if n < size {
            return char::from_u32(start + n as u32);
        }
        n -= size;
    }
    None
}

fn line_hunks<'a>(old: &'a str, new: &'a str) -> Vec<Hunk<'a>> {
    let mut table = LineTable::default();
    let encoded = table
        .encode(old)
        .and_then(|o| table.encode(new).map(|n| (o, n)));
    let Some((old_codes, new_codes)) = encoded else {
        debug!("too many distinct lines for a line diff; replacing whole file");
        return whole_file(old, new);
    };

    let dmp = DiffMatchPatch::new();
    let diffs = match dmp.diff_main::<Compat>(&old_codes, &new_codes) {
        Ok(diffs) => diffs,
        Err(error) => {
            debug!(?error, "line diff failed; replacing whole file");
            return whole_file(old, new);
        }
    };

    let mut hunks = Vec::new();
    let mut current: Option<Hunk<'a>> = None;
    let (mut old_pos, mut new_pos) = (0, 0);
    for diff in &diffs {
        let codes = diff.data();
        match diff.op() {
            Ops::Equal => {
                hunks.extend(current.take());
                old_pos += codes.len();
                new_pos += codes.len();
            }
            Ops::Delete => {
                let hunk = current.get_or_insert_with(|| Hunk {
                    old_before: old_pos,
                    new_before: new_pos,
                    ..Hunk::default()
                });
                hunk.removed.extend(codes.iter().map(|c| table.line(*c)));
                old_pos += codes.len();
            }
            Ops::Insert => {
                let hunk = current.get_or_insert_with(|| Hunk {
                    old_before: old_pos,
                    new_before: new_pos,
                    ..Hunk::default()
                });
                hunk.added.extend(codes.iter().map(|c| table.line(*c)));
                new_pos += codes.len();
            }
        }
    }
    hunks.extend(current);
    hunks
}

fn whole_file<'a>(old: &'a str, new: &'a str) -> Vec<Hunk<'a>> {
    vec![Hunk {
        old_before: 0,
        new_before: 0,
        removed: old.split_inclusive('\n').collect(),
        added: new.split_inclusive('\n').collect(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_change() {
        let patch = file_patch("main.tex", b"a\nb\nc\n", b"a\nB\nc\n");
        assert_eq!(patch, "--- a/main.tex\n+++ b/main.tex\n@@ -2 +2 @@\n-b\n+B\n");
    }

    #[test]
    fn test_pure_insertion_and_deletion_ranges() {
        let patch = file_patch("x.tex", b"a\nc\n", b"a\nb1\nb2\nc\n");
        assert!(patch.contains("@@ -1,0 +2,2 @@\n+b1\n+b2\n"));

        let patch = file_patch("x.tex", b"a\nb\nc\n", b"a\n");
        assert!(patch.contains("@@ -2,2 +1,0 @@\n-b\n-c\n"));
    }

    #[test]
    fn test_missing_trailing_newline_is_marked() {
        let patch = file_patch("x.tex", b"a\n", b"a\nb");
        assert!(patch.ends_with("+b\n\\ No newline at end of file\n"));
    }

    #[test]
    fn test_binary_content() {
        let patch = file_patch("fig.tex", b"\x00\x01", b"text");
        assert_eq!(patch, "Binary files a/fig.tex and b/fig.tex differ\n");
    }

    #[test]
    fn test_line_codes_span_ranges() {
        assert_eq!(nth_line_code(0), Some('\u{E000}'));
        assert_eq!(nth_line_code(0x1900), char::from_u32(0xF_0000));
        assert!(nth_line_code(usize::MAX / 2).is_none());
    }

    #[test]
    fn test_report_render() {
        let report = DiffReport {
            commit: CommitId::from("c1"),
            changed: vec![FileDelta {
                path: "main.tex".into(),
                patch: file_patch("main.tex", b"old\n", b"new\n"),
            }],
            added: vec!["new.tex".into()],
            removed: vec!["gone.bib".into()],
        };
        insta::assert_snapshot!(report.render(), @r"
        --- a/main.tex
        +++ b/main.tex
        @@ -1 +1 @@
        -old
        +new
        added: new.tex
        removed: gone.bib
        ");
    }
}
