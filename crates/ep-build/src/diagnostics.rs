//! Engine output to structured diagnostics.
//!
//! Parsing is total: unknown lines are ignored and a truncated or garbled
//! log yields whatever diagnostics were recognized, possibly none.
//! Diagnostics keep the order in which they appear in the log.

use std::sync::LazyLock;

use ep_model::Diagnostic;
use regex::Regex;

/// How far back from a `! ` error to look for a `file:line:` location.
const LOCATION_LOOKBACK: usize = 5;

/// How far forward from a `! ` error to look for TeX's `l.NN` marker.
const LINE_MARK_LOOKAHEAD: usize = 10;

static FILE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\./)?(?P<file>[^\s:()]+\.(?:tex|sty|cls|bib|ltx|dtx|bbl)):(?P<line>\d+):\s*(?P<msg>.*)$")
        .expect("Invalid file:line regex")
});

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(?P<kind>error|warning):\s*(?P<rest>.*)$").expect("Invalid marker regex")
});

static INPUT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"on input line (?P<line>\d+)").expect("Invalid input line regex")
});

static BOX_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at lines? (?P<line>\d+)").expect("Invalid box lines regex"));

static LINE_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l\.(?P<line>\d+)\b").expect("Invalid line mark regex"));

static CONTINUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\([A-Za-z@.\-]+\)\s+(?P<rest>.*)$").expect("Invalid continuation regex")
});

/// Output format to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDialect {
    /// Tectonic's console output (`error:` / `warning:` prefixed lines).
    Tectonic,
    /// A TeX `.log` file as written by latexmk runs.
    Latex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ParsedLog {
    fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            ep_model::DiagnosticKind::Error => self.errors.push(diagnostic),
            ep_model::DiagnosticKind::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Parse raw engine output.
pub fn parse(dialect: LogDialect, raw: &str) -> ParsedLog {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    match dialect {
        LogDialect::Tectonic => parse_tectonic(&lines),
        LogDialect::Latex => parse_latex(&lines),
    }
}

fn parse_line_number(text: &str) -> Option<u32> {
    text.parse().ok()
}

fn capture_line(regex: &Regex, text: &str) -> Option<u32> {
    regex
        .captures(text)
        .and_then(|caps| parse_line_number(&caps["line"]))
}

fn located(line: &str) -> Option<(String, Option<u32>, String)> {
    let caps = FILE_LINE.captures(line)?;
    Some((
        caps["file"].to_string(),
        parse_line_number(&caps["line"]),
        caps["msg"].trim().to_string(),
    ))
}

fn parse_tectonic(lines: &[&str]) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    for line in lines {
        if let Some(caps) = MARKER.captures(line) {
            let rest = caps["rest"].trim();
            if rest.is_empty() {
                continue;
            }
            let is_error = caps["kind"].eq_ignore_ascii_case("error");
            let diagnostic = match located(rest) {
                Some((file, line, message)) => make(is_error, message).at(Some(file), line),
                None => make(is_error, rest).at(None, capture_line(&INPUT_LINE, rest)),
            };
            parsed.push(diagnostic);
        } else if let Some(message) = line.strip_prefix("! ").map(str::trim)
            && !message.is_empty()
        {
            parsed.push(Diagnostic::error(message));
        } else if line.contains("Warning:") {
            parsed.push(Diagnostic::warning(line.trim()).at(None, capture_line(&INPUT_LINE, line)));
        }
    }
    parsed
}

fn make(is_error: bool, message: impl Into<String>) -> Diagnostic {
    if is_error {
        Diagnostic::error(message)
    } else {
        Diagnostic::warning(message)
    }
}

fn parse_latex(lines: &[&str]) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(message) = line.strip_prefix("! ") {
            let message = message.trim();
            if !message.is_empty()
                && let Some(diagnostic) = bang_error(lines, i, message)
            {
                parsed.push(diagnostic);
            }
        } else if let Some((file, line_no, message)) = located(line) {
            parsed.push(Diagnostic::error(message).at(Some(file), line_no));
        } else if line.contains("Warning:") {
            let mut message = line.trim().to_string();
            while let Some(caps) = lines.get(i + 1).and_then(|next| CONTINUATION.captures(next)) {
                message.push(' ');
                message.push_str(caps["rest"].trim());
                i += 1;
            }
            let line_no = capture_line(&INPUT_LINE, &message);
            parsed.push(Diagnostic::warning(message).at(None, line_no));
        } else if line.starts_with("Overfull \\") || line.starts_with("Underfull \\") {
            parsed.push(Diagnostic::warning(line.trim()).at(None, capture_line(&BOX_LINES, line)));
        }

        i += 1;
    }
    parsed
}

/// Locate a `! message` error at `index`.
///
/// TeX's `l.NN` marker below the error gives the line. A `file:line:` line
/// just above gives the file, unless it names a different line. Returns
/// `None` when the error was already reported in `file:line:` form.
fn bang_error(lines: &[&str], index: usize, message: &str) -> Option<Diagnostic> {
    let marked_line = lines
        .iter()
        .skip(index + 1)
        .take(LINE_MARK_LOOKAHEAD)
        .take_while(|next| !next.starts_with("! "))
        .find_map(|next| capture_line(&LINE_MARK, next));

    match lookback_location(lines, index) {
        Some((_, _, earlier)) if earlier == message => None,
        Some((file, line_no, _)) if marked_line.is_none() || marked_line == line_no => {
            Some(Diagnostic::error(message).at(Some(file), line_no))
        }
        _ => Some(Diagnostic::error(message).at(None, marked_line)),
    }
}

fn lookback_location(lines: &[&str], index: usize) -> Option<(String, Option<u32>, String)> {
    lines[index.saturating_sub(LOCATION_LOOKBACK)..index]
        .iter()
        .rev()
        .find_map(|line| located(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    fn render(parsed: &ParsedLog) -> String {
        let mut out = String::new();
        for diag in &parsed.errors {
            let _ = writeln!(out, "E {diag}");
        }
        for diag in &parsed.warnings {
            let line = diag.line.map_or_else(|| "-".to_string(), |l| l.to_string());
            let _ = writeln!(out, "W [{line}] {diag}");
        }
        out
    }

    #[test]
    fn test_tectonic_output() {
        let raw = "\
note: connecting to bundle
error: main.tex:14: Undefined control sequence.
warning: main.tex:3: Overfull \\hbox (1.2pt too wide) in paragraph
Warning: Citation `knuth84' on page 1 undefined on input line 22.
error: halted on potentially-recoverable error as specified
";
        let parsed = parse(LogDialect::Tectonic, raw);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].file.as_deref(), Some("main.tex"));
        assert_eq!(parsed.errors[0].line, Some(14));
        assert_eq!(parsed.warnings[1].line, Some(22));
        insta::assert_snapshot!(render(&parsed), @r"
        E main.tex:14: Undefined control sequence.
        E halted on potentially-recoverable error as specified
        W [3] main.tex:3: Overfull \hbox (1.2pt too wide) in paragraph
        W [22] Citation `knuth84' on page 1 undefined on input line 22.
        ");
    }

    #[test]
    fn test_latex_log() {
        let raw = "\
This is pdfTeX, Version 3.141592653
(./main.tex
LaTeX2e <2023-11-01>
./chapters/intro.tex:7: Undefined control sequence.
l.7 \\foo

! Missing $ inserted.
<inserted text>
                $
l.31 a_b

LaTeX Warning: Reference `fig:x' on page 2 undefined on input line 40.

Package hyperref Warning: Token not allowed in a PDF string,
(hyperref)                removing `math shift' on input line 52.

Overfull \\hbox (3.1pt too wide) in paragraph at lines 60--61
";
        let parsed = parse(LogDialect::Latex, raw);
        insta::assert_snapshot!(render(&parsed), @r"
        E chapters/intro.tex:7: Undefined control sequence.
        E Missing $ inserted.
        W [40] LaTeX Warning: Reference `fig:x' on page 2 undefined on input line 40.
        W [52] Package hyperref Warning: Token not allowed in a PDF string, removing `math shift' on input line 52.
        W [60] Overfull \hbox (3.1pt too wide) in paragraph at lines 60--61
        ");
        assert_eq!(parsed.errors[1].line, Some(31));
    }

    #[test]
    fn test_bang_error_takes_location_from_lookback() {
        let raw = "\
(./main.tex
./main.tex:12: LaTeX Error: Environment foo undefined.
See the LaTeX manual.
! LaTeX Error: Environment foo undefined.
! Emergency stop.
";
        let parsed = parse(LogDialect::Latex, raw);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].line, Some(12));
        assert_eq!(parsed.errors[1].message, "Emergency stop.");
        assert_eq!(parsed.errors[1].file.as_deref(), Some("main.tex"));
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert!(parse(LogDialect::Latex, "\u{0}\u{1}binary junk\n(((\n! ").is_empty());
        assert!(parse(LogDialect::Tectonic, "").is_empty());
        assert!(parse(LogDialect::Latex, "just some text\nmore text").is_empty());
    }
}
