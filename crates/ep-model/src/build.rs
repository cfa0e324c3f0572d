//! Build results and diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
}

/// One message parsed from engine output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            ..Self::error(message)
        }
    }

    #[must_use]
    pub fn at(mut self, file: Option<String>, line: Option<u32>) -> Self {
        self.file = file;
        self.line = line;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}", self.message),
            (Some(file), None) => write!(f, "{file}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Outcome of one compile attempt.
///
/// Use [`BuildResult::succeeded`] and [`BuildResult::failed`]; they keep
/// `success` consistent with `pdf_path` and `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub success: bool,
    pub pdf_path: Option<String>,
    pub log_path: Option<String>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub duration_ms: u64,
}

impl BuildResult {
    pub fn succeeded(pdf_path: impl Into<String>, warnings: Vec<Diagnostic>) -> Self {
        Self {
            success: true,
            pdf_path: Some(pdf_path.into()),
            log_path: None,
            errors: Vec::new(),
            warnings,
            duration_ms: 0,
        }
    }

    /// A failed build. If `errors` is empty a generic error is recorded so
    /// the failure is never silent.
    pub fn failed(mut errors: Vec<Diagnostic>, warnings: Vec<Diagnostic>) -> Self {
        if errors.is_empty() {
            errors.push(Diagnostic::error("build failed without reporting an error"));
        }
        Self {
            success: false,
            pdf_path: None,
            log_path: None,
            errors,
            warnings,
            duration_ms: 0,
        }
    }

    /// Failed build described by one synthetic diagnostic.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::failed(vec![Diagnostic::error(message)], Vec::new())
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn with_log_path(mut self, log_path: Option<String>) -> Self {
        self.log_path = log_path;
        self
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Whether the success/pdf/errors invariant holds.
    pub fn is_consistent(&self) -> bool {
        if self.success {
            self.pdf_path.is_some() && self.errors.is_empty()
        } else {
            self.pdf_path.is_none() && !self.errors.is_empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_keep_invariant() {
        let ok = BuildResult::succeeded("out/main.pdf", vec![Diagnostic::warning("w")]);
        assert!(ok.is_consistent());
        assert_eq!(ok.warning_count(), 1);

        let failed = BuildResult::failed(vec![], vec![]);
        assert!(failed.is_consistent());
        assert_eq!(failed.error_count(), 1);
        assert!(failed.pdf_path.is_none());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = BuildResult::failure("engine not found").with_duration_ms(12);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["durationMs"], 12);
        assert!(value["pdfPath"].is_null());
        assert_eq!(value["errors"][0]["kind"], "error");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error("Undefined control sequence.")
            .at(Some("chapters/intro.tex".into()), Some(14));
        assert_eq!(
            diag.to_string(),
            "chapters/intro.tex:14: Undefined control sequence."
        );
    }
}
