//! Terminal rendering of command results.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use ep_model::{BuildResult, Commit, CommitKind, Diagnostic, DiagnosticKind};
use ep_versioning::{GcReport, History, RestoreReport, VerifyReport};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

/// Commits oldest first, the head marked with `*`.
pub fn history_table(history: &History, limit: Option<usize>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell(""),
        header_cell("Commit"),
        header_cell("Kind"),
        header_cell("When (UTC)"),
        header_cell("Files"),
        header_cell("Summary"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);

    let skip = limit.map_or(0, |n| history.commits.len().saturating_sub(n));
    for commit in history.commits.iter().skip(skip) {
        let is_head = history.head.as_ref() == Some(&commit.id);
        table.add_row(vec![
            Cell::new(if is_head { "*" } else { "" }),
            Cell::new(commit.id.as_str()),
            kind_cell(commit),
            Cell::new(commit.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(commit.files.len()),
            Cell::new(commit.summary()),
        ]);
    }
    table
}

pub fn print_history(history: &History, limit: Option<usize>) {
    if history.commits.is_empty() {
        println!("No commits yet.");
    } else {
        println!("{}", history_table(history, limit));
    }
    if history.corrupted > 0 {
        println!(
            "{} unreadable commit record(s) were skipped.",
            history.corrupted
        );
    }
}

/// Diagnostics of a build, errors first.
pub fn diagnostics_table(result: &BuildResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Location"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    for diagnostic in result.errors.iter().chain(&result.warnings) {
        table.add_row(vec![
            severity_cell(diagnostic.kind),
            Cell::new(location(diagnostic)),
            Cell::new(&diagnostic.message),
        ]);
    }
    table
}

pub fn print_build_result(result: &BuildResult) {
    let seconds = result.duration_ms as f64 / 1000.0;
    if result.success {
        println!(
            "Build succeeded in {seconds:.1}s: {}",
            result.pdf_path.as_deref().unwrap_or("-")
        );
    } else {
        println!("Build failed after {seconds:.1}s.");
    }
    if !result.errors.is_empty() || !result.warnings.is_empty() {
        println!("{}", diagnostics_table(result));
    }
    if let Some(log) = &result.log_path {
        println!("Log: {log}");
    }
}

pub fn print_restore(report: &RestoreReport) {
    println!(
        "Restored {}: {} file(s) written, {} unchanged.",
        report.commit.short(),
        report.written.len(),
        report.unchanged
    );
    for path in &report.written {
        println!("  {path}");
    }
}

pub fn print_gc(report: &GcReport) {
    println!(
        "Scanned {} snapshot(s), removed {} ({} bytes freed).",
        report.scanned, report.removed, report.bytes_freed
    );
}

pub fn print_verify(report: &VerifyReport) {
    if report.is_healthy() {
        println!("All {} snapshot(s) are intact.", report.checked);
        return;
    }
    println!("Checked {} snapshot(s).", report.checked);
    for hash in &report.damaged {
        println!("  damaged: {hash}");
    }
    for hash in &report.missing {
        println!("  missing: {hash}");
    }
}

fn location(diagnostic: &Diagnostic) -> String {
    match (&diagnostic.file, diagnostic.line) {
        (Some(file), Some(line)) => format!("{file}:{line}"),
        (Some(file), None) => file.clone(),
        (None, Some(line)) => format!("line {line}"),
        (None, None) => "-".to_string(),
    }
}

fn kind_cell(commit: &Commit) -> Cell {
    match (commit.kind, commit.build_success) {
        (CommitKind::Save, _) => Cell::new("save"),
        (CommitKind::Compile, Some(false)) => Cell::new("compile ✗").fg(Color::Red),
        (CommitKind::Compile, _) => Cell::new("compile ✓").fg(Color::Green),
    }
}

fn severity_cell(kind: DiagnosticKind) -> Cell {
    match kind {
        DiagnosticKind::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        DiagnosticKind::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
