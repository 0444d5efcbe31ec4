//! services/client/src/cli/render.rs
//!
//! Text rendering of session state, history and the dashboard for the terminal.

use std::fmt::Write as _;

use evaluation_core::dashboard::AccountSummary;
use evaluation_core::domain::{HistoryDetail, HistoryEntry, ScoreRecord, StagedFile};
use evaluation_core::session::SessionSnapshot;
use evaluation_core::staging::{format_file_size, StagingReport};

fn score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{:.2}%", s))
}

pub fn staging_report(report: &StagingReport) -> String {
    let mut out = String::new();
    if !report.accepted.is_empty() {
        let _ = writeln!(out, "Staged: {}", report.accepted.join(", "));
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "Warning: {} ({})", warning, report.rejected.join(", "));
    }
    out
}

pub fn staged_files(files: &[StagedFile]) -> String {
    if files.is_empty() {
        return "No files staged.\n".to_string();
    }
    files
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{:>3}. {} ({})\n", i + 1, f.name, format_file_size(f.size)))
        .collect()
}

pub fn session_status(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Mode:        {}", snapshot.mode);
    let _ = writeln!(out, "Title:       {}", snapshot.title);
    let _ = writeln!(out, "Description: {}", snapshot.description);
    if !snapshot.repository_url.is_empty() {
        let _ = writeln!(out, "Repository:  {}", snapshot.repository_url);
    }
    if snapshot.evaluate_design {
        let _ = writeln!(out, "Design review: on");
    }
    let _ = writeln!(out, "Staged files: {}", snapshot.staged.len());
    let _ = writeln!(out, "Evaluated subjects: {}", snapshot.records.len());
    if snapshot.generating {
        let _ = writeln!(out, "An evaluation is running.");
    }
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "Last error: {}", error);
    }
    out
}

/// The summary followed by one line per visible subject.
pub fn results(snapshot: &SessionSnapshot, visible: &[(usize, ScoreRecord)]) -> String {
    if !snapshot.has_results() {
        return "No results yet. Submit an evaluation first.\n".to_string();
    }
    let mut out = String::new();
    if !snapshot.summary.trim().is_empty() {
        let _ = writeln!(out, "{}\n", snapshot.summary.trim_end());
    } else if !snapshot.result.trim().is_empty() {
        let _ = writeln!(out, "{}\n", snapshot.result.trim_end());
    }
    if visible.is_empty() {
        out.push_str("No subjects to show.\n");
        return out;
    }
    for (index, record) in visible {
        let busy = if snapshot.busy.contains(index) { "  (re-evaluating)" } else { "" };
        let _ = writeln!(out, "[{}] {}  {}{}", index + 1, record.label(*index), score(record.score_percent), busy);
        if let Some(reasoning) = record.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
            let _ = writeln!(out, "    {}", reasoning.trim());
        }
    }
    out
}

pub fn history_page(entries: &[HistoryEntry], page: u32, total_pages: u32, total: u64) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        out.push_str("No evaluations yet.\n");
    }
    for entry in entries {
        let _ = writeln!(
            out,
            "#{:<5} {:<16} {:<30} {:<20} {}",
            entry.id,
            entry.created_at,
            entry.title,
            entry.subject_or_placeholder(),
            score(entry.score)
        );
        let _ = writeln!(out, "       {}", entry.description_or_placeholder());
    }
    let _ = writeln!(out, "Page {} of {} ({} records)", page, total_pages, total);
    out
}

pub fn history_detail(detail: &HistoryDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", detail.title, detail.id);
    if let Some(created) = &detail.created_at {
        let _ = writeln!(out, "Created: {}", created);
    }
    if let Some(category) = &detail.category {
        let _ = writeln!(out, "Category: {}", category);
    }
    let _ = writeln!(
        out,
        "{}",
        detail.description.as_deref().filter(|d| !d.trim().is_empty()).unwrap_or("No description")
    );
    for result in &detail.results {
        let _ = writeln!(
            out,
            "\n  Result #{}: {}  {}",
            result.id,
            result.subject_name.as_deref().unwrap_or("Unknown"),
            score(result.score_percent)
        );
        if let Some(reasoning) = &result.reasoning {
            let _ = writeln!(out, "    {}", reasoning);
        }
        if let Some(file) = &result.file {
            let _ = writeln!(out, "    File: {}", file);
        }
        for (i, detail) in result.details.iter().enumerate() {
            let _ = writeln!(
                out,
                "    Q{}: {} [{}]",
                i + 1,
                detail.question.as_deref().unwrap_or("-"),
                detail.correctness.label()
            );
        }
    }
    out
}

pub fn account_summary(summary: &AccountSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Welcome back, {}", summary.display_name);
    let _ = writeln!(out, "Email:        {}", summary.email);
    let _ = writeln!(out, "Total logins: {}", summary.login_count);
    let _ = writeln!(
        out,
        "Model:        {}{}",
        if summary.model.connected { "connected" } else { "disconnected" },
        summary.model.detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
    );
    let _ = writeln!(
        out,
        "Re-evaluate:  {}",
        if summary.reevaluate_available { "available" } else { "unavailable" }
    );
    out
}
