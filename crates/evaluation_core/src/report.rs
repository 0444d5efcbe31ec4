//! crates/evaluation_core/src/report.rs
//!
//! Renders evaluation results as plain text or as a self-contained HTML
//! document. The same HTML serves for printing to PDF and, saved with a
//! `.doc` extension, for opening in a word processor.

use std::fmt::Write as _;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::domain::{CriterionScore, DesignReview, DetailEntry, ScoreRecord, SlideContentReview};

const PLACEHOLDER: &str = "-";

//=========================================================================================
// Export formats and file names
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Plain text.
    Text,
    /// HTML meant for a browser's print-to-PDF.
    Print,
    /// HTML served as a Word document.
    Doc,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Print => "html",
            ExportFormat::Doc => "doc",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Print => "text/html",
            ExportFormat::Doc => "application/msword",
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\-_ ]").expect("literal pattern"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("literal pattern"))
}

/// Strips everything but letters, digits, `-`, `_` and spaces, then joins words with `_`.
pub fn sanitize_file_stem(raw: &str) -> String {
    let kept = unsafe_chars().replace_all(raw, "");
    whitespace_runs().replace_all(kept.trim(), "_").into_owned()
}

/// Builds the download name for an export.
///
/// Text exports carry a `_DD-MM-YYYY_HH-MM` timestamp; HTML exports do not.
pub fn export_file_name(
    title: &str,
    title_fallback: &str,
    subject: Option<&str>,
    format: ExportFormat,
    now: NaiveDateTime,
) -> String {
    let title = match title.trim() {
        "" => title_fallback,
        t => t,
    };
    let mut stem = sanitize_file_stem(title);
    if let Some(subject) = subject {
        stem.push('_');
        stem.push_str(&sanitize_file_stem(subject));
    }
    if format == ExportFormat::Text {
        stem.push('_');
        stem.push_str(&now.format("%d-%m-%Y_%H-%M").to_string());
    }
    format!("{}.{}", stem, format.extension())
}

//=========================================================================================
// Plain text
//=========================================================================================

fn score_text(score: Option<f64>) -> String {
    score.map_or_else(|| PLACEHOLDER.to_string(), |s| format!("{:.2}", s))
}

fn need_to_improve(record: &ScoreRecord) -> String {
    match record.score_percent {
        Some(score) if score >= 100.0 => "None".to_string(),
        _ => record.reasoning.clone().unwrap_or_default(),
    }
}

fn or_placeholder(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => PLACEHOLDER,
    }
}

fn criterion_line(label: &str, criterion: &Option<CriterionScore>) -> Option<String> {
    criterion
        .as_ref()
        .map(|c| format!("{}: {}/100 - {}", label, c.score, c.feedback))
}

fn slide_text(content: Option<&SlideContentReview>, design: Option<&DesignReview>) -> Vec<String> {
    let mut parts = vec![String::new()];
    if let Some(c) = content {
        parts.push("--- CONTENT EVALUATION ---".to_string());
        parts.extend(criterion_line("Content Quality", &c.content_quality));
        parts.extend(criterion_line("Structure", &c.structure));
        parts.extend(criterion_line("Alignment", &c.alignment));
        if !c.strengths.is_empty() {
            parts.push("\nStrengths:".to_string());
            parts.extend(c.strengths.iter().map(|s| format!("- {}", s)));
        }
        if !c.improvements.is_empty() {
            parts.push("\nAreas for Improvement:".to_string());
            parts.extend(c.improvements.iter().map(|s| format!("- {}", s)));
        }
    }
    if let Some(d) = design {
        parts.push("\n--- VISUAL DESIGN EVALUATION ---".to_string());
        if let Some(error) = &d.error {
            parts.push(format!("Design Evaluation Error: {}", error));
        } else {
            parts.extend(criterion_line("Visual Appeal", &d.visual_appeal));
            parts.extend(criterion_line("Layout & Composition", &d.layout));
            parts.extend(criterion_line("Typography", &d.typography));
            parts.extend(criterion_line("Color Scheme", &d.color_scheme));
            if let Some(comment) = &d.overall_comment {
                parts.push(format!("\nOverall Design Comment: {}", comment));
            }
        }
    }
    parts
}

fn detail_text(index: usize, detail: &DetailEntry) -> String {
    let mut lines = vec![
        format!("Q{}: {}", index + 1, or_placeholder(&detail.question)),
        format!("Answer: {}", or_placeholder(&detail.answer)),
        format!("Correct answer: {}", or_placeholder(&detail.reference_answer)),
        format!("Evaluation: {}", detail.correctness.label()),
    ];
    if let Some(feedback) = detail.feedback.as_deref().filter(|f| !f.is_empty()) {
        lines.push(format!("Feedback: {}", feedback));
    }
    lines.join("\n")
}

fn subject_block(record: &ScoreRecord, name: &str) -> String {
    let mut lines = vec![
        format!("Student name: {}", name),
        format!("Score: {}", score_text(record.score_percent)),
        format!("Reason: {}", record.reasoning.as_deref().unwrap_or_default()),
        format!("Need to improve: {}", need_to_improve(record)),
    ];
    if record.has_slide_reviews() {
        lines.extend(slide_text(record.slide_content.as_ref(), record.design_review.as_ref()));
    } else if !record.details.is_empty() {
        lines.push(String::new());
        lines.push("Per-question evaluation:".to_string());
        lines.extend(record.details.iter().enumerate().map(|(i, d)| detail_text(i, d)));
    }
    lines.join("\n")
}

/// Plain-text report for one subject.
pub fn subject_text(record: &ScoreRecord, index: usize) -> String {
    subject_block(record, &record.label(index))
}

/// Plain-text report for the whole result set, or `None` when there is nothing to export.
///
/// With scored subjects every subject gets a block; otherwise the free-text
/// result (or, failing that, the summary) is the report.
pub fn report_text(records: &[ScoreRecord], result: &str, summary: &str) -> Option<String> {
    if !records.is_empty() {
        let blocks: Vec<String> = records
            .iter()
            .map(|r| {
                let name = r.name.clone().filter(|n| !n.trim().is_empty());
                subject_block(r, name.as_deref().unwrap_or(PLACEHOLDER))
            })
            .collect();
        return Some(blocks.join("\n\n"));
    }
    [result, summary]
        .into_iter()
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

//=========================================================================================
// HTML
//=========================================================================================

const STYLE: &str = r#"<style>
  body { font-family: Arial, sans-serif; color:#111827; }
  h1 { font-size: 22px; margin-bottom: 12px; }
  h2 { font-size: 18px; margin: 18px 0 8px; }
  .student { border:1px solid #e5e7eb; border-radius:8px; padding:12px; margin:12px 0; }
  .meta { display:flex; justify-content:space-between; font-size: 13px; color:#4b5563; margin-bottom:8px; }
  .q { background:#f9fafb; border-radius:6px; padding:10px; margin:8px 0; }
  .row { margin:2px 0; font-size: 13px; }
  .label { font-weight:600; }
  .ok { color:#047857; font-weight:600; }
  .bad { color:#b91c1c; font-weight:600; }
  .partial { color:#ea580c; font-weight:600; }
  .reason { white-space: pre-wrap; }
  .summary { background:#f8fafc; padding:20px; border-radius:12px; margin-bottom:24px; border:1px solid #e2e8f0; border-left:6px solid #00A896; }
  .code-block { white-space: pre-wrap; font-family: 'Courier New', monospace; background: #f3f4f6; padding: 8px; border-radius: 4px; margin: 4px 0; font-size: 12px; }
</style>"#;

/// Escapes text for interpolation into HTML element content or attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(title: &str, body: &str) -> String {
    let title = match title.trim() {
        "" => "Report",
        t => t,
    };
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{t}</title>{style}</head><body><h1>{t}</h1>{body}</body></html>",
        t = escape_html(title),
        style = STYLE,
        body = body,
    )
}

fn criterion_html(out: &mut String, label: &str, criterion: &Option<CriterionScore>) {
    if let Some(c) = criterion {
        let _ = write!(
            out,
            "<div class=\"row\"><span class=\"label\">{}:</span> {}/100 - {}</div>",
            label,
            c.score,
            escape_html(&c.feedback)
        );
    }
}

fn list_html(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "<div class=\"q\"><span class=\"label\">{}:</span><ul>", label);
    for item in items {
        let _ = write!(out, "<li>{}</li>", escape_html(item));
    }
    out.push_str("</ul></div>");
}

fn slide_html(out: &mut String, record: &ScoreRecord) {
    if let Some(c) = &record.slide_content {
        out.push_str("<h2>Content Evaluation</h2>");
        criterion_html(out, "Content Quality", &c.content_quality);
        criterion_html(out, "Structure", &c.structure);
        criterion_html(out, "Alignment", &c.alignment);
        list_html(out, "Strengths", &c.strengths);
        list_html(out, "Areas for Improvement", &c.improvements);
    }
    if let Some(d) = &record.design_review {
        out.push_str("<h2>Visual Design Evaluation</h2>");
        if let Some(error) = &d.error {
            let _ = write!(out, "<div class=\"bad\">Design Evaluation Error: {}</div>", escape_html(error));
            return;
        }
        criterion_html(out, "Visual Appeal", &d.visual_appeal);
        criterion_html(out, "Layout", &d.layout);
        criterion_html(out, "Typography", &d.typography);
        criterion_html(out, "Color Scheme", &d.color_scheme);
        if let Some(comment) = &d.overall_comment {
            let _ = write!(
                out,
                "<div class=\"q\"><span class=\"label\">Overall Comment:</span> {}</div>",
                escape_html(comment)
            );
        }
    }
}

fn detail_html(out: &mut String, index: usize, detail: &DetailEntry) {
    use crate::domain::Correctness;

    let verdict = match detail.correctness {
        Correctness::Correct => "<span class=\"ok\">Correct</span>".to_string(),
        Correctness::PartialCredit(_) => {
            format!("<span class=\"partial\">{}</span>", detail.correctness.label())
        }
        Correctness::Incorrect => "<span class=\"bad\">Incorrect</span>".to_string(),
    };
    let _ = write!(
        out,
        "<div class=\"q\">\
         <div class=\"row\"><span class=\"label\">Q{n}:</span> {q}</div>\
         <div class=\"row\"><span class=\"label\">Answer:</span></div><pre class=\"code-block\">{a}</pre>\
         <div class=\"row\"><span class=\"label\">Correct answer:</span></div><pre class=\"code-block\">{c}</pre>\
         <div class=\"row\"><span class=\"label\">Evaluation:</span> {v}</div>",
        n = index + 1,
        q = escape_html(or_placeholder(&detail.question)),
        a = escape_html(or_placeholder(&detail.answer)),
        c = escape_html(or_placeholder(&detail.reference_answer)),
        v = verdict,
    );
    if let Some(feedback) = detail.feedback.as_deref().filter(|f| !f.is_empty()) {
        let _ = write!(
            out,
            "<div class=\"row\"><span class=\"label\">Feedback:</span> {}</div>",
            escape_html(feedback)
        );
    }
    out.push_str("</div>");
}

fn subject_section(record: &ScoreRecord, name: &str) -> String {
    let mut out = String::from("<div class=\"student\">");
    let _ = write!(
        out,
        "<div class=\"meta\"><div><span class=\"label\">Student name:</span> {}</div>\
         <div><span class=\"label\">Score:</span> {}</div></div>\
         <div class=\"row reason\"><span class=\"label\">Reason:</span> {}</div>\
         <div class=\"row\"><span class=\"label\">Need to improve:</span> {}</div>",
        escape_html(name),
        score_text(record.score_percent),
        escape_html(record.reasoning.as_deref().unwrap_or_default()),
        escape_html(&need_to_improve(record)),
    );
    if record.has_slide_reviews() {
        slide_html(&mut out, record);
    } else if record.details.is_empty() {
        out.push_str("<div class=\"row\">No per-question details available.</div>");
    } else {
        out.push_str("<h2>Per-question evaluation</h2>");
        for (i, detail) in record.details.iter().enumerate() {
            detail_html(&mut out, i, detail);
        }
    }
    out.push_str("</div>");
    out
}

/// HTML report for one subject.
pub fn subject_html(record: &ScoreRecord, index: usize, title: &str) -> String {
    document(title, &subject_section(record, &record.label(index)))
}

/// HTML report for the whole result set, or `None` when there is nothing to export.
pub fn report_html(
    records: &[ScoreRecord],
    result: &str,
    summary: &str,
    title: &str,
) -> Option<String> {
    if records.is_empty() && result.trim().is_empty() && summary.trim().is_empty() {
        return None;
    }

    let mut body = String::new();
    if !summary.trim().is_empty() {
        let _ = write!(
            body,
            "<div class=\"summary\"><h2>Process Summary</h2><div class=\"reason\">{}</div></div>",
            escape_html(summary)
        );
    }
    if records.is_empty() {
        if !result.trim().is_empty() && result != summary {
            let _ = write!(
                body,
                "<div class=\"student\"><pre class=\"reason\">{}</pre></div>",
                escape_html(result)
            );
        }
    } else {
        for (i, record) in records.iter().enumerate() {
            body.push_str(&subject_section(record, &record.label(i)));
        }
    }
    Some(document(title, &body))
}
