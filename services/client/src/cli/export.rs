//! services/client/src/cli/export.rs
//!
//! Writes session results to disk in one of the report formats.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use evaluation_core::report::{self, ExportFormat};
use evaluation_core::session::SessionSnapshot;
use tracing::info;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// Plain text with a timestamped file name.
    Text,
    /// HTML for printing to PDF.
    Print,
    /// HTML saved as a Word document.
    Doc,
}

impl From<ExportKind> for ExportFormat {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Text => ExportFormat::Text,
            ExportKind::Print => ExportFormat::Print,
            ExportKind::Doc => ExportFormat::Doc,
        }
    }
}

/// A rendered export: where it should go and what it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub file_name: String,
    pub body: String,
}

/// Renders the whole result set, or subject `subject` (0-based) alone.
/// `None` when there is nothing to export.
pub fn render(
    snapshot: &SessionSnapshot,
    format: ExportFormat,
    subject: Option<usize>,
    now: NaiveDateTime,
) -> Result<Option<Rendered>, CliError> {
    let title = snapshot.report_title();
    match subject {
        Some(index) => {
            let record = snapshot.records.get(index).ok_or_else(|| {
                CliError::Usage(format!("There is no subject number {}.", index + 1))
            })?;
            let label = record.label(index);
            let body = match format {
                ExportFormat::Text => report::subject_text(record, index),
                ExportFormat::Print | ExportFormat::Doc => {
                    report::subject_html(record, index, title)
                }
            };
            let file_name = report::export_file_name(title, "report", Some(&label), format, now);
            Ok(Some(Rendered { file_name, body }))
        }
        None => {
            let body = match format {
                ExportFormat::Text => {
                    report::report_text(&snapshot.records, &snapshot.result, &snapshot.summary)
                }
                ExportFormat::Print | ExportFormat::Doc => report::report_html(
                    &snapshot.records,
                    &snapshot.result,
                    &snapshot.summary,
                    title,
                ),
            };
            let fallback = if format == ExportFormat::Text { "output" } else { "report" };
            Ok(body.map(|body| Rendered {
                file_name: report::export_file_name(title, fallback, None, format, now),
                body,
            }))
        }
    }
}

/// Renders and writes an export into `dir`, returning the written path.
pub async fn write(
    snapshot: &SessionSnapshot,
    kind: ExportKind,
    subject: Option<usize>,
    dir: &Path,
) -> Result<Option<PathBuf>, CliError> {
    let format = ExportFormat::from(kind);
    let Some(rendered) = render(snapshot, format, subject, Local::now().naive_local())? else {
        return Ok(None);
    };
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&rendered.file_name);
    tokio::fs::write(&path, rendered.body).await?;
    info!(path = %path.display(), mime = format.mime_type(), "Export written");
    Ok(Some(path))
}
