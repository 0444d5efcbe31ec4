//! crates/evaluation_core/src/staging.rs
//!
//! Local validation of files picked for upload. Nothing here touches the network.

use std::fmt;

use crate::domain::{EvaluationMode, StagedFile};

/// Per-file size ceiling, inclusive.
pub const MAX_FILE_SIZE: u64 = 30 * 1024 * 1024;

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx"];
const SLIDE_EXTENSIONS: &[&str] = &["ppt", "pptx"];

/// The extensions a mode accepts, lower-case and without the dot.
pub fn allowed_extensions(mode: EvaluationMode) -> &'static [&'static str] {
    match mode {
        EvaluationMode::Files => DOCUMENT_EXTENSIONS,
        EvaluationMode::Slides => SLIDE_EXTENSIONS,
        EvaluationMode::None | EvaluationMode::Repository => &[],
    }
}

/// One aggregated warning per rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingWarning {
    Oversize,
    InvalidType(EvaluationMode),
}

impl fmt::Display for StagingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingWarning::Oversize => f.write_str("File size exceeds 30MB limit."),
            StagingWarning::InvalidType(EvaluationMode::Files) => {
                f.write_str("Invalid file! Only PDF, Text, DOC, and DOCX files are allowed.")
            }
            StagingWarning::InvalidType(EvaluationMode::Slides) => {
                f.write_str("Invalid file! Only PPT and PPTX files are allowed.")
            }
            StagingWarning::InvalidType(_) => {
                f.write_str("This evaluation type does not accept file uploads.")
            }
        }
    }
}

/// What happened to a batch of candidates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StagingReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub warnings: Vec<StagingWarning>,
}

/// Splits candidates into the files a mode accepts and a report on the rest.
///
/// Oversize is checked before the extension, so a file that fails both counts
/// only as oversize. The accepted files keep their relative order.
pub fn partition(
    candidates: Vec<StagedFile>,
    mode: EvaluationMode,
) -> (Vec<StagedFile>, StagingReport) {
    let allowed = allowed_extensions(mode);
    let mut accepted = Vec::new();
    let mut report = StagingReport::default();
    let mut too_large = false;
    let mut invalid = false;

    for file in candidates {
        if file.size > MAX_FILE_SIZE {
            too_large = true;
            report.rejected.push(file.name);
        } else if file
            .extension()
            .is_some_and(|ext| allowed.contains(&ext.as_str()))
        {
            report.accepted.push(file.name.clone());
            accepted.push(file);
        } else {
            invalid = true;
            report.rejected.push(file.name);
        }
    }

    if too_large {
        report.warnings.push(StagingWarning::Oversize);
    }
    if invalid {
        report.warnings.push(StagingWarning::InvalidType(mode));
    }
    (accepted, report)
}

/// Renders a byte count the way the file list shows it.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{:.2} MB", value / MB)
    }
}
