//! crates/evaluation_core/src/domain.rs
//!
//! Defines the pure, core data structures for the evaluation client.
//! These structs are independent of any transport or serialization format.

use bytes::Bytes;
use std::fmt;

//=========================================================================================
// Evaluation Mode
//=========================================================================================

/// Which kind of evaluation the session is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// Nothing chosen yet (or the user switched type).
    #[default]
    None,
    /// Written assignments: PDF, text and Word documents.
    Files,
    /// Presentation decks.
    Slides,
    /// Audit of a public GitHub repository against free-text rules.
    Repository,
}

impl EvaluationMode {
    pub fn label(&self) -> &'static str {
        match self {
            EvaluationMode::None => "none",
            EvaluationMode::Files => "files",
            EvaluationMode::Slides => "slides",
            EvaluationMode::Repository => "repository",
        }
    }

    /// Whether this mode stages files for upload.
    pub fn accepts_uploads(&self) -> bool {
        matches!(self, EvaluationMode::Files | EvaluationMode::Slides)
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//=========================================================================================
// Files
//=========================================================================================

/// A file selected for upload, held locally until submission.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub name: String,
    pub size: u64,
    pub content: Bytes,
}

impl StagedFile {
    /// Builds a staged file whose size is the length of its content.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// The lower-cased text after the last `.`, if any.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// A backend-issued identifier for a previously uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadedFileHandle(String);

impl UploadedFileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadedFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UploadedFileHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UploadedFileHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

//=========================================================================================
// Scores
//=========================================================================================

/// The evaluation of one subject: one document, one deck, or one repository.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreRecord {
    pub name: Option<String>,
    /// In `[0, 100]`; `None` for repository audits.
    pub score_percent: Option<f64>,
    pub reasoning: Option<String>,
    pub details: Vec<DetailEntry>,
    pub slide_content: Option<SlideContentReview>,
    pub design_review: Option<DesignReview>,
    /// Pre-rendered text for this subject, only sent back by slide re-evaluations.
    pub formatted_result: Option<String>,
}

impl ScoreRecord {
    /// The subject name, or a positional label when the backend sent none.
    pub fn label(&self, index: usize) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Student {}", index + 1),
        }
    }

    pub fn has_slide_reviews(&self) -> bool {
        self.slide_content.is_some() || self.design_review.is_some()
    }
}

/// One question or criterion inside a `ScoreRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailEntry {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub reference_answer: Option<String>,
    pub correctness: Correctness,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correctness {
    Correct,
    /// Fraction of full credit in `(0, 1]`.
    PartialCredit(f64),
    Incorrect,
}

impl Correctness {
    /// Folds the backend's `is_correct` / `partial_credit` pair into one value.
    pub fn from_flags(is_correct: Option<bool>, partial_credit: Option<f64>) -> Self {
        if is_correct == Some(true) {
            return Correctness::Correct;
        }
        match partial_credit {
            Some(fraction) if fraction > 0.0 => Correctness::PartialCredit(fraction.min(1.0)),
            _ => Correctness::Incorrect,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Correctness::Correct => "Correct".to_string(),
            Correctness::PartialCredit(fraction) => format!("Partial ({:.0}%)", fraction * 100.0),
            Correctness::Incorrect => "Incorrect".to_string(),
        }
    }
}

/// A sub-score with its feedback, used by the slide reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionScore {
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlideContentReview {
    pub content_quality: Option<CriterionScore>,
    pub structure: Option<CriterionScore>,
    pub alignment: Option<CriterionScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesignReview {
    /// Set when the design pass failed; the other fields are then empty.
    pub error: Option<String>,
    pub visual_appeal: Option<CriterionScore>,
    pub layout: Option<CriterionScore>,
    pub typography: Option<CriterionScore>,
    pub color_scheme: Option<CriterionScore>,
    pub overall_comment: Option<String>,
}

//=========================================================================================
// Repository audits
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepositoryReport {
    pub rule_results: Vec<RuleResult>,
    pub conversational_response: Option<String>,
    pub overall_comment: Option<String>,
    pub detected_stack: Option<Vec<String>>,
    pub rules_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleResult {
    pub rule_text: Option<String>,
    pub satisfied: bool,
    pub evidence: Option<String>,
    pub failure_reason: Option<String>,
}

//=========================================================================================
// History
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryQuery {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub category: Option<String>,
}

/// One past evaluation session as shown in the history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub created_at: String,
    pub subject_name: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDetail {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<String>,
    pub results: Vec<HistoryResult>,
}

/// One evaluated subject inside a past session.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResult {
    pub id: i64,
    pub subject_name: Option<String>,
    pub score_percent: Option<f64>,
    pub reasoning: Option<String>,
    pub summary: Option<String>,
    pub evaluation_type: Option<String>,
    pub file: Option<UploadedFileHandle>,
    pub details: Vec<DetailEntry>,
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
}

impl User {
    /// The part of the email before `@`, used as a greeting.
    pub fn display_name(&self) -> String {
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "Member".to_string(),
        }
    }
}

/// A bearer token issued at login together with the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub user: User,
}

/// Everything the client keeps on disk between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredSession {
    pub credential: Option<Credential>,
    pub login_count: u64,
}

/// Reachability of the model provider behind the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStatus {
    pub connected: bool,
    pub detail: Option<String>,
}
