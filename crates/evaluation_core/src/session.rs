//! crates/evaluation_core/src/session.rs
//!
//! The Evaluation Session: mode selection, file staging, submission, result
//! ingestion and per-subject re-evaluation.
//!
//! State sits behind an async mutex that is released before every network
//! call, so re-evaluations of different subjects may be in flight together.
//! Every operation converts failures into one user-facing `SessionError` and
//! also records its message in the state for display.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audit::{self, AuditSummary};
use crate::domain::{EvaluationMode, ScoreRecord, StagedFile, UploadedFileHandle};
use crate::filter::{self, ScoreBand};
use crate::handle_map::HandleMap;
use crate::ports::{
    EvaluationService, GenerateRequest, GradeRequest, PortError, ReevaluateRequest,
};
use crate::staging::{self, StagingReport};

const CONNECT_HINT: &str =
    "Cannot connect to server. Please ensure the backend server is running and reachable.";
const GENERATION_FALLBACK: &str = "An error occurred during generation";

//=========================================================================================
// Errors
//=========================================================================================

/// A required input is missing or malformed. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Please select an evaluation type")]
    MissingMode,
    #[error("Please enter a title")]
    MissingTitle,
    #[error("Please enter a description")]
    MissingDescription,
    #[error("Please upload at least one file")]
    MissingFiles,
    #[error("Please upload at least one slide deck")]
    MissingSlides,
    #[error("Please enter a valid public GitHub repository URL")]
    InvalidRepositoryUrl,
    #[error("Please enter rules/description for how the GitHub repo should be evaluated")]
    MissingRules,
    #[error("Title or description not available for re-evaluation. Please ensure title and description fields are filled.")]
    MissingReevaluationContext,
}

/// The user-facing outcome of a failed session operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Field(#[from] FieldError),

    #[error("An evaluation type is already selected. Switch type first.")]
    ModeLocked,

    #[error("An evaluation is already running.")]
    AlreadyGenerating,

    #[error("{0} is already being re-evaluated.")]
    SubjectBusy(String),

    #[error("No evaluated subject at position {0}.")]
    NoSuchSubject(usize),

    #[error("No staged file at position {0}.")]
    NoSuchStagedFile(usize),

    #[error("File ID not found for {0}. Cannot re-evaluate. The file may have been removed or the page needs to be refreshed.")]
    HandleNotFound(String),

    #[error("Re-evaluate endpoint not found (404). Please ensure the backend server is reachable at the configured API URL and that any proxy in front of it forwards /reevaluate.")]
    ReevaluateEndpointMissing,

    #[error("Session expired. Please login again.")]
    Unauthorized,

    /// Server-provided or transport-derived message, shown verbatim.
    #[error("{0}")]
    Backend(String),

    #[error("The session was closed before the response arrived.")]
    Closed,

    #[error("The results changed while {0} was being re-evaluated; the response was discarded.")]
    Superseded(String),
}

/// Picks the message for a port failure: the server's own words, then the
/// HTTP status, then the operation's fallback.
fn describe(err: PortError, fallback: &str) -> SessionError {
    match err {
        PortError::Unauthorized => SessionError::Unauthorized,
        PortError::Rejected(message) => SessionError::Backend(message),
        PortError::NotFound(detail) if !detail.trim().is_empty() => SessionError::Backend(detail),
        PortError::NotFound(_) => SessionError::Backend("Server error: 404".to_string()),
        PortError::Status(code) => SessionError::Backend(format!("Server error: {}", code)),
        PortError::Transport(detail) => {
            warn!("Backend unreachable: {}", detail);
            SessionError::Backend(CONNECT_HINT.to_string())
        }
        PortError::Unexpected(detail) => {
            warn!("Unexpected backend failure: {}", detail);
            SessionError::Backend(fallback.to_string())
        }
    }
}

//=========================================================================================
// State
//=========================================================================================

#[derive(Debug, Default)]
struct SessionState {
    mode: EvaluationMode,
    staged: Vec<StagedFile>,
    title: String,
    description: String,
    repository_url: String,
    evaluate_design: bool,

    result: String,
    summary: String,
    records: Vec<ScoreRecord>,
    handles: HandleMap,
    last_title: String,
    last_description: String,

    generating: bool,
    busy: BTreeSet<usize>,
    error: Option<String>,
    /// Bumped whenever the result set is replaced.
    epoch: u64,
}

/// A point-in-time copy of the session for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub mode: EvaluationMode,
    pub staged: Vec<StagedFile>,
    pub title: String,
    pub description: String,
    pub repository_url: String,
    pub evaluate_design: bool,
    pub result: String,
    pub summary: String,
    pub records: Vec<ScoreRecord>,
    pub handles: HandleMap,
    pub last_title: String,
    pub generating: bool,
    pub busy: BTreeSet<usize>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// The title reports are headed with: the submitted one, else the live field.
    pub fn report_title(&self) -> &str {
        if !self.last_title.trim().is_empty() {
            &self.last_title
        } else {
            self.title.trim()
        }
    }

    pub fn has_results(&self) -> bool {
        !self.records.is_empty() || !self.result.is_empty() || !self.summary.is_empty()
    }
}

/// Inputs captured when a submission starts.
struct Submission {
    mode: EvaluationMode,
    files: Vec<StagedFile>,
    title: String,
    description: String,
    repository_url: String,
    evaluate_design: bool,
}

enum Evaluated {
    Scored {
        result: String,
        summary: String,
        records: Vec<ScoreRecord>,
        handles: HandleMap,
    },
    Audit(AuditSummary),
}

fn validate(state: &SessionState) -> Result<(), FieldError> {
    match state.mode {
        EvaluationMode::None => Err(FieldError::MissingMode),
        EvaluationMode::Files | EvaluationMode::Slides => {
            if state.title.trim().is_empty() {
                return Err(FieldError::MissingTitle);
            }
            if state.description.trim().is_empty() {
                return Err(FieldError::MissingDescription);
            }
            if state.staged.is_empty() {
                return Err(if state.mode == EvaluationMode::Slides {
                    FieldError::MissingSlides
                } else {
                    FieldError::MissingFiles
                });
            }
            Ok(())
        }
        EvaluationMode::Repository => {
            if !audit::is_valid_repository_url(&state.repository_url) {
                return Err(FieldError::InvalidRepositoryUrl);
            }
            if state.description.trim().is_empty() {
                return Err(FieldError::MissingRules);
            }
            Ok(())
        }
    }
}

fn first_non_empty(live: &str, remembered: &str) -> Option<String> {
    [live.trim(), remembered.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

//=========================================================================================
// The Session
//=========================================================================================

pub struct EvaluationSession {
    service: Arc<dyn EvaluationService>,
    state: Mutex<SessionState>,
    closed: CancellationToken,
}

impl EvaluationSession {
    pub fn new(service: Arc<dyn EvaluationService>) -> Self {
        Self {
            service,
            state: Mutex::new(SessionState::default()),
            closed: CancellationToken::new(),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            mode: state.mode,
            staged: state.staged.clone(),
            title: state.title.clone(),
            description: state.description.clone(),
            repository_url: state.repository_url.clone(),
            evaluate_design: state.evaluate_design,
            result: state.result.clone(),
            summary: state.summary.clone(),
            records: state.records.clone(),
            handles: state.handles.clone(),
            last_title: state.last_title.clone(),
            generating: state.generating,
            busy: state.busy.clone(),
            error: state.error.clone(),
        }
    }

    /// Stops the session; responses that arrive later are dropped.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    // --- Inputs ---

    /// Picks the evaluation type. A concrete mode can only be chosen from
    /// `None`; choosing `None` is the "switch type" reset, which drops staged
    /// files and the repository URL but keeps title, description and results.
    pub async fn select_mode(&self, mode: EvaluationMode) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.generating {
            return Err(SessionError::AlreadyGenerating);
        }
        if mode == EvaluationMode::None {
            state.mode = EvaluationMode::None;
            state.staged.clear();
            state.repository_url.clear();
            debug!("Evaluation type reset");
            return Ok(());
        }
        if state.mode != EvaluationMode::None && state.mode != mode {
            return Err(SessionError::ModeLocked);
        }
        state.mode = mode;
        info!(%mode, "Evaluation type selected");
        Ok(())
    }

    pub async fn switch_type(&self) -> Result<(), SessionError> {
        self.select_mode(EvaluationMode::None).await
    }

    pub async fn set_title(&self, title: &str) {
        self.state.lock().await.title = title.to_string();
    }

    pub async fn set_description(&self, description: &str) {
        self.state.lock().await.description = description.to_string();
    }

    pub async fn set_repository_url(&self, url: &str) {
        self.state.lock().await.repository_url = url.to_string();
    }

    /// Slide decks only: judge visual design instead of content.
    pub async fn set_evaluate_design(&self, evaluate_design: bool) {
        self.state.lock().await.evaluate_design = evaluate_design;
    }

    // --- Staging ---

    /// Appends the candidates the active mode accepts; the rest are reported
    /// with at most one warning per rejection reason.
    pub async fn stage_files(&self, candidates: Vec<StagedFile>) -> StagingReport {
        let mut state = self.state.lock().await;
        let (accepted, report) = staging::partition(candidates, state.mode);
        for warning in &report.warnings {
            warn!(rejected = ?report.rejected, "{}", warning);
        }
        state.staged.extend(accepted);
        debug!(staged = state.staged.len(), "Files staged");
        report
    }

    pub async fn remove_staged_file(&self, index: usize) -> Result<StagedFile, SessionError> {
        let mut state = self.state.lock().await;
        if index >= state.staged.len() {
            return Err(SessionError::NoSuchStagedFile(index));
        }
        Ok(state.staged.remove(index))
    }

    // --- Results ---

    /// The current records narrowed by name and band, with their indices.
    pub async fn filtered(&self, name_query: &str, band: ScoreBand) -> Vec<(usize, ScoreRecord)> {
        let state = self.state.lock().await;
        filter::filter(&state.records, name_query, band)
            .into_iter()
            .map(|(index, record)| (index, record.clone()))
            .collect()
    }

    // --- Submission ---

    /// Validates, uploads (for files and decks), evaluates, and replaces the
    /// result set. Staged files, title and description are left in place.
    ///
    /// Returns the number of evaluated subjects.
    pub async fn submit(&self) -> Result<usize, SessionError> {
        let submission = {
            let mut state = self.state.lock().await;
            if state.generating {
                return Err(SessionError::AlreadyGenerating);
            }
            if let Err(field) = validate(&state) {
                let err = SessionError::from(field);
                state.error = Some(err.to_string());
                return Err(err);
            }

            state.generating = true;
            state.error = None;
            state.result.clear();
            state.summary.clear();
            state.records.clear();
            state.handles = HandleMap::default();
            state.busy.clear();
            state.epoch += 1;
            state.last_title = state.title.trim().to_string();
            state.last_description = state.description.trim().to_string();

            Submission {
                mode: state.mode,
                files: state.staged.clone(),
                title: state.title.trim().to_string(),
                description: state.description.trim().to_string(),
                repository_url: state.repository_url.trim().to_string(),
                evaluate_design: state.evaluate_design,
            }
        };

        info!(mode = %submission.mode, files = submission.files.len(), "Submitting evaluation");
        let outcome = self.evaluate(&submission).await;

        let mut state = self.state.lock().await;
        if self.closed.is_cancelled() {
            debug!("Session closed; dropping evaluation response");
            return Err(SessionError::Closed);
        }
        state.generating = false;

        match outcome {
            Ok(Evaluated::Scored { result, summary, records, handles }) => {
                let count = records.len();
                state.result = result;
                state.summary = summary;
                state.records = records;
                state.handles = handles;
                info!(subjects = count, "Evaluation complete");
                Ok(count)
            }
            Ok(Evaluated::Audit(audit)) => {
                state.result = audit.text.clone();
                state.summary = audit.text;
                state.records = vec![audit.record];
                info!("Repository audit complete");
                Ok(1)
            }
            Err(err) => {
                error!("Evaluation failed: {}", err);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn evaluate(&self, submission: &Submission) -> Result<Evaluated, SessionError> {
        match submission.mode {
            EvaluationMode::None => Err(FieldError::MissingMode.into()),
            EvaluationMode::Repository => {
                let request = GradeRequest {
                    repository_url: submission.repository_url.clone(),
                    description: submission.description.clone(),
                };
                let outcome = self
                    .service
                    .grade_repository(&request)
                    .await
                    .map_err(|e| describe(e, GENERATION_FALLBACK))?;
                if !outcome.success {
                    return Err(SessionError::Backend(
                        outcome.error.unwrap_or_else(|| "GitHub grading failed".to_string()),
                    ));
                }
                let report = outcome.report.unwrap_or_default();
                Ok(Evaluated::Audit(audit::summarize(&report)))
            }
            EvaluationMode::Files | EvaluationMode::Slides => {
                let upload = self
                    .service
                    .upload_batch(&submission.files)
                    .await
                    .map_err(|e| describe(e, GENERATION_FALLBACK))?;
                if !upload.success {
                    let fallback = if submission.mode == EvaluationMode::Slides {
                        "Slide deck upload failed"
                    } else {
                        "File upload failed"
                    };
                    return Err(SessionError::Backend(
                        upload.error.unwrap_or_else(|| fallback.to_string()),
                    ));
                }
                debug!(handles = upload.handles.len(), "Upload complete");

                let request = GenerateRequest {
                    title: submission.title.clone(),
                    description: submission.description.clone(),
                    handles: upload.handles.clone(),
                    evaluate_design: submission.mode == EvaluationMode::Slides
                        && submission.evaluate_design,
                };
                let outcome = self
                    .service
                    .generate(&request)
                    .await
                    .map_err(|e| describe(e, GENERATION_FALLBACK))?;
                if !outcome.success {
                    return Err(SessionError::Backend(
                        outcome.error.unwrap_or_else(|| "Generation failed".to_string()),
                    ));
                }

                let records = outcome.scores.unwrap_or_default();
                if outcome.handles.is_empty() {
                    warn!("No file ids returned with the scores; pairing by upload order");
                }
                let handles = HandleMap::build(&records, &outcome.handles, &upload.handles);
                Ok(Evaluated::Scored {
                    result: outcome.result.unwrap_or_default(),
                    summary: outcome.summary.unwrap_or_default(),
                    records,
                    handles,
                })
            }
        }
    }

    // --- Re-evaluation ---

    /// Re-runs the evaluation of subject `index` from scratch and replaces
    /// only that record. The summary and the other subjects are untouched.
    pub async fn reevaluate(&self, index: usize) -> Result<ScoreRecord, SessionError> {
        let (request, label, epoch) = {
            let mut state = self.state.lock().await;
            let prepared = Self::prepare_reevaluation(&state, index);
            match prepared {
                Ok((request, label)) => {
                    state.busy.insert(index);
                    state.error = None;
                    (request, label, state.epoch)
                }
                Err(err) => {
                    warn!(index, "Cannot re-evaluate: {}", err);
                    state.error = Some(err.to_string());
                    return Err(err);
                }
            }
        };

        info!(subject = %label, file_id = %request.handle, "Re-evaluating subject");
        let response = self.service.reevaluate(&request).await;

        let mut state = self.state.lock().await;
        if self.closed.is_cancelled() {
            debug!("Session closed; dropping re-evaluation response");
            return Err(SessionError::Closed);
        }
        if state.epoch != epoch {
            debug!(subject = %label, "Result set replaced; dropping re-evaluation response");
            return Err(SessionError::Superseded(label));
        }
        state.busy.remove(&index);

        let failed = || format!("Failed to re-evaluate {}", label);
        let outcome = match response {
            Ok(outcome) if outcome.success => outcome
                .record
                .ok_or_else(|| SessionError::Backend(outcome.error.unwrap_or_else(failed))),
            Ok(outcome) => Err(SessionError::Backend(outcome.error.unwrap_or_else(failed))),
            Err(PortError::NotFound(detail)) => {
                error!("Re-evaluate endpoint returned 404: {}", detail);
                Err(SessionError::ReevaluateEndpointMissing)
            }
            Err(err) => Err(describe(err, &format!("Error re-evaluating {}", label))),
        };

        match outcome {
            Ok(record) => {
                let slot = state
                    .records
                    .get_mut(index)
                    .ok_or(SessionError::NoSuchSubject(index))?;
                *slot = record.clone();
                info!(subject = %label, score = ?record.score_percent, "Re-evaluation complete");
                Ok(record)
            }
            Err(err) => {
                error!(subject = %label, "Re-evaluation failed: {}", err);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn prepare_reevaluation(
        state: &SessionState,
        index: usize,
    ) -> Result<(ReevaluateRequest, String), SessionError> {
        let record = state
            .records
            .get(index)
            .ok_or(SessionError::NoSuchSubject(index))?;
        let label = record.label(index);
        if state.busy.contains(&index) {
            return Err(SessionError::SubjectBusy(label));
        }
        let handle: UploadedFileHandle = state
            .handles
            .resolve(&label, index)
            .cloned()
            .ok_or_else(|| SessionError::HandleNotFound(label.clone()))?;
        let title = first_non_empty(&state.title, &state.last_title);
        let description = first_non_empty(&state.description, &state.last_description);
        let (Some(title), Some(description)) = (title, description) else {
            return Err(FieldError::MissingReevaluationContext.into());
        };
        Ok((ReevaluateRequest { handle, title, description }, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepositoryReport, RuleResult};
    use crate::ports::{
        GenerateOutcome, GradeOutcome, PortResult, ReevaluateOutcome, UploadOutcome,
    };
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    struct FakeEvaluation {
        upload: PortResult<UploadOutcome>,
        generate: PortResult<GenerateOutcome>,
        grade: PortResult<GradeOutcome>,
        reevaluate: PortResult<ReevaluateOutcome>,
        gate: Option<Arc<Notify>>,
        calls: StdMutex<Vec<&'static str>>,
        reevaluated: StdMutex<Vec<ReevaluateRequest>>,
        generated: StdMutex<Vec<GenerateRequest>>,
    }

    impl FakeEvaluation {
        fn new() -> Self {
            Self {
                upload: Ok(UploadOutcome { success: true, handles: vec!["f1".into()], error: None }),
                generate: Ok(GenerateOutcome {
                    success: true,
                    result: Some("Evaluated 1 file".into()),
                    summary: Some("All good".into()),
                    scores: Some(vec![scored("Alice", 92.0)]),
                    handles: vec!["f1".into()],
                    error: None,
                }),
                grade: Ok(GradeOutcome::default()),
                reevaluate: Ok(ReevaluateOutcome {
                    success: true,
                    record: Some(scored("Alice", 75.0)),
                    error: None,
                }),
                gate: None,
                calls: StdMutex::new(Vec::new()),
                reevaluated: StdMutex::new(Vec::new()),
                generated: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EvaluationService for FakeEvaluation {
        async fn upload_batch(&self, _files: &[StagedFile]) -> PortResult<UploadOutcome> {
            self.calls.lock().unwrap().push("upload");
            self.upload.clone()
        }

        async fn generate(&self, request: &GenerateRequest) -> PortResult<GenerateOutcome> {
            self.calls.lock().unwrap().push("generate");
            self.generated.lock().unwrap().push(request.clone());
            self.generate.clone()
        }

        async fn grade_repository(&self, _request: &GradeRequest) -> PortResult<GradeOutcome> {
            self.calls.lock().unwrap().push("grade");
            self.grade.clone()
        }

        async fn reevaluate(&self, request: &ReevaluateRequest) -> PortResult<ReevaluateOutcome> {
            self.calls.lock().unwrap().push("reevaluate");
            self.reevaluated.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reevaluate.clone()
        }
    }

    fn scored(name: &str, score: f64) -> ScoreRecord {
        ScoreRecord {
            name: Some(name.to_string()),
            score_percent: Some(score),
            reasoning: Some("Good".to_string()),
            ..Default::default()
        }
    }

    fn pdf(name: &str) -> StagedFile {
        StagedFile::new(name, b"%PDF-1.4".to_vec())
    }

    async fn ready_files_session(fake: FakeEvaluation) -> (Arc<FakeEvaluation>, EvaluationSession) {
        let fake = Arc::new(fake);
        let session = EvaluationSession::new(fake.clone());
        session.select_mode(EvaluationMode::Files).await.unwrap();
        session.set_title("Quiz 1").await;
        session.set_description("Grade each answer").await;
        session.stage_files(vec![pdf("alice.pdf")]).await;
        (fake, session)
    }

    #[tokio::test]
    async fn successful_submission_maps_names_and_positions_to_handles() {
        let (fake, session) = ready_files_session(FakeEvaluation::new()).await;

        assert_eq!(session.submit().await, Ok(1));

        let snap = session.snapshot().await;
        assert_eq!(fake.calls(), vec!["upload", "generate"]);
        assert_eq!(snap.records, vec![scored("Alice", 92.0)]);
        assert_eq!(snap.handles.by_name("Alice").map(|h| h.as_str()), Some("f1"));
        assert_eq!(snap.handles.by_index(0).map(|h| h.as_str()), Some("f1"));
        assert_eq!(snap.summary, "All good");
        assert!(!snap.generating);
        // Inputs survive the submission so the user can re-evaluate.
        assert_eq!(snap.staged.len(), 1);
        assert_eq!(snap.title, "Quiz 1");
        assert_eq!(snap.description, "Grade each answer");
    }

    #[tokio::test]
    async fn generate_receives_upload_handles_in_order() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Ok(UploadOutcome {
            success: true,
            handles: vec!["h1".into(), "h2".into()],
            error: None,
        });
        let (fake, session) = ready_files_session(fake).await;
        session.stage_files(vec![pdf("bob.pdf")]).await;
        session.submit().await.unwrap();

        let generated = fake.generated.lock().unwrap().clone();
        let expected: Vec<UploadedFileHandle> = vec!["h1".into(), "h2".into()];
        assert_eq!(generated[0].handles, expected);
        assert!(!generated[0].evaluate_design);
    }

    #[tokio::test]
    async fn executable_is_rejected_with_one_warning() {
        let session = EvaluationSession::new(Arc::new(FakeEvaluation::new()));
        session.select_mode(EvaluationMode::Files).await.unwrap();

        let report = session.stage_files(vec![StagedFile::new("setup.exe", vec![0u8; 4])]).await;

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].to_string().starts_with("Invalid file!"));
        assert!(session.snapshot().await.staged.is_empty());
    }

    #[tokio::test]
    async fn staging_appends_across_calls_until_removed() {
        let session = EvaluationSession::new(Arc::new(FakeEvaluation::new()));
        session.select_mode(EvaluationMode::Files).await.unwrap();
        session.stage_files(vec![pdf("a.pdf"), pdf("b.pdf")]).await;
        session.stage_files(vec![pdf("c.txt")]).await;

        let names = |snap: SessionSnapshot| snap.staged.into_iter().map(|f| f.name).collect::<Vec<_>>();
        assert_eq!(names(session.snapshot().await), vec!["a.pdf", "b.pdf", "c.txt"]);

        let removed = session.remove_staged_file(1).await.unwrap();
        assert_eq!(removed.name, "b.pdf");
        assert_eq!(names(session.snapshot().await), vec!["a.pdf", "c.txt"]);
        assert_eq!(
            session.remove_staged_file(5).await,
            Err(SessionError::NoSuchStagedFile(5))
        );
    }

    #[tokio::test]
    async fn missing_fields_never_reach_the_network() {
        let fake = Arc::new(FakeEvaluation::new());
        let session = EvaluationSession::new(fake.clone());

        assert_eq!(session.submit().await, Err(FieldError::MissingMode.into()));

        session.select_mode(EvaluationMode::Files).await.unwrap();
        session.set_description("rules").await;
        session.stage_files(vec![pdf("a.pdf")]).await;
        assert_eq!(session.submit().await, Err(FieldError::MissingTitle.into()));

        session.set_title("T").await;
        session.set_description("   ").await;
        assert_eq!(session.submit().await, Err(FieldError::MissingDescription.into()));

        assert!(fake.calls().is_empty());
        assert_eq!(session.snapshot().await.error.as_deref(), Some("Please enter a description"));
    }

    #[tokio::test]
    async fn slides_without_decks_report_a_slide_specific_error() {
        let session = EvaluationSession::new(Arc::new(FakeEvaluation::new()));
        session.select_mode(EvaluationMode::Slides).await.unwrap();
        session.set_title("Pitch").await;
        session.set_description("Judge clarity").await;
        assert_eq!(session.submit().await, Err(FieldError::MissingSlides.into()));
    }

    #[tokio::test]
    async fn failed_upload_stops_before_generation() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Ok(UploadOutcome { success: false, handles: vec![], error: None });
        let (fake, session) = ready_files_session(fake).await;

        let err = session.submit().await.unwrap_err();

        assert_eq!(err, SessionError::Backend("File upload failed".into()));
        assert_eq!(fake.calls(), vec!["upload"]);
        let snap = session.snapshot().await;
        assert!(!snap.generating);
        assert_eq!(snap.error.as_deref(), Some("File upload failed"));
    }

    #[tokio::test]
    async fn transport_and_auth_failures_get_their_own_messages() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Err(PortError::Transport("connection refused".into()));
        let (_, session) = ready_files_session(fake).await;
        let err = session.submit().await.unwrap_err();
        assert!(err.to_string().starts_with("Cannot connect to server"));

        let mut fake = FakeEvaluation::new();
        fake.generate = Err(PortError::Unauthorized);
        let (_, session) = ready_files_session(fake).await;
        assert_eq!(session.submit().await, Err(SessionError::Unauthorized));

        let mut fake = FakeEvaluation::new();
        fake.generate = Err(PortError::Status(502));
        let (_, session) = ready_files_session(fake).await;
        assert_eq!(session.submit().await, Err(SessionError::Backend("Server error: 502".into())));
    }

    #[tokio::test]
    async fn repository_audit_yields_one_unscored_record() {
        let mut fake = FakeEvaluation::new();
        fake.grade = Ok(GradeOutcome {
            success: true,
            report: Some(RepositoryReport {
                rule_results: vec![RuleResult {
                    rule_text: Some("No console.log".into()),
                    satisfied: true,
                    evidence: Some("none found".into()),
                    failure_reason: None,
                }],
                conversational_response: Some("Clean.".into()),
                ..Default::default()
            }),
            error: None,
        });
        let fake = Arc::new(fake);
        let session = EvaluationSession::new(fake.clone());
        session.select_mode(EvaluationMode::Repository).await.unwrap();
        session.set_repository_url("https://github.com/user/repo").await;
        session.set_description("No console.log").await;

        assert_eq!(session.submit().await, Ok(1));

        let snap = session.snapshot().await;
        assert_eq!(fake.calls(), vec!["grade"]);
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].score_percent, None);
        assert_eq!(snap.records[0].name.as_deref(), Some("Repository Analysis"));
        assert!(snap.result.starts_with("RESPONSE TO YOUR QUERY:\nClean."));
        assert!(snap.handles.is_empty());
    }

    #[tokio::test]
    async fn malformed_repository_url_is_a_field_error() {
        let fake = Arc::new(FakeEvaluation::new());
        let session = EvaluationSession::new(fake.clone());
        session.select_mode(EvaluationMode::Repository).await.unwrap();
        session.set_repository_url("https://example.com/user/repo").await;
        session.set_description("rules").await;
        assert_eq!(session.submit().await, Err(FieldError::InvalidRepositoryUrl.into()));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn reevaluate_without_handles_makes_no_call() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Ok(UploadOutcome { success: true, handles: vec![], error: None });
        fake.generate = Ok(GenerateOutcome {
            success: true,
            scores: Some(vec![scored("Alice", 92.0)]),
            ..Default::default()
        });
        let (fake, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let err = session.reevaluate(0).await.unwrap_err();

        assert_eq!(err, SessionError::HandleNotFound("Alice".into()));
        assert!(err.to_string().contains("Cannot re-evaluate"));
        assert!(!fake.calls().contains(&"reevaluate"));
        assert_eq!(session.snapshot().await.error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn reevaluate_replaces_only_its_subject() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Ok(UploadOutcome {
            success: true,
            handles: vec!["f1".into(), "f2".into(), "f3".into()],
            error: None,
        });
        fake.generate = Ok(GenerateOutcome {
            success: true,
            result: Some("overall".into()),
            summary: Some("summary".into()),
            scores: Some(vec![scored("A", 10.0), scored("B", 20.0), scored("C", 30.0)]),
            handles: vec!["f1".into(), "f2".into(), "f3".into()],
            error: None,
        });
        fake.reevaluate = Ok(ReevaluateOutcome {
            success: true,
            record: Some(scored("B", 99.0)),
            error: None,
        });
        let (fake, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();
        let before = session.snapshot().await;

        let updated = session.reevaluate(1).await.unwrap();

        let after = session.snapshot().await;
        assert_eq!(updated.score_percent, Some(99.0));
        assert_eq!(after.records[0], before.records[0]);
        assert_eq!(after.records[1], scored("B", 99.0));
        assert_eq!(after.records[2], before.records[2]);
        assert_eq!(after.summary, "summary");
        assert_eq!(after.result, "overall");
        assert!(after.busy.is_empty());

        let sent = fake.reevaluated.lock().unwrap().clone();
        assert_eq!(sent[0].handle.as_str(), "f2");
        assert_eq!(sent[0].title, "Quiz 1");
    }

    #[tokio::test]
    async fn reevaluate_falls_back_to_submitted_title_and_description() {
        let (fake, session) = ready_files_session(FakeEvaluation::new()).await;
        session.submit().await.unwrap();
        session.set_title("").await;
        session.set_description("Stricter rubric").await;

        session.reevaluate(0).await.unwrap();

        let sent = fake.reevaluated.lock().unwrap().clone();
        assert_eq!(sent[0].title, "Quiz 1");
        assert_eq!(sent[0].description, "Stricter rubric");
    }

    #[tokio::test]
    async fn reevaluate_404_points_at_backend_configuration() {
        let mut fake = FakeEvaluation::new();
        fake.reevaluate = Err(PortError::NotFound("Not Found".into()));
        let (_, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let err = session.reevaluate(0).await.unwrap_err();

        assert_eq!(err, SessionError::ReevaluateEndpointMissing);
        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("proxy"));
        assert_ne!(message, "Error re-evaluating Alice");

        let snap = session.snapshot().await;
        assert_eq!(snap.records, vec![scored("Alice", 92.0)]);
        assert!(snap.busy.is_empty());
    }

    #[tokio::test]
    async fn reevaluate_logical_failure_keeps_the_old_record() {
        let mut fake = FakeEvaluation::new();
        fake.reevaluate = Ok(ReevaluateOutcome { success: false, record: None, error: None });
        let (_, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let err = session.reevaluate(0).await.unwrap_err();

        assert_eq!(err, SessionError::Backend("Failed to re-evaluate Alice".into()));
        assert_eq!(session.snapshot().await.records, vec![scored("Alice", 92.0)]);
    }

    #[tokio::test]
    async fn same_subject_cannot_be_reevaluated_twice_at_once() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeEvaluation::new();
        fake.gate = Some(gate.clone());
        let (fake, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let (first, second) = futures::join!(session.reevaluate(0), async {
            let busy = session.snapshot().await.busy;
            let second = session.reevaluate(0).await;
            gate.notify_one();
            (busy, second)
        });

        let (busy_while_running, second) = second;
        assert!(busy_while_running.contains(&0));
        assert_eq!(second, Err(SessionError::SubjectBusy("Alice".into())));
        assert!(first.is_ok());
        assert_eq!(fake.calls().iter().filter(|c| **c == "reevaluate").count(), 1);
    }

    #[tokio::test]
    async fn responses_after_close_are_dropped() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeEvaluation::new();
        fake.gate = Some(gate.clone());
        let (_, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let (result, _) = futures::join!(session.reevaluate(0), async {
            session.close();
            gate.notify_one();
        });

        assert_eq!(result, Err(SessionError::Closed));
        assert!(session.is_closed());
        assert_eq!(session.snapshot().await.records, vec![scored("Alice", 92.0)]);
    }

    #[tokio::test]
    async fn submit_is_refused_while_generating() {
        let session = EvaluationSession::new(Arc::new(FakeEvaluation::new()));
        session.state.lock().await.generating = true;
        assert_eq!(session.submit().await, Err(SessionError::AlreadyGenerating));
    }

    #[tokio::test]
    async fn mode_is_locked_until_switched_back() {
        let session = EvaluationSession::new(Arc::new(FakeEvaluation::new()));
        session.select_mode(EvaluationMode::Files).await.unwrap();
        session.set_title("Kept").await;
        session.stage_files(vec![pdf("a.pdf")]).await;

        assert_eq!(
            session.select_mode(EvaluationMode::Slides).await,
            Err(SessionError::ModeLocked)
        );

        session.switch_type().await.unwrap();
        session.select_mode(EvaluationMode::Slides).await.unwrap();
        let snap = session.snapshot().await;
        assert_eq!(snap.mode, EvaluationMode::Slides);
        assert!(snap.staged.is_empty());
        assert_eq!(snap.title, "Kept");
    }

    #[tokio::test]
    async fn slide_reevaluation_replaces_only_the_record() {
        let mut fake = FakeEvaluation::new();
        fake.upload = Ok(UploadOutcome {
            success: true,
            handles: vec!["d1".into(), "d2".into()],
            error: None,
        });
        fake.generate = Ok(GenerateOutcome {
            success: true,
            result: Some("Deck one review\n\nDeck two review".into()),
            scores: Some(vec![scored("One", 60.0), scored("Two", 70.0)]),
            handles: vec!["d1".into(), "d2".into()],
            ..Default::default()
        });
        fake.reevaluate = Ok(ReevaluateOutcome {
            success: true,
            record: Some(ScoreRecord {
                formatted_result: Some("Deck two, again".into()),
                ..scored("Two", 80.0)
            }),
            error: None,
        });
        let fake = Arc::new(fake);
        let session = EvaluationSession::new(fake.clone());
        session.select_mode(EvaluationMode::Slides).await.unwrap();
        session.set_title("Pitch").await;
        session.set_description("Clarity").await;
        session.set_evaluate_design(true).await;
        session
            .stage_files(vec![
                StagedFile::new("one.pptx", vec![1u8]),
                StagedFile::new("two.ppt", vec![2u8]),
            ])
            .await;
        session.submit().await.unwrap();
        assert!(fake.generated.lock().unwrap()[0].evaluate_design);

        session.reevaluate(1).await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.result, "Deck one review\n\nDeck two review");
        assert_eq!(snapshot.records[1].score_percent, Some(80.0));
        assert_eq!(snapshot.records[1].formatted_result.as_deref(), Some("Deck two, again"));
        assert_eq!(snapshot.records[0].score_percent, Some(60.0));
    }

    #[tokio::test]
    async fn filtered_view_keeps_original_indices() {
        let mut fake = FakeEvaluation::new();
        fake.generate = Ok(GenerateOutcome {
            success: true,
            scores: Some(vec![scored("Ann", 95.0), scored("Ben", 30.0)]),
            ..Default::default()
        });
        let (_, session) = ready_files_session(fake).await;
        session.submit().await.unwrap();

        let high = session.filtered("", ScoreBand::High).await;
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].0, 0);
        let ben = session.filtered("BEN", ScoreBand::All).await;
        assert_eq!(ben[0].0, 1);
    }
}
