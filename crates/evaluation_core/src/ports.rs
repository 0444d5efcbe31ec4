//! crates/evaluation_core/src/ports.rs
//!
//! Defines the service contracts (traits) the evaluation workflow depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! workflow independent of the REST backend and of where credentials are kept.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{
    Credential, HistoryDetail, HistoryPage, HistoryQuery, ModelStatus, RepositoryReport,
    ScoreRecord, StagedFile, StoredSession, UploadedFileHandle, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the transport (HTTP client, filesystem).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// The credential was rejected (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,
    /// The route or resource does not exist (HTTP 404).
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend explained the failure in a structured error field.
    #[error("{0}")]
    Rejected(String),
    /// A non-success status without a structured explanation.
    #[error("Server error: {0}")]
    Status(u16),
    /// No response at all: connection refused, DNS failure, timeout.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Evaluation Requests and Outcomes
//=========================================================================================

/// Result of the batch upload call. Handles are in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadOutcome {
    pub success: bool,
    pub handles: Vec<UploadedFileHandle>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub title: String,
    pub description: String,
    pub handles: Vec<UploadedFileHandle>,
    /// Only meaningful for slide decks.
    pub evaluate_design: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateOutcome {
    pub success: bool,
    pub result: Option<String>,
    pub summary: Option<String>,
    pub scores: Option<Vec<ScoreRecord>>,
    /// Handles in score order, echoed back for re-evaluation.
    pub handles: Vec<UploadedFileHandle>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeRequest {
    pub repository_url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GradeOutcome {
    pub success: bool,
    pub report: Option<RepositoryReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReevaluateRequest {
    pub handle: UploadedFileHandle,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReevaluateOutcome {
    pub success: bool,
    pub record: Option<ScoreRecord>,
    pub error: Option<String>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait EvaluationService: Send + Sync {
    /// Uploads every staged file in one call.
    async fn upload_batch(&self, files: &[StagedFile]) -> PortResult<UploadOutcome>;

    /// Evaluates previously uploaded documents or decks.
    async fn generate(&self, request: &GenerateRequest) -> PortResult<GenerateOutcome>;

    /// Audits a repository against free-text rules.
    async fn grade_repository(&self, request: &GradeRequest) -> PortResult<GradeOutcome>;

    /// Re-runs the evaluation of one uploaded file from scratch.
    async fn reevaluate(&self, request: &ReevaluateRequest) -> PortResult<ReevaluateOutcome>;
}

#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn list(&self, query: &HistoryQuery) -> PortResult<HistoryPage>;

    async fn detail(&self, id: i64) -> PortResult<HistoryDetail>;

    async fn delete(&self, id: i64) -> PortResult<()>;

    /// Fetches the original uploaded file.
    async fn download_file(&self, handle: &UploadedFileHandle) -> PortResult<Bytes>;

    /// Fetches the server-rendered report for one evaluated subject.
    async fn download_report(&self, result_id: i64) -> PortResult<Bytes>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> PortResult<Credential>;

    async fn register(&self, email: &str, password: &str) -> PortResult<User>;

    /// Resolves the account behind a token.
    async fn me(&self, token: &str) -> PortResult<User>;
}

#[async_trait]
pub trait SystemService: Send + Sync {
    async fn model_status(&self) -> PortResult<ModelStatus>;

    async fn reevaluate_available(&self) -> bool;
}

/// Where the credential and the login counter survive between runs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> PortResult<StoredSession>;

    async fn save(&self, session: &StoredSession) -> PortResult<()>;
}
