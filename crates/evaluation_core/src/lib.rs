pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod domain;
pub mod filter;
pub mod handle_map;
pub mod history;
pub mod ports;
pub mod report;
pub mod session;
pub mod staging;

pub use auth::{AuthContext, AuthError, Registration, Route};
pub use domain::{
    Credential, EvaluationMode, HistoryDetail, HistoryEntry, ModelStatus, RepositoryReport,
    ScoreRecord, StagedFile, StoredSession, UploadedFileHandle, User,
};
pub use filter::ScoreBand;
pub use history::{HistoryBrowser, HistoryError};
pub use ports::{
    AuthService, CredentialStore, EvaluationService, HistoryService, PortError, PortResult,
    SystemService,
};
pub use session::{EvaluationSession, FieldError, SessionError, SessionSnapshot};
