//! services/client/src/error.rs
//!
//! Defines the primary error type for the `evaluator` binary.

use evaluation_core::auth::AuthError;
use evaluation_core::filter::UnknownBand;
use evaluation_core::history::HistoryError;
use evaluation_core::ports::PortError;
use evaluation_core::session::SessionError;

use crate::config::ConfigError;

/// The primary error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error straight from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    History(#[from] HistoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Band(#[from] UnknownBand),

    /// Reading inputs or writing exports.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The command cannot run as asked.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Whether the backend rejected the stored credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            CliError::Port(PortError::Unauthorized)
                | CliError::Session(SessionError::Unauthorized)
                | CliError::History(HistoryError::Unauthorized)
                | CliError::Auth(AuthError::SessionExpired)
        )
    }
}
