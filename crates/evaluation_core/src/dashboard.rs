//! crates/evaluation_core/src/dashboard.rs
//!
//! The signed-in landing summary.

use tracing::warn;

use crate::auth::{AuthContext, AuthError};
use crate::domain::ModelStatus;
use crate::ports::SystemService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub display_name: String,
    pub email: String,
    pub login_count: u64,
    pub model: ModelStatus,
    pub reevaluate_available: bool,
}

/// Gathers the account summary. An unreachable backend degrades the model
/// status instead of failing the whole summary.
pub async fn account_summary(
    auth: &AuthContext,
    system: &dyn SystemService,
) -> Result<AccountSummary, AuthError> {
    let user = auth.current_user().await.ok_or(AuthError::NotLoggedIn)?;
    let model = match system.model_status().await {
        Ok(status) => status,
        Err(err) => {
            warn!("Model status unavailable: {}", err);
            ModelStatus { connected: false, detail: Some(err.to_string()) }
        }
    };
    Ok(AccountSummary {
        display_name: user.display_name(),
        email: user.email,
        login_count: auth.login_count().await,
        model,
        reevaluate_available: system.reevaluate_available().await,
    })
}
