//! crates/evaluation_core/src/auth.rs
//!
//! The explicit auth context: who is signed in, how that survives restarts,
//! and which screens need a signed-in user.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{Credential, StoredSession, User};
use crate::ports::{AuthService, CredentialStore, PortError};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    /// The backend's own explanation, shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("Login failed. Please try again.")]
    LoginFailed,
    #[error("Registration failed. Please try again.")]
    RegistrationFailed,
    #[error("Session expired. Please login again.")]
    SessionExpired,
    #[error("You are not logged in.")]
    NotLoggedIn,
    #[error("Could not persist the session: {0}")]
    Storage(String),
}

fn explain(err: PortError, otherwise: AuthError) -> AuthError {
    match err {
        PortError::Rejected(message) => AuthError::Rejected(message),
        PortError::NotFound(detail) if !detail.trim().is_empty() => AuthError::Rejected(detail),
        other => {
            warn!("{}: {}", otherwise, other);
            otherwise
        }
    }
}

/// How a registration ended. The account exists in both cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    SignedIn(User),
    /// The automatic sign-in after registering failed.
    SignInRequired,
}

//=========================================================================================
// Routes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Services,
    History,
    About,
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Home | Route::Login | Route::Register)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Services => "/services",
            Route::History => "/history",
            Route::About => "/about",
        }
    }
}

//=========================================================================================
// Auth Context
//=========================================================================================

pub struct AuthContext {
    service: Arc<dyn AuthService>,
    store: Arc<dyn CredentialStore>,
    session: RwLock<StoredSession>,
}

impl AuthContext {
    pub fn new(service: Arc<dyn AuthService>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            service,
            store,
            session: RwLock::new(StoredSession::default()),
        }
    }

    /// Restores the persisted credential and login counter.
    pub async fn hydrate(&self) -> Result<Option<User>, AuthError> {
        let stored = self
            .store
            .load()
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let user = stored.credential.as_ref().map(|c| c.user.clone());
        debug!(signed_in = user.is_some(), logins = stored.login_count, "Session restored");
        *self.session.write().await = stored;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let credential = self
            .service
            .login(email.trim(), password)
            .await
            .map_err(|e| explain(e, AuthError::LoginFailed))?;
        let user = credential.user.clone();

        let mut session = self.session.write().await;
        let mut next = session.clone();
        next.credential = Some(credential);
        next.login_count += 1;
        self.store
            .save(&next)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *session = next;

        info!(user_id = user.id, "Signed in");
        Ok(user)
    }

    /// Validates locally, creates the account, then signs in with the same
    /// credentials.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<Registration, AuthError> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let created = self
            .service
            .register(email, password)
            .await
            .map_err(|e| explain(e, AuthError::RegistrationFailed))?;
        info!(user_id = created.id, "Account created");

        match self.login(email, password).await {
            Ok(user) => Ok(Registration::SignedIn(user)),
            Err(AuthError::Storage(detail)) => Err(AuthError::Storage(detail)),
            Err(err) => {
                warn!("Automatic sign-in after registration failed: {}", err);
                Ok(Registration::SignInRequired)
            }
        }
    }

    /// Forgets the credential; the login counter is kept.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let mut session = self.session.write().await;
        if session.credential.is_none() {
            return Ok(());
        }
        let next = StoredSession { credential: None, login_count: session.login_count };
        self.store
            .save(&next)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *session = next;
        info!("Signed out");
        Ok(())
    }

    /// Called when any backend call answers 401.
    pub async fn handle_unauthorized(&self) {
        warn!("Credential rejected by the backend; signing out");
        if let Err(err) = self.logout().await {
            warn!("Could not clear the stored credential: {}", err);
        }
    }

    /// Asks the backend who the credential belongs to.
    pub async fn refresh_user(&self) -> Result<User, AuthError> {
        let token = self.bearer().await.ok_or(AuthError::NotLoggedIn)?;
        match self.service.me(&token).await {
            Ok(user) => Ok(user),
            Err(PortError::Unauthorized) => {
                self.handle_unauthorized().await;
                Err(AuthError::SessionExpired)
            }
            Err(err) => Err(explain(err, AuthError::SessionExpired)),
        }
    }

    pub async fn bearer(&self) -> Option<String> {
        self.session
            .read()
            .await
            .credential
            .as_ref()
            .map(|c| c.token.clone())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session
            .read()
            .await
            .credential
            .as_ref()
            .map(|c| c.user.clone())
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.session.read().await.credential.clone()
    }

    pub async fn login_count(&self) -> u64 {
        self.session.read().await.login_count
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.credential.is_some()
    }

    /// The route to actually show: protected routes send anonymous users to login.
    pub async fn gate(&self, route: Route) -> Route {
        if route.requires_auth() && !self.is_authenticated().await {
            debug!(requested = route.path(), "Redirecting to login");
            return Route::Login;
        }
        route
    }
}
