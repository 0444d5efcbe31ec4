//! services/client/src/adapters/auth.rs
//!
//! Implements the `AuthService` port against the backend's `/auth` routes.

use async_trait::async_trait;
use evaluation_core::domain::{Credential, User};
use evaluation_core::ports::{AuthService, PortResult};
use tracing::debug;

use super::rest::{read_json, RestClient};
use super::wire::{CredentialsPayload, LoginResponse, RegisterResponse, UserWire};

#[derive(Clone)]
pub struct HttpAuthAdapter {
    rest: RestClient,
}

impl HttpAuthAdapter {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl AuthService for HttpAuthAdapter {
    async fn login(&self, email: &str, password: &str) -> PortResult<Credential> {
        let request = self
            .rest
            .post("auth/login")?
            .json(&CredentialsPayload { email, password });
        let res = self.rest.send_credentials(request).await?;
        let body: LoginResponse = read_json(res).await?;
        Ok(body.to_domain())
    }

    async fn register(&self, email: &str, password: &str) -> PortResult<User> {
        let request = self
            .rest
            .post("auth/register")?
            .json(&CredentialsPayload { email, password });
        let res = self.rest.send(request).await?;
        let body: RegisterResponse = read_json(res).await?;
        let user = body.user.to_domain();
        debug!(user_id = user.id, "Registered");
        Ok(user)
    }

    async fn me(&self, token: &str) -> PortResult<User> {
        let request = self.rest.get("auth/me")?.bearer_auth(token);
        let res = self.rest.send(request).await?;
        let body: UserWire = read_json(res).await?;
        Ok(body.to_domain())
    }
}
