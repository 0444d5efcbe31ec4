//! services/client/src/adapters/rest.rs
//!
//! The shared HTTP plumbing every backend adapter goes through: URL joining,
//! bearer headers, and turning non-success responses into `PortError`s.

use std::time::Duration;

use evaluation_core::ports::{PortError, PortResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = concat!("evaluator/", env!("CARGO_PKG_VERSION"));

/// A thin wrapper over `reqwest` rooted at the backend's API base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base: Url,
}

impl RestClient {
    /// `base` must end with `/`; see `config::parse_base_url`.
    pub fn new(base: Url, timeout: Duration) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Could not build HTTP client: {}", e)))?;
        Ok(Self { client, base })
    }

    pub fn endpoint(&self, path: &str) -> PortResult<Url> {
        self.base
            .join(path)
            .map_err(|e| PortError::Unexpected(format!("Bad endpoint '{}': {}", path, e)))
    }

    pub fn get(&self, path: &str) -> PortResult<RequestBuilder> {
        Ok(self.client.get(self.endpoint(path)?))
    }

    pub fn post(&self, path: &str) -> PortResult<RequestBuilder> {
        Ok(self.client.post(self.endpoint(path)?))
    }

    pub fn delete(&self, path: &str) -> PortResult<RequestBuilder> {
        Ok(self.client.delete(self.endpoint(path)?))
    }

    /// Sends the request; any non-success status becomes an error.
    pub async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let res = request.send().await.map_err(transport_error)?;
        if res.status().is_success() {
            return Ok(res);
        }
        Err(error_from_response(res, false).await)
    }

    /// Like `send`, for the sign-in call: a 401 there means wrong credentials,
    /// so the server's explanation is kept rather than reported as an expired session.
    pub async fn send_credentials(&self, request: RequestBuilder) -> PortResult<Response> {
        let res = request.send().await.map_err(transport_error)?;
        if res.status().is_success() {
            return Ok(res);
        }
        Err(error_from_response(res, true).await)
    }
}

/// Decodes a successful response body.
pub async fn read_json<T: DeserializeOwned>(res: Response) -> PortResult<T> {
    let body = res.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| PortError::Unexpected(format!("Malformed response body: {}", e)))
}

fn transport_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Transport("the request timed out".to_string())
    } else if err.is_decode() || err.is_body() {
        PortError::Unexpected(err.to_string())
    } else {
        PortError::Transport(err.to_string())
    }
}

//=========================================================================================
// Error bodies
//=========================================================================================

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
    error: Option<String>,
}

/// Extracts the server's explanation: `detail` as a string, as a list of
/// `{msg}` objects, or as any other object; then `error`.
pub fn structured_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    let from_detail = match parsed.detail {
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join(", "))
        }
        Some(other @ Value::Object(_)) => Some(other.to_string()),
        _ => None,
    };
    from_detail
        .or(parsed.error)
        .filter(|message| !message.trim().is_empty())
}

async fn error_from_response(res: Response, credentials: bool) -> PortError {
    let status = res.status();
    let url = res.url().clone();
    let body = res.bytes().await.unwrap_or_default();
    let message = structured_message(&body);
    debug!(%status, %url, message = ?message, "Backend returned an error");

    match (status, message) {
        (StatusCode::UNAUTHORIZED, Some(message)) if credentials => PortError::Rejected(message),
        (StatusCode::UNAUTHORIZED, _) => PortError::Unauthorized,
        (StatusCode::NOT_FOUND, message) => PortError::NotFound(message.unwrap_or_default()),
        (_, Some(message)) => PortError::Rejected(message),
        (status, None) => PortError::Status(status.as_u16()),
    }
}
