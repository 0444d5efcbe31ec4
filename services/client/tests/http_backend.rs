//! End-to-end checks of the REST adapters against an in-process stub backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use client_lib::adapters::{FileCredentialStore, HttpAuthAdapter, HttpBackend, RestClient};
use client_lib::cli::{App, Command, HistoryCommand};
use client_lib::config::Config;
use evaluation_core::auth::AuthContext;
use evaluation_core::domain::{Credential, EvaluationMode, StagedFile, StoredSession, User};
use evaluation_core::ports::{AuthService, CredentialStore, HistoryService, PortError, PortResult};
use evaluation_core::session::{EvaluationSession, SessionError};
use reqwest::Url;
use serde_json::{json, Value};

const TOKEN: &str = "tok-1";

//=========================================================================================
// Stub backend
//=========================================================================================

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {}", TOKEN))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response()
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut ids = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("files") {
            ids.push(format!("id-{}", field.file_name().unwrap_or("unnamed")));
        }
    }
    Json(json!({"success": true, "file_ids": ids})).into_response()
}

async fn generate(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["file_ids"] != json!(["id-ann.pdf", "id-bob.txt"]) || body["title"] != "Quiz" {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "unexpected payload"})))
            .into_response();
    }
    Json(json!({
        "success": true,
        "result": "Ann: 90\nBob: 40",
        "summary": "Two submissions graded.",
        "file_ids": ["id-ann.pdf", "id-bob.txt"],
        "scores": [
            {"name": "Ann", "score_percent": "90", "reasoning": "Thorough"},
            {"name": "Bob", "score_percent": 40.0, "details": [
                {"question": "Q1", "student_answer": "b", "correct_answer": "a", "is_correct": false}
            ]}
        ]
    }))
    .into_response()
}

async fn reevaluate(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match body["file_id"].as_str() {
        Some("id-ann.pdf") => Json(json!({
            "success": true,
            "result": {"name": "Ann", "score_percent": 95.5, "reasoning": "Second look"}
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn grade(Json(body): Json<Value>) -> Response {
    if body["github_url"] != "https://github.com/acme/widgets" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"msg": "field required"}, {"msg": "bad url"}]})),
        )
            .into_response();
    }
    Json(json!({
        "success": true,
        "result": {
            "success": true,
            "result": {
                "rule_results": [
                    {"rule_text": "Has a README", "is_satisfied": true, "evidence": "README.md present"}
                ],
                "conversational_response": "Looks tidy.",
                "detected_technology_stack": ["Rust"]
            }
        }
    }))
    .into_response()
}

async fn history_list(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"success": true, "data": [], "pagination": {"total": 0}})).into_response()
}

async fn history_detail(Path(id): Path<i64>) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": format!("History {} not found", id)})))
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "secret1" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        )
            .into_response();
    }
    Json(json!({"token": TOKEN, "user": {"id": 7, "email": body["email"]}})).into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"id": 7, "email": "ada@example.com"})).into_response()
}

fn stub() -> Router {
    Router::new()
        .route("/api/files/upload", post(upload))
        .route("/api/files/generate", post(generate))
        .route("/api/reevaluate", post(reevaluate))
        .route("/api/github/grade", post(grade))
        .route("/api/history", get(history_list))
        .route("/api/history/{id}", get(history_detail))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

async fn spawn(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/api/", addr)).unwrap()
}

//=========================================================================================
// Client wiring
//=========================================================================================

#[derive(Default)]
struct MemoryStore(Mutex<StoredSession>);

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> PortResult<StoredSession> {
        Ok(self.0.lock().unwrap().clone())
    }

    async fn save(&self, session: &StoredSession) -> PortResult<()> {
        *self.0.lock().unwrap() = session.clone();
        Ok(())
    }
}

fn signed_in() -> StoredSession {
    StoredSession {
        credential: Some(Credential {
            token: TOKEN.to_string(),
            user: User { id: 7, email: "ada@example.com".into() },
        }),
        login_count: 1,
    }
}

async fn client(base: Url, stored: StoredSession) -> (Arc<AuthContext>, Arc<HttpBackend>) {
    let rest = RestClient::new(base, std::time::Duration::from_secs(5)).unwrap();
    let store = Arc::new(MemoryStore(Mutex::new(stored)));
    let auth = Arc::new(AuthContext::new(Arc::new(HttpAuthAdapter::new(rest.clone())), store));
    auth.hydrate().await.unwrap();
    let backend = Arc::new(HttpBackend::new(rest, auth.clone()));
    (auth, backend)
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn files_are_uploaded_graded_and_reevaluated() {
    let base = spawn(stub()).await;
    let (_auth, backend) = client(base, signed_in()).await;
    let session = EvaluationSession::new(backend);

    session.select_mode(EvaluationMode::Files).await.unwrap();
    session.set_title("Quiz").await;
    session.set_description("Answer key").await;
    let report = session
        .stage_files(vec![
            StagedFile::new("ann.pdf", b"%PDF".to_vec()),
            StagedFile::new("bob.txt", b"answers".to_vec()),
        ])
        .await;
    assert_eq!(report.accepted.len(), 2);

    assert_eq!(session.submit().await.unwrap(), 2);
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.summary, "Two submissions graded.");
    assert_eq!(snapshot.records[0].score_percent, Some(90.0));
    assert_eq!(snapshot.records[1].details.len(), 1);

    let record = session.reevaluate(0).await.unwrap();
    assert_eq!(record.score_percent, Some(95.5));
    assert_eq!(session.snapshot().await.records[0].reasoning.as_deref(), Some("Second look"));

    assert_eq!(session.reevaluate(1).await, Err(SessionError::ReevaluateEndpointMissing));
}

#[tokio::test]
async fn stale_credential_surfaces_as_unauthorized() {
    let base = spawn(stub()).await;
    let mut stale = signed_in();
    if let Some(credential) = stale.credential.as_mut() {
        credential.token = "expired".into();
    }
    let (auth, backend) = client(base, stale).await;
    let session = EvaluationSession::new(backend);

    session.select_mode(EvaluationMode::Files).await.unwrap();
    session.set_title("Quiz").await;
    session.set_description("Answer key").await;
    session.stage_files(vec![StagedFile::new("ann.pdf", b"%PDF".to_vec())]).await;

    assert_eq!(session.submit().await, Err(SessionError::Unauthorized));
    assert!(session.snapshot().await.records.is_empty());

    assert_eq!(auth.refresh_user().await.unwrap_err().to_string(), "Session expired. Please login again.");
    assert!(!auth.is_authenticated().await);
    assert_eq!(auth.login_count().await, 1);
}

#[tokio::test]
async fn nested_grading_reports_are_unwrapped() {
    let base = spawn(stub()).await;
    let (_auth, backend) = client(base, signed_in()).await;
    let session = EvaluationSession::new(backend);

    session.select_mode(EvaluationMode::Repository).await.unwrap();
    session.set_repository_url("https://github.com/acme/widgets").await;
    session.set_description("Must have a README").await;

    assert_eq!(session.submit().await.unwrap(), 1);
    let snapshot = session.snapshot().await;
    assert!(snapshot.result.contains("Looks tidy."));
    assert!(snapshot.result.contains("Has a README"));
}

#[tokio::test]
async fn structured_error_details_are_kept() {
    let base = spawn(stub()).await;
    let (_auth, backend) = client(base, signed_in()).await;
    let session = EvaluationSession::new(backend.clone());

    session.select_mode(EvaluationMode::Repository).await.unwrap();
    session.set_repository_url("https://github.com/acme/other").await;
    session.set_description("Anything").await;
    assert_eq!(
        session.submit().await,
        Err(SessionError::Backend("field required, bad url".into()))
    );

    assert_eq!(
        backend.detail(12).await,
        Err(PortError::NotFound("History 12 not found".into()))
    );
}

#[tokio::test]
async fn login_keeps_the_servers_explanation() {
    let base = spawn(stub()).await;
    let rest = RestClient::new(base, std::time::Duration::from_secs(5)).unwrap();
    let adapter = HttpAuthAdapter::new(rest);

    assert_eq!(
        adapter.login("ada@example.com", "wrong").await,
        Err(PortError::Rejected("Incorrect email or password".into()))
    );
    let credential = adapter.login("ada@example.com", "secret1").await.unwrap();
    assert_eq!(credential.token, TOKEN);
    assert_eq!(credential.user.id, 7);

    assert_eq!(adapter.me(TOKEN).await.unwrap().email, "ada@example.com");
    assert_eq!(adapter.me("stale").await, Err(PortError::Unauthorized));
}

#[tokio::test]
async fn a_401_from_any_command_signs_the_user_out() {
    let base = spawn(stub()).await;
    let dir = std::env::temp_dir().join(format!("evaluator-app-{}", std::process::id()));
    let state_path = dir.join("session.json");
    let mut stale = signed_in();
    if let Some(credential) = stale.credential.as_mut() {
        credential.token = "expired".into();
    }
    FileCredentialStore::new(&state_path).save(&stale).await.unwrap();

    let api_url = base.to_string();
    let state = state_path.display().to_string();
    let config = Config::from_lookup(|key| match key {
        "EVALUATOR_API_URL" => Some(api_url.clone()),
        "EVALUATOR_STATE_PATH" => Some(state.clone()),
        _ => None,
    })
    .unwrap();
    let app = App::connect(config).await.unwrap();

    let err = app
        .run(Command::History(HistoryCommand::List { page: 1, category: None }))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Session expired. Please login again.");

    let stored = FileCredentialStore::new(&state_path).load().await.unwrap();
    assert!(stored.credential.is_none());
    assert_eq!(stored.login_count, 1);

    let again = app
        .run(Command::History(HistoryCommand::List { page: 1, category: None }))
        .await
        .unwrap_err();
    assert!(!again.is_unauthorized());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
