//! services/client/src/adapters/backend.rs
//!
//! The REST adapter for the evaluation backend. It implements the
//! `EvaluationService`, `HistoryService` and `SystemService` ports from the
//! core crate, attaching the signed-in user's bearer token to every call.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use evaluation_core::auth::AuthContext;
use evaluation_core::domain::{
    HistoryDetail, HistoryPage, HistoryQuery, ModelStatus, StagedFile, UploadedFileHandle,
};
use evaluation_core::ports::{
    EvaluationService, GenerateOutcome, GenerateRequest, GradeOutcome, GradeRequest,
    HistoryService, PortError, PortResult, ReevaluateOutcome, ReevaluateRequest, SystemService,
    UploadOutcome,
};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use tracing::{debug, instrument, warn};

use super::rest::{read_json, RestClient};
use super::wire::{
    GeneratePayload, GenerateResponse, GradePayload, GradeResponse, HistoryDetailResponse,
    HistoryListResponse, ModelStatusWire, ReevaluatePayload, ReevaluateResponse, UploadResponse,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Speaks to the backend on behalf of whoever is signed in to `auth`.
#[derive(Clone)]
pub struct HttpBackend {
    rest: RestClient,
    auth: Arc<AuthContext>,
}

impl HttpBackend {
    pub fn new(rest: RestClient, auth: Arc<AuthContext>) -> Self {
        Self { rest, auth }
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_bytes(&self, path: &str) -> PortResult<Bytes> {
        let request = self.authorized(self.rest.get(path)?).await;
        let res = self.rest.send(request).await?;
        res.bytes()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))
    }
}

//=========================================================================================
// Evaluation
//=========================================================================================

#[async_trait]
impl EvaluationService for HttpBackend {
    #[instrument(skip_all, fields(files = files.len()))]
    async fn upload_batch(&self, files: &[StagedFile]) -> PortResult<UploadOutcome> {
        let form = files.iter().fold(Form::new(), |form, file| {
            let part = Part::bytes(file.content.to_vec()).file_name(file.name.clone());
            form.part("files", part)
        });
        let request = self.authorized(self.rest.post("files/upload")?).await;
        let res = self.rest.send(request.multipart(form)).await?;
        let body: UploadResponse = read_json(res).await?;
        debug!(handles = body.file_ids.len(), "Upload accepted");
        Ok(body.to_domain())
    }

    #[instrument(skip_all, fields(handles = request.handles.len()))]
    async fn generate(&self, request: &GenerateRequest) -> PortResult<GenerateOutcome> {
        let payload = GeneratePayload {
            title: &request.title,
            description: &request.description,
            file_ids: request.handles.iter().map(UploadedFileHandle::as_str).collect(),
            github_url: None,
            evaluate_design: request.evaluate_design,
        };
        let http = self.authorized(self.rest.post("files/generate")?).await;
        let res = self.rest.send(http.json(&payload)).await?;
        let body: GenerateResponse = read_json(res).await?;
        Ok(body.to_domain())
    }

    #[instrument(skip_all, fields(url = %request.repository_url))]
    async fn grade_repository(&self, request: &GradeRequest) -> PortResult<GradeOutcome> {
        let payload = GradePayload {
            github_url: &request.repository_url,
            description: &request.description,
        };
        let http = self.authorized(self.rest.post("github/grade")?).await;
        let res = self.rest.send(http.json(&payload)).await?;
        let body: GradeResponse = read_json(res).await?;
        body.to_domain()
            .map_err(|e| PortError::Unexpected(format!("Unreadable grading report: {}", e)))
    }

    #[instrument(skip_all, fields(file_id = %request.handle))]
    async fn reevaluate(&self, request: &ReevaluateRequest) -> PortResult<ReevaluateOutcome> {
        let payload = ReevaluatePayload {
            file_id: request.handle.as_str(),
            title: &request.title,
            description: &request.description,
        };
        let http = self.authorized(self.rest.post("reevaluate")?).await;
        let res = self.rest.send(http.json(&payload)).await?;
        let body: ReevaluateResponse = read_json(res).await?;
        Ok(body.to_domain())
    }
}

//=========================================================================================
// History
//=========================================================================================

#[async_trait]
impl HistoryService for HttpBackend {
    async fn list(&self, query: &HistoryQuery) -> PortResult<HistoryPage> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(category) = &query.category {
            params.push(("category", category.clone()));
        }
        let request = self.authorized(self.rest.get("history")?).await;
        let res = self.rest.send(request.query(&params)).await?;
        let body: HistoryListResponse = read_json(res).await?;
        if !body.success {
            return Err(PortError::Unexpected("history listing was not successful".to_string()));
        }
        Ok(body.to_domain())
    }

    async fn detail(&self, id: i64) -> PortResult<HistoryDetail> {
        let request = self.authorized(self.rest.get(&format!("history/{}", id))?).await;
        let res = self.rest.send(request).await?;
        let body: HistoryDetailResponse = read_json(res).await?;
        match body.data {
            Some(detail) if body.success => Ok(detail.to_domain()),
            _ => Err(PortError::NotFound(format!("history record {}", id))),
        }
    }

    async fn delete(&self, id: i64) -> PortResult<()> {
        let request = self.authorized(self.rest.delete(&format!("history/{}", id))?).await;
        self.rest.send(request).await?;
        Ok(())
    }

    async fn download_file(&self, handle: &UploadedFileHandle) -> PortResult<Bytes> {
        self.get_bytes(&format!("history/download/{}", handle)).await
    }

    async fn download_report(&self, result_id: i64) -> PortResult<Bytes> {
        self.get_bytes(&format!("history/download-report/{}", result_id)).await
    }
}

//=========================================================================================
// System
//=========================================================================================

#[async_trait]
impl SystemService for HttpBackend {
    async fn model_status(&self) -> PortResult<ModelStatus> {
        let request = self.authorized(self.rest.get("system/openrouter/status")?).await;
        let res = self.rest.send(request).await?;
        let body: ModelStatusWire = read_json(res).await?;
        Ok(body.to_domain())
    }

    async fn reevaluate_available(&self) -> bool {
        let request = match self.rest.get("reevaluate/health") {
            Ok(request) => self.authorized(request).await,
            Err(_) => return false,
        };
        match self.rest.send(request).await {
            Ok(_) => true,
            Err(err) => {
                warn!("Re-evaluate endpoint check failed: {}", err);
                false
            }
        }
    }
}
