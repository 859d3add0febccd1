//! HTTP API over the crawler.
//!
//! - `GET /` service description
//! - `GET /api/status` liveness, active jobs, uptime
//! - `POST /api/extract` crawl one URL and return the merged document
//! - `POST /api/extract-text` text under a CSS selector on one page
//! - `POST /api/batch` queue a batch job, answered with `202` and a task id
//! - `GET /api/batch/:task_id` job snapshot
//!
//! Errors are answered as `{"status": "error", "message": ...}`.

use crate::config::{CrawlOptions, CrawlOverrides};
use crate::crawlers::batch::{SelectedText, crawl_document, crawl_selected_text};
use crate::errors::{CrawlError, CrawlResult};
use crate::jobs::{JobRegistry, JobSnapshot};
use crate::renderer::{self, RendererFactory};
use crate::results::DocumentRecord;
use crate::utils::validate_url;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Errors answered by the API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Crawl(#[from] CrawlError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_)
            | ApiError::Crawl(CrawlError::InvalidUrl(_))
            | ApiError::Crawl(CrawlError::InvalidSelector(_)) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Crawl(_) => StatusCode::BAD_GATEWAY,
        };

        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    factory: Arc<dyn RendererFactory>,
    jobs: Arc<JobRegistry>,
    defaults: CrawlOptions,
    started_at: Instant,
}

impl AppState {
    pub fn new(factory: Arc<dyn RendererFactory>, defaults: CrawlOptions, max_concurrency: usize) -> Self {
        let jobs = Arc::new(JobRegistry::new(Arc::clone(&factory), max_concurrency));
        Self {
            factory,
            jobs,
            defaults,
            started_at: Instant::now(),
        }
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    /// Factory for one request, with its browser overrides applied
    fn factory_for(&self, overrides: &CrawlOverrides) -> Arc<dyn RendererFactory> {
        renderer::factory_for(&self.factory, &overrides.session())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub options: CrawlOverrides,
}

fn default_selector() -> String {
    "body".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractTextRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default)]
    pub options: CrawlOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractTextResponse {
    pub status: String,
    #[serde(flatten)]
    pub text: SelectedText,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: CrawlOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub active_jobs: usize,
    pub uptime_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAccepted {
    pub status: String,
    pub task_id: Uuid,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/extract", post(extract))
        .route("/api/extract-text", post(extract_text))
        .route("/api/batch", post(submit_batch))
        .route("/api/batch/:task_id", get(batch_status))
        .with_state(state)
}

/// Serves the API until Ctrl+C, then aborts unfinished jobs
pub async fn serve(state: AppState, host: &str, port: u16) -> CrawlResult<()> {
    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    ::log::info!("API server listening on {}", address);

    let jobs = Arc::clone(&state.jobs);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    jobs.shutdown().await;
    ::log::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => ::log::info!("Received Ctrl+C, shutting down"),
        Err(e) => ::log::error!("Failed to listen for Ctrl+C: {}", e),
    }
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            {"path": "/api/status", "method": "GET", "description": "Server status"},
            {"path": "/api/extract", "method": "POST", "description": "Extract one URL, following pagination"},
            {"path": "/api/extract-text", "method": "POST", "description": "Extract the text under a CSS selector"},
            {"path": "/api/batch", "method": "POST", "description": "Queue a batch extraction job"},
            {"path": "/api/batch/:task_id", "method": "GET", "description": "Batch job status and results"},
        ]
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        active_jobs: state.jobs.active_count().await,
        uptime_secs: state.started_at.elapsed().as_secs_f64(),
    })
}

pub async fn extract(
    State(state): State<AppState>,
    body: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("request has no url".to_string()))?;
    let url = validate_url(&url)?;
    let options = request
        .options
        .apply(state.defaults)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let factory = state.factory_for(&request.options);

    ::log::info!("API extract request for {}", url);
    let document = crawl_document(factory.as_ref(), &url, &options).await?;
    Ok(Json(document))
}

pub async fn extract_text(
    State(state): State<AppState>,
    body: Result<Json<ExtractTextRequest>, JsonRejection>,
) -> Result<Json<ExtractTextResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("request has no url".to_string()))?;
    let options = request
        .options
        .apply(state.defaults)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let factory = state.factory_for(&request.options);

    ::log::info!("API text request for {} ({})", url, request.selector);
    let text = crawl_selected_text(factory.as_ref(), &url, &request.selector, &options).await?;
    Ok(Json(ExtractTextResponse {
        status: "success".to_string(),
        text,
    }))
}

pub async fn submit_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchAccepted>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if request.urls.is_empty() {
        return Err(ApiError::BadRequest("request has no urls".to_string()));
    }
    let options = request
        .options
        .apply(state.defaults)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let factory = state.factory_for(&request.options);
    let task_id = state
        .jobs
        .submit_with_factory(factory, request.urls, options)
        .await;
    ::log::info!("API batch request queued as {}", task_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            status: "accepted".to_string(),
            task_id,
        }),
    ))
}

pub async fn batch_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let not_found = || ApiError::NotFound(format!("no batch job {}", task_id));

    let id = Uuid::parse_str(&task_id).map_err(|_| not_found())?;
    state.jobs.get(&id).await.map(Json).ok_or_else(not_found)
}
