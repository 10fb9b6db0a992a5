//! HTTP route handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use recommend_types::AssessmentSummary;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::error::RecommendError;
use crate::recommender::Recommender;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub default_top_k: usize,
}

impl AppState {
    pub fn new(recommender: Recommender, default_top_k: usize) -> Self {
        Self {
            recommender,
            default_top_k,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    #[serde(default)]
    pub is_url: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub top_k: Option<usize>,
}

/// Errors surfaced to HTTP clients as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self {
        if e.is_invalid_top_k() {
            ApiError::InvalidRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Assessment Recommendation API is running" }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn recommend(
    State(state): State<AppState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<Vec<AssessmentSummary>>, ApiError> {
    let Query(params) = params?;
    let Json(request) = body?;
    let k = params.top_k.unwrap_or(state.default_top_k);

    let result = state
        .recommender
        .recommend(&request.query, request.is_url, k)
        .await?;

    info!(k, results = result.len(), "Recommend request served");
    Ok(Json(result.summaries()))
}
