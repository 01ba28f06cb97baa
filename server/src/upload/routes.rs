//! HTTP route handlers for multipart uploads

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::lifecycle::MultipartLifecycleService;
use super::types::{
    AbortRequest, AbortResponse, CompleteRequest, CompleteResponse, InitiateRequest,
    InitiateResponse, PresignRequest, PresignResponse, UploadError,
};
use crate::storage::StorageError;
use crate::tiling::TilingError;

/// Application state containing the lifecycle service
#[derive(Clone)]
pub struct UploadAppState {
    pub lifecycle: Arc<MultipartLifecycleService>,
}

/// Error response for upload API
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<UploadError> for UploadErrorResponse {
    fn from(e: UploadError) -> Self {
        let code = match &e {
            UploadError::InvalidRequest(_) => "invalid_request",
            UploadError::Presign { .. } => "presign_error",
            UploadError::CompletionMismatch(_) => "completion_mismatch",
            UploadError::Tiling(TilingError::Configuration(_)) => "configuration_error",
            UploadError::Tiling(_) => "tiling_unavailable",
            UploadError::Storage(StorageError::Transport { .. }) => "storage_unavailable",
            UploadError::Storage(_) => "storage_error",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl UploadErrorResponse {
    pub fn status_code(&self) -> StatusCode {
        match self.code.as_str() {
            "invalid_request" | "presign_error" => StatusCode::BAD_REQUEST,
            "completion_mismatch" => StatusCode::CONFLICT,
            "tiling_unavailable" => StatusCode::BAD_GATEWAY,
            "storage_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// POST /uploads/initiate - Open a multipart upload
pub async fn initiate(
    State(state): State<UploadAppState>,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<InitiateResponse>, UploadErrorResponse> {
    let response = state
        .lifecycle
        .initiate(&req.filename, req.content_type.as_deref(), req.part_size_hint)
        .await
        .map_err(|e| {
            tracing::error!("Failed to initiate upload for {}: {}", req.filename, e);
            UploadErrorResponse::from(e)
        })?;

    Ok(Json(response))
}

/// POST /uploads/presign - Issue presigned URLs for a batch of parts
pub async fn presign(
    State(state): State<UploadAppState>,
    Json(req): Json<PresignRequest>,
) -> Result<Json<PresignResponse>, UploadErrorResponse> {
    let urls = state
        .lifecycle
        .presign_parts(&req.upload_id, &req.key, &req.part_numbers)
        .await
        .map_err(|e| {
            tracing::warn!("Failed to presign parts for {}: {}", req.upload_id, e);
            UploadErrorResponse::from(e)
        })?;

    Ok(Json(PresignResponse { urls }))
}

/// POST /uploads/complete - Assemble the uploaded parts
pub async fn complete(
    State(state): State<UploadAppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, UploadErrorResponse> {
    let response = state
        .lifecycle
        .complete(
            &req.upload_id,
            &req.key,
            &req.parts,
            req.dataset_name.as_deref(),
        )
        .await
        .map_err(|e| {
            match &e {
                UploadError::CompletionMismatch(_) => {
                    tracing::warn!("Completion rejected for {}: {}", req.upload_id, e);
                }
                _ => {
                    tracing::error!("Failed to complete upload {}: {}", req.upload_id, e);
                }
            }
            UploadErrorResponse::from(e)
        })?;

    Ok(Json(response))
}

/// POST /uploads/abort - Release an incomplete upload
pub async fn abort(
    State(state): State<UploadAppState>,
    Json(req): Json<AbortRequest>,
) -> Result<Json<AbortResponse>, UploadErrorResponse> {
    let outcome = state
        .lifecycle
        .abort(&req.upload_id, &req.key)
        .await
        .map_err(|e| {
            tracing::error!("Failed to abort upload {}: {}", req.upload_id, e);
            UploadErrorResponse::from(e)
        })?;

    Ok(Json(AbortResponse { outcome }))
}

/// Build upload API routes
pub fn upload_routes(state: UploadAppState) -> Router {
    Router::new()
        .route("/uploads/initiate", post(initiate))
        .route("/uploads/presign", post(presign))
        .route("/uploads/complete", post(complete))
        .route("/uploads/abort", post(abort))
        .with_state(state)
}
