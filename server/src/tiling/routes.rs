//! HTTP route handlers for tiling status and tile delivery

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use super::status::{TilingStatusResolver, descriptor_key, tile_key};
use super::types::{TilingError, TilingStatus, TilingStatusResponse};
use crate::storage::{ObjectStore, StorageError};

/// Application state for tiling routes
#[derive(Clone)]
pub struct TilingAppState {
    pub resolver: Arc<TilingStatusResolver>,
    pub store: Arc<dyn ObjectStore>,
}

/// Error response for tiling API
#[derive(Debug, Serialize)]
pub struct TilingErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<TilingError> for TilingErrorResponse {
    fn from(e: TilingError) -> Self {
        let code = match &e {
            TilingError::NotFound(_) | TilingError::Storage(StorageError::NotFound { .. }) => {
                "not_found"
            }
            TilingError::Configuration(_) => "configuration_error",
            TilingError::Request(_) | TilingError::Rejected { .. } => "tiling_unavailable",
            TilingError::Storage(_) => "storage_error",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for TilingErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_coordinates" => StatusCode::BAD_REQUEST,
            "tiling_unavailable" | "storage_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// GET /tiling-status/:id - 200 completed, 202 processing, 404 not found
pub async fn get_tiling_status(
    State(state): State<TilingAppState>,
    Path(image_id): Path<String>,
) -> Result<Response, TilingErrorResponse> {
    let status = state.resolver.status(&image_id).await.map_err(|e| {
        tracing::error!("Failed to resolve tiling status for {}: {}", image_id, e);
        TilingErrorResponse::from(e)
    })?;

    let http_status = match status {
        TilingStatus::Completed => StatusCode::OK,
        TilingStatus::Processing => StatusCode::ACCEPTED,
        TilingStatus::NotFound => StatusCode::NOT_FOUND,
    };
    let body = TilingStatusResponse {
        image_id,
        status,
        message: status.message().to_string(),
    };

    Ok((http_status, Json(body)).into_response())
}

/// GET /tiles/:id/image.dzi - DZI descriptor written by the tiling service
pub async fn get_dzi_descriptor(
    State(state): State<TilingAppState>,
    Path(image_id): Path<String>,
) -> Result<Response, TilingErrorResponse> {
    let bytes = state
        .store
        .get_object(state.resolver.tiles_bucket(), &descriptor_key(&image_id))
        .await
        .map_err(|e| {
            if e.is_not_found() {
                tracing::debug!("DZI descriptor not found: {}", image_id);
            } else {
                tracing::error!("Failed to read DZI descriptor for {}: {}", image_id, e);
            }
            TilingErrorResponse::from(TilingError::from(e))
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

/// Parse a `{x}_{y}.jpg` tile file name
fn parse_tile_name(name: &str) -> Option<(u32, u32)> {
    let stem = name.strip_suffix(".jpg")?;
    let (x, y) = stem.split_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

/// GET /tiles/:id/image_files/:level/:tile - A tile as JPEG
pub async fn get_tile(
    State(state): State<TilingAppState>,
    Path((image_id, level, tile)): Path<(String, u32, String)>,
) -> Result<Response, TilingErrorResponse> {
    let (x, y) = parse_tile_name(&tile).ok_or_else(|| TilingErrorResponse {
        error: format!("Invalid tile name: {}", tile),
        code: "invalid_coordinates".to_string(),
    })?;

    let bytes = state
        .store
        .get_object(state.resolver.tiles_bucket(), &tile_key(&image_id, level, x, y))
        .await
        .map_err(|e| {
            if e.is_not_found() {
                tracing::debug!("Tile not found: {} level={} x={} y={}", image_id, level, x, y);
            } else {
                tracing::error!(
                    "Failed to read tile: {} level={} x={} y={}: {}",
                    image_id,
                    level,
                    x,
                    y,
                    e
                );
            }
            TilingErrorResponse::from(TilingError::from(e))
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    )
        .into_response())
}

/// Build tiling API routes
pub fn tiling_routes(state: TilingAppState) -> Router {
    Router::new()
        .route("/tiling-status/:id", get(get_tiling_status))
        .route("/tiles/:id/image.dzi", get(get_dzi_descriptor))
        .route("/tiles/:id/image_files/:level/:tile", get(get_tile))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_name() {
        assert_eq!(parse_tile_name("3_14.jpg"), Some((3, 14)));
        assert_eq!(parse_tile_name("3_14.png"), None);
        assert_eq!(parse_tile_name("3-14.jpg"), None);
        assert_eq!(parse_tile_name("a_1.jpg"), None);
    }
}
