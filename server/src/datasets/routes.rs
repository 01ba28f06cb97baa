//! HTTP route handler for dataset listing

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::aggregator::DatasetAggregator;
use super::types::{DatasetError, DatasetPage, DatasetQuery};

/// Application state containing the dataset aggregator
#[derive(Clone)]
pub struct DatasetAppState {
    pub aggregator: Arc<DatasetAggregator>,
}

/// Error response for dataset API
#[derive(Debug, Serialize)]
pub struct DatasetErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<DatasetError> for DatasetErrorResponse {
    fn from(e: DatasetError) -> Self {
        let code = match &e {
            DatasetError::Storage(_) => "storage_error",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for DatasetErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "storage_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Query parameters for GET /datasets
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetListParams {
    pub limit: Option<usize>,
    pub continuation_token: Option<String>,
    pub prefix: Option<String>,
}

/// GET /datasets - List datasets, most recently modified first
pub async fn list_datasets(
    State(state): State<DatasetAppState>,
    Query(params): Query<DatasetListParams>,
) -> Result<Json<DatasetPage>, DatasetErrorResponse> {
    let query = DatasetQuery {
        limit: params.limit,
        continuation_token: params.continuation_token,
        search: params.prefix,
    };

    let page = state.aggregator.list(&query).await.map_err(|e| {
        tracing::error!("Failed to list datasets: {}", e);
        DatasetErrorResponse::from(e)
    })?;

    Ok(Json(page))
}

/// Build dataset API routes
pub fn dataset_routes(state: DatasetAppState) -> Router {
    Router::new()
        .route("/datasets", get(list_datasets))
        .with_state(state)
}
