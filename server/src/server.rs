//! Application state and router assembly shared by the binary and tests

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::datasets::{DatasetAggregator, DatasetAppState, dataset_routes};
use crate::storage::{ListRequest, MemoryObjectStore, ObjectStore, S3ObjectStore};
use crate::tiling::{TilingAppState, TilingStatusResolver, TilingTrigger, tiling_routes};
use crate::upload::{MultipartLifecycleService, UploadAppState, upload_routes};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ObjectStore>,
    pub lifecycle: Arc<MultipartLifecycleService>,
    pub aggregator: Arc<DatasetAggregator>,
    pub resolver: Arc<TilingStatusResolver>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        trigger: Option<Arc<dyn TilingTrigger>>,
    ) -> Self {
        let mut lifecycle = MultipartLifecycleService::new(
            store.clone(),
            config.storage.uploads_bucket.clone(),
            config.upload.clone(),
        );
        if let Some(trigger) = trigger {
            lifecycle = lifecycle.with_tiling_trigger(trigger);
        }
        let aggregator = DatasetAggregator::new(
            store.clone(),
            config.storage.tiles_bucket.clone(),
            config.datasets.clone(),
        );
        let resolver = TilingStatusResolver::new(
            store.clone(),
            config.storage.tiles_bucket.clone(),
            config.storage.uploads_bucket.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            lifecycle: Arc::new(lifecycle),
            aggregator: Arc::new(aggregator),
            resolver: Arc::new(resolver),
            started_at: Instant::now(),
        }
    }
}

/// Build the configured object store
pub async fn connect_storage(config: &Config) -> Arc<dyn ObjectStore> {
    match config.storage.backend {
        StorageBackend::S3 => {
            info!("Using S3 storage in region {}", config.storage.region);
            Arc::new(S3ObjectStore::from_config(&config.storage).await)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; contents are lost on exit");
            Arc::new(MemoryObjectStore::with_min_part_size(
                config.upload.min_part_size,
            ))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub uptime_seconds: u64,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // Storage is usable if the tiles bucket can be listed
    let request = ListRequest::new(state.config.storage.tiles_bucket.clone(), 1);
    let storage_ready = match state.store.list_objects(&request).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Health check could not reach storage: {}", e);
            false
        }
    };

    let (http_status, status, storage) = if storage_ready {
        (StatusCode::OK, "healthy", "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: storage.to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}

/// Assemble `/health` and every API route under `/api/v1`
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(upload_routes(UploadAppState {
            lifecycle: state.lifecycle.clone(),
        }))
        .merge(dataset_routes(DatasetAppState {
            aggregator: state.aggregator.clone(),
        }))
        .merge(tiling_routes(TilingAppState {
            resolver: state.resolver.clone(),
            store: state.store.clone(),
        }));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
