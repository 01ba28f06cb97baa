//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use bytes::Bytes;
use histoflow_server::client::{PartTransport, TransportError};
use histoflow_server::config::Config;
use histoflow_server::server::{AppState, build_router};
use histoflow_server::storage::MemoryObjectStore;
use histoflow_server::tiling::{TilingError, TilingJobRequest, TilingTrigger};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const TILES_BUCKET: &str = "histoflow-tiles";
pub const UPLOADS_BUCKET: &str = "unprocessed-slides";

/// Smallest part size used by tests; keeps fixtures small
pub const TEST_MIN_PART_SIZE: u64 = 1024;

/// Configuration with small part sizes and the default bucket names
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.tiles_bucket = TILES_BUCKET.to_string();
    config.storage.uploads_bucket = UPLOADS_BUCKET.to_string();
    config.upload.min_part_size = TEST_MIN_PART_SIZE;
    config.upload.default_part_size = 4 * TEST_MIN_PART_SIZE;
    config
}

/// A fully wired application over in-memory storage
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryObjectStore>,
    pub trigger: Arc<RecordingTrigger>,
}

/// Initialize tracing for tests; repeated calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "histoflow_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Create a test application with a recording tiling trigger
pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), RecordingTrigger::default())
}

/// Create a test application from an adjusted configuration and trigger
pub fn create_test_app_with(config: Config, trigger: RecordingTrigger) -> TestApp {
    let store = Arc::new(MemoryObjectStore::with_min_part_size(TEST_MIN_PART_SIZE));
    let trigger = Arc::new(trigger);
    let state = AppState::new(
        config,
        store.clone(),
        Some(trigger.clone() as Arc<dyn TilingTrigger>),
    );
    TestApp {
        router: build_router(state.clone()),
        state,
        store,
        trigger,
    }
}

/// Build a JSON POST request
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Deterministic, non-repeating file contents
pub fn test_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Tiling trigger that records jobs instead of calling a service
#[derive(Default)]
pub struct RecordingTrigger {
    pub jobs: Mutex<Vec<TilingJobRequest>>,
    pub fail: bool,
}

#[async_trait]
impl TilingTrigger for RecordingTrigger {
    async fn trigger(&self, job: &TilingJobRequest) -> Result<(), TilingError> {
        if self.fail {
            return Err(TilingError::Request("connection refused".to_string()));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Wraps the in-memory store's part endpoint with instrumentation and
/// injected faults
pub struct InstrumentedTransport {
    store: Arc<MemoryObjectStore>,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub attempts: Mutex<Vec<u32>>,
    /// Parts that fail permanently
    pub reject_parts: Mutex<HashSet<u32>>,
    /// Remaining transient failures to inject per part
    pub transient_failures: Mutex<Vec<(u32, usize)>>,
    /// Optional per-part delay, by part number
    pub delays: Mutex<Vec<(u32, Duration)>>,
}

impl InstrumentedTransport {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            reject_parts: Mutex::new(HashSet::new()),
            transient_failures: Mutex::new(Vec::new()),
            delays: Mutex::new(Vec::new()),
        }
    }

    /// Distinct part numbers that reached the transport, sorted
    pub fn attempted_parts(&self) -> Vec<u32> {
        let mut parts = self.attempts.lock().unwrap().clone();
        parts.sort_unstable();
        parts.dedup();
        parts
    }

    fn delay_for(&self, part_number: u32) -> Option<Duration> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| *n == part_number)
            .map(|(_, d)| *d)
    }

    fn take_transient_failure(&self, part_number: u32) -> bool {
        let mut failures = self.transient_failures.lock().unwrap();
        match failures.iter_mut().find(|(n, left)| *n == part_number && *left > 0) {
            Some((_, left)) => {
                *left -= 1;
                true
            }
            None => false,
        }
    }
}

fn part_number_from_url(url: &str) -> u32 {
    url.rsplit('/').next().unwrap().parse().unwrap()
}

#[async_trait]
impl PartTransport for InstrumentedTransport {
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, TransportError> {
        let part_number = part_number_from_url(url);
        self.attempts.lock().unwrap().push(part_number);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delay_for(part_number).unwrap_or(Duration::from_millis(2));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.reject_parts.lock().unwrap().contains(&part_number) {
            return Err(TransportError::Rejected {
                status: 403,
                message: "signature expired".to_string(),
            });
        }
        if self.take_transient_failure(part_number) {
            return Err(TransportError::Transient("connection reset".to_string()));
        }
        self.store.put_part(url, body).await
    }
}
