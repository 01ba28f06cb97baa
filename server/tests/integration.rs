//! Integration Tests for HistoFlow Server
//!
//! These tests drive the HTTP surface and the upload client against
//! in-memory storage, testing the system as a whole rather than
//! individual units.

use axum::http::StatusCode;
use histoflow_server::storage::ObjectStore;
use tower::util::ServiceExt;

mod common;
use common::*;

// ============================================================================
// HTTP Route Integration Tests
// ============================================================================

mod http_routes {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["storage"], "ready");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_initiate_returns_session_handle() {
        let app = create_test_app();

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/uploads/initiate",
                json!({"filename": "scans/kidney.svs", "partSizeHint": 2048}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["uploadId"].as_str().is_some_and(|id| !id.is_empty()));
        let key = json["key"].as_str().unwrap();
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with("-kidney.svs"));
        assert_eq!(json["partSize"], 2048);
        assert_eq!(app.store.pending_upload_count(), 1);
    }

    #[tokio::test]
    async fn test_initiate_rejects_blank_filename() {
        let app = create_test_app();

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/uploads/initiate",
                json!({"filename": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_presign_rejects_out_of_range_part_number() {
        let app = create_test_app();
        let init = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/initiate",
                    json!({"filename": "a.svs"}),
                ))
                .await
                .unwrap(),
        )
        .await;

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/uploads/presign",
                json!({
                    "uploadId": init["uploadId"],
                    "key": init["key"],
                    "partNumbers": [1, 10001],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "presign_error");
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_http() {
        let app = create_test_app();
        let data = test_bytes(2 * 1024 + 100);

        let init = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/initiate",
                    json!({"filename": "liver.tiff", "partSizeHint": 1024}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let upload_id = init["uploadId"].as_str().unwrap().to_string();
        let key = init["key"].as_str().unwrap().to_string();

        let presigned = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/presign",
                    json!({"uploadId": upload_id, "key": key, "partNumbers": [1, 2, 3]}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let urls = presigned["urls"].as_array().unwrap();
        assert_eq!(urls.len(), 3);

        let mut parts = Vec::new();
        for (index, chunk) in data.chunks(1024).enumerate() {
            let entry = &urls[index];
            assert_eq!(entry["partNumber"], index as u64 + 1);
            let etag = app
                .store
                .put_presigned_part(
                    entry["url"].as_str().unwrap(),
                    bytes::Bytes::copy_from_slice(chunk),
                )
                .unwrap();
            parts.push(json!({"partNumber": index + 1, "etag": format!("\"{}\"", etag)}));
        }

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/v1/uploads/complete",
                json!({
                    "uploadId": upload_id,
                    "key": key,
                    "parts": parts,
                    "datasetName": "Liver Panel",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["key"], key.as_str());
        assert_eq!(json["datasetName"], "Liver Panel");
        assert_eq!(json["tilingTriggered"], true);

        let stored = app.store.get_object(UPLOADS_BUCKET, &key).await.unwrap();
        assert_eq!(stored.as_ref(), data.as_slice());

        let jobs = app.trigger.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].image_id, json["imageId"].as_str().unwrap());
        assert_eq!(jobs[0].source_bucket, UPLOADS_BUCKET);
        assert_eq!(jobs[0].source_object_name, key);
        assert_eq!(jobs[0].dataset_name.as_deref(), Some("Liver Panel"));
    }

    #[tokio::test]
    async fn test_complete_with_gap_is_conflict() {
        let app = create_test_app();
        let init = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/initiate",
                    json!({"filename": "a.svs"}),
                ))
                .await
                .unwrap(),
        )
        .await;

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/uploads/complete",
                json!({
                    "uploadId": init["uploadId"],
                    "key": init["key"],
                    "parts": [
                        {"partNumber": 1, "etag": "a"},
                        {"partNumber": 3, "etag": "c"},
                    ],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "completion_mismatch");
        assert!(app.trigger.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tiling_failure_is_reported_and_object_is_kept() {
        let app = create_test_app_with(
            test_config(),
            RecordingTrigger {
                fail: true,
                ..Default::default()
            },
        );
        let init = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/initiate",
                    json!({"filename": "a.svs", "partSizeHint": 1024}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let upload_id = init["uploadId"].as_str().unwrap();
        let key = init["key"].as_str().unwrap();

        let url = format!("memory://upload/{}/1", upload_id);
        let etag = app
            .store
            .put_presigned_part(&url, bytes::Bytes::from_static(b"tiny"))
            .unwrap();

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/uploads/complete",
                json!({
                    "uploadId": upload_id,
                    "key": key,
                    "parts": [{"partNumber": 1, "etag": etag}],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tilingTriggered"], false);
        assert!(
            json["tilingError"]
                .as_str()
                .is_some_and(|e| e.contains("connection refused"))
        );
        assert!(app.store.object_exists(UPLOADS_BUCKET, key).await.unwrap());
    }

    #[tokio::test]
    async fn test_abort_is_idempotent() {
        let app = create_test_app();
        let init = body_json(
            app.router
                .clone()
                .oneshot(post_json(
                    "/api/v1/uploads/initiate",
                    json!({"filename": "a.svs"}),
                ))
                .await
                .unwrap(),
        )
        .await;
        let request = json!({"uploadId": init["uploadId"], "key": init["key"]});

        let first = app
            .router
            .clone()
            .oneshot(post_json("/api/v1/uploads/abort", request.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(body_json(first).await["outcome"], "aborted");
        assert_eq!(app.store.pending_upload_count(), 0);

        let second = app
            .router
            .oneshot(post_json("/api/v1/uploads/abort", request))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await["outcome"], "already_released");
    }
}

// ============================================================================
// Dataset Listing Tests
// ============================================================================

mod dataset_listing {
    use super::*;

    fn seed_datasets(app: &TestApp, count: usize) {
        for i in 0..count {
            let id = format!("dataset-{:02}", i);
            for file in ["image.dzi", "image_files/0/0_0.jpg"] {
                app.store.put_object_with_modified(
                    TILES_BUCKET,
                    &format!("{}/{}", id, file),
                    vec![0u8; 10],
                    1_000 + i as i64,
                );
            }
        }
    }

    #[tokio::test]
    async fn test_limit_stops_scan_early_with_token() {
        let mut config = test_config();
        config.datasets.raw_page_size = 4;
        let app = create_test_app_with(config, RecordingTrigger::default());
        seed_datasets(&app, 12);

        let response = app
            .router
            .oneshot(get("/api/v1/datasets?limit=5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let datasets = json["datasets"].as_array().unwrap();
        assert_eq!(datasets.len(), 5);
        assert!(json["nextContinuationToken"].is_string());

        let modified: Vec<i64> = datasets
            .iter()
            .map(|d| d["lastModifiedEpochMillis"].as_i64().unwrap())
            .collect();
        assert!(modified.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(datasets[0]["totalObjects"], 2);
        assert_eq!(datasets[0]["totalSizeBytes"], 20);
    }

    #[tokio::test]
    async fn test_search_filters_by_display_name() {
        let app = create_test_app();
        seed_datasets(&app, 3);
        app.store.put_object(
            TILES_BUCKET,
            "dataset-01/metadata.json",
            r#"{"dataset_name":"Kidney Biopsy"}"#,
        );

        let response = app
            .router
            .oneshot(get("/api/v1/datasets?prefix=kidney"))
            .await
            .unwrap();
        let json = body_json(response).await;
        let datasets = json["datasets"].as_array().unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0]["datasetId"], "dataset-01");
        assert_eq!(datasets[0]["displayName"], "Kidney Biopsy");
        assert_eq!(json["appliedPrefix"], "kidney");
    }

    #[tokio::test]
    async fn test_empty_bucket_lists_nothing() {
        let app = create_test_app();

        let response = app.router.oneshot(get("/api/v1/datasets")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["datasets"].as_array().unwrap().is_empty());
        assert!(json["nextContinuationToken"].is_null());
    }
}

// ============================================================================
// Tiling Status and Tile Serving Tests
// ============================================================================

mod tiling_status {
    use super::*;

    const IMAGE_ID: &str = "3f2b8c1e-0000-4000-8000-000000000001";

    #[tokio::test]
    async fn test_status_follows_storage_contents() {
        let app = create_test_app();
        let uri = format!("/api/v1/tiling-status/{}", IMAGE_ID);

        let response = app.router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], "not_found");

        app.store.put_object(
            UPLOADS_BUCKET,
            &format!("uploads/{}-slide.svs", IMAGE_ID),
            vec![1u8; 4],
        );
        let response = app.router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["status"], "processing");

        app.store.put_object(
            TILES_BUCKET,
            &format!("{}/image.dzi", IMAGE_ID),
            "<Image/>",
        );
        let response = app.router.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "completed");
        assert_eq!(json["imageId"], IMAGE_ID);
    }

    #[tokio::test]
    async fn test_descriptor_and_tiles_are_served() {
        let app = create_test_app();
        app.store.put_object(
            TILES_BUCKET,
            &format!("{}/image.dzi", IMAGE_ID),
            "<Image TileSize=\"254\"/>",
        );
        app.store.put_object(
            TILES_BUCKET,
            &format!("{}/image_files/12/3_4.jpg", IMAGE_ID),
            vec![0xFF, 0xD8, 0xFF],
        );

        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/api/v1/tiles/{}/image.dzi", IMAGE_ID)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/xml"
        );

        let response = app
            .router
            .clone()
            .oneshot(get(&format!(
                "/api/v1/tiles/{}/image_files/12/3_4.jpg",
                IMAGE_ID
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), &[0xFF, 0xD8, 0xFF]);

        let response = app
            .router
            .clone()
            .oneshot(get(&format!(
                "/api/v1/tiles/{}/image_files/12/9_9.jpg",
                IMAGE_ID
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .router
            .oneshot(get(&format!(
                "/api/v1/tiles/{}/image_files/12/bogus.png",
                IMAGE_ID
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Upload Client Tests
// ============================================================================

mod upload_client {
    use super::*;
    use histoflow_server::client::{
        BytesSource, ClientError, MemoryStateStore, PartSource, RetryPolicy, UploadOptions,
        UploadSessionCoordinator,
    };
    use histoflow_server::upload::AbortOutcome;
    use rand::Rng;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const KIB: usize = 1024;

    struct Harness {
        app: TestApp,
        transport: Arc<InstrumentedTransport>,
        state: Arc<MemoryStateStore>,
        coordinator: UploadSessionCoordinator,
    }

    fn harness() -> Harness {
        harness_with(create_test_app())
    }

    fn harness_with(app: TestApp) -> Harness {
        init_test_logging();
        let transport = Arc::new(InstrumentedTransport::new(app.store.clone()));
        let state = Arc::new(MemoryStateStore::new());
        let coordinator = UploadSessionCoordinator::new(
            app.state.lifecycle.clone(),
            transport.clone(),
            state.clone(),
        );
        Harness {
            app,
            transport,
            state,
            coordinator,
        }
    }

    fn options(part_size: usize, concurrency: usize) -> UploadOptions {
        UploadOptions {
            concurrency,
            part_size_hint: part_size as u64,
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_secs(10),
            },
            ..UploadOptions::default()
        }
    }

    async fn stored(h: &Harness, key: &str) -> Vec<u8> {
        h.app
            .store
            .get_object(UPLOADS_BUCKET, key)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_uploads_file_in_planned_parts() {
        let h = harness();
        // 40 KiB in 16 KiB parts: 16 + 16 + 8
        let data = test_bytes(40 * KIB);
        let source = BytesSource::new("slide.svs", data.clone(), 1_700_000_000_000);

        let outcome = h
            .coordinator
            .upload(&source, &options(16 * KIB, 4))
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!outcome.resumed);
        assert_eq!(outcome.parts_uploaded, 3);
        assert!(outcome.storage_key.ends_with("-slide.svs"));
        assert_eq!(h.transport.attempted_parts(), vec![1, 2, 3]);
        assert_eq!(stored(&h, &outcome.storage_key).await, data);
        assert!(h.state.is_empty());
        assert!(outcome.tiling_triggered);
        assert_eq!(h.app.trigger.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let h = harness();
        let data = test_bytes(5 * KIB + 17);
        let source = BytesSource::new("slide.svs", data, 1);
        let reports = Arc::new(std::sync::Mutex::new(Vec::new()));

        let sink = reports.clone();
        let options = options(KIB, 1).with_progress(move |uploaded, total| {
            sink.lock().unwrap().push((uploaded, total));
        });
        h.coordinator.upload(&source, &options).await.unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.first(), Some(&(0, (5 * KIB + 17) as u64)));
        assert_eq!(reports.last(), Some(&((5 * KIB + 17) as u64, (5 * KIB + 17) as u64)));
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_parts_are_saved_before_progress_is_reported() {
        let h = harness();
        let total = 5 * KIB + 17;
        let source = BytesSource::new("slide.svs", test_bytes(total), 1);
        let fingerprint = source.fingerprint();
        let checked = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let state = h.state.clone();
        let seen = checked.clone();
        let options = options(KIB, 1).with_progress(move |uploaded, _| {
            if uploaded == 0 {
                return;
            }
            let session = state.session(&fingerprint).unwrap();
            let recorded: u64 = session
                .uploaded_parts
                .keys()
                .map(|n| (total as u64 - (*n as u64 - 1) * KIB as u64).min(KIB as u64))
                .sum();
            assert_eq!(recorded, uploaded);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        h.coordinator.upload(&source, &options).await.unwrap();

        assert_eq!(checked.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_tiling_outage_still_finishes_upload() {
        let h = harness_with(create_test_app_with(
            test_config(),
            RecordingTrigger {
                fail: true,
                ..Default::default()
            },
        ));
        let data = test_bytes(3 * KIB);
        let source = BytesSource::new("slide.svs", data.clone(), 1);

        let outcome = h
            .coordinator
            .upload(&source, &options(KIB, 2))
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!outcome.tiling_triggered);
        assert_eq!(stored(&h, &outcome.storage_key).await, data);
        assert!(h.state.is_empty());

        // Nothing is left to resume, so a second run is a fresh upload
        let again = h
            .coordinator
            .upload(&source, &options(KIB, 2))
            .await
            .unwrap();
        assert!(!again.resumed);
        assert_ne!(again.storage_key, outcome.storage_key);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let h = harness();
        let source = BytesSource::new("slide.svs", test_bytes(24 * KIB), 1);

        h.coordinator
            .upload(&source, &options(KIB, 3))
            .await
            .unwrap();

        assert!(h.transport.peak_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(h.transport.attempted_parts(), (1..=24).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_out_of_order_finishes_complete_in_order() {
        let h = harness();
        {
            let mut rng = rand::rng();
            let mut delays = h.transport.delays.lock().unwrap();
            for part in 1..=8 {
                delays.push((part, Duration::from_millis(rng.random_range(1..25))));
            }
        }
        let data = test_bytes(8 * KIB);
        let source = BytesSource::new("slide.svs", data.clone(), 1);

        let outcome = h
            .coordinator
            .upload(&source, &options(KIB, 4))
            .await
            .unwrap();

        // The backend rejects unsorted part lists, so a stored object means
        // the completion request was ascending
        assert_eq!(stored(&h, &outcome.storage_key).await, data);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let h = harness();
        h.transport.transient_failures.lock().unwrap().push((2, 2));
        let source = BytesSource::new("slide.svs", test_bytes(3 * KIB), 1);

        h.coordinator
            .upload(&source, &options(KIB, 1))
            .await
            .unwrap();

        let attempts = h.transport.attempts.lock().unwrap();
        assert_eq!(attempts.iter().filter(|n| **n == 2).count(), 3);
    }

    #[tokio::test]
    async fn test_failed_upload_resumes_without_resending_parts() {
        let h = harness();
        let data = test_bytes(5 * KIB);
        let source = BytesSource::new("slide.svs", data.clone(), 42);
        h.transport.reject_parts.lock().unwrap().insert(4);

        let err = h
            .coordinator
            .upload(&source, &options(KIB, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PartUpload { part_number: 4, .. }));
        assert!(err.is_resumable());
        assert_eq!(h.state.len(), 1);

        h.transport.reject_parts.lock().unwrap().clear();
        h.transport.attempts.lock().unwrap().clear();

        let outcome = h
            .coordinator
            .upload(&source, &options(KIB, 1))
            .await
            .unwrap();
        assert!(outcome.resumed);
        assert_eq!(outcome.parts_uploaded, 2);
        assert_eq!(h.transport.attempted_parts(), vec![4, 5]);
        assert_eq!(stored(&h, &outcome.storage_key).await, data);
        assert!(h.state.is_empty());
    }

    #[tokio::test]
    async fn test_changed_file_starts_new_session() {
        let h = harness();
        let first = BytesSource::new("slide.svs", test_bytes(3 * KIB), 1);
        h.transport.reject_parts.lock().unwrap().insert(2);
        h.coordinator
            .upload(&first, &options(KIB, 1))
            .await
            .unwrap_err();
        h.transport.reject_parts.lock().unwrap().clear();

        // Same name and size, different modification time
        let second = BytesSource::new("slide.svs", test_bytes(3 * KIB), 2);
        let outcome = h
            .coordinator
            .upload(&second, &options(KIB, 1))
            .await
            .unwrap();
        assert!(!outcome.resumed);
        assert_eq!(outcome.parts_uploaded, 3);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_session_resumable() {
        let h = harness();
        h.transport
            .delays
            .lock()
            .unwrap()
            .push((2, Duration::from_secs(30)));
        let data = test_bytes(4 * KIB);
        let source = BytesSource::new("slide.svs", data.clone(), 7);

        let opts = options(KIB, 1);
        let cancel = opts.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let err = h.coordinator.upload(&source, &opts).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(err.is_resumable());
        assert_eq!(h.state.len(), 1);

        h.transport.delays.lock().unwrap().clear();
        let outcome = h
            .coordinator
            .upload(&source, &options(KIB, 2))
            .await
            .unwrap();
        assert!(outcome.resumed);
        assert_eq!(outcome.parts_uploaded, 3);
        assert_eq!(stored(&h, &outcome.storage_key).await, data);
    }

    #[tokio::test]
    async fn test_abort_releases_saved_session() {
        let h = harness();
        let source = BytesSource::new("slide.svs", test_bytes(3 * KIB), 1);
        h.transport.reject_parts.lock().unwrap().insert(3);
        h.coordinator
            .upload(&source, &options(KIB, 1))
            .await
            .unwrap_err();
        assert_eq!(h.app.store.pending_upload_count(), 1);

        let outcome = h.coordinator.abort(&source).await.unwrap();
        assert_eq!(outcome, Some(AbortOutcome::Aborted));
        assert!(h.state.is_empty());
        assert_eq!(h.app.store.pending_upload_count(), 0);

        assert_eq!(h.coordinator.abort(&source).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let h = harness();
        let source = BytesSource::new("empty.svs", Vec::<u8>::new(), 1);

        let err = h
            .coordinator
            .upload(&source, &options(KIB, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptySource));
        assert_eq!(h.app.store.pending_upload_count(), 0);
    }
}
