//! Upload session lifecycle: initiate or resume, upload parts, complete

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::api::UploadApi;
use super::plan::ChunkPlan;
use super::pool::{PartUploadWorkerPool, RetryPolicy, upload_with_retry};
use super::presign::PresignBatcher;
use super::source::PartSource;
use super::state::{UploadSession, UploadStateStore};
use super::transport::PartTransport;
use super::types::ClientError;
use crate::upload::{AbortOutcome, AbortRequest, CompleteRequest, InitiateRequest};

/// Progress callback: `(uploaded_bytes, total_bytes)`
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Per-upload knobs
#[derive(Clone)]
pub struct UploadOptions {
    pub concurrency: usize,
    pub part_size_hint: u64,
    pub content_type: Option<String>,
    /// Dataset name passed through to tiling on completion
    pub dataset_name: Option<String>,
    pub retry: RetryPolicy,
    /// Abort signal shared by every worker
    pub cancel: CancellationToken,
    pub progress: Option<ProgressFn>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            part_size_hint: 16 * 1024 * 1024,
            content_type: None,
            dataset_name: None,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

impl UploadOptions {
    pub fn with_progress(mut self, progress: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    fn report(&self, uploaded: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress(uploaded, total);
        }
    }
}

/// Result of a finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub storage_key: String,
    /// Whether a persisted session was picked up
    pub resumed: bool,
    /// Parts sent during this call, excluding those recorded earlier
    pub parts_uploaded: u32,
    /// False when the object was stored but no tiling job was submitted
    pub tiling_triggered: bool,
}

/// Owns one upload from initiation to completion.
///
/// The session is persisted right after initiation and after every part, so
/// any failure before completion leaves it resumable by a later call with a
/// source of the same fingerprint. One coordinator per session at a time.
pub struct UploadSessionCoordinator {
    api: Arc<dyn UploadApi>,
    transport: Arc<dyn PartTransport>,
    state: Arc<dyn UploadStateStore>,
}

impl UploadSessionCoordinator {
    pub fn new(
        api: Arc<dyn UploadApi>,
        transport: Arc<dyn PartTransport>,
        state: Arc<dyn UploadStateStore>,
    ) -> Self {
        Self {
            api,
            transport,
            state,
        }
    }

    async fn load_or_initiate(
        &self,
        source: &dyn PartSource,
        options: &UploadOptions,
    ) -> Result<(UploadSession, bool), ClientError> {
        let fingerprint = source.fingerprint();
        if let Some(session) = self.state.get(&fingerprint).await? {
            info!(
                "Resuming upload {} for {} with {} parts recorded",
                session.upload_id,
                source.name(),
                session.uploaded_parts.len()
            );
            return Ok((session, true));
        }

        let init = self
            .api
            .initiate(&InitiateRequest {
                filename: source.name().to_string(),
                content_type: options.content_type.clone(),
                part_size_hint: Some(options.part_size_hint),
            })
            .await
            .map_err(|e| ClientError::Initiation(e.to_string()))?;

        let session = UploadSession::new(&fingerprint, init);
        self.state.put(&session).await?;
        info!(
            "Initiated upload {} for {} ({} byte parts)",
            session.upload_id,
            source.name(),
            session.part_size
        );
        Ok((session, false))
    }

    pub async fn upload(
        &self,
        source: &dyn PartSource,
        options: &UploadOptions,
    ) -> Result<UploadOutcome, ClientError> {
        if source.size() == 0 {
            return Err(ClientError::EmptySource);
        }
        let started = Instant::now();
        let fingerprint = source.fingerprint();
        let (session, resumed) = self.load_or_initiate(source, options).await?;

        let plan = ChunkPlan::new(source.size(), session.part_size)?;
        let total_bytes = plan.file_size();
        let recorded: BTreeSet<u32> = session
            .uploaded_parts
            .keys()
            .copied()
            .filter(|n| *n <= plan.total_parts())
            .collect();
        let uploaded_bytes = AtomicU64::new(plan.bytes_for(recorded.iter().copied()));
        options.report(uploaded_bytes.load(Ordering::SeqCst), total_bytes);

        let upload_id = session.upload_id.clone();
        let storage_key = session.storage_key.clone();
        let pending: Vec<u32> = plan
            .part_numbers()
            .filter(|n| !recorded.contains(n))
            .collect();
        let parts_uploaded = pending.len() as u32;

        let batcher = PresignBatcher::new(
            self.api.clone(),
            upload_id.clone(),
            storage_key.clone(),
            pending,
        );
        let session = Mutex::new(session);
        let pool = PartUploadWorkerPool::new(options.concurrency, options.cancel.clone());

        let result = pool
            .run(
                plan.total_parts(),
                |n| recorded.contains(&n),
                |part_number, stop| {
                    let batcher = &batcher;
                    let session = &session;
                    let uploaded_bytes = &uploaded_bytes;
                    let plan = &plan;
                    let transport = self.transport.as_ref();
                    let state = self.state.as_ref();
                    async move {
                        let url = tokio::select! {
                            _ = stop.cancelled() => return Err(ClientError::Cancelled),
                            url = batcher.url_for(part_number) => url?,
                        };

                        let range = plan.part_range(part_number);
                        let len = range.end - range.start;
                        let body = source.read_range(range).await?;

                        let url = url.as_str();
                        let etag = upload_with_retry(&options.retry, part_number, &stop, move || {
                            transport.put_part(url, body.clone())
                        })
                        .await?;

                        // Persist before progress is reported
                        {
                            let mut session = session.lock().await;
                            session.record_part(part_number, etag);
                            state.put(&session).await?;
                        }

                        counter!("histoflow_client_parts_uploaded_total").increment(1);
                        let done = uploaded_bytes.fetch_add(len, Ordering::SeqCst) + len;
                        options.report(done, total_bytes);
                        Ok(())
                    }
                },
            )
            .await;

        if let Err(e) = result {
            warn!(
                "Upload {} of {} stopped, session kept for resume: {}",
                upload_id,
                source.name(),
                e
            );
            return Err(e);
        }

        let session = session.into_inner();
        let parts = session.part_records();
        if parts.len() as u32 != plan.total_parts() {
            return Err(ClientError::Completion(format!(
                "{} of {} parts recorded",
                parts.len(),
                plan.total_parts()
            )));
        }

        let completed = self
            .api
            .complete(&CompleteRequest {
                upload_id: upload_id.clone(),
                key: storage_key.clone(),
                parts,
                dataset_name: options.dataset_name.clone(),
            })
            .await
            .map_err(|e| {
                if e.is_completion_mismatch() {
                    ClientError::CompletionMismatch(e.to_string())
                } else {
                    ClientError::Completion(e.to_string())
                }
            })?;

        if let Err(e) = self.state.delete(&fingerprint).await {
            warn!("Upload {} completed but its session was not erased: {}", upload_id, e);
        }

        if let Some(reason) = &completed.tiling_error {
            warn!("Upload {} stored but tiling was not started: {}", upload_id, reason);
        }

        histogram!("histoflow_client_upload_duration_seconds").record(started.elapsed());
        info!(
            "Upload {} complete: key={}, parts={}, elapsed={:?}",
            upload_id,
            storage_key,
            plan.total_parts(),
            started.elapsed()
        );

        Ok(UploadOutcome {
            success: true,
            storage_key,
            resumed,
            parts_uploaded,
            tiling_triggered: completed.tiling_triggered,
        })
    }

    /// Abort the persisted session for `source`, if any, and erase it.
    ///
    /// Returns `None` when there was nothing to abort.
    pub async fn abort(&self, source: &dyn PartSource) -> Result<Option<AbortOutcome>, ClientError> {
        let fingerprint = source.fingerprint();
        let Some(session) = self.state.get(&fingerprint).await? else {
            return Ok(None);
        };

        let outcome = self
            .api
            .abort(&AbortRequest {
                upload_id: session.upload_id.clone(),
                key: session.storage_key.clone(),
            })
            .await
            .map_err(|e| ClientError::Abort(e.to_string()))?;
        self.state.delete(&fingerprint).await?;

        info!(
            "Aborted upload {} for {} ({:?})",
            session.upload_id,
            source.name(),
            outcome
        );
        Ok(Some(outcome))
    }
}
