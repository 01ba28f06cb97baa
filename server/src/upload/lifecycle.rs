//! Multipart upload lifecycle against the uploads bucket

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    AbortOutcome, CompleteResponse, InitiateResponse, PartRecord, PartUrl, UploadError,
};
use crate::config::UploadConfig;
use crate::storage::{ObjectStore, StorageError};
use crate::tiling::{TilingError, TilingJobRequest, TilingTrigger};

/// Highest part number a multipart upload may use
pub const MAX_PART_NUMBER: u32 = 10_000;

const UPLOAD_PREFIX: &str = "uploads/";
const UUID_LEN: usize = 36;

/// Opens, presigns, completes and aborts multipart uploads.
///
/// Part bytes never pass through this service; clients PUT them to the
/// presigned URLs it issues.
pub struct MultipartLifecycleService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: UploadConfig,
    trigger: Option<Arc<dyn TilingTrigger>>,
}

impl MultipartLifecycleService {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, config: UploadConfig) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            config,
            trigger: None,
        }
    }

    /// Start a tiling job after every successful completion
    pub fn with_tiling_trigger(mut self, trigger: Arc<dyn TilingTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Part size for a new upload: the hint raised to the backend minimum, or the default
    pub fn part_size_for(&self, hint: Option<u64>) -> u64 {
        hint.unwrap_or(self.config.default_part_size)
            .max(self.config.min_part_size)
    }

    pub async fn initiate(
        &self,
        filename: &str,
        content_type: Option<&str>,
        part_size_hint: Option<u64>,
    ) -> Result<InitiateResponse, UploadError> {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .trim();
        if name.is_empty() {
            return Err(UploadError::InvalidRequest(
                "filename must not be empty".to_string(),
            ));
        }

        let key = format!("{}{}-{}", UPLOAD_PREFIX, Uuid::new_v4(), name);
        let part_size = self.part_size_for(part_size_hint);
        let upload_id = self
            .store
            .create_multipart_upload(&self.bucket, &key, content_type)
            .await?;

        counter!("histoflow_multipart_initiated_total").increment(1);
        info!(
            "Initiated multipart upload: key={}, upload_id={}, part_size={}",
            key, upload_id, part_size
        );

        Ok(InitiateResponse {
            upload_id,
            key,
            part_size,
        })
    }

    /// Presign the PUT of a single part
    pub async fn presign_part(
        &self,
        upload_id: &str,
        key: &str,
        part_number: u32,
    ) -> Result<String, UploadError> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(UploadError::Presign {
                part_number,
                message: format!("part number must be within 1..={}", MAX_PART_NUMBER),
            });
        }

        self.store
            .presign_upload_part(
                &self.bucket,
                key,
                upload_id,
                part_number,
                self.config.presign_expiry,
            )
            .await
            .map_err(|e| UploadError::Presign {
                part_number,
                message: e.to_string(),
            })
    }

    /// Presign a batch of parts. Either every URL is issued or none is.
    pub async fn presign_parts(
        &self,
        upload_id: &str,
        key: &str,
        part_numbers: &[u32],
    ) -> Result<Vec<PartUrl>, UploadError> {
        if part_numbers.is_empty() {
            return Err(UploadError::InvalidRequest(
                "partNumbers must not be empty".to_string(),
            ));
        }

        let mut urls = Vec::with_capacity(part_numbers.len());
        for &part_number in part_numbers {
            let url = self.presign_part(upload_id, key, part_number).await?;
            urls.push(PartUrl { part_number, url });
        }

        counter!("histoflow_presigned_urls_total").increment(urls.len() as u64);
        debug!("Presigned {} part URLs for upload {}", urls.len(), upload_id);
        Ok(urls)
    }

    /// Assemble the object and hand it to tiling
    pub async fn complete(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[PartRecord],
        dataset_name: Option<&str>,
    ) -> Result<CompleteResponse, UploadError> {
        validate_part_list(parts)?;

        self.store
            .complete_multipart_upload(&self.bucket, key, upload_id, parts)
            .await
            .map_err(|e| match e {
                StorageError::Rejected { message, .. } => UploadError::CompletionMismatch(message),
                StorageError::NoSuchUpload(_) => {
                    UploadError::CompletionMismatch(format!("upload {} no longer exists", upload_id))
                }
                other => UploadError::Storage(other),
            })?;

        counter!("histoflow_multipart_completed_total").increment(1);

        let (image_id, derived_name) = parse_upload_key(key);
        let dataset_name = dataset_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or(derived_name);
        info!(
            "Multipart upload complete: image_id={}, key={}, parts={}",
            image_id,
            key,
            parts.len()
        );

        // The upload id is consumed at this point, so only a misconfigured
        // trigger fails the call; a failed job request is reported in the body.
        let mut tiling_error = None;
        let tiling_triggered = match &self.trigger {
            Some(trigger) => {
                let job = TilingJobRequest {
                    image_id: image_id.clone(),
                    source_bucket: self.bucket.clone(),
                    source_object_name: key.to_string(),
                    dataset_name: Some(dataset_name.clone()),
                };
                match trigger.trigger(&job).await {
                    Ok(()) => true,
                    Err(e @ TilingError::Configuration(_)) => return Err(e.into()),
                    Err(e) => {
                        counter!("histoflow_tiling_trigger_failures_total").increment(1);
                        warn!("Tiling trigger failed for {}: {}", image_id, e);
                        tiling_error = Some(e.to_string());
                        false
                    }
                }
            }
            None => false,
        };

        Ok(CompleteResponse {
            key: key.to_string(),
            image_id,
            dataset_name,
            tiling_triggered,
            tiling_error,
        })
    }

    /// Release backend-held parts; a missing upload is reported, not raised
    pub async fn abort(&self, upload_id: &str, key: &str) -> Result<AbortOutcome, UploadError> {
        match self
            .store
            .abort_multipart_upload(&self.bucket, key, upload_id)
            .await
        {
            Ok(()) => {
                counter!("histoflow_multipart_aborted_total").increment(1);
                info!("Aborted multipart upload {} ({})", upload_id, key);
                Ok(AbortOutcome::Aborted)
            }
            Err(StorageError::NoSuchUpload(_)) => {
                warn!(
                    "Abort of {} ignored: upload already completed or aborted",
                    upload_id
                );
                Ok(AbortOutcome::AlreadyReleased)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Part lists must be non-empty, ascending and contiguous from 1, with etags
fn validate_part_list(parts: &[PartRecord]) -> Result<(), UploadError> {
    if parts.is_empty() {
        return Err(UploadError::CompletionMismatch(
            "no parts supplied".to_string(),
        ));
    }
    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(UploadError::CompletionMismatch(format!(
                "expected part {} at position {}, found part {}",
                expected, index, part.part_number
            )));
        }
        if part.etag.trim().is_empty() {
            return Err(UploadError::CompletionMismatch(format!(
                "part {} has an empty etag",
                part.part_number
            )));
        }
    }
    Ok(())
}

fn is_uuid_like(value: &str) -> bool {
    value.len() == UUID_LEN && value.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Split an upload key into `(image_id, dataset_name)`.
///
/// Keys produced by `initiate` look like `uploads/{uuid}-{filename}`. Other
/// keys fall back to the last path segment: the image id is everything before
/// its final `-` (or the whole key without one) and the dataset name is the
/// segment itself.
pub fn parse_upload_key(key: &str) -> (String, String) {
    if let Some(rest) = key.strip_prefix(UPLOAD_PREFIX)
        && rest.len() > UUID_LEN + 1
        && rest.is_char_boundary(UUID_LEN)
        && is_uuid_like(&rest[..UUID_LEN])
        && rest[UUID_LEN..].starts_with('-')
    {
        return (
            rest[..UUID_LEN].to_string(),
            rest[UUID_LEN + 1..].to_string(),
        );
    }

    let segment = key.rsplit('/').next().unwrap_or(key);
    let image_id = segment
        .rsplit_once('-')
        .map(|(head, _)| head)
        .unwrap_or(key);
    (image_id.to_string(), segment.to_string())
}
