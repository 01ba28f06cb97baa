//! Multipart upload wire types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;
use crate::tiling::TilingError;

/// Errors raised by the multipart lifecycle
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to presign part {part_number}: {message}")]
    Presign { part_number: u32, message: String },

    #[error("Part set rejected at completion: {0}")]
    CompletionMismatch(String),

    #[error(transparent)]
    Tiling(#[from] TilingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One uploaded part, identified by its 1-based number and the backend's etag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRecord {
    pub part_number: u32,
    pub etag: String,
}

/// POST /uploads/initiate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size_hint: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub upload_id: String,
    pub key: String,
    pub part_size: u64,
}

/// POST /uploads/presign
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub upload_id: String,
    pub key: String,
    pub part_numbers: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignResponse {
    pub urls: Vec<PartUrl>,
}

/// POST /uploads/complete
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub upload_id: String,
    pub key: String,
    pub parts: Vec<PartRecord>,
    /// Overrides the dataset name derived from the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub key: String,
    pub image_id: String,
    pub dataset_name: String,
    pub tiling_triggered: bool,
    /// Set when the object was stored but the tiling job could not be submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiling_error: Option<String>,
}

/// POST /uploads/abort
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortRequest {
    pub upload_id: String,
    pub key: String,
}

/// Result of an abort; releasing an upload that no longer exists is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortOutcome {
    Aborted,
    AlreadyReleased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortResponse {
    pub outcome: AbortOutcome,
}
