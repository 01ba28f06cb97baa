//! Tiling types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while triggering tiling or reading its output
#[derive(Debug, Error)]
pub enum TilingError {
    #[error("Unsupported tiling trigger strategy: {0}")]
    Configuration(String),

    #[error("Failed to call tiling service: {0}")]
    Request(String),

    #[error("Tiling service rejected job with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// How completed uploads are handed to the tiling service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStrategy {
    /// POST the job to the tiling service
    DirectHttp,
    /// Do not trigger; an external process picks uploads up
    Disabled,
}

impl TriggerStrategy {
    pub fn parse(value: &str) -> Result<Self, TilingError> {
        match value.trim().to_lowercase().as_str() {
            "direct-http" => Ok(Self::DirectHttp),
            "none" => Ok(Self::Disabled),
            _ => Err(TilingError::Configuration(value.to_string())),
        }
    }
}

/// Job payload accepted by the tiling service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingJobRequest {
    pub image_id: String,
    pub source_bucket: String,
    pub source_object_name: String,
    #[serde(default)]
    pub dataset_name: Option<String>,
}

/// Coarse job status derived from storage contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingStatus {
    Completed,
    Processing,
    NotFound,
}

impl TilingStatus {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Completed => "Tiling completed",
            Self::Processing => "Tiling in progress",
            Self::NotFound => "No upload or tiles found for this image",
        }
    }
}

/// Response for GET /tiling-status/:id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilingStatusResponse {
    pub image_id: String,
    pub status: TilingStatus,
    pub message: String,
}
