//! Storage types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by an object store backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Multipart upload not found: {0}")]
    NoSuchUpload(String),

    #[error("{operation} rejected by storage: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed to reach storage: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("Failed to presign request: {0}")]
    Presign(String),
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// One page request against a bucket listing
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: i32,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>, max_keys: i32) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            continuation_token: None,
            max_keys,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// A single listed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified_millis: i64,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub objects: Vec<ObjectInfo>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}
